//! Priority-ordered handler lists shared by the interceptor and monitor
//! registries.
//!
//! # Ordering (for beginners)
//!
//! Entries are kept in a `Vec` sorted ascending by priority.  A new entry is
//! inserted *after* every entry with the same or a lower priority (the
//! "upper bound" position), so among equal priorities the one registered
//! first stays first.  The result is a total order over
//! `(priority, insertion sequence)` without storing a sequence number.
//!
//! # One entry per session
//!
//! A client aggregates all of its local handlers of one type into a single
//! registration: the event mask it sends is the union of what its handlers
//! want.  Adding again from the same session replaces the old entry;
//! removing sends the union that *remains*, and the entry is re-inserted
//! with that reduced mask if it is not empty.

use mmi_core::domain::{DeviceTags, EventTypeMask, HandlerType};
use mmi_core::protocol::InputHandlerRequest;
use thiserror::Error;

use super::session::SessionId;

/// Error type for handler registration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandlerError {
    #[error("handler must name at least one event type")]
    InvalidHandler,
    #[error("handler limit of {max} reached")]
    CapacityReached { max: usize },
    #[error("session {0} has no handler registered")]
    NotFound(SessionId),
    #[error("handler type {0:?} is not accepted here")]
    WrongType(HandlerType),
}

impl HandlerError {
    /// Stable code sent back to the client.
    pub fn code(&self) -> i32 {
        match self {
            Self::InvalidHandler => -1,
            Self::CapacityReached { .. } => -2,
            Self::NotFound(_) => -3,
            Self::WrongType(_) => -4,
        }
    }
}

/// One registered interceptor or monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionHandler {
    pub session: SessionId,
    pub handler_type: HandlerType,
    pub event_types: EventTypeMask,
    pub priority: i32,
    pub device_tags: DeviceTags,
}

impl SessionHandler {
    pub fn from_request(session: SessionId, req: &InputHandlerRequest) -> Self {
        Self {
            session,
            handler_type: req.handler_type,
            event_types: req.event_types,
            priority: req.priority,
            device_tags: req.device_tags,
        }
    }

    /// Whether this handler wants an event of `class` from a device with `capabilities`.
    pub fn accepts(&self, class: u32, capabilities: DeviceTags) -> bool {
        self.event_types.contains(class) && self.device_tags.matches(capabilities)
    }
}

/// Sorted list of handlers with a fixed upper bound.
#[derive(Debug)]
pub struct HandlerCollection {
    entries: Vec<SessionHandler>,
    max: usize,
}

impl HandlerCollection {
    pub fn new(max: usize) -> Self {
        Self {
            entries: Vec::new(),
            max,
        }
    }

    /// Adds `handler`, replacing any entry from the same session.
    ///
    /// The capacity check runs before the replacement, so a full collection
    /// rejects a replacement too.
    pub fn add(&mut self, handler: SessionHandler) -> Result<(), HandlerError> {
        if handler.event_types.is_empty() {
            return Err(HandlerError::InvalidHandler);
        }
        if self.entries.len() >= self.max {
            return Err(HandlerError::CapacityReached { max: self.max });
        }
        self.entries.retain(|e| e.session != handler.session);
        self.insert_sorted(handler);
        Ok(())
    }

    /// Removes the session's entry; re-inserts it with `remaining` if that
    /// mask is not empty.
    pub fn remove(&mut self, session: SessionId, remaining: EventTypeMask) -> Result<(), HandlerError> {
        let pos = self
            .entries
            .iter()
            .position(|e| e.session == session)
            .ok_or(HandlerError::NotFound(session))?;
        let mut entry = self.entries.remove(pos);
        if !remaining.is_empty() {
            entry.event_types = remaining;
            self.insert_sorted(entry);
        }
        Ok(())
    }

    /// Drops every entry of `session`; returns how many were removed.
    pub fn purge_session(&mut self, session: SessionId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.session != session);
        before - self.entries.len()
    }

    /// Entries in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = &SessionHandler> {
        self.entries.iter()
    }

    pub fn contains_session(&self, session: SessionId) -> bool {
        self.entries.iter().any(|e| e.session == session)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert_sorted(&mut self, handler: SessionHandler) {
        let pos = self
            .entries
            .iter()
            .position(|e| e.priority > handler.priority)
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, handler);
    }
}
