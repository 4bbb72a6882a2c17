//! The fixed event pipeline shared by hardware and injected events.
//!
//! ```text
//! pointer: validate ─► interceptors ─► monitors ─► dispatch
//! key:     validate ─► interceptors ─► monitors ─► key subscribers ─► dispatch
//! ```
//!
//! An interceptor or a key subscription consumes the event.  Monitors never
//! do, except for a gesture they marked consumed (see
//! [`super::monitor::MonitorVerdict`]).

use std::sync::Arc;

use mmi_core::domain::DeviceTags;
use mmi_core::protocol::SequenceCounter;
use mmi_core::{KeyEvent, PointerAction, PointerEvent};
use tracing::{debug, trace};

use super::devices::{DeviceRegistry, DisplayState};
use super::dispatch::DispatchHandler;
use super::interceptor::InterceptorRegistry;
use super::key_subscriber::KeySubscriberRegistry;
use super::monitor::{MonitorRegistry, MonitorVerdict};

/// Where an event ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Rejected by validation.
    Invalid,
    Intercepted,
    /// Withheld because a monitor consumed the gesture.
    Suppressed,
    /// Delivered to a hot-key subscriber.
    Subscribed,
    /// Handed to the dispatch handler (delivery itself may still fail).
    Dispatched,
}

pub struct InputPipeline {
    displays: Arc<DisplayState>,
    devices: Arc<DeviceRegistry>,
    interceptors: Arc<InterceptorRegistry>,
    monitors: Arc<MonitorRegistry>,
    key_subscribers: Arc<KeySubscriberRegistry>,
    dispatch: Arc<DispatchHandler>,
    sequence: SequenceCounter,
}

impl InputPipeline {
    pub fn new(
        displays: Arc<DisplayState>,
        devices: Arc<DeviceRegistry>,
        interceptors: Arc<InterceptorRegistry>,
        monitors: Arc<MonitorRegistry>,
        key_subscribers: Arc<KeySubscriberRegistry>,
        dispatch: Arc<DispatchHandler>,
    ) -> Self {
        Self {
            displays,
            devices,
            interceptors,
            monitors,
            key_subscribers,
            dispatch,
            sequence: SequenceCounter::new(),
        }
    }

    /// Assigns an event id and runs `event` through the pipeline.
    pub fn handle_pointer_event(&self, mut event: PointerEvent) -> PipelineOutcome {
        event.id = self.sequence.next();
        if !event.is_valid() {
            debug!(event_id = event.id, action = ?event.pointer_action, "invalid pointer event dropped");
            return PipelineOutcome::Invalid;
        }

        let caps = self
            .devices
            .pointer_capabilities(event.device_id, event.source_type);
        if self.interceptors.handle_pointer_event(&event, caps) {
            return PipelineOutcome::Intercepted;
        }

        match self.monitors.handle_pointer_event(&event, caps) {
            MonitorVerdict::Dispatch => {}
            MonitorVerdict::DispatchCancel => event.pointer_action = PointerAction::Cancel,
            MonitorVerdict::Suppress => {
                trace!(event_id = event.id, "event withheld from consumed gesture");
                return PipelineOutcome::Suppressed;
            }
        }

        let displays = self.displays.snapshot();
        if let Err(e) = self.dispatch.handle_pointer_event(&event, &displays) {
            debug!(event_id = event.id, error = %e, "pointer event not delivered");
        }
        PipelineOutcome::Dispatched
    }

    /// Assigns an event id and runs `event` through the pipeline.
    pub fn handle_key_event(&self, mut event: KeyEvent) -> PipelineOutcome {
        event.id = self.sequence.next();
        if !event.is_valid() {
            debug!(event_id = event.id, key_code = event.key_code, "invalid key event dropped");
            return PipelineOutcome::Invalid;
        }

        let caps = self.devices.capabilities(event.device_id, DeviceTags::keyboard());
        if self.interceptors.handle_key_event(&event, caps) {
            return PipelineOutcome::Intercepted;
        }
        self.monitors.handle_key_event(&event, caps);
        if self.key_subscribers.handle_key_event(&event) {
            return PipelineOutcome::Subscribed;
        }

        let displays = self.displays.snapshot();
        if let Err(e) = self.dispatch.handle_key_event(&event, &displays) {
            debug!(event_id = event.id, error = %e, "key event not delivered");
        }
        PipelineOutcome::Dispatched
    }

    /// Id of the most recent event.
    pub fn last_event_id(&self) -> i32 {
        self.sequence.current()
    }
}
