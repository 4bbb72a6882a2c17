//! Entry point for raw device samples.
//!
//! [`EventNormalizeHandler`] lives on the input-reader thread.  It keeps one
//! transform processor per `(device, kind)`, created on the first sample
//! and dropped when the device goes away, runs each sample through it and
//! hands the resulting event to the [`InputPipeline`].  Device arrival and
//! removal are announced to windows registered for the matching
//! standardized event.
//!
//! # No locks on processors (for beginners)
//!
//! Every method takes `&mut self`, so the handler can only be driven by
//! whoever owns it: in the service that is [`run_reader`] on its own thread.
//! The registries it feeds are shared with the IPC side and carry their own
//! locks; the processors and the shared cursor do not need one.

use std::collections::HashMap;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Instant;

use mmi_core::domain::{DeviceId, DeviceTags, InputDevice};
use tracing::{debug, info, trace};

use super::devices::{DeviceRegistry, DisplayState};
use super::pipeline::{InputPipeline, PipelineOutcome};
use super::standardized::{StandardizedRegistry, DEVICE_ADDED, DEVICE_REMOVED};
use crate::infrastructure::input_source::RawInputEvent;
use crate::transform::{
    CursorPosition, KeyTransformProcessor, KnuckleClassifier, PointerSettings, ProcessorKind,
    TransformContext, TransformError, TransformProcessor,
};

pub struct EventNormalizeHandler {
    processors: HashMap<(DeviceId, ProcessorKind), Box<dyn TransformProcessor>>,
    keyboards: HashMap<DeviceId, KeyTransformProcessor>,
    cursor: CursorPosition,
    settings: PointerSettings,
    knuckle: Arc<dyn KnuckleClassifier>,
    displays: Arc<DisplayState>,
    devices: Arc<DeviceRegistry>,
    pipeline: Arc<InputPipeline>,
    standardized: Arc<StandardizedRegistry>,
}

impl EventNormalizeHandler {
    pub fn new(
        settings: PointerSettings,
        knuckle: Arc<dyn KnuckleClassifier>,
        displays: Arc<DisplayState>,
        devices: Arc<DeviceRegistry>,
        pipeline: Arc<InputPipeline>,
        standardized: Arc<StandardizedRegistry>,
    ) -> Self {
        Self {
            processors: HashMap::new(),
            keyboards: HashMap::new(),
            cursor: CursorPosition::UNSET,
            settings,
            knuckle,
            displays,
            devices,
            pipeline,
            standardized,
        }
    }

    /// Normalizes one raw sample and, if it produced an event, runs the pipeline.
    ///
    /// Returns `Ok(None)` for samples that only change state (device
    /// lifecycle, hover motion, unmapped codes).
    pub fn handle_raw_event(
        &mut self,
        raw: &RawInputEvent,
        now: Instant,
    ) -> Result<Option<PipelineOutcome>, TransformError> {
        let device_id = raw.device_id();
        match raw {
            RawInputEvent::DeviceAdded {
                name, capabilities, ..
            } => {
                self.devices.add(InputDevice {
                    id: device_id,
                    name: name.clone(),
                    capabilities: DeviceTags(*capabilities),
                });
                self.standardized.notify(DEVICE_ADDED, device_id);
                return Ok(None);
            }
            RawInputEvent::DeviceRemoved { .. } => {
                self.devices
                    .remove(device_id)
                    .ok_or(TransformError::UnknownDevice(device_id))?;
                self.processors.retain(|(id, _), _| *id != device_id);
                self.keyboards.remove(&device_id);
                self.standardized.notify(DEVICE_REMOVED, device_id);
                return Ok(None);
            }
            RawInputEvent::KeyboardKey { .. } => {
                let processor = self
                    .keyboards
                    .entry(device_id)
                    .or_insert_with(|| KeyTransformProcessor::new(device_id));
                if processor.normalize(raw)?.is_none() {
                    return Ok(None);
                }
                let event = processor.key_event().clone();
                return Ok(Some(self.pipeline.handle_key_event(event)));
            }
            _ => {}
        }

        let Some(kind) = ProcessorKind::for_raw(raw) else {
            return Ok(None);
        };
        let displays = self.displays.snapshot();
        let processor = self.processors.entry((device_id, kind)).or_insert_with(|| {
            debug!(device_id, ?kind, "transform processor created");
            kind.create(device_id)
        });
        let mut ctx = TransformContext {
            displays: &displays,
            cursor: &mut self.cursor,
            settings: &self.settings,
            knuckle: self.knuckle.as_ref(),
            now,
        };
        let Some(action) = processor.normalize(raw, &mut ctx)? else {
            return Ok(None);
        };
        trace!(device_id, ?action, "raw sample normalized");
        let event = processor.pointer_event().clone();
        Ok(Some(self.pipeline.handle_pointer_event(event)))
    }

    /// Fires every processor timer due at `now`.
    pub fn fire_timers(&mut self, now: Instant) -> Vec<PipelineOutcome> {
        let mut outcomes = Vec::new();
        for processor in self.processors.values_mut() {
            if processor.next_deadline().is_some_and(|d| d <= now) {
                if let Some(event) = processor.on_timer(now) {
                    outcomes.push(self.pipeline.handle_pointer_event(event));
                }
            }
        }
        outcomes
    }

    /// Earliest pending processor timer.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.processors
            .values()
            .filter_map(|p| p.next_deadline())
            .min()
    }
}

/// Drives `handler` from `rx` until every sender is gone.
///
/// Waits for the next sample, but no longer than the next processor
/// deadline, so scroll gestures end on time even when the devices go quiet.
pub fn run_reader(mut handler: EventNormalizeHandler, rx: Receiver<RawInputEvent>) {
    info!("input reader started");
    loop {
        let now = Instant::now();
        handler.fire_timers(now);
        let received = match handler.next_deadline() {
            Some(deadline) => rx.recv_timeout(deadline.saturating_duration_since(now)),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(raw) => {
                if let Err(e) = handler.handle_raw_event(&raw, Instant::now()) {
                    debug!(device_id = raw.device_id(), error = %e, "raw sample dropped");
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    info!("input reader stopped");
}
