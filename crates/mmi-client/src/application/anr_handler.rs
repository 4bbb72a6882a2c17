//! Client-side "application not responding" acknowledgements.
//!
//! The service tracks, per session, which dispatched and monitored events
//! the client has not yet acknowledged.  The client does not acknowledge
//! every event.  It records the highest id it has seen per
//! [`AnrEventType`] and, at most once per window, reports that id with
//! `MarkProcessed`, which the service treats as acknowledging everything up
//! to it.
//!
//! # When the report fires (for beginners)
//!
//! The report has to reach the service before the service's UI timeout
//! expires for the oldest unacknowledged event.  So the delay is not fixed:
//! it is the remaining budget, `ui_timeout - (now - action_time)`, capped
//! at 3.5 s.  A remaining budget under 50 ms means "report now".
//!
//! Only one report task is pending at a time.  Events that arrive while it
//! is pending just raise the recorded id; the task picks up whatever is
//! latest when it fires.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use mmi_core::domain::AnrEventType;
use mmi_core::protocol::INVALID_EVENT_ID;
use mmi_core::{current_time_us, MmiMessage};
use tracing::{debug, error, trace, warn};

use super::sender::MessageSender;

pub const DEFAULT_UI_TIMEOUT: Duration = Duration::from_secs(5);
const MIN_MARK_PROCESS_DELAY: Duration = Duration::from_millis(50);
const MAX_MARK_PROCESS_DELAY: Duration = Duration::from_millis(3500);

/// Attempts per `MarkProcessed` report, including the first.
pub const REPORT_ATTEMPTS: u32 = 3;
const REPORT_BACKOFF_BASE: Duration = Duration::from_millis(10);

/// Delay before reporting an event that happened `elapsed` ago.
pub fn mark_process_delay(ui_timeout: Duration, elapsed: Duration) -> Duration {
    let remaining = ui_timeout.saturating_sub(elapsed);
    if remaining < MIN_MARK_PROCESS_DELAY {
        return Duration::ZERO;
    }
    // Whole milliseconds.
    let millis = remaining.min(MAX_MARK_PROCESS_DELAY).as_millis();
    Duration::from_millis(u64::try_from(millis).unwrap_or(u64::MAX))
}

struct State {
    last_event_id: [i32; 2],
    last_report_id: [i32; 2],
    scheduled: bool,
}

pub struct AnrHandler {
    sender: Arc<dyn MessageSender>,
    ui_timeout: Duration,
    state: Mutex<State>,
}

impl AnrHandler {
    pub fn new(sender: Arc<dyn MessageSender>, ui_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            sender,
            ui_timeout,
            state: Mutex::new(State {
                last_event_id: [INVALID_EVENT_ID; 2],
                last_report_id: [INVALID_EVENT_ID; 2],
                scheduled: false,
            }),
        })
    }

    /// Records that `event_id` of `anr_type` was handled and schedules a
    /// report if none is pending.
    ///
    /// An id lower than the last one recorded is stale and ignored.  Must be
    /// called from within a Tokio runtime for the report to be scheduled.
    pub fn update_last_event_id(self: &Arc<Self>, anr_type: AnrEventType, event_id: i32, action_time_us: i64) {
        let delay = {
            let mut state = self.lock();
            let last = &mut state.last_event_id[anr_type.index()];
            if event_id < *last {
                debug!(?anr_type, event_id, last = *last, "stale event id ignored");
                return;
            }
            *last = event_id;
            if state.scheduled {
                return;
            }
            let elapsed_us = u64::try_from(current_time_us().saturating_sub(action_time_us)).unwrap_or(0);
            let delay = mark_process_delay(self.ui_timeout, Duration::from_micros(elapsed_us));
            state.scheduled = true;
            delay
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no async runtime; mark-processed report not scheduled");
            self.lock().scheduled = false;
            return;
        };
        trace!(?anr_type, event_id, delay_ms = delay.as_millis() as u64, "mark-processed report scheduled");
        let this = Arc::clone(self);
        runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            this.mark_processed_task().await;
        });
    }

    /// Reports every id not reported yet and clears the pending flag.
    ///
    /// Returns what was reported.
    pub async fn mark_processed_task(&self) -> Vec<(AnrEventType, i32)> {
        let pending: Vec<(AnrEventType, i32)> = {
            let mut state = self.lock();
            state.scheduled = false;
            let mut pending = Vec::new();
            for anr_type in AnrEventType::ALL {
                let i = anr_type.index();
                let last = state.last_event_id[i];
                if last == INVALID_EVENT_ID || last <= state.last_report_id[i] {
                    continue;
                }
                state.last_report_id[i] = last;
                pending.push((anr_type, last));
            }
            pending
        };

        for &(anr_type, event_id) in &pending {
            self.report(anr_type, event_id).await;
        }
        pending
    }

    pub fn last_event_id(&self, anr_type: AnrEventType) -> i32 {
        self.lock().last_event_id[anr_type.index()]
    }

    pub fn last_report_id(&self, anr_type: AnrEventType) -> i32 {
        self.lock().last_report_id[anr_type.index()]
    }

    pub fn is_scheduled(&self) -> bool {
        self.lock().scheduled
    }

    async fn report(&self, anr_type: AnrEventType, event_id: i32) {
        let msg = MmiMessage::MarkProcessed { anr_type, event_id };
        let mut backoff = REPORT_BACKOFF_BASE;
        for attempt in 1..=REPORT_ATTEMPTS {
            match self.sender.send(&msg).await {
                Ok(()) => {
                    debug!(?anr_type, event_id, attempt, "mark-processed reported");
                    return;
                }
                Err(e) if attempt < REPORT_ATTEMPTS => {
                    warn!(?anr_type, event_id, attempt, error = %e, "mark-processed report failed; retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => {
                    error!(?anr_type, event_id, error = %e, "mark-processed report failed; giving up");
                }
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
