//! Replay input source.
//!
//! Reads a JSON-lines file, one [`RawInputEvent`] per line, and plays it into
//! the pipeline.  Used for headless runs and for reproducing field reports.
//! Blank lines and lines starting with `#` are skipped; malformed lines are
//! logged and skipped.
//!
//! Recorded timestamps are preserved by default.  With
//! [`ReplayInputSource::with_pacing`] the replay thread sleeps between
//! samples so the original timing is reproduced.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{CaptureError, InputSource, RawInputEvent};

pub struct ReplayInputSource {
    path: PathBuf,
    paced: bool,
    running: Arc<AtomicBool>,
}

impl ReplayInputSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            paced: false,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Sleeps between samples according to their recorded timestamps.
    pub fn with_pacing(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parses one line of a recording; `None` for blank lines and comments.
pub fn parse_line(line: &str) -> Option<Result<RawInputEvent, serde_json::Error>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    Some(serde_json::from_str(trimmed))
}

fn event_time_us(event: &RawInputEvent) -> Option<i64> {
    match event {
        RawInputEvent::DeviceAdded { .. } | RawInputEvent::DeviceRemoved { .. } => None,
        RawInputEvent::KeyboardKey { time_us, .. }
        | RawInputEvent::PointerMotion { time_us, .. }
        | RawInputEvent::PointerButton { time_us, .. }
        | RawInputEvent::PointerAxis { time_us, .. }
        | RawInputEvent::TouchpadPointerMotion { time_us, .. }
        | RawInputEvent::TouchpadButton { time_us, .. }
        | RawInputEvent::TouchpadDown { time_us, .. }
        | RawInputEvent::TouchpadContactMotion { time_us, .. }
        | RawInputEvent::TouchpadUp { time_us, .. }
        | RawInputEvent::GestureSwipeBegin { time_us, .. }
        | RawInputEvent::GestureSwipeUpdate { time_us, .. }
        | RawInputEvent::GestureSwipeEnd { time_us, .. }
        | RawInputEvent::GesturePinchBegin { time_us, .. }
        | RawInputEvent::GesturePinchUpdate { time_us, .. }
        | RawInputEvent::GesturePinchEnd { time_us, .. }
        | RawInputEvent::TouchDown { time_us, .. }
        | RawInputEvent::TouchMotion { time_us, .. }
        | RawInputEvent::TouchUp { time_us, .. }
        | RawInputEvent::TouchCancel { time_us, .. }
        | RawInputEvent::JoystickButton { time_us, .. }
        | RawInputEvent::JoystickAxis { time_us, .. }
        | RawInputEvent::TabletToolAxis { time_us, .. }
        | RawInputEvent::TabletToolTip { time_us, .. }
        | RawInputEvent::TabletToolProximity { time_us, .. } => Some(*time_us),
    }
}

impl InputSource for ReplayInputSource {
    fn start(&self) -> Result<mpsc::Receiver<RawInputEvent>, CaptureError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(CaptureError::AlreadyStarted);
        }
        let file = File::open(&self.path).map_err(|source| {
            self.running.store(false, Ordering::SeqCst);
            CaptureError::Open {
                path: self.path.display().to_string(),
                source,
            }
        })?;

        let (tx, rx) = mpsc::channel();
        let running = Arc::clone(&self.running);
        let paced = self.paced;
        let path = self.path.display().to_string();

        std::thread::Builder::new()
            .name("mmi-replay".to_string())
            .spawn(move || {
                let mut last_time: Option<i64> = None;
                let mut played = 0usize;
                for (index, line) in BufReader::new(file).lines().enumerate() {
                    if !running.load(Ordering::SeqCst) {
                        break;
                    }
                    let line = match line {
                        Ok(line) => line,
                        Err(e) => {
                            warn!("replay {path}: read failed at line {}: {e}", index + 1);
                            break;
                        }
                    };
                    let event = match parse_line(&line) {
                        None => continue,
                        Some(Ok(event)) => event,
                        Some(Err(e)) => {
                            warn!("replay {path}: skipping line {}: {e}", index + 1);
                            continue;
                        }
                    };
                    if paced {
                        if let Some(t) = event_time_us(&event) {
                            if let Some(prev) = last_time {
                                let gap = u64::try_from(t - prev).unwrap_or(0);
                                std::thread::sleep(Duration::from_micros(gap));
                            }
                            last_time = Some(t);
                        }
                    }
                    if tx.send(event).is_err() {
                        debug!("replay {path}: receiver dropped");
                        break;
                    }
                    played += 1;
                }
                info!("replay {path}: finished after {played} events");
            })
            .map_err(|source| CaptureError::Open {
                path: self.path.display().to_string(),
                source,
            })?;

        Ok(rx)
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_line_skips_blank_and_comment_lines() {
        assert!(parse_line("").is_none());
        assert!(parse_line("   ").is_none());
        assert!(parse_line("# recorded on desk rig").is_none());
    }

    #[test]
    fn test_replay_plays_every_valid_line_in_order() {
        // Arrange
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, r#"{{"type":"device_added","device_id":1,"name":"kbd","capabilities":1}}"#)
            .expect("write");
        writeln!(file, "not json").expect("write");
        writeln!(file, r#"{{"type":"keyboard_key","device_id":1,"code":30,"pressed":true,"time_us":5}}"#)
            .expect("write");
        let source = ReplayInputSource::new(file.path());

        // Act
        let rx = source.start().expect("start");
        let events: Vec<RawInputEvent> = rx.iter().collect();

        // Assert
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], RawInputEvent::DeviceAdded { device_id: 1, .. }));
        assert!(matches!(events[1], RawInputEvent::KeyboardKey { code: 30, .. }));
    }

    #[test]
    fn test_replay_missing_file_is_open_error() {
        let source = ReplayInputSource::new("/nonexistent/mmi/replay.jsonl");
        assert!(matches!(source.start(), Err(CaptureError::Open { .. })));
    }
}
