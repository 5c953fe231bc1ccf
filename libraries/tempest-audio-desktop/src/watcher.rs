//! System default device watcher
//!
//! CPAL has no device-change notifications, so the watcher polls the host's
//! default output endpoint on its own thread and posts
//! `ControlMessage::DefaultDeviceChanged` when the name changes.

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tempest_playback::{ControlMessage, DeviceWatch, Dispatcher};

/// Interval between default-device polls
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Returns the current default device id, `None` when there is none
pub type DefaultDeviceProbe = Box<dyn FnMut() -> Option<String> + Send>;

/// Running watcher; stops when closed or dropped
pub struct DefaultDeviceWatcher {
    shutdown_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl DefaultDeviceWatcher {
    /// Start polling `probe` every `interval`
    ///
    /// The first probe result is the baseline; only later changes are
    /// posted. Returns `None` if the thread cannot be spawned.
    pub fn spawn(
        interval: Duration,
        mut probe: DefaultDeviceProbe,
        dispatcher: Dispatcher,
    ) -> Option<Self> {
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);

        let thread = thread::Builder::new()
            .name("tempest-device-watch".into())
            .spawn(move || {
                let mut current = probe();
                tracing::debug!("Watching default output device (now {:?})", current);

                loop {
                    match shutdown_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }

                    let latest = probe();
                    if latest == current {
                        continue;
                    }
                    tracing::info!("Default output device changed: {:?} -> {:?}", current, latest);
                    current = latest;

                    if let Some(device_id) = current.clone() {
                        if !dispatcher.post(ControlMessage::DefaultDeviceChanged { device_id }) {
                            break;
                        }
                    }
                }
            });

        match thread {
            Ok(thread) => Some(Self {
                shutdown_tx: Some(shutdown_tx),
                thread: Some(thread),
            }),
            Err(e) => {
                tracing::warn!("Failed to start default device watcher: {}", e);
                None
            }
        }
    }
}

impl DeviceWatch for DefaultDeviceWatcher {
    fn close(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for DefaultDeviceWatcher {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tempest_playback::control_channel;

    fn shared_probe(initial: Option<&str>) -> (Arc<Mutex<Option<String>>>, DefaultDeviceProbe) {
        let value = Arc::new(Mutex::new(initial.map(str::to_string)));
        let reader = value.clone();
        (value, Box::new(move || reader.lock().unwrap().clone()))
    }

    #[test]
    fn posts_only_changes() {
        let (dispatcher, receiver) = control_channel();
        let (value, probe) = shared_probe(Some("Speakers"));
        let mut watcher =
            DefaultDeviceWatcher::spawn(Duration::from_millis(5), probe, dispatcher).unwrap();

        // Unchanged polls post nothing
        assert!(receiver.recv_timeout(Duration::from_millis(50)).is_err());

        *value.lock().unwrap() = Some("Headphones".into());
        match receiver.recv_timeout(Duration::from_secs(2)) {
            Ok(ControlMessage::DefaultDeviceChanged { device_id }) => {
                assert_eq!(device_id, "Headphones");
            }
            other => panic!("unexpected {:?}", other),
        }

        watcher.close();
    }

    #[test]
    fn losing_the_default_is_not_posted() {
        let (dispatcher, receiver) = control_channel();
        let (value, probe) = shared_probe(Some("Speakers"));
        let mut watcher =
            DefaultDeviceWatcher::spawn(Duration::from_millis(5), probe, dispatcher).unwrap();

        *value.lock().unwrap() = None;
        assert!(receiver.recv_timeout(Duration::from_millis(60)).is_err());

        *value.lock().unwrap() = Some("Speakers".into());
        assert!(matches!(
            receiver.recv_timeout(Duration::from_secs(2)),
            Ok(ControlMessage::DefaultDeviceChanged { .. })
        ));
        watcher.close();
    }

    #[test]
    fn close_stops_posting() {
        let (dispatcher, receiver) = control_channel();
        let (value, probe) = shared_probe(None);
        let mut watcher =
            DefaultDeviceWatcher::spawn(Duration::from_millis(5), probe, dispatcher).unwrap();
        watcher.close();
        watcher.close();

        *value.lock().unwrap() = Some("Speakers".into());
        assert!(receiver.recv_timeout(Duration::from_millis(50)).is_err());
    }
}
