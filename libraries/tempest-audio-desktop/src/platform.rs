//! `OutputDevices` implementation on CPAL

use crate::backend;
use crate::device;
use crate::output::CpalSink;
use crate::watcher::{DefaultDeviceWatcher, POLL_INTERVAL};
use tempest_playback::{
    DeviceDescriptor, DeviceError, DeviceSelector, DeviceWatch, Dispatcher, OutputDevices,
    OutputMode, OutputSink, SinkRequest, SYSTEM_DEFAULT_DEVICE_ID,
};

/// Desktop output layer: both output modes on the platform CPAL host
///
/// Hosts are created per call, so the type carries no platform handles and
/// can move freely between threads.
#[derive(Debug, Default)]
pub struct CpalDevices {
    poll_interval: Option<std::time::Duration>,
}

impl CpalDevices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Poll the default device at `interval` instead of every 500 ms
    #[must_use]
    pub fn with_poll_interval(mut self, interval: std::time::Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }
}

impl OutputDevices for CpalDevices {
    fn enumerate(&self, mode: OutputMode) -> Result<Vec<DeviceDescriptor>, DeviceError> {
        Ok(device::list_devices(&backend::host(), mode)?)
    }

    fn default_device_id(&self, _mode: OutputMode) -> Option<String> {
        device::default_device_name(&backend::host())
    }

    fn create_sink(
        &mut self,
        request: &SinkRequest,
        dispatcher: Dispatcher,
    ) -> Result<Box<dyn OutputSink>, DeviceError> {
        let host = backend::host();
        let device = device::resolve_device(&host, request.mode, &request.device)?;
        let device_id = match &request.device {
            DeviceSelector::Id(name) => name.clone(),
            DeviceSelector::SystemDefault => device::device_name(&device)
                .unwrap_or_else(|| SYSTEM_DEFAULT_DEVICE_ID.to_string()),
        };

        let sink = CpalSink::open(device, device_id, request.mode, request.latency_ms, dispatcher)?;
        Ok(Box::new(sink))
    }

    fn watch_default_device(&mut self, dispatcher: Dispatcher) -> Option<Box<dyn DeviceWatch>> {
        let watcher = DefaultDeviceWatcher::spawn(
            self.poll_interval.unwrap_or(POLL_INTERVAL),
            Box::new(|| device::default_device_name(&backend::host())),
            dispatcher,
        )?;
        Some(Box::new(watcher))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempest_playback::control_channel;

    #[test]
    fn offers_both_modes() {
        let devices = CpalDevices::new();
        assert_eq!(
            devices.modes(),
            vec![OutputMode::LowLatency, OutputMode::Compatibility]
        );
    }

    #[test]
    fn unknown_device_is_not_found() {
        let (dispatcher, _receiver) = control_channel();
        let mut devices = CpalDevices::new();
        let request = SinkRequest {
            mode: OutputMode::LowLatency,
            device: DeviceSelector::Id("No Such Device 12345".into()),
            latency_ms: 100,
        };
        match devices.create_sink(&request, dispatcher) {
            Err(DeviceError::DeviceNotFound(id)) => assert_eq!(id, "No Such Device 12345"),
            Err(DeviceError::Enumeration(_)) => {} // no audio subsystem at all
            Err(other) => panic!("unexpected error {:?}", other),
            Ok(_) => panic!("sink opened on a device that does not exist"),
        }
    }
}
