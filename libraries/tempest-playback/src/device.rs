//! Output device management
//!
//! `OutputDevices` is the seam to the platform audio layer: it lists devices
//! per output mode, opens sinks and watches the system default endpoint.
//! `DeviceManager` adds the engine-level policy on top: grouped device lists
//! with a leading "system default" entry, and falling back to the default
//! device when the configured one has disappeared.

use crate::dispatch::Dispatcher;
use crate::error::DeviceError;
use crate::settings::{EngineSettings, OutputMode, SYSTEM_DEFAULT_DEVICE_ID};
use crate::sink::OutputSink;
use serde::{Deserialize, Serialize};

/// Display name of the "follow the system" entry
pub const SYSTEM_DEFAULT_DEVICE_NAME: &str = "System default";

/// One selectable output device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub id: String,
    pub name: String,
    /// Whether this is the current system default endpoint
    pub is_default: bool,
    pub mode: OutputMode,
}

/// Devices available through one output mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceGroup {
    pub mode: OutputMode,
    pub name: String,
    pub devices: Vec<DeviceDescriptor>,
}

/// Which device a sink should open
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSelector {
    SystemDefault,
    Id(String),
}

impl DeviceSelector {
    /// Parse a settings id ("-0" is the system default)
    pub fn from_id(id: &str) -> Self {
        if id == SYSTEM_DEFAULT_DEVICE_ID {
            Self::SystemDefault
        } else {
            Self::Id(id.to_string())
        }
    }
}

/// Parameters for opening a sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkRequest {
    pub mode: OutputMode,
    pub device: DeviceSelector,
    pub latency_ms: u32,
}

impl SinkRequest {
    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self {
            mode: settings.sound_out_mode,
            device: DeviceSelector::from_id(&settings.sound_out_device_id),
            latency_ms: settings.latency_ms,
        }
    }
}

/// Handle to a running default-device watcher
pub trait DeviceWatch: Send {
    /// Stop watching; no further messages are posted
    fn close(&mut self);
}

/// Platform output layer
pub trait OutputDevices: Send {
    /// Output modes this platform offers
    fn modes(&self) -> Vec<OutputMode> {
        vec![OutputMode::LowLatency, OutputMode::Compatibility]
    }

    /// List the devices reachable through `mode`
    ///
    /// # Errors
    /// `BackendUnavailable` if the mode cannot be used here, `Enumeration`
    /// for other failures
    fn enumerate(&self, mode: OutputMode) -> Result<Vec<DeviceDescriptor>, DeviceError>;

    /// Id of the current system default device for `mode`
    fn default_device_id(&self, mode: OutputMode) -> Option<String>;

    /// Open a sink
    ///
    /// # Errors
    /// `DeviceNotFound` if the requested device does not exist
    fn create_sink(
        &mut self,
        request: &SinkRequest,
        dispatcher: Dispatcher,
    ) -> Result<Box<dyn OutputSink>, DeviceError>;

    /// Start posting `ControlMessage::DefaultDeviceChanged` when the system
    /// default changes; `None` if the platform cannot watch
    fn watch_default_device(&mut self, _dispatcher: Dispatcher) -> Option<Box<dyn DeviceWatch>> {
        None
    }
}

/// Result of opening a sink through the manager
pub struct SinkCreation {
    pub sink: Box<dyn OutputSink>,
    /// The configured device was missing and the default was used instead
    pub fell_back: bool,
}

/// Engine-side device policy
pub struct DeviceManager {
    backend: Box<dyn OutputDevices>,
}

impl DeviceManager {
    pub fn new(backend: Box<dyn OutputDevices>) -> Self {
        Self { backend }
    }

    /// Open a sink for the configured device
    ///
    /// If the configured device no longer exists, `settings` is rewritten to
    /// the system default and the sink is opened there.
    ///
    /// # Errors
    /// Any failure other than a missing non-default device
    pub fn create_sink(
        &mut self,
        settings: &mut EngineSettings,
        dispatcher: &Dispatcher,
    ) -> Result<SinkCreation, DeviceError> {
        let request = SinkRequest::from_settings(settings);
        match self.backend.create_sink(&request, dispatcher.clone()) {
            Ok(sink) => Ok(SinkCreation {
                sink,
                fell_back: false,
            }),
            Err(DeviceError::DeviceNotFound(id)) if request.device != DeviceSelector::SystemDefault => {
                tracing::warn!("Output device {} not found, falling back to system default", id);
                settings.sound_out_device_id = SYSTEM_DEFAULT_DEVICE_ID.to_string();
                let request = SinkRequest {
                    device: DeviceSelector::SystemDefault,
                    ..request
                };
                let sink = self.backend.create_sink(&request, dispatcher.clone())?;
                Ok(SinkCreation {
                    sink,
                    fell_back: true,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// All selectable devices, grouped by output mode
    ///
    /// Each group starts with the "system default" entry. Modes whose backend
    /// is unavailable are left out.
    pub fn sound_out_list(&self) -> Vec<DeviceGroup> {
        let mut groups = Vec::new();
        for mode in self.backend.modes() {
            let devices = match self.backend.enumerate(mode) {
                Ok(devices) => devices,
                Err(DeviceError::BackendUnavailable(reason)) => {
                    tracing::debug!("Skipping {} output: {}", mode.display_name(), reason);
                    continue;
                }
                Err(e) => {
                    tracing::warn!("Failed to list {} devices: {}", mode.display_name(), e);
                    continue;
                }
            };

            let default_id = self.backend.default_device_id(mode);
            let mut entries = Vec::with_capacity(devices.len() + 1);
            entries.push(DeviceDescriptor {
                id: SYSTEM_DEFAULT_DEVICE_ID.to_string(),
                name: SYSTEM_DEFAULT_DEVICE_NAME.to_string(),
                is_default: false,
                mode,
            });
            entries.extend(devices.into_iter().map(|device| DeviceDescriptor {
                is_default: default_id.as_deref() == Some(device.id.as_str()),
                ..device
            }));

            groups.push(DeviceGroup {
                mode,
                name: mode.display_name().to_string(),
                devices: entries,
            });
        }
        groups
    }

    /// Start watching the system default device
    pub fn watch_default_device(&mut self, dispatcher: Dispatcher) -> Option<Box<dyn DeviceWatch>> {
        self.backend.watch_default_device(dispatcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::control_channel;
    use crate::sink::{PlaybackState, SinkId};
    use tempest_core::{SharedVolume, WaveSource};

    struct NullSink {
        device: String,
    }

    impl OutputSink for NullSink {
        fn id(&self) -> SinkId {
            1
        }
        fn device_id(&self) -> &str {
            &self.device
        }
        fn initialize(&mut self, _source: Box<dyn WaveSource>) -> Result<(), DeviceError> {
            Ok(())
        }
        fn play(&mut self) -> Result<(), DeviceError> {
            Ok(())
        }
        fn pause(&mut self) -> Result<(), DeviceError> {
            Ok(())
        }
        fn stop(&mut self) -> Result<(), DeviceError> {
            Ok(())
        }
        fn state(&self) -> PlaybackState {
            PlaybackState::Stopped
        }
        fn volume(&self) -> SharedVolume {
            SharedVolume::default()
        }
        fn has_source(&self) -> bool {
            false
        }
    }

    struct FakeDevices;

    impl FakeDevices {
        fn device(id: &str) -> DeviceDescriptor {
            DeviceDescriptor {
                id: id.to_string(),
                name: id.to_uppercase(),
                is_default: false,
                mode: OutputMode::LowLatency,
            }
        }
    }

    impl OutputDevices for FakeDevices {
        fn enumerate(&self, mode: OutputMode) -> Result<Vec<DeviceDescriptor>, DeviceError> {
            match mode {
                OutputMode::LowLatency => Ok(vec![Self::device("speakers"), Self::device("headset")]),
                OutputMode::Compatibility => {
                    Err(DeviceError::BackendUnavailable("not on this host".into()))
                }
            }
        }

        fn default_device_id(&self, _mode: OutputMode) -> Option<String> {
            Some("headset".into())
        }

        fn create_sink(
            &mut self,
            request: &SinkRequest,
            _dispatcher: Dispatcher,
        ) -> Result<Box<dyn OutputSink>, DeviceError> {
            let device = match &request.device {
                DeviceSelector::SystemDefault => "headset".to_string(),
                DeviceSelector::Id(id) if id == "speakers" || id == "headset" => id.clone(),
                DeviceSelector::Id(id) => return Err(DeviceError::DeviceNotFound(id.clone())),
            };
            Ok(Box::new(NullSink { device }))
        }
    }

    #[test]
    fn sound_out_list_leads_with_system_default() {
        let manager = DeviceManager::new(Box::new(FakeDevices));
        let groups = manager.sound_out_list();

        assert_eq!(groups.len(), 1);
        let devices = &groups[0].devices;
        assert_eq!(devices[0].id, SYSTEM_DEFAULT_DEVICE_ID);
        assert_eq!(devices.len(), 3);
        assert!(!devices[1].is_default);
        assert!(devices[2].is_default);
    }

    #[test]
    fn missing_device_falls_back_to_default() {
        let (dispatcher, _rx) = control_channel();
        let mut manager = DeviceManager::new(Box::new(FakeDevices));
        let mut settings = EngineSettings {
            sound_out_device_id: "unplugged-dac".into(),
            ..EngineSettings::default()
        };

        let created = manager.create_sink(&mut settings, &dispatcher).unwrap();
        assert!(created.fell_back);
        assert_eq!(created.sink.device_id(), "headset");
        assert_eq!(settings.sound_out_device_id, SYSTEM_DEFAULT_DEVICE_ID);
    }

    #[test]
    fn existing_device_is_opened_directly() {
        let (dispatcher, _rx) = control_channel();
        let mut manager = DeviceManager::new(Box::new(FakeDevices));
        let mut settings = EngineSettings {
            sound_out_device_id: "speakers".into(),
            ..EngineSettings::default()
        };

        let created = manager.create_sink(&mut settings, &dispatcher).unwrap();
        assert!(!created.fell_back);
        assert_eq!(created.sink.device_id(), "speakers");
        assert_eq!(settings.sound_out_device_id, "speakers");
    }

    #[test]
    fn selector_parses_system_default() {
        assert_eq!(DeviceSelector::from_id("-0"), DeviceSelector::SystemDefault);
        assert_eq!(
            DeviceSelector::from_id("speakers"),
            DeviceSelector::Id("speakers".into())
        );
    }
}
