// tempest-audio-desktop/src/device.rs
//
// Output device enumeration and lookup. Devices are identified by name.

use crate::error::{DesktopError, Result};
use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host};
use tempest_playback::{DeviceDescriptor, DeviceSelector, OutputMode};

/// Name of a device, `None` if the driver cannot report it
#[allow(deprecated)]
pub fn device_name(device: &Device) -> Option<String> {
    device.name().ok()
}

/// Name of the host's current default output device
pub fn default_device_name(host: &Host) -> Option<String> {
    host.default_output_device()
        .as_ref()
        .and_then(device_name)
}

/// Enumerate the output devices of `host` for `mode`
///
/// Devices without a usable default configuration are skipped. The list is
/// sorted default first, then alphabetically.
pub fn list_devices(host: &Host, mode: OutputMode) -> Result<Vec<DeviceDescriptor>> {
    let default_name = default_device_name(host);

    let mut device_list = Vec::new();
    for device in host.output_devices()? {
        let Some(name) = device_name(&device) else {
            continue;
        };
        if device.default_output_config().is_err() {
            tracing::debug!("Skipping output device {} without a default config", name);
            continue;
        }
        device_list.push(DeviceDescriptor {
            id: name.clone(),
            is_default: Some(&name) == default_name.as_ref(),
            name,
            mode,
        });
    }

    sort_devices(&mut device_list);
    Ok(device_list)
}

/// Default first, then alphabetically
pub fn sort_devices(devices: &mut [DeviceDescriptor]) {
    devices.sort_by(|a, b| match (a.is_default, b.is_default) {
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
        _ => a.name.cmp(&b.name),
    });
}

/// Find an output device by name
pub fn find_device_by_name(host: &Host, device_name_query: &str) -> Result<Device> {
    host.output_devices()?
        .find(|device| device_name(device).as_deref() == Some(device_name_query))
        .ok_or_else(|| DesktopError::DeviceNotFound(device_name_query.to_string()))
}

/// Device a sink should open for `selector` in `mode`
///
/// In compatibility mode the system default is looked up by the name of the
/// low-latency default endpoint, falling back to the first device.
pub fn resolve_device(host: &Host, mode: OutputMode, selector: &DeviceSelector) -> Result<Device> {
    match (selector, mode) {
        (DeviceSelector::Id(name), _) => find_device_by_name(host, name),
        (DeviceSelector::SystemDefault, OutputMode::LowLatency) => {
            host.default_output_device().ok_or(DesktopError::NoDevice)
        }
        (DeviceSelector::SystemDefault, OutputMode::Compatibility) => {
            if let Some(name) = default_device_name(host) {
                match find_device_by_name(host, &name) {
                    Ok(device) => return Ok(device),
                    Err(e) => tracing::debug!("Default endpoint lookup failed: {}", e),
                }
            }
            host.output_devices()?.next().ok_or(DesktopError::NoDevice)
        }
    }
}
