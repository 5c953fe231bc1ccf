// tempest-audio-desktop/src/backend.rs
//
// Output modes on top of CPAL hosts: which host serves a mode and how its
// streams are configured

use crate::error::{DesktopError, Result};
use cpal::traits::DeviceTrait;
use cpal::{BufferSize, Device, SampleFormat, StreamConfig, SupportedBufferSize};
use tempest_playback::OutputMode;

/// Human-readable name of the platform host
pub fn host_name() -> &'static str {
    #[cfg(target_os = "windows")]
    return "WASAPI";

    #[cfg(target_os = "macos")]
    return "CoreAudio";

    #[cfg(target_os = "linux")]
    return "ALSA";

    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    return "Default";
}

/// Longer description of what a mode means on this platform
pub fn mode_description(mode: OutputMode) -> &'static str {
    match mode {
        OutputMode::LowLatency => "Fixed device buffer sized from the latency setting",
        OutputMode::Compatibility => "Driver-chosen buffer size and stream configuration",
    }
}

/// CPAL host behind every output mode
///
/// Both modes share the platform default host; they differ in how streams
/// are configured (see [`stream_config`]).
pub fn host() -> cpal::Host {
    cpal::default_host()
}

/// Frames of buffering for `latency_ms` at `sample_rate`
pub fn latency_frames(latency_ms: u32, sample_rate: u32) -> u32 {
    let frames = u64::from(sample_rate) * u64::from(latency_ms) / 1000;
    frames.clamp(1, u64::from(u32::MAX)) as u32
}

/// Buffer size requested for a stream
///
/// Low latency asks for a fixed buffer clamped to what the device supports;
/// compatibility mode (and devices that do not report a range) leave it to
/// the driver.
pub fn buffer_size_for(
    mode: OutputMode,
    latency_ms: u32,
    sample_rate: u32,
    supported: &SupportedBufferSize,
) -> BufferSize {
    match (mode, supported) {
        (OutputMode::LowLatency, SupportedBufferSize::Range { min, max }) => {
            BufferSize::Fixed(latency_frames(latency_ms, sample_rate).clamp(*min, *max))
        }
        _ => BufferSize::Default,
    }
}

/// Stream configuration and sample format for opening `device` in `mode`
pub fn stream_config(
    device: &Device,
    mode: OutputMode,
    latency_ms: u32,
) -> Result<(StreamConfig, SampleFormat)> {
    let supported = device.default_output_config()?;
    let sample_format = supported.sample_format();
    if !is_renderable(sample_format) {
        return Err(DesktopError::UnsupportedFormat(format!(
            "device sample format {:?}",
            sample_format
        )));
    }

    let buffer_size = buffer_size_for(
        mode,
        latency_ms,
        supported.sample_rate(),
        supported.buffer_size(),
    );
    let mut config = supported.config();
    config.buffer_size = buffer_size;

    tracing::debug!(
        mode = mode.display_name(),
        sample_rate = config.sample_rate,
        channels = config.channels,
        ?sample_format,
        ?buffer_size,
        "Stream configuration selected"
    );

    Ok((config, sample_format))
}

/// Sample formats the sink can render
pub fn is_renderable(format: SampleFormat) -> bool {
    matches!(
        format,
        SampleFormat::I16 | SampleFormat::U16 | SampleFormat::I32 | SampleFormat::F32 | SampleFormat::F64
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_frames_scale_with_rate() {
        assert_eq!(latency_frames(100, 48_000), 4_800);
        assert_eq!(latency_frames(10, 44_100), 441);
        assert_eq!(latency_frames(0, 44_100), 1);
    }

    #[test]
    fn low_latency_clamps_to_supported_range() {
        let range = SupportedBufferSize::Range { min: 64, max: 2048 };
        assert_eq!(
            buffer_size_for(OutputMode::LowLatency, 10, 48_000, &range),
            BufferSize::Fixed(480)
        );
        assert_eq!(
            buffer_size_for(OutputMode::LowLatency, 500, 48_000, &range),
            BufferSize::Fixed(2048)
        );
        assert_eq!(
            buffer_size_for(OutputMode::LowLatency, 1, 8_000, &range),
            BufferSize::Fixed(64)
        );
    }

    #[test]
    fn compatibility_leaves_buffer_to_driver() {
        let range = SupportedBufferSize::Range { min: 64, max: 2048 };
        assert_eq!(
            buffer_size_for(OutputMode::Compatibility, 100, 48_000, &range),
            BufferSize::Default
        );
        assert_eq!(
            buffer_size_for(OutputMode::LowLatency, 100, 48_000, &SupportedBufferSize::Unknown),
            BufferSize::Default
        );
    }

    #[test]
    fn renderable_formats() {
        assert!(is_renderable(SampleFormat::F32));
        assert!(is_renderable(SampleFormat::I16));
        assert!(!is_renderable(SampleFormat::U8));
    }

    #[test]
    fn modes_are_described() {
        assert_ne!(
            mode_description(OutputMode::LowLatency),
            mode_description(OutputMode::Compatibility)
        );
        assert!(!host_name().is_empty());
    }
}
