/// Core traits for Tempest
use crate::error::Result;
use crate::types::AudioFormat;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::Duration;

/// Pull-based stream of interleaved `f32` samples
///
/// Every stage of a playback pipeline (decoder, resampler, equalizer,
/// notification taps) implements this trait and wraps the stage before it.
/// Positions and lengths are expressed in frames of the stage's own format.
pub trait WaveSource: Send {
    /// Format of the samples produced by `read`
    fn format(&self) -> AudioFormat;

    /// Fill `buffer` with interleaved samples
    ///
    /// Returns the number of samples written. `Ok(0)` signals end of stream.
    /// Implementations should only return partial frames at end of stream.
    ///
    /// # Errors
    /// Returns an error if the underlying stream cannot be decoded
    fn read(&mut self, buffer: &mut [f32]) -> Result<usize>;

    /// Current read position in frames
    fn position(&self) -> u64;

    /// Total length in frames (`0` when unknown)
    fn length(&self) -> u64;

    /// Seek to the given frame
    ///
    /// # Errors
    /// Returns an error if the stream does not support seeking or the target is unreachable
    fn set_position(&mut self, frame: u64) -> Result<()>;

    /// Current position as wall-clock time
    fn elapsed(&self) -> Duration {
        self.format().frames_to_duration(self.position())
    }

    /// Total length as wall-clock time
    fn duration(&self) -> Duration {
        self.format().frames_to_duration(self.length())
    }
}

impl<S: WaveSource + ?Sized> WaveSource for Box<S> {
    fn format(&self) -> AudioFormat {
        (**self).format()
    }

    fn read(&mut self, buffer: &mut [f32]) -> Result<usize> {
        (**self).read(buffer)
    }

    fn position(&self) -> u64 {
        (**self).position()
    }

    fn length(&self) -> u64 {
        (**self).length()
    }

    fn set_position(&mut self, frame: u64) -> Result<()> {
        (**self).set_position(frame)
    }
}

/// A playable item owned by the surrounding library
///
/// The engine only drives the track's lifecycle; it never owns its metadata.
pub trait Track: Send + Sync {
    /// File the track's audio is read from
    fn path(&self) -> &Path;

    /// Prepare the track for playback
    ///
    /// # Errors
    /// Returns an error if the track cannot be prepared
    fn load(&self) -> Result<()>;

    /// Release anything `load` acquired
    fn unload(&self);

    /// Mark the track as currently playing (or not)
    fn set_playing(&self, playing: bool);

    /// Whether the track is the one currently playing
    fn is_playing(&self) -> bool;

    /// Record when playback of this track last started
    fn set_last_time_played(&self, at: DateTime<Utc>);

    /// When playback of this track last started
    fn last_time_played(&self) -> Option<DateTime<Utc>>;
}
