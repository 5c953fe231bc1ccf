/// Streaming decoder built on Symphonia
use crate::error::{AudioError, Result};
use std::path::Path;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use symphonia::core::units::{Time, TimeBase};
use tempest_core::{AudioFormat, SampleRate, WaveSource};

/// ITU-R BS.775-1 coefficient (-3 dB) for center and surround channels
const SURROUND_MIX: f32 = 0.707;

/// Decoder stage of a playback pipeline
///
/// Supports: MP3, FLAC, OGG/Vorbis, WAV, AAC/MP4.
///
/// Always produces interleaved stereo `f32` at the file's native rate.
/// Mono is duplicated, multi-channel layouts are downmixed.
pub struct SymphoniaSource {
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    time_base: Option<TimeBase>,
    format: AudioFormat,
    native_bits: Option<u32>,
    length: u64,
    position: u64,
    /// Decoded samples not yet handed out
    pending: Vec<f32>,
    pending_offset: usize,
    /// Frames to discard after an accurate seek landed before the target
    skip_frames: u64,
    finished: bool,
}

impl SymphoniaSource {
    /// Open and probe a file
    ///
    /// # Errors
    /// `FileNotFound` if the path does not exist, `DecodeError` if the
    /// container cannot be probed or the codec is not supported
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AudioError::FileNotFound(path.display().to_string()));
        }

        let file = std::fs::File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| AudioError::DecodeError(format!("Failed to probe file: {}", e)))?;

        let reader = probed.format;
        let track = reader
            .default_track()
            .ok_or_else(|| AudioError::DecodeError("No audio tracks found".to_string()))?;

        let params = &track.codec_params;
        let sample_rate = params
            .sample_rate
            .ok_or_else(|| AudioError::DecodeError("Unknown sample rate".to_string()))?;
        let track_id = track.id;
        let time_base = params.time_base;
        let native_bits = params.bits_per_sample;
        let length = params.n_frames.unwrap_or(0);

        let decoder = symphonia::default::get_codecs()
            .make(params, &DecoderOptions::default())
            .map_err(|e| AudioError::DecodeError(format!("Failed to create decoder: {}", e)))?;

        tracing::debug!(
            path = %path.display(),
            sample_rate,
            length,
            "Opened audio stream"
        );

        Ok(Self {
            reader,
            decoder,
            track_id,
            time_base,
            format: AudioFormat::stereo_float(SampleRate::new(sample_rate)),
            native_bits,
            length,
            position: 0,
            pending: Vec::new(),
            pending_offset: 0,
            skip_frames: 0,
            finished: false,
        })
    }

    /// Bit depth declared by the container, if any
    pub fn native_bits_per_sample(&self) -> Option<u32> {
        self.native_bits
    }

    /// Decode the next packet of our track into `pending`
    ///
    /// Returns `false` at end of stream.
    fn decode_next(&mut self) -> Result<bool> {
        loop {
            let packet = match self.reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(false);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => {
                    return Err(AudioError::DecodeError(format!(
                        "Error reading packet: {}",
                        e
                    )));
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    tracing::debug!("Skipping corrupt packet: {}", e);
                    continue;
                }
                Err(e) => return Err(AudioError::DecodeError(e.to_string())),
            };

            self.pending.clear();
            self.pending_offset = 0;
            append_stereo(decoded, &mut self.pending);

            if self.skip_frames > 0 {
                let available = (self.pending.len() / 2) as u64;
                let skip = self.skip_frames.min(available);
                self.pending_offset = (skip as usize) * 2;
                self.skip_frames -= skip;
            }

            if self.pending_offset < self.pending.len() {
                return Ok(true);
            }
        }
    }

    fn ts_to_frames(&self, ts: u64) -> u64 {
        match self.time_base {
            Some(tb) => {
                let time = tb.calc_time(ts);
                let secs = time.seconds as f64 + time.frac;
                (secs * f64::from(self.format.sample_rate.as_hz())).round() as u64
            }
            None => ts,
        }
    }
}

impl WaveSource for SymphoniaSource {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn read(&mut self, buffer: &mut [f32]) -> tempest_core::Result<usize> {
        let wanted = buffer.len() - buffer.len() % 2;
        let mut written = 0;

        while written < wanted {
            if self.pending_offset >= self.pending.len() {
                if self.finished || !self.decode_next()? {
                    self.finished = true;
                    break;
                }
            }

            let available = &self.pending[self.pending_offset..];
            let count = available.len().min(wanted - written);
            buffer[written..written + count].copy_from_slice(&available[..count]);
            self.pending_offset += count;
            written += count;
        }

        self.position += (written / 2) as u64;
        Ok(written)
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn length(&self) -> u64 {
        self.length
    }

    fn set_position(&mut self, frame: u64) -> tempest_core::Result<()> {
        let target = if self.length > 0 {
            frame.min(self.length)
        } else {
            frame
        };
        let rate = f64::from(self.format.sample_rate.as_hz());
        let secs = target as f64 / rate;
        let whole = secs.trunc();

        let seeked = self
            .reader
            .seek(
                SeekMode::Accurate,
                SeekTo::Time {
                    time: Time::new(whole as u64, secs - whole),
                    track_id: Some(self.track_id),
                },
            )
            .map_err(|e| AudioError::SeekError(format!("Seek failed: {}", e)))?;

        self.decoder.reset();
        self.pending.clear();
        self.pending_offset = 0;
        self.finished = false;

        let actual = self.ts_to_frames(seeked.actual_ts);
        let required = self.ts_to_frames(seeked.required_ts);
        self.skip_frames = required.saturating_sub(actual);
        self.position = actual + self.skip_frames;
        Ok(())
    }
}

/// Append a decoded buffer to `out` as interleaved stereo in [-1.0, 1.0]
fn append_stereo(decoded: AudioBufferRef<'_>, out: &mut Vec<f32>) {
    // Symmetric scaling for signed integers (divide by 2^(N-1))
    match decoded {
        AudioBufferRef::F32(buf) => mix_to_stereo(&buf, out, |s| s.clamp(-1.0, 1.0)),
        AudioBufferRef::F64(buf) => mix_to_stereo(&buf, out, |s| (s as f32).clamp(-1.0, 1.0)),
        AudioBufferRef::S32(buf) => mix_to_stereo(&buf, out, |s| s as f32 / 2147483648.0),
        AudioBufferRef::S24(buf) => mix_to_stereo(&buf, out, |s| s.inner() as f32 / 8388608.0),
        AudioBufferRef::S16(buf) => mix_to_stereo(&buf, out, |s| s as f32 / 32768.0),
        AudioBufferRef::S8(buf) => mix_to_stereo(&buf, out, |s| s as f32 / 128.0),
        AudioBufferRef::U32(buf) => {
            mix_to_stereo(&buf, out, |s| (s as f32 / u32::MAX as f32) * 2.0 - 1.0);
        }
        AudioBufferRef::U24(buf) => {
            mix_to_stereo(&buf, out, |s| (s.inner() as f32 / 16777215.0) * 2.0 - 1.0);
        }
        AudioBufferRef::U16(buf) => {
            mix_to_stereo(&buf, out, |s| (s as f32 / u16::MAX as f32) * 2.0 - 1.0);
        }
        AudioBufferRef::U8(buf) => {
            mix_to_stereo(&buf, out, |s| (s as f32 / u8::MAX as f32) * 2.0 - 1.0);
        }
    }
}

/// Downmix any channel layout to interleaved stereo
///
/// Layout assumed as FL, FR, C, LFE, SL, SR, ... for six or more channels,
/// L, R, C for three, L, R, SL, SR for four and L, R, C, SL, SR for five.
fn mix_to_stereo<T, F>(buf: &AudioBuffer<T>, out: &mut Vec<f32>, normalize: F)
where
    T: Sample + Copy,
    F: Fn(T) -> f32,
{
    let frames = buf.frames();
    let channels = buf.spec().channels.count();
    out.reserve(frames * 2);

    match channels {
        0 => out.resize(out.len() + frames * 2, 0.0),
        1 => {
            for &s in &buf.chan(0)[..frames] {
                let v = normalize(s);
                out.push(v);
                out.push(v);
            }
        }
        _ => {
            let (center, left_extra, right_extra): (Option<usize>, Vec<usize>, Vec<usize>) =
                match channels {
                    2 => (None, vec![], vec![]),
                    3 => (Some(2), vec![], vec![]),
                    4 => (None, vec![2], vec![3]),
                    5 => (Some(2), vec![3], vec![4]),
                    _ => (Some(2), vec![4], vec![5]),
                };
            let lfe = (channels >= 6).then_some(3);

            for i in 0..frames {
                let mut l = normalize(buf.chan(0)[i]);
                let mut r = normalize(buf.chan(1)[i]);
                for ch in center.iter().chain(lfe.iter()) {
                    let v = normalize(buf.chan(*ch)[i]) * SURROUND_MIX;
                    l += v;
                    r += v;
                }
                for &ch in &left_extra {
                    l += normalize(buf.chan(ch)[i]) * SURROUND_MIX;
                }
                for &ch in &right_extra {
                    r += normalize(buf.chan(ch)[i]) * SURROUND_MIX;
                }
                out.push(l.clamp(-1.0, 1.0));
                out.push(r.clamp(-1.0, 1.0));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_nonexistent_file_returns_not_found() {
        let result = SymphoniaSource::open(Path::new("/nonexistent/file.mp3"));
        assert!(matches!(result, Err(AudioError::FileNotFound(_))));
    }

    #[test]
    fn open_garbage_returns_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.mp3");
        std::fs::write(&path, vec![0x42u8; 4096]).unwrap();

        let result = SymphoniaSource::open(&path);
        assert!(matches!(result, Err(AudioError::DecodeError(_))));
    }
}
