/// CPAL output sink
///
/// Each sink owns a dedicated audio thread that builds and owns the CPAL
/// `Stream`. The control thread talks to it through a command channel;
/// the stream callback pulls from the installed `WaveSource` directly.
use crate::backend;
use crate::error::{DesktopError, Result};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tempest_audio::{ResampleStage, ResamplingQuality};
use tempest_core::{SharedVolume, WaveSource};
use tempest_playback::{
    ControlMessage, DeviceError, Dispatcher, OutputMode, OutputSink, PlaybackState, SinkId,
};

static NEXT_SINK_ID: AtomicU64 = AtomicU64::new(1);

/// Commands sent to the audio thread
enum AudioCommand {
    /// Start the stream
    Play,
    /// Pause the stream
    Pause,
    /// Drop the stream and exit
    Shutdown,
}

/// `PlaybackState` in an atomic, so the callback never locks to read it
struct AtomicState(AtomicU8);

impl AtomicState {
    fn new(state: PlaybackState) -> Self {
        Self(AtomicU8::new(Self::encode(state)))
    }

    fn encode(state: PlaybackState) -> u8 {
        match state {
            PlaybackState::Stopped => 0,
            PlaybackState::Playing => 1,
            PlaybackState::Paused => 2,
        }
    }

    fn decode(value: u8) -> PlaybackState {
        match value {
            1 => PlaybackState::Playing,
            2 => PlaybackState::Paused,
            _ => PlaybackState::Stopped,
        }
    }

    fn load(&self) -> PlaybackState {
        Self::decode(self.0.load(Ordering::Acquire))
    }

    fn store(&self, state: PlaybackState) {
        self.0.store(Self::encode(state), Ordering::Release);
    }

    fn swap(&self, state: PlaybackState) -> PlaybackState {
        Self::decode(self.0.swap(Self::encode(state), Ordering::AcqRel))
    }

    /// Move from `Playing` to `Stopped`; false if the state was anything else
    fn finish(&self) -> bool {
        self.0
            .compare_exchange(
                Self::encode(PlaybackState::Playing),
                Self::encode(PlaybackState::Stopped),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

/// State shared between the sink, its audio thread and the stream callback
struct SinkShared {
    id: SinkId,
    source: Mutex<Option<Box<dyn WaveSource>>>,
    state: AtomicState,
    volume: SharedVolume,
    dispatcher: Dispatcher,
}

impl SinkShared {
    fn post_stopped(&self) {
        self.dispatcher
            .post(ControlMessage::SinkStopped { sink: self.id });
    }
}

/// Output sink rendering to one CPAL device
pub struct CpalSink {
    id: SinkId,
    device_id: String,
    mode: OutputMode,
    /// Rate and channel count of the opened stream
    config: StreamConfig,
    shared: Arc<SinkShared>,
    command_tx: Sender<AudioCommand>,
    audio_thread: Option<JoinHandle<()>>,
}

impl CpalSink {
    /// Open a stream on `device`
    ///
    /// The stream is built on the sink's audio thread; this blocks until it
    /// exists (or failed to build). The sink starts stopped and silent.
    ///
    /// # Errors
    /// Returns an error if the device's configuration cannot be read, the
    /// stream cannot be built or the audio thread cannot be spawned
    pub fn open(
        device: Device,
        device_id: String,
        mode: OutputMode,
        latency_ms: u32,
        dispatcher: Dispatcher,
    ) -> Result<Self> {
        let (config, sample_format) = backend::stream_config(&device, mode, latency_ms)?;
        let id = NEXT_SINK_ID.fetch_add(1, Ordering::Relaxed);

        let shared = Arc::new(SinkShared {
            id,
            source: Mutex::new(None),
            state: AtomicState::new(PlaybackState::Stopped),
            volume: SharedVolume::default(),
            dispatcher,
        });

        let (command_tx, command_rx) = bounded::<AudioCommand>(32);
        let (ready_tx, ready_rx) = bounded::<Result<()>>(1);

        let shared_clone = Arc::clone(&shared);
        let stream_config = config.clone();
        let audio_thread = thread::Builder::new()
            .name(format!("tempest-audio-{}", id))
            .spawn(move || {
                Self::audio_thread_run(
                    device,
                    stream_config,
                    sample_format,
                    shared_clone,
                    command_rx,
                    ready_tx,
                );
            })
            .map_err(|e| DesktopError::Thread(e.to_string()))?;

        let ready = ready_rx
            .recv()
            .map_err(|_| DesktopError::Thread("audio thread exited during setup".into()))
            .and_then(|result| result);
        if let Err(e) = ready {
            let _ = audio_thread.join();
            return Err(e);
        }

        tracing::info!(
            sink = id,
            device = %device_id,
            mode = mode.display_name(),
            sample_rate = config.sample_rate,
            channels = config.channels,
            "Output sink opened"
        );

        Ok(Self {
            id,
            device_id,
            mode,
            config,
            shared,
            command_tx,
            audio_thread: Some(audio_thread),
        })
    }

    /// Output mode the sink was opened with
    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Sample rate of the device stream
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    /// Channel count of the device stream
    pub fn channels(&self) -> u16 {
        self.config.channels
    }

    fn send(&self, command: AudioCommand) -> std::result::Result<(), DeviceError> {
        self.command_tx
            .send(command)
            .map_err(|_| DeviceError::StreamBuild("audio thread has exited".into()))
    }

    /// Audio thread main loop
    ///
    /// Owns the CPAL stream for the sink's whole life and applies commands
    /// from the control thread.
    fn audio_thread_run(
        device: Device,
        config: StreamConfig,
        sample_format: SampleFormat,
        shared: Arc<SinkShared>,
        command_rx: Receiver<AudioCommand>,
        ready_tx: Sender<Result<()>>,
    ) {
        let stream = match Self::build_stream(&device, &config, sample_format, &shared) {
            Ok(stream) => stream,
            Err(e) => {
                let _ = ready_tx.send(Err(e));
                return;
            }
        };
        let _ = ready_tx.send(Ok(()));

        while let Ok(cmd) = command_rx.recv() {
            match cmd {
                AudioCommand::Play => {
                    if let Err(e) = stream.play() {
                        tracing::error!(sink = shared.id, "Failed to start stream: {}", e);
                    }
                }
                AudioCommand::Pause => {
                    if let Err(e) = stream.pause() {
                        tracing::debug!(sink = shared.id, "Failed to pause stream: {}", e);
                    }
                }
                AudioCommand::Shutdown => break,
            }
        }

        drop(stream);
        tracing::debug!(sink = shared.id, "Audio thread exiting");
    }

    fn build_stream(
        device: &Device,
        config: &StreamConfig,
        sample_format: SampleFormat,
        shared: &Arc<SinkShared>,
    ) -> Result<Stream> {
        match sample_format {
            SampleFormat::I16 => Self::build_typed::<i16>(device, config, shared),
            SampleFormat::U16 => Self::build_typed::<u16>(device, config, shared),
            SampleFormat::I32 => Self::build_typed::<i32>(device, config, shared),
            SampleFormat::F32 => Self::build_typed::<f32>(device, config, shared),
            SampleFormat::F64 => Self::build_typed::<f64>(device, config, shared),
            other => Err(DesktopError::UnsupportedFormat(format!(
                "device sample format {:?}",
                other
            ))),
        }
    }

    fn build_typed<T>(
        device: &Device,
        config: &StreamConfig,
        shared: &Arc<SinkShared>,
    ) -> Result<Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let shared = Arc::clone(shared);
        let sink_id = shared.id;
        let channels = usize::from(config.channels);
        let mut scratch = Vec::new();

        let stream = device.build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                Self::audio_callback(data, channels, &shared, &mut scratch);
            },
            move |err| tracing::error!(sink = sink_id, "Audio stream error: {}", err),
            None,
        )?;
        Ok(stream)
    }

    /// Audio callback (runs on the real-time audio thread)
    fn audio_callback<T>(
        output: &mut [T],
        device_channels: usize,
        shared: &SinkShared,
        scratch: &mut Vec<f32>,
    ) where
        T: SizedSample + FromSample<f32>,
    {
        if shared.state.load() != PlaybackState::Playing {
            output.fill(T::EQUILIBRIUM);
            return;
        }

        // The control thread holds the lock only while swapping sources
        let Ok(mut guard) = shared.source.try_lock() else {
            output.fill(T::EQUILIBRIUM);
            return;
        };
        let Some(source) = guard.as_mut() else {
            output.fill(T::EQUILIBRIUM);
            return;
        };

        let source_channels = source.format().channel_count().max(1);
        let frames = output.len() / device_channels.max(1);
        scratch.resize(frames * source_channels, 0.0);

        let (filled, ended) = fill_from_source(source.as_mut(), scratch);
        drop(guard);

        let volume = shared.volume.get();
        let rendered = filled / source_channels;
        map_channels(
            &scratch[..rendered * source_channels],
            source_channels,
            output,
            device_channels,
            volume,
        );

        if ended && shared.state.finish() {
            tracing::debug!(sink = shared.id, "Source ended");
            shared.post_stopped();
        }
    }
}

/// Read until `buffer` is full or the source ends
///
/// Returns the samples written and whether the source ended. A read error
/// ends the source.
pub(crate) fn fill_from_source(source: &mut dyn WaveSource, buffer: &mut [f32]) -> (usize, bool) {
    let mut filled = 0;
    while filled < buffer.len() {
        match source.read(&mut buffer[filled..]) {
            Ok(0) => return (filled, true),
            Ok(read) => filled += read,
            Err(e) => {
                tracing::error!("Source read failed: {}", e);
                return (filled, true);
            }
        }
    }
    (filled, false)
}

/// Write interleaved `input` frames to `output`, scaled by `volume`
///
/// Mono is copied to every output channel; otherwise channels map one to
/// one and extra output channels are silent. Output beyond the input is
/// filled with silence.
pub fn map_channels<T>(
    input: &[f32],
    input_channels: usize,
    output: &mut [T],
    output_channels: usize,
    volume: f32,
) where
    T: SizedSample + FromSample<f32>,
{
    let input_channels = input_channels.max(1);
    let output_channels = output_channels.max(1);
    let frames = input.len() / input_channels;

    for (frame, out_frame) in output.chunks_mut(output_channels).enumerate() {
        if frame >= frames {
            out_frame.fill(T::EQUILIBRIUM);
            continue;
        }
        let in_frame = &input[frame * input_channels..(frame + 1) * input_channels];
        for (ch, out) in out_frame.iter_mut().enumerate() {
            let sample = if input_channels == 1 {
                in_frame[0]
            } else {
                in_frame.get(ch).copied().unwrap_or(0.0)
            };
            *out = T::from_sample(sample * volume);
        }
    }
}

impl OutputSink for CpalSink {
    fn id(&self) -> SinkId {
        self.id
    }

    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn initialize(&mut self, source: Box<dyn WaveSource>) -> std::result::Result<(), DeviceError> {
        let format = source.format();
        if format.channels == 0 {
            return Err(DeviceError::StreamBuild("source has no channels".into()));
        }

        let device_rate = self.config.sample_rate;
        let source: Box<dyn WaveSource> = if format.sample_rate.as_hz() == device_rate {
            source
        } else {
            tracing::debug!(
                sink = self.id,
                source_rate = format.sample_rate.as_hz(),
                device_rate,
                "Converting to device rate"
            );
            Box::new(
                ResampleStage::new(source, device_rate, ResamplingQuality::Balanced)
                    .map_err(|e| DeviceError::StreamBuild(e.to_string()))?,
            )
        };

        self.shared.state.store(PlaybackState::Stopped);
        self.send(AudioCommand::Pause)?;
        match self.shared.source.lock() {
            Ok(mut guard) => *guard = Some(source),
            Err(poisoned) => *poisoned.into_inner() = Some(source),
        }
        Ok(())
    }

    fn play(&mut self) -> std::result::Result<(), DeviceError> {
        if !self.has_source() {
            return Err(DeviceError::StreamBuild("no source installed".into()));
        }
        self.shared.state.store(PlaybackState::Playing);
        self.send(AudioCommand::Play)
    }

    fn pause(&mut self) -> std::result::Result<(), DeviceError> {
        if self.shared.state.load() == PlaybackState::Playing {
            self.shared.state.store(PlaybackState::Paused);
            self.send(AudioCommand::Pause)?;
        }
        Ok(())
    }

    fn stop(&mut self) -> std::result::Result<(), DeviceError> {
        let previous = self.shared.state.swap(PlaybackState::Stopped);
        if previous != PlaybackState::Stopped {
            self.shared.post_stopped();
            self.send(AudioCommand::Pause)?;
        }
        Ok(())
    }

    fn state(&self) -> PlaybackState {
        self.shared.state.load()
    }

    fn volume(&self) -> SharedVolume {
        self.shared.volume.clone()
    }

    fn has_source(&self) -> bool {
        match self.shared.source.lock() {
            Ok(guard) => guard.is_some(),
            Err(poisoned) => poisoned.into_inner().is_some(),
        }
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.shared.state.store(PlaybackState::Stopped);
        let _ = self.command_tx.send(AudioCommand::Shutdown);
        if let Some(handle) = self.audio_thread.take() {
            let _ = handle.join();
        }
        tracing::debug!(sink = self.id, "Output sink released");
    }
}
