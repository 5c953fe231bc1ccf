//! Shared test doubles for engine tests
//!
//! `MockHost` stands in for the platform output layer. Sinks it creates
//! never render anything on their own: tests pull frames through a
//! `SinkProbe`, which drives the pipeline's taps exactly like an audio
//! thread would.

#![allow(dead_code)]

use crossbeam_channel::Receiver;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempest_audio::test_utils::ToneSource;
use tempest_audio::AudioError;
use tempest_core::{FileTrack, SharedVolume, Track, WaveSource};
use tempest_playback::{
    control_channel, ControlMessage, DeviceDescriptor, DeviceError, DeviceSelector, DeviceWatch,
    Dispatcher, EngineEvent, EngineSettings, OutputDevices, OutputMode, OutputSink, PlaybackEngine,
    PlaybackState, SinkId, SinkRequest, SourceOpener,
};

/// Sample rate of generated test tracks
pub const TONE_RATE: u32 = 1_000;

// ===== Sinks =====

struct SinkShared {
    id: SinkId,
    device: String,
    dispatcher: Dispatcher,
    source: Mutex<Option<Box<dyn WaveSource>>>,
    state: Mutex<PlaybackState>,
    volume: SharedVolume,
    released: AtomicBool,
}

impl SinkShared {
    fn set_state(&self, state: PlaybackState) {
        *self.state.lock().unwrap() = state;
    }

    fn state(&self) -> PlaybackState {
        *self.state.lock().unwrap()
    }
}

struct MockSink {
    shared: Arc<SinkShared>,
}

impl OutputSink for MockSink {
    fn id(&self) -> SinkId {
        self.shared.id
    }

    fn device_id(&self) -> &str {
        &self.shared.device
    }

    fn initialize(&mut self, source: Box<dyn WaveSource>) -> Result<(), DeviceError> {
        *self.shared.source.lock().unwrap() = Some(source);
        self.shared.set_state(PlaybackState::Stopped);
        Ok(())
    }

    fn play(&mut self) -> Result<(), DeviceError> {
        if !self.has_source() {
            return Err(DeviceError::StreamBuild("no source".into()));
        }
        self.shared.set_state(PlaybackState::Playing);
        Ok(())
    }

    fn pause(&mut self) -> Result<(), DeviceError> {
        self.shared.set_state(PlaybackState::Paused);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        if self.shared.state() != PlaybackState::Stopped {
            self.shared.set_state(PlaybackState::Stopped);
            self.shared.dispatcher.post(ControlMessage::SinkStopped {
                sink: self.shared.id,
            });
        }
        Ok(())
    }

    fn state(&self) -> PlaybackState {
        self.shared.state()
    }

    fn volume(&self) -> SharedVolume {
        self.shared.volume.clone()
    }

    fn has_source(&self) -> bool {
        self.shared.source.lock().unwrap().is_some()
    }
}

impl Drop for MockSink {
    fn drop(&mut self) {
        self.shared.released.store(true, Ordering::SeqCst);
    }
}

/// Test-side view of a sink
#[derive(Clone)]
pub struct SinkProbe {
    shared: Arc<SinkShared>,
}

impl SinkProbe {
    pub fn id(&self) -> SinkId {
        self.shared.id
    }

    pub fn device(&self) -> &str {
        &self.shared.device
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.state()
    }

    pub fn volume(&self) -> f32 {
        self.shared.volume.get()
    }

    pub fn has_source(&self) -> bool {
        self.shared.source.lock().unwrap().is_some()
    }

    /// Whether the engine dropped this sink
    pub fn is_released(&self) -> bool {
        self.shared.released.load(Ordering::SeqCst)
    }

    /// Read up to `frames` frames like the audio thread would
    ///
    /// Returns the number of frames read. Reaching the end of the source
    /// stops the sink and posts `SinkStopped`.
    pub fn pull(&self, frames: usize) -> usize {
        if self.state() != PlaybackState::Playing {
            return 0;
        }

        let mut guard = self.shared.source.lock().unwrap();
        let Some(source) = guard.as_mut() else {
            return 0;
        };
        let channels = source.format().channel_count();
        let mut buffer = vec![0.0; frames * channels];
        let read = source.read(&mut buffer).unwrap();
        drop(guard);

        if read == 0 {
            self.shared.set_state(PlaybackState::Stopped);
            self.shared.dispatcher.post(ControlMessage::SinkStopped {
                sink: self.shared.id,
            });
        }
        read / channels
    }
}

// ===== Devices =====

struct HostState {
    devices: Vec<String>,
    default_device: String,
    sinks: Vec<SinkProbe>,
    next_id: SinkId,
    watch_closed: bool,
    fail_new_sinks: bool,
}

/// Shared state of the mock output layer
#[derive(Clone)]
pub struct MockHost {
    state: Arc<Mutex<HostState>>,
}

impl MockHost {
    pub fn new(devices: &[&str], default_device: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(HostState {
                devices: devices.iter().map(|d| (*d).to_string()).collect(),
                default_device: default_device.to_string(),
                sinks: Vec::new(),
                next_id: 0,
                watch_closed: false,
                fail_new_sinks: false,
            })),
        }
    }

    pub fn devices(&self) -> Box<dyn OutputDevices> {
        Box::new(MockDevices { host: self.clone() })
    }

    pub fn remove_device(&self, id: &str) {
        self.state.lock().unwrap().devices.retain(|d| d != id);
    }

    /// Make every following `create_sink` fail
    pub fn fail_new_sinks(&self, fail: bool) {
        self.state.lock().unwrap().fail_new_sinks = fail;
    }

    pub fn set_default_device(&self, id: &str) {
        self.state.lock().unwrap().default_device = id.to_string();
    }

    /// Every sink created so far, oldest first
    pub fn sinks(&self) -> Vec<SinkProbe> {
        self.state.lock().unwrap().sinks.clone()
    }

    /// Most recently created sink
    pub fn sink(&self) -> SinkProbe {
        self.state
            .lock()
            .unwrap()
            .sinks
            .last()
            .cloned()
            .expect("no sink created")
    }

    pub fn watch_closed(&self) -> bool {
        self.state.lock().unwrap().watch_closed
    }
}

struct MockDevices {
    host: MockHost,
}

struct MockWatch {
    host: MockHost,
}

impl DeviceWatch for MockWatch {
    fn close(&mut self) {
        self.host.state.lock().unwrap().watch_closed = true;
    }
}

impl OutputDevices for MockDevices {
    fn modes(&self) -> Vec<OutputMode> {
        vec![OutputMode::LowLatency]
    }

    fn enumerate(&self, mode: OutputMode) -> Result<Vec<DeviceDescriptor>, DeviceError> {
        let state = self.host.state.lock().unwrap();
        Ok(state
            .devices
            .iter()
            .map(|id| DeviceDescriptor {
                id: id.clone(),
                name: id.clone(),
                is_default: false,
                mode,
            })
            .collect())
    }

    fn default_device_id(&self, _mode: OutputMode) -> Option<String> {
        Some(self.host.state.lock().unwrap().default_device.clone())
    }

    fn create_sink(
        &mut self,
        request: &SinkRequest,
        dispatcher: Dispatcher,
    ) -> Result<Box<dyn OutputSink>, DeviceError> {
        let mut state = self.host.state.lock().unwrap();
        if state.fail_new_sinks {
            return Err(DeviceError::StreamBuild("device busy".into()));
        }
        let device = match &request.device {
            DeviceSelector::SystemDefault => state.default_device.clone(),
            DeviceSelector::Id(id) if state.devices.contains(id) => id.clone(),
            DeviceSelector::Id(id) => return Err(DeviceError::DeviceNotFound(id.clone())),
        };

        state.next_id += 1;
        let shared = Arc::new(SinkShared {
            id: state.next_id,
            device,
            dispatcher,
            source: Mutex::new(None),
            state: Mutex::new(PlaybackState::Stopped),
            volume: SharedVolume::default(),
            released: AtomicBool::new(false),
        });
        state.sinks.push(SinkProbe {
            shared: shared.clone(),
        });
        Ok(Box::new(MockSink { shared }))
    }

    fn watch_default_device(&mut self, _dispatcher: Dispatcher) -> Option<Box<dyn DeviceWatch>> {
        Some(Box::new(MockWatch {
            host: self.host.clone(),
        }))
    }
}

// ===== Sources =====

/// Opens `<seconds>.tone` paths as stereo sine tones at `TONE_RATE`
pub struct ToneOpener;

impl SourceOpener for ToneOpener {
    fn open(&self, path: &Path) -> tempest_audio::Result<Box<dyn WaveSource>> {
        let seconds: f64 = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| stem.parse().ok())
            .ok_or_else(|| AudioError::DecodeError(format!("not a tone: {}", path.display())))?;
        Ok(Box::new(ToneSource::new(TONE_RATE, 100.0, seconds)))
    }
}

/// A track backed by a `<seconds>.tone` path
pub fn tone_track(seconds: u32) -> Arc<FileTrack> {
    Arc::new(FileTrack::new(format!("/music/{}.tone", seconds)))
}

pub fn as_track(track: &Arc<FileTrack>) -> Arc<dyn Track> {
    track.clone()
}

// ===== Harness =====

/// Settings with short fades and native-rate pipelines
pub fn test_settings() -> EngineSettings {
    EngineSettings {
        sample_rate: 0,
        wave_source_bits: 32,
        fade_duration_ms: 20,
        fade_tick_ms: 5,
        block_notify_interval: 100,
        ..EngineSettings::default()
    }
}

/// Engine wired to a mock host, with its control loop driven by the test
pub struct Harness {
    pub engine: PlaybackEngine,
    pub host: MockHost,
    control: Receiver<ControlMessage>,
    events: Receiver<EngineEvent>,
    seen: Vec<EngineEvent>,
}

impl Harness {
    pub fn new(settings: EngineSettings) -> Self {
        Self::with_host(settings, MockHost::new(&["speakers", "headset"], "speakers"))
    }

    pub fn with_host(settings: EngineSettings, host: MockHost) -> Self {
        let (dispatcher, control) = control_channel();
        let mut engine =
            PlaybackEngine::new(settings, host.devices(), Box::new(ToneOpener), dispatcher)
                .unwrap();
        let events = engine.subscribe();
        Self {
            engine,
            host,
            control,
            events,
            seen: Vec::new(),
        }
    }

    fn collect_events(&mut self) {
        self.seen.extend(self.events.try_iter());
    }

    /// Handle every message already queued
    pub fn pump(&mut self) {
        while let Ok(message) = self.control.try_recv() {
            self.engine.handle(message);
        }
        self.collect_events();
    }

    /// Handle messages as they arrive for `wait`
    pub fn pump_for(&mut self, wait: Duration) {
        let deadline = Instant::now() + wait;
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            if let Ok(message) = self.control.recv_timeout(deadline - now) {
                self.engine.handle(message);
            }
        }
        self.collect_events();
    }

    /// Pump until `predicate` matches an event seen so far, or `timeout` passes
    pub fn pump_until(&mut self, timeout: Duration, predicate: impl Fn(&EngineEvent) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.pump();
            if self.seen.iter().any(&predicate) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            if let Ok(message) = self
                .control
                .recv_timeout((deadline - now).min(Duration::from_millis(10)))
            {
                self.engine.handle(message);
            }
        }
    }

    /// Pull `frames` frames from the active sink in 100-frame reads,
    /// handling messages after each read
    pub fn play_frames(&mut self, frames: usize) -> usize {
        let sink = self.host.sink();
        let mut total = 0;
        while total < frames {
            let read = sink.pull(100.min(frames - total));
            self.pump();
            if read == 0 {
                break;
            }
            total += read;
        }
        total
    }

    /// Events seen so far (clears the log)
    pub fn take_events(&mut self) -> Vec<EngineEvent> {
        self.collect_events();
        std::mem::take(&mut self.seen)
    }

    /// Number of events seen so far matching `predicate`
    pub fn count(&mut self, predicate: impl Fn(&EngineEvent) -> bool) -> usize {
        self.collect_events();
        self.seen.iter().filter(|e| predicate(e)).count()
    }
}
