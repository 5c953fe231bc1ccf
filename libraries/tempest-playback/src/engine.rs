//! Playback engine
//!
//! `PlaybackEngine` owns the active output sink, the current track's pipeline
//! session and the faders. It is driven from a single control thread: every
//! command from the application and every notification from audio threads,
//! fade workers and device watchers arrives as a `ControlMessage` and is
//! handled in order by [`PlaybackEngine::handle`].
//!
//! Observable state changes are published as `EngineEvent`s to subscribers.

use crate::crossfade::CrossfadeController;
use crate::device::{DeviceGroup, DeviceManager, DeviceWatch, OutputDevices};
use crate::dispatch::{ControlMessage, Dispatcher, EngineCommand};
use crate::error::{PlaybackError, Result};
use crate::events::EngineEvent;
use crate::fader::{FadeCurve, FadeId, VolumeFader};
use crate::settings::EngineSettings;
use crate::sink::{OutputSink, PlaybackState, SinkId};
use chrono::Utc;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempest_audio::effects::band_value_to_db;
use tempest_audio::{
    AnalyzerHandle, EqualizerSettings, PipelineBuilder, PipelineHandle, PipelineHooks,
    SampleAnalyzer, SymphoniaSource,
};
use tempest_core::{SharedVolume, Track, WaveSource};

/// Tracks must run this many seconds beyond the crossfade window to crossfade
pub const CROSSFADE_MIN_REMAINDER_SECS: i64 = 6;

/// Wait after a default device change before rebuilding the sink
pub const DEVICE_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Opens the decoder for a track file
pub trait SourceOpener: Send {
    /// # Errors
    /// `FileNotFound` or `DecodeError` if the file cannot be decoded
    fn open(&self, path: &Path) -> tempest_audio::Result<Box<dyn WaveSource>>;
}

/// Decodes files with Symphonia
#[derive(Debug, Clone, Copy, Default)]
pub struct FileOpener;

impl SourceOpener for FileOpener {
    fn open(&self, path: &Path) -> tempest_audio::Result<Box<dyn WaveSource>> {
        Ok(Box::new(SymphoniaSource::open(path)?))
    }
}

/// Whether a block notification at `elapsed_secs` should start a crossfade
///
/// Crossfading applies when it is enabled, none is running, the track is more
/// than `CROSSFADE_MIN_REMAINDER_SECS` longer than the crossfade, and at most
/// the crossfade duration remains.
pub fn should_begin_crossfade(
    settings: &EngineSettings,
    elapsed_secs: u64,
    total_secs: u64,
    crossfading: bool,
) -> bool {
    if !settings.crossfade_enabled || crossfading {
        return false;
    }
    let duration = i64::from(settings.crossfade_duration_secs);
    let total = total_secs as i64;
    let elapsed = elapsed_secs as i64;
    total - duration > CROSSFADE_MIN_REMAINDER_SECS && total - elapsed <= duration
}

struct Session {
    id: u64,
    handle: PipelineHandle,
    /// Set once opening an output for the next track failed
    crossfade_blocked: bool,
}

/// The playback state machine
pub struct PlaybackEngine {
    settings: EngineSettings,
    dispatcher: Dispatcher,
    devices: DeviceManager,
    opener: Box<dyn SourceOpener>,
    builder: PipelineBuilder,
    sink: Option<Box<dyn OutputSink>>,
    current_device_id: Option<String>,
    session: Option<Session>,
    next_session: u64,
    track: Option<Arc<dyn Track>>,
    analyzer: AnalyzerHandle,
    equalizer: EqualizerSettings,
    volume: f32,
    fader: VolumeFader,
    crossfade: CrossfadeController,
    fading_out: bool,
    pending_pause: Option<FadeId>,
    manual_stop: Option<SinkId>,
    watcher: Option<Box<dyn DeviceWatch>>,
    subscribers: Vec<Sender<EngineEvent>>,
    disposing: bool,
    disposed: bool,
}

impl PlaybackEngine {
    /// Create the engine and open the configured output device
    ///
    /// # Errors
    /// `InvalidSettings` for an unusable FFT size, `Device` if no sink can be
    /// opened (after falling back to the system default)
    pub fn new(
        settings: EngineSettings,
        devices: Box<dyn OutputDevices>,
        opener: Box<dyn SourceOpener>,
        dispatcher: Dispatcher,
    ) -> Result<Self> {
        let analyzer = SampleAnalyzer::new(settings.fft_size)
            .map_err(|e| PlaybackError::InvalidSettings(e.to_string()))?;

        let mut engine = Self {
            builder: PipelineBuilder::new(settings.pipeline_options()),
            fader: VolumeFader::new(settings.fade_tick(), FadeCurve::Linear),
            crossfade: CrossfadeController::new(settings.fade_tick()),
            settings,
            dispatcher,
            devices: DeviceManager::new(devices),
            opener,
            sink: None,
            current_device_id: None,
            session: None,
            next_session: 0,
            track: None,
            analyzer: AnalyzerHandle::new(analyzer),
            equalizer: EqualizerSettings::flat(),
            volume: 1.0,
            fading_out: false,
            pending_pause: None,
            manual_stop: None,
            watcher: None,
            subscribers: Vec::new(),
            disposing: false,
            disposed: false,
        };

        engine.refresh_sound_out()?;
        engine.watcher = engine
            .devices
            .watch_default_device(engine.dispatcher.clone());

        tracing::info!(
            mode = engine.settings.sound_out_mode.display_name(),
            device = engine.current_device_id.as_deref().unwrap_or("none"),
            "Playback engine ready"
        );
        Ok(engine)
    }

    /// Receive every event emitted from now on
    pub fn subscribe(&mut self) -> Receiver<EngineEvent> {
        let (sender, receiver) = unbounded();
        self.subscribers.push(sender);
        receiver
    }

    fn emit(&mut self, event: EngineEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    fn emit_state_changed(&mut self) {
        let event = EngineEvent::PlaybackStateChanged {
            state: self.current_state(),
            is_playing: self.is_playing(),
        };
        self.emit(event);
    }

    fn fade_completion(&self) -> impl FnOnce(FadeId) + Send + 'static {
        let dispatcher = self.dispatcher.clone();
        move |fade| {
            dispatcher.post(ControlMessage::FadeCompleted { fade });
        }
    }

    /// Handle one control message
    ///
    /// Returns false once the engine has shut down and the control loop
    /// should exit.
    pub fn handle(&mut self, message: ControlMessage) -> bool {
        if self.disposed {
            return false;
        }

        match message {
            ControlMessage::Command(command) => return self.handle_command(command),
            ControlMessage::BlockRead { session } => self.on_block_read(session),
            ControlMessage::SinkStopped { sink } => self.on_sink_stopped(sink),
            ControlMessage::FadeCompleted { fade } => self.on_fade_completed(fade),
            ControlMessage::CrossfadeOutCompleted { fade } => {
                if self.crossfade.on_fade_out_completed(fade) {
                    self.emit(EngineEvent::CrossfadeCompleted);
                }
            }
            ControlMessage::DefaultDeviceChanged { device_id } => {
                self.on_default_device_changed(device_id);
            }
            ControlMessage::RebuildSink => {
                if let Err(e) = self.update_sound_out() {
                    tracing::error!("Failed to rebuild output after device change: {}", e);
                    self.emit(EngineEvent::OutputFailed {
                        message: e.to_string(),
                    });
                }
            }
        }
        true
    }

    fn handle_command(&mut self, command: EngineCommand) -> bool {
        tracing::trace!("Command: {:?}", command);
        let result = match command {
            EngineCommand::OpenTrack(track) => self.open_track(track),
            EngineCommand::TogglePlayPause => self.toggle_play_pause(),
            EngineCommand::Play => self.play(),
            EngineCommand::Pause => self.pause(),
            EngineCommand::StopPlayback => {
                self.stop_playback();
                Ok(())
            }
            EngineCommand::KickTrack => {
                self.kick_track();
                Ok(())
            }
            EngineCommand::SetVolume(volume) => {
                self.set_volume(volume);
                Ok(())
            }
            EngineCommand::Seek(position) => {
                self.set_track_position(position);
                Ok(())
            }
            EngineCommand::SetEqualizerBand { index, value } => {
                self.set_band(index, value);
                Ok(())
            }
            EngineCommand::SetEqualizer(settings) => {
                self.set_equalizer(settings);
                Ok(())
            }
            EngineCommand::ApplySettings(settings) => self.apply_settings(settings),
            EngineCommand::UpdateSoundOut => self.update_sound_out(),
            EngineCommand::Shutdown => {
                self.dispose();
                return false;
            }
        };

        if let Err(e) = result {
            tracing::error!("Engine command failed: {}", e);
        }
        true
    }

    /// Handle messages until shutdown, then dispose
    pub fn run(mut self, receiver: Receiver<ControlMessage>) {
        while let Ok(message) = receiver.recv() {
            if !self.handle(message) {
                break;
            }
        }
        self.dispose();
    }

    // ===== Track lifecycle =====

    /// Open `track` on the current sink
    ///
    /// Stops the current playback and releases the previous track. The new
    /// track is left stopped, except while a crossfade is running: then it
    /// starts immediately and fades in.
    ///
    /// # Errors
    /// `Decode` if the file cannot be decoded (a `TrackOpenFailed` event is
    /// emitted too), `NoSink` or `Device` if the sink rejects the source
    pub fn open_track(&mut self, track: Arc<dyn Track>) -> Result<()> {
        if self.sink.is_none() {
            self.abandon_crossfade_incoming();
            return Err(PlaybackError::NoSink);
        }

        self.stop_playback();
        self.release_track();
        if let Some(session) = self.session.take() {
            session.handle.detach_notifications();
        }

        let path = track.path().to_path_buf();
        track.set_playing(true);

        self.next_session += 1;
        let session_id = self.next_session;
        let dispatcher = self.dispatcher.clone();
        let hooks = PipelineHooks {
            on_block: Some(Box::new(move || {
                dispatcher.post(ControlMessage::BlockRead {
                    session: session_id,
                });
            })),
            sample_observer: Some(Arc::new(self.analyzer.clone())),
        };

        let pipeline = match self
            .opener
            .open(&path)
            .and_then(|decoder| self.builder.assemble(decoder, hooks))
        {
            Ok(pipeline) => pipeline,
            Err(e) => {
                tracing::warn!("Failed to open {}: {}", path.display(), e);
                track.set_playing(false);
                self.analyzer.clear();
                self.abandon_crossfade_incoming();
                self.emit(EngineEvent::TrackOpenFailed {
                    path,
                    message: e.to_string(),
                });
                return Err(PlaybackError::Decode(e));
            }
        };

        pipeline
            .handle
            .equalizer
            .set_gains(&self.equalizer.gains_db());
        self.analyzer.initialize(pipeline.handle.format);

        let Some(sink) = self.sink.as_mut() else {
            track.set_playing(false);
            self.abandon_crossfade_incoming();
            return Err(PlaybackError::NoSink);
        };
        if let Err(e) = sink.initialize(pipeline.source) {
            track.set_playing(false);
            self.abandon_crossfade_incoming();
            return Err(e.into());
        }
        let volume = sink.volume();

        self.session = Some(Session {
            id: session_id,
            handle: pipeline.handle,
            crossfade_blocked: false,
        });
        self.track = Some(track.clone());
        track.set_last_time_played(Utc::now());
        if let Err(e) = track.load() {
            tracing::warn!("Failed to load track {}: {}", path.display(), e);
        }

        tracing::info!("Opened {}", path.display());
        self.emit(EngineEvent::TrackChanged { path });
        self.emit(EngineEvent::StartVisualization);

        if self.crossfade.is_crossfading() {
            volume.set(0.0);
            if let Err(e) = self.start_sink() {
                self.abandon_crossfade_incoming();
                return Err(e);
            }
            if self.crossfade.fade_in(volume, self.volume) {
                self.emit(EngineEvent::CrossfadeCompleted);
            }
        } else {
            self.crossfade.cancel_fading();
            volume.set(self.volume);
        }

        self.emit_state_changed();
        Ok(())
    }

    fn abandon_crossfade_incoming(&mut self) {
        if self.crossfade.abandon_incoming() {
            self.emit(EngineEvent::CrossfadeCompleted);
        }
    }

    fn release_track(&mut self) {
        if let Some(track) = self.track.take() {
            track.set_playing(false);
            track.unload();
        }
    }

    /// Forget the current track without touching the sink
    ///
    /// Position and length read as zero afterwards.
    pub fn kick_track(&mut self) {
        self.release_track();
        if let Some(session) = self.session.take() {
            session.handle.detach_notifications();
        }
        self.analyzer.clear();
        self.emit(EngineEvent::PositionChanged {
            elapsed_secs: 0,
            total_secs: 0,
        });
        self.emit_state_changed();
    }

    // ===== Transport =====

    fn start_sink(&mut self) -> Result<()> {
        let sink = self.sink.as_mut().ok_or(PlaybackError::NoSink)?;
        sink.play()?;
        Ok(())
    }

    fn sink_volume(&self) -> Result<SharedVolume> {
        self.sink
            .as_ref()
            .map(|sink| sink.volume())
            .ok_or(PlaybackError::NoSink)
    }

    /// Pause with a fade-out, or resume with a fade-in
    ///
    /// Toggling while a pause fade-out is running aborts the pause and fades
    /// back up from the current level. Does nothing without a track.
    ///
    /// # Errors
    /// `NoSink` or `Device` if the sink cannot be started
    pub fn toggle_play_pause(&mut self) -> Result<()> {
        if self.track.is_none() {
            return Ok(());
        }

        if self.fader.is_fading() {
            self.fader.cancel_fading();
        }
        self.fader.wait_for_cancel();

        let volume = self.sink_volume()?;
        let duration = self.settings.fade_duration();

        if self.fading_out {
            self.fading_out = false;
            self.pending_pause = None;
            let on_complete = self.fade_completion();
            self.fader
                .fade_to(volume, self.volume, duration, on_complete);
            self.emit_state_changed();
            return Ok(());
        }

        if self.current_state() == PlaybackState::Playing {
            self.crossfade.cancel_fading();
            self.fading_out = true;
            let on_complete = self.fade_completion();
            let fade = self.fader.fade_to(volume, 0.0, duration, on_complete);
            self.pending_pause = Some(fade);
        } else {
            self.start_sink()?;
            self.emit_state_changed();
            let on_complete = self.fade_completion();
            self.fader
                .fade_in(volume, self.volume, duration, on_complete);
        }
        Ok(())
    }

    /// Start playback if not already playing
    ///
    /// # Errors
    /// See [`Self::toggle_play_pause`]
    pub fn play(&mut self) -> Result<()> {
        if self.is_playing() {
            return Ok(());
        }
        self.toggle_play_pause()
    }

    /// Pause playback if playing
    ///
    /// # Errors
    /// See [`Self::toggle_play_pause`]
    pub fn pause(&mut self) -> Result<()> {
        if !self.is_playing() {
            return Ok(());
        }
        self.toggle_play_pause()
    }

    /// Stop the sink; the resulting stop notification is not a track end
    ///
    /// The state change is announced here, the sink's own notification is
    /// swallowed.
    pub fn stop_playback(&mut self) {
        self.fader.cancel_fading();
        self.fader.wait_for_cancel();
        self.pending_pause = None;
        self.fading_out = false;

        if let Some(sink) = self.sink.as_mut() {
            if matches!(
                sink.state(),
                PlaybackState::Playing | PlaybackState::Paused
            ) {
                self.manual_stop = Some(sink.id());
                match sink.stop() {
                    Ok(()) => self.emit_state_changed(),
                    Err(e) => {
                        tracing::warn!("Failed to stop output: {}", e);
                        self.manual_stop = None;
                    }
                }
            }
        }
    }

    fn on_fade_completed(&mut self, fade: FadeId) {
        if self.pending_pause != Some(fade) {
            return;
        }
        self.pending_pause = None;
        self.fading_out = false;
        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.pause() {
                tracing::warn!("Failed to pause output: {}", e);
            }
        }
        self.emit_state_changed();
    }

    fn on_sink_stopped(&mut self, id: SinkId) {
        if self.disposing {
            return;
        }
        if self.manual_stop == Some(id) {
            self.manual_stop = None;
            return;
        }
        if self.sink.as_ref().map(|sink| sink.id()) != Some(id) {
            tracing::debug!("Ignoring stop from retired sink {}", id);
            return;
        }

        tracing::debug!("Track finished");
        self.emit(EngineEvent::TrackFinished);
        self.emit_state_changed();
    }

    // ===== Position =====

    fn on_block_read(&mut self, session_id: u64) {
        let Some(session) = &self.session else {
            return;
        };
        if session.id != session_id {
            return;
        }
        let blocked = session.crossfade_blocked;

        let elapsed_secs = session.handle.elapsed().as_secs();
        let total_secs = session.handle.duration().as_secs();
        self.emit(EngineEvent::PositionChanged {
            elapsed_secs,
            total_secs,
        });

        if !blocked
            && should_begin_crossfade(
                &self.settings,
                elapsed_secs,
                total_secs,
                self.crossfade.is_crossfading(),
            )
        {
            self.begin_crossfade(Duration::from_secs(total_secs.saturating_sub(elapsed_secs)));
        }
    }

    fn begin_crossfade(&mut self, duration: Duration) {
        let Some(outgoing) = self.sink.take() else {
            return;
        };
        if let Err(e) = self.refresh_sound_out() {
            tracing::error!("Failed to open output for the next track: {}", e);
            self.sink = Some(outgoing);
            if let Some(session) = self.session.as_mut() {
                session.crossfade_blocked = true;
            }
            self.emit(EngineEvent::OutputFailed {
                message: e.to_string(),
            });
            return;
        }
        if let Some(session) = &self.session {
            session.handle.detach_notifications();
        }

        self.fader.cancel_fading();
        self.fader.wait_for_cancel();
        self.pending_pause = None;
        self.fading_out = false;
        self.manual_stop = None;

        tracing::info!("Crossfading over {}s", duration.as_secs());
        self.crossfade
            .fade_out(duration, outgoing, &self.dispatcher);

        self.emit(EngineEvent::CrossfadeStarted {
            duration_secs: duration.as_secs(),
        });
        self.emit(EngineEvent::TrackFinished);
    }

    /// Position of the current track in frames (0 without a track)
    pub fn position(&self) -> u64 {
        self.session
            .as_ref()
            .map_or(0, |session| session.handle.position.position())
    }

    /// Length of the current track in frames (0 without a track)
    pub fn length(&self) -> u64 {
        self.session
            .as_ref()
            .map_or(0, |session| session.handle.position.length())
    }

    pub fn current_track_position(&self) -> Duration {
        self.session
            .as_ref()
            .map_or(Duration::ZERO, |session| session.handle.elapsed())
    }

    pub fn current_track_length(&self) -> Duration {
        self.session
            .as_ref()
            .map_or(Duration::ZERO, |session| session.handle.duration())
    }

    /// Seek to `frame`, clamped to the track length
    ///
    /// Returns the frame actually requested, or `None` without a track.
    pub fn set_position(&mut self, frame: u64) -> Option<u64> {
        let session = self.session.as_ref()?;
        let target = session.handle.position.request_seek(frame);
        let elapsed_secs = session.handle.elapsed().as_secs();
        let total_secs = session.handle.duration().as_secs();
        self.emit(EngineEvent::PositionChanged {
            elapsed_secs,
            total_secs,
        });
        Some(target)
    }

    /// Seek to a wall-clock position
    pub fn set_track_position(&mut self, position: Duration) -> Option<u64> {
        let frame = self
            .session
            .as_ref()?
            .handle
            .format
            .duration_to_frames(position);
        self.set_position(frame)
    }

    // ===== Volume & equalizer =====

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Set the playback volume (clamped to 0.0..=1.0)
    pub fn set_volume(&mut self, volume: f32) {
        let volume = if volume.is_nan() {
            0.0
        } else {
            volume.clamp(0.0, 1.0)
        };
        if volume == self.volume {
            return;
        }

        self.volume = volume;
        if self.session.is_some() && !self.fading_out {
            if let Ok(sink_volume) = self.sink_volume() {
                // A running fade-in owns the level; steer it to the new target
                if self.fader.is_fading() {
                    let remaining = self.fader.remaining();
                    let on_complete = self.fade_completion();
                    self.fader
                        .fade_to(sink_volume, volume, remaining, on_complete);
                } else if !self.crossfade.retarget(sink_volume.clone(), volume) {
                    sink_volume.set(volume);
                }
            }
        }
        self.emit(EngineEvent::VolumeChanged { volume });
    }

    pub fn equalizer(&self) -> &EqualizerSettings {
        &self.equalizer
    }

    /// Set one band's slider value (0..=100, 50 is flat)
    pub fn set_band(&mut self, index: usize, value: f32) {
        if !self.equalizer.set_band(index, value) {
            tracing::debug!("Ignoring equalizer band {}", index);
            return;
        }
        if let Some(session) = &self.session {
            session
                .handle
                .equalizer
                .set_band_gain(index, band_value_to_db(value));
        }
    }

    /// Replace all band values
    pub fn set_equalizer(&mut self, settings: EqualizerSettings) {
        self.equalizer = settings;
        if let Some(session) = &self.session {
            session
                .handle
                .equalizer
                .set_gains(&self.equalizer.gains_db());
        }
    }

    // ===== Spectrum =====

    /// Handle to the spectrum analyzer, for polling from a UI thread
    pub fn analyzer(&self) -> AnalyzerHandle {
        self.analyzer.clone()
    }

    /// Fill `output` with the current spectrum; returns whether audio is playing
    pub fn fft_data(&self, output: &mut [f32]) -> bool {
        self.analyzer.compute_fft(output);
        self.is_playing()
    }

    /// FFT bin for a frequency at the current source rate
    pub fn fft_frequency_index(&self, frequency_hz: f32) -> usize {
        self.analyzer.frequency_to_bin_index(frequency_hz)
    }

    // ===== State =====

    pub fn current_state(&self) -> PlaybackState {
        self.sink
            .as_ref()
            .map_or(PlaybackState::Stopped, |sink| sink.state())
    }

    /// Playing and not fading out towards a pause
    pub fn is_playing(&self) -> bool {
        !self.fading_out && self.current_state() == PlaybackState::Playing
    }

    pub fn is_crossfading(&self) -> bool {
        self.crossfade.is_crossfading()
    }

    pub fn current_track(&self) -> Option<Arc<dyn Track>> {
        self.track.clone()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Device the active sink was opened on
    pub fn current_device_id(&self) -> Option<&str> {
        self.current_device_id.as_deref()
    }

    // ===== Devices & settings =====

    /// Selectable devices grouped by output mode
    pub fn sound_out_list(&self) -> Vec<DeviceGroup> {
        self.devices.sound_out_list()
    }

    fn refresh_sound_out(&mut self) -> Result<()> {
        let created = self
            .devices
            .create_sink(&mut self.settings, &self.dispatcher)?;
        if created.fell_back {
            let settings = self.settings.clone();
            self.emit(EngineEvent::SettingsChanged { settings });
        }

        tracing::info!("Output opened on {}", created.sink.device_id());
        self.current_device_id = Some(created.sink.device_id().to_string());
        self.sink = Some(created.sink);
        Ok(())
    }

    /// Recreate the sink on the configured device, keeping track, position
    /// and play state
    ///
    /// # Errors
    /// `Device` if no sink can be opened, `Decode` if the track cannot be reopened
    pub fn update_sound_out(&mut self) -> Result<()> {
        let position = self.position();
        let was_playing = self.is_playing();

        if self.sink.is_some() {
            self.stop_playback();
            self.sink = None;
        }
        self.refresh_sound_out()?;

        if let Some(track) = self.track.clone() {
            self.open_track(track)?;
            self.set_position(position);
            if was_playing && !self.is_playing() {
                self.toggle_play_pause()?;
            }
        }
        Ok(())
    }

    /// Replace the settings, rebuilding output and pipeline as needed
    ///
    /// # Errors
    /// `InvalidSettings` for an unusable FFT size; see [`Self::update_sound_out`]
    pub fn apply_settings(&mut self, settings: EngineSettings) -> Result<()> {
        if settings.fft_size != self.settings.fft_size {
            self.analyzer
                .resize(settings.fft_size)
                .map_err(|e| PlaybackError::InvalidSettings(e.to_string()))?;
        }

        let device_changed = self.settings.device_differs(&settings);
        let pipeline_changed = self.settings.pipeline_differs(&settings);

        self.settings = settings;
        self.builder = PipelineBuilder::new(self.settings.pipeline_options());
        self.fader.set_tick(self.settings.fade_tick());
        self.crossfade.set_tick(self.settings.fade_tick());

        if device_changed || (pipeline_changed && self.track.is_some()) {
            self.update_sound_out()?;
        }
        Ok(())
    }

    fn on_default_device_changed(&mut self, device_id: String) {
        if !self.settings.uses_system_default()
            || self.current_device_id.as_deref() == Some(device_id.as_str())
        {
            return;
        }

        tracing::info!("System default output changed to {}", device_id);
        self.current_device_id = Some(device_id);

        let dispatcher = self.dispatcher.clone();
        let settle = thread::Builder::new()
            .name("tempest-device-settle".into())
            .spawn(move || {
                thread::sleep(DEVICE_SETTLE_DELAY);
                dispatcher.post(ControlMessage::RebuildSink);
            });
        if let Err(e) = settle {
            tracing::warn!("Failed to spawn device settle thread: {}", e);
            self.dispatcher.post(ControlMessage::RebuildSink);
        }
    }

    // ===== Teardown =====

    /// Release every resource; safe to call more than once
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposing = true;

        self.fader.cancel_fading();
        self.fader.wait_for_cancel();
        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.stop() {
                tracing::debug!("Stopping output during shutdown failed: {}", e);
            }
        }
        self.crossfade.cancel_fading();
        self.release_track();
        self.session = None;
        if let Some(mut watcher) = self.watcher.take() {
            watcher.close();
        }

        self.disposed = true;
        tracing::debug!("Playback engine disposed");
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}
