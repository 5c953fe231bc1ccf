//! Desktop engine runtime
//!
//! Runs a `PlaybackEngine` on its own control thread with CPAL output and
//! hands the application a cheap handle: commands in, events out.

use crate::error::{DesktopError, Result};
use crate::platform::CpalDevices;
use crossbeam_channel::Receiver;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tempest_audio::AnalyzerHandle;
use tempest_core::FileTrack;
use tempest_playback::{
    control_channel, Dispatcher, EngineCommand, EngineEvent, EngineSettings, FileOpener,
    OutputDevices, PlaybackEngine, PlaybackError,
};

/// Handle to a playback engine running on its control thread
pub struct DesktopEngine {
    dispatcher: Dispatcher,
    events: Receiver<EngineEvent>,
    analyzer: AnalyzerHandle,
    control_thread: Option<JoinHandle<()>>,
}

impl DesktopEngine {
    /// Open the configured output device and start the control thread
    ///
    /// # Errors
    /// Returns an error if the engine cannot open an output device or the
    /// control thread cannot be spawned
    pub fn spawn(settings: EngineSettings) -> Result<Self> {
        Self::with_devices(settings, Box::new(CpalDevices::new()))
    }

    /// Start the control thread on a custom output layer
    pub fn with_devices(settings: EngineSettings, devices: Box<dyn OutputDevices>) -> Result<Self> {
        let (dispatcher, receiver) = control_channel();
        let mut engine =
            PlaybackEngine::new(settings, devices, Box::new(FileOpener), dispatcher.clone())?;
        let events = engine.subscribe();
        let analyzer = engine.analyzer();

        let control_thread = thread::Builder::new()
            .name("tempest-control".into())
            .spawn(move || engine.run(receiver))
            .map_err(|e| DesktopError::Thread(e.to_string()))?;

        tracing::debug!("Control thread started");
        Ok(Self {
            dispatcher,
            events,
            analyzer,
            control_thread: Some(control_thread),
        })
    }

    /// Queue a command for the control thread
    pub fn send(&self, command: EngineCommand) -> Result<()> {
        if self.dispatcher.post(command) {
            Ok(())
        } else {
            Err(PlaybackError::ControlThreadGone.into())
        }
    }

    /// Queue opening a file as the current track
    pub fn open_file(&self, path: impl Into<PathBuf>) -> Result<()> {
        self.send(EngineCommand::OpenTrack(Arc::new(FileTrack::new(path))))
    }

    /// Events emitted by the engine
    pub fn events(&self) -> &Receiver<EngineEvent> {
        &self.events
    }

    /// Dispatcher posting into the control loop
    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    /// Spectrum analyzer fed by the current track, for polling from a UI
    pub fn analyzer(&self) -> &AnalyzerHandle {
        &self.analyzer
    }

    /// Fill `output` with the current spectrum
    pub fn fft_data(&self, output: &mut [f32]) {
        self.analyzer.compute_fft(output);
    }

    /// Dispose the engine on its control thread and wait for it to exit
    pub fn shutdown(mut self) {
        self.stop_control_thread();
    }

    fn stop_control_thread(&mut self) {
        let Some(handle) = self.control_thread.take() else {
            return;
        };
        self.dispatcher.post(EngineCommand::Shutdown);
        if handle.join().is_err() {
            tracing::error!("Control thread panicked");
        }
    }
}

impl Drop for DesktopEngine {
    fn drop(&mut self) {
        self.stop_control_thread();
    }
}
