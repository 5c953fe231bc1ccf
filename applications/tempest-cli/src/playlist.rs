//! Sequential playback of a file list
//!
//! `Playlist` turns engine events into the next thing the player should do.
//! It owns no engine handle, so the decisions can be driven from tests.

use std::path::PathBuf;
use std::time::Duration;
use tempest_playback::EngineEvent;

/// What the player should do next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaylistAction {
    /// Open this file as the current track
    Open(PathBuf),
    /// Start playback of the track just opened
    Play,
    /// Nothing left to play; let a running crossfade tail finish first
    Finish { tail: Option<Duration> },
}

/// Files played in order, skipping those that fail to open
#[derive(Debug, Clone)]
pub struct Playlist {
    files: Vec<PathBuf>,
    next: usize,
    crossfade_tail: Option<Duration>,
    failed: Vec<PathBuf>,
}

impl Playlist {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self {
            files,
            next: 0,
            crossfade_tail: None,
            failed: Vec::new(),
        }
    }

    /// First action: open the first file
    pub fn start(&mut self) -> PlaylistAction {
        self.advance()
    }

    /// React to one engine event
    pub fn on_event(&mut self, event: &EngineEvent) -> Option<PlaylistAction> {
        match event {
            EngineEvent::TrackChanged { .. } => Some(PlaylistAction::Play),
            EngineEvent::TrackOpenFailed { path, message } => {
                tracing::warn!("Skipping {}: {}", path.display(), message);
                self.failed.push(path.clone());
                Some(self.advance())
            }
            EngineEvent::TrackFinished => Some(self.advance()),
            EngineEvent::CrossfadeStarted { duration_secs } => {
                self.crossfade_tail = Some(Duration::from_secs(*duration_secs));
                None
            }
            EngineEvent::CrossfadeCompleted => {
                self.crossfade_tail = None;
                None
            }
            _ => None,
        }
    }

    /// Files that could not be opened so far
    pub fn failed(&self) -> &[PathBuf] {
        &self.failed
    }

    /// Number of files not yet opened
    pub fn remaining(&self) -> usize {
        self.files.len() - self.next
    }

    fn advance(&mut self) -> PlaylistAction {
        match self.files.get(self.next) {
            Some(path) => {
                self.next += 1;
                PlaylistAction::Open(path.clone())
            }
            None => PlaylistAction::Finish {
                tail: self.crossfade_tail.take(),
            },
        }
    }
}

/// `m:ss / m:ss` for position updates
pub fn format_position(elapsed_secs: u64, total_secs: u64) -> String {
    format!(
        "{}:{:02} / {}:{:02}",
        elapsed_secs / 60,
        elapsed_secs % 60,
        total_secs / 60,
        total_secs % 60
    )
}
