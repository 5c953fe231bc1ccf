/// File-backed track
use crate::error::{CoreError, Result};
use crate::traits::Track;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Minimal `Track` backed by a file on disk
///
/// Loading only checks that the file still exists; the decoder opens it later.
#[derive(Debug)]
pub struct FileTrack {
    path: PathBuf,
    loaded: AtomicBool,
    playing: AtomicBool,
    last_played: Mutex<Option<DateTime<Utc>>>,
}

impl FileTrack {
    /// Create a track for the given file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            loaded: AtomicBool::new(false),
            playing: AtomicBool::new(false),
            last_played: Mutex::new(None),
        }
    }

    /// Whether `load` succeeded and `unload` has not been called since
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }
}

impl Track for FileTrack {
    fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<()> {
        if !self.path.is_file() {
            return Err(CoreError::track(format!(
                "file not found: {}",
                self.path.display()
            )));
        }
        self.loaded.store(true, Ordering::Release);
        Ok(())
    }

    fn unload(&self) {
        self.loaded.store(false, Ordering::Release);
    }

    fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::Release);
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    fn set_last_time_played(&self, at: DateTime<Utc>) {
        if let Ok(mut last) = self.last_played.lock() {
            *last = Some(at);
        }
    }

    fn last_time_played(&self) -> Option<DateTime<Utc>> {
        self.last_played.lock().ok().and_then(|last| *last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_fails_to_load() {
        let track = FileTrack::new("/definitely/not/here.flac");
        assert!(track.load().is_err());
        assert!(!track.is_loaded());
    }

    #[test]
    fn lifecycle_flags() {
        let path = std::env::temp_dir().join("tempest-core-track-test.wav");
        std::fs::write(&path, b"RIFF").unwrap();

        let track = FileTrack::new(&path);
        track.load().unwrap();
        assert!(track.is_loaded());

        track.set_playing(true);
        assert!(track.is_playing());
        let now = Utc::now();
        track.set_last_time_played(now);
        assert_eq!(track.last_time_played(), Some(now));

        track.unload();
        assert!(!track.is_loaded());
        let _ = std::fs::remove_file(path);
    }
}
