/// Core domain types for Tempest
mod audio;
mod track;

pub use audio::{AudioFormat, SampleRate};
pub use track::FileTrack;
