//! Audio effects processing
//!
//! The playback chain carries one effect: a 10-band graphic equalizer whose
//! band gains can be changed from any thread through an `EqualizerHandle`
//! while the audio thread keeps processing.

mod graphic_eq;
mod settings;

pub use graphic_eq::{
    EqualizerHandle, EqualizerStage, GraphicEq, BAND_COUNT, ISO_10_BAND_FREQUENCIES, MAX_GAIN_DB,
};
pub use settings::{band_value_to_db, EqualizerBand, EqualizerSettings, NEUTRAL_BAND_VALUE};
