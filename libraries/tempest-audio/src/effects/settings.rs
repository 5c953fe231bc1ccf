/// User-facing equalizer band values
use super::graphic_eq::{BAND_COUNT, MAX_GAIN_DB};
use serde::{Deserialize, Serialize};

/// Band value that maps to 0 dB
pub const NEUTRAL_BAND_VALUE: f32 = 50.0;

const BAND_LABELS: [&str; BAND_COUNT] = [
    "31", "62", "125", "250", "500", "1K", "2K", "4K", "8K", "16K",
];

/// Map a 0-100 band value linearly onto -20..+20 dB
///
/// Values outside the scale are clamped first.
pub fn band_value_to_db(value: f32) -> f32 {
    let value = if value.is_nan() {
        NEUTRAL_BAND_VALUE
    } else {
        value.clamp(0.0, 100.0)
    };
    (value - NEUTRAL_BAND_VALUE) / NEUTRAL_BAND_VALUE * MAX_GAIN_DB
}

/// One equalizer slider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqualizerBand {
    /// Display label ("31", "1K", ...)
    pub label: String,
    /// Slider value, 0-100 with 50 = flat
    pub value: f32,
}

/// Ordered set of ten band values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqualizerSettings {
    bands: Vec<EqualizerBand>,
}

impl EqualizerSettings {
    /// Flat settings (every band at 50)
    pub fn flat() -> Self {
        Self {
            bands: BAND_LABELS
                .iter()
                .map(|label| EqualizerBand {
                    label: (*label).to_string(),
                    value: NEUTRAL_BAND_VALUE,
                })
                .collect(),
        }
    }

    /// Settings from raw slider values, missing bands stay flat
    pub fn from_values(values: &[f32]) -> Self {
        let mut settings = Self::flat();
        for (band, value) in settings.bands.iter_mut().zip(values) {
            band.value = value.clamp(0.0, 100.0);
        }
        settings
    }

    /// All bands in frequency order
    pub fn bands(&self) -> &[EqualizerBand] {
        &self.bands
    }

    /// Update one band; returns `false` if `index` is out of range
    pub fn set_band(&mut self, index: usize, value: f32) -> bool {
        match self.bands.get_mut(index) {
            Some(band) => {
                band.value = value.clamp(0.0, 100.0);
                true
            }
            None => false,
        }
    }

    /// Band gains in dB
    pub fn gains_db(&self) -> [f32; BAND_COUNT] {
        let mut gains = [0.0; BAND_COUNT];
        for (gain, band) in gains.iter_mut().zip(&self.bands) {
            *gain = band_value_to_db(band.value);
        }
        gains
    }
}

impl Default for EqualizerSettings {
    fn default() -> Self {
        Self::flat()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_mapping_endpoints() {
        assert_eq!(band_value_to_db(50.0), 0.0);
        assert_eq!(band_value_to_db(100.0), 20.0);
        assert_eq!(band_value_to_db(0.0), -20.0);
        assert_eq!(band_value_to_db(150.0), 20.0);
    }

    #[test]
    fn flat_settings_have_ten_labelled_bands() {
        let settings = EqualizerSettings::flat();
        assert_eq!(settings.bands().len(), BAND_COUNT);
        assert_eq!(settings.bands()[5].label, "1K");
        assert!(settings.gains_db().iter().all(|g| *g == 0.0));
    }

    #[test]
    fn set_band_rejects_out_of_range_index() {
        let mut settings = EqualizerSettings::flat();
        assert!(settings.set_band(2, 75.0));
        assert_eq!(settings.gains_db()[2], 10.0);
        assert!(!settings.set_band(10, 75.0));
    }

    #[test]
    fn from_values_keeps_missing_bands_flat() {
        let settings = EqualizerSettings::from_values(&[100.0, 0.0]);
        let gains = settings.gains_db();
        assert_eq!(gains[0], 20.0);
        assert_eq!(gains[1], -20.0);
        assert_eq!(gains[9], 0.0);
    }
}
