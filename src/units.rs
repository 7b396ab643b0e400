//! Concentration unit normalization.
//!
//! The CO and O3 breakpoint tables are expressed in ppm while stations usually
//! report mass concentrations. PM2.5, PM10 and NO2 are passed through as-is:
//! their tables are in µg/m³ and no conversion is attempted for them.

use crate::models::Pollutant;

/// Recognized families of unit labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitClass {
    /// µg/m³ and its spellings
    MicrogramsPerCubicMeter,
    /// mg/m³ and its spellings
    MilligramsPerCubicMeter,
    /// Anything else, assumed to already match the breakpoint table
    Other,
}

impl UnitClass {
    /// Classify a free-text unit label (case-insensitive).
    #[must_use]
    pub fn classify(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "µg/m³" | "μg/m³" | "ug/m3" | "micrograms per cubic meter" => {
                Self::MicrogramsPerCubicMeter
            }
            "mg/m³" | "mg/m3" | "milligrams per cubic meter" => Self::MilligramsPerCubicMeter,
            _ => Self::Other,
        }
    }
}

/// Molar-mass derived divisors `(µg/m³ → ppm, mg/m³ → ppm)` at STP.
const fn ppm_divisors(pollutant: Pollutant) -> Option<(f64, f64)> {
    match pollutant {
        // 1 ppm CO = 1.15 mg/m³ = 1150 µg/m³
        Pollutant::Co => Some((1150.0, 1.15)),
        // 1 ppm O3 = 1.96 mg/m³ = 1960 µg/m³
        Pollutant::O3 => Some((1960.0, 1.96)),
        Pollutant::Pm25 | Pollutant::Pm10 | Pollutant::No2 => None,
    }
}

/// Convert `value` reported in `unit` into the unit of the pollutant's
/// breakpoint table. Unknown labels leave the value unchanged.
#[must_use]
pub fn normalize(value: f64, pollutant: Pollutant, unit: &str) -> f64 {
    let Some((ug_divisor, mg_divisor)) = ppm_divisors(pollutant) else {
        return value;
    };

    match UnitClass::classify(unit) {
        UnitClass::MicrogramsPerCubicMeter => value / ug_divisor,
        UnitClass::MilligramsPerCubicMeter => value / mg_divisor,
        UnitClass::Other => value,
    }
}
