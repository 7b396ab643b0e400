//! AQI calculation from EPA breakpoint tables.
//!
//! Reference: <https://www.airnow.gov/aqi/aqi-calculation/>

use crate::models::Pollutant;
use crate::units;

/// One row of a breakpoint table. Both ends are inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breakpoint {
    pub c_low: f64,
    pub c_high: f64,
    pub i_low: u16,
    pub i_high: u16,
}

const fn bp(c_low: f64, c_high: f64, i_low: u16, i_high: u16) -> Breakpoint {
    Breakpoint {
        c_low,
        c_high,
        i_low,
        i_high,
    }
}

/// NO2, as reported (µg/m³).
pub const NO2_BREAKPOINTS: [Breakpoint; 7] = [
    bp(0.0, 53.0, 0, 50),
    bp(54.0, 100.0, 51, 100),
    bp(101.0, 360.0, 101, 150),
    bp(361.0, 649.0, 151, 200),
    bp(650.0, 1249.0, 201, 300),
    bp(1250.0, 1649.0, 301, 400),
    bp(1650.0, 2049.0, 401, 500),
];

/// PM2.5, 24-hour (µg/m³).
pub const PM25_BREAKPOINTS: [Breakpoint; 7] = [
    bp(0.0, 12.0, 0, 50),
    bp(12.1, 35.4, 51, 100),
    bp(35.5, 55.4, 101, 150),
    bp(55.5, 150.4, 151, 200),
    bp(150.5, 250.4, 201, 300),
    bp(250.5, 350.4, 301, 400),
    bp(350.5, 500.4, 401, 500),
];

/// CO, 8-hour running average (ppm).
pub const CO_BREAKPOINTS: [Breakpoint; 6] = [
    bp(0.0, 4.4, 0, 50),
    bp(4.5, 9.4, 51, 100),
    bp(9.5, 12.4, 101, 150),
    bp(12.5, 15.4, 151, 200),
    bp(15.5, 30.4, 201, 300),
    bp(30.5, 50.4, 301, 500),
];

/// PM10, 24-hour (µg/m³).
pub const PM10_BREAKPOINTS: [Breakpoint; 6] = [
    bp(0.0, 54.0, 0, 50),
    bp(55.0, 154.0, 51, 100),
    bp(155.0, 254.0, 101, 150),
    bp(255.0, 354.0, 151, 200),
    bp(355.0, 424.0, 201, 300),
    bp(425.0, 604.0, 301, 500),
];

/// O3, 8-hour running average (ppm).
pub const O3_BREAKPOINTS: [Breakpoint; 5] = [
    bp(0.000, 0.054, 0, 50),
    bp(0.055, 0.070, 51, 100),
    bp(0.071, 0.085, 101, 150),
    bp(0.086, 0.105, 151, 200),
    bp(0.106, 0.200, 201, 300),
];

impl Pollutant {
    /// Breakpoint table for this pollutant.
    #[must_use]
    pub const fn breakpoints(self) -> &'static [Breakpoint] {
        match self {
            Self::Pm25 => &PM25_BREAKPOINTS,
            Self::No2 => &NO2_BREAKPOINTS,
            Self::Co => &CO_BREAKPOINTS,
            Self::Pm10 => &PM10_BREAKPOINTS,
            Self::O3 => &O3_BREAKPOINTS,
        }
    }
}

/// Interpolate a concentration against a breakpoint table.
///
/// Uses the first row whose range contains the concentration and rounds
/// half-to-even. Returns `None` when no row contains it: above the top of the
/// table, negative, NaN, or in the gap between two rows.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn calc_aqi(concentration: f64, breakpoints: &[Breakpoint]) -> Option<u16> {
    let row = breakpoints
        .iter()
        .find(|b| b.c_low <= concentration && concentration <= b.c_high)?;

    let slope = f64::from(row.i_high - row.i_low) / (row.c_high - row.c_low);
    let aqi = slope * (concentration - row.c_low) + f64::from(row.i_low);

    // Bounded by the row's index range, so the cast cannot wrap.
    Some(aqi.round_ties_even() as u16)
}

/// Normalize a reported value and compute its AQI.
#[must_use]
pub fn aqi_for(pollutant: Pollutant, value: f64, unit: &str) -> Option<u16> {
    calc_aqi(units::normalize(value, pollutant, unit), pollutant.breakpoints())
}

/// EPA reporting band for an AQI value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AqiCategory {
    Good,
    Moderate,
    UnhealthyForSensitiveGroups,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiCategory {
    #[must_use]
    pub const fn from_aqi(aqi: u16) -> Self {
        match aqi {
            0..=50 => Self::Good,
            51..=100 => Self::Moderate,
            101..=150 => Self::UnhealthyForSensitiveGroups,
            151..=200 => Self::Unhealthy,
            201..=300 => Self::VeryUnhealthy,
            _ => Self::Hazardous,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Moderate => "Moderate",
            Self::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive Groups",
            Self::Unhealthy => "Unhealthy",
            Self::VeryUnhealthy => "Very Unhealthy",
            Self::Hazardous => "Hazardous",
        }
    }

    /// ANSI foreground color used by terminal output.
    #[must_use]
    pub const fn ansi_color(self) -> &'static str {
        match self {
            Self::Good => "\x1b[92m",
            Self::Moderate => "\x1b[93m",
            Self::UnhealthyForSensitiveGroups => "\x1b[38;5;208m",
            Self::Unhealthy => "\x1b[91m",
            Self::VeryUnhealthy => "\x1b[95m",
            Self::Hazardous => "\x1b[35;1m",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Pollutant::Pm25, 0.0, Some(0))]
    #[case(Pollutant::Pm25, 12.0, Some(50))]
    #[case(Pollutant::Pm25, 12.1, Some(51))]
    #[case(Pollutant::Pm25, 35.5, Some(101))]
    #[case(Pollutant::Pm25, 500.4, Some(500))]
    #[case(Pollutant::Pm25, 501.0, None)]
    #[case(Pollutant::Pm25, 12.05, None)]
    #[case(Pollutant::Pm25, -1.0, None)]
    #[case(Pollutant::No2, 53.0, Some(50))]
    #[case(Pollutant::No2, 100.0, Some(100))]
    #[case(Pollutant::No2, 2050.0, None)]
    #[case(Pollutant::Co, 4.4, Some(50))]
    #[case(Pollutant::Co, 1.0, Some(11))]
    #[case(Pollutant::Pm10, 54.0, Some(50))]
    #[case(Pollutant::Pm10, 605.0, None)]
    #[case(Pollutant::O3, 0.2, Some(300))]
    #[case(Pollutant::O3, 0.201, None)]
    fn test_calc_aqi(#[case] pollutant: Pollutant, #[case] conc: f64, #[case] expected: Option<u16>) {
        assert_eq!(calc_aqi(conc, pollutant.breakpoints()), expected);
    }

    #[test]
    fn test_lowest_range_stays_in_band() {
        for tenth in 0..=120 {
            let conc = f64::from(tenth) / 10.0;
            let aqi = calc_aqi(conc, &PM25_BREAKPOINTS).unwrap();
            assert!(aqi <= 50, "pm25 {conc} gave {aqi}");
        }
    }

    #[test]
    fn test_nan_is_absent() {
        assert_eq!(calc_aqi(f64::NAN, &PM25_BREAKPOINTS), None);
    }

    #[test]
    fn test_rounds_half_to_even() {
        let table = [bp(0.0, 10.0, 0, 5)];
        assert_eq!(calc_aqi(1.0, &table), Some(0)); // 0.5
        assert_eq!(calc_aqi(3.0, &table), Some(2)); // 1.5
        assert_eq!(calc_aqi(5.0, &table), Some(2)); // 2.5
    }

    #[test]
    fn test_aqi_for_converts_units() {
        // 5750 µg/m³ CO is 5.0 ppm, second CO band
        assert_eq!(aqi_for(Pollutant::Co, 5750.0, "µg/m³"), Some(56));
        assert_eq!(aqi_for(Pollutant::Co, 5.0, "ppm"), Some(56));
    }

    #[test]
    fn test_tables_are_ordered_and_disjoint() {
        for pollutant in Pollutant::ALL {
            let table = pollutant.breakpoints();
            for pair in table.windows(2) {
                assert!(pair[0].c_high < pair[1].c_low, "{pollutant:?} overlaps");
                assert!(pair[0].i_high < pair[1].i_low, "{pollutant:?} index overlaps");
            }
        }
    }

    #[test]
    fn test_category_bands() {
        assert_eq!(AqiCategory::from_aqi(0), AqiCategory::Good);
        assert_eq!(AqiCategory::from_aqi(50), AqiCategory::Good);
        assert_eq!(AqiCategory::from_aqi(51), AqiCategory::Moderate);
        assert_eq!(AqiCategory::from_aqi(150), AqiCategory::UnhealthyForSensitiveGroups);
        assert_eq!(AqiCategory::from_aqi(200), AqiCategory::Unhealthy);
        assert_eq!(AqiCategory::from_aqi(300), AqiCategory::VeryUnhealthy);
        assert_eq!(AqiCategory::from_aqi(301), AqiCategory::Hazardous);
        assert_eq!(AqiCategory::Hazardous.label(), "Hazardous");
    }
}
