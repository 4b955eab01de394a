//! Alert levels and thresholds for sensor data
//!
//! This module provides the three-step alert assessment that drives the
//! status LEDs and the warning overlay. Each monitored metric has a fixed
//! yellow and red threshold in the metric's own unit.

/// A value the station monitors against thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Air temperature in °C
    Temperature,
    /// Relative humidity in %
    Humidity,
    /// Equivalent CO2 in ppm
    Eco2,
    /// Total volatile organic compounds in ppb
    Tvoc,
    /// Sound level in dB
    Noise,
    /// Light level in %
    Light,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Self::Temperature,
        Self::Humidity,
        Self::Eco2,
        Self::Tvoc,
        Self::Noise,
        Self::Light,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Temperature => "Temperature",
            Self::Humidity => "Humidity",
            Self::Eco2 => "eCO2",
            Self::Tvoc => "TVOC",
            Self::Noise => "Noise",
            Self::Light => "Light",
        }
    }

    pub const fn unit(self) -> &'static str {
        match self {
            Self::Temperature => "C",
            Self::Humidity | Self::Light => "%",
            Self::Eco2 => "ppm",
            Self::Tvoc => "ppb",
            Self::Noise => "dB",
        }
    }

    /// Static thresholds for this metric.
    pub const fn thresholds(self) -> Thresholds {
        match self {
            // Indoor comfort tops out around 28 °C
            Self::Temperature => Thresholds::new(30.0, 35.0),
            // Mould risk above 70 %
            Self::Humidity => Thresholds::new(70.0, 85.0),
            // Ventilation guidance: 1000 ppm stuffy, 2000 ppm poor
            Self::Eco2 => Thresholds::new(1000.0, 2000.0),
            // UBA bands: 660 ppb moderate, 2200 ppb high
            Self::Tvoc => Thresholds::new(660.0, 2200.0),
            Self::Noise => Thresholds::new(70.0, 85.0),
            Self::Light => Thresholds::new(85.0, 95.0),
        }
    }
}

/// Yellow and red trip points for one metric. A value equal to a threshold
/// counts as having crossed it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub yellow: f32,
    pub red: f32,
}

impl Thresholds {
    pub const fn new(yellow: f32, red: f32) -> Self {
        Self { yellow, red }
    }

    pub fn assess(&self, value: f32) -> AlertLevel {
        if value >= self.red {
            AlertLevel::Alert
        } else if value >= self.yellow {
            AlertLevel::Warning
        } else {
            AlertLevel::Normal
        }
    }
}

/// Alert level for a single metric or for a whole tick.
///
/// Ordered so that the aggregate of several levels is their maximum.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AlertLevel {
    #[default]
    Normal,
    Warning,
    Alert,
}

impl AlertLevel {
    /// Assess `value` against the thresholds of `metric`.
    ///
    /// `NaN` never crosses a threshold and assesses as `Normal`.
    pub fn assess(metric: Metric, value: f32) -> Self {
        metric.thresholds().assess(value)
    }

    /// The most severe of `levels`, or `Normal` when empty.
    pub fn aggregate(levels: impl IntoIterator<Item = AlertLevel>) -> Self {
        levels.into_iter().max().unwrap_or_default()
    }

    /// Text appended under a metric at this level, if any.
    pub const fn label(self) -> Option<&'static str> {
        match self {
            Self::Normal => None,
            Self::Warning => Some("Warning"),
            Self::Alert => Some("ALERT"),
        }
    }

    /// How far the display cursor moves after this level's label.
    pub const fn row_height(self) -> i32 {
        match self {
            Self::Normal => 0,
            Self::Warning => 15,
            Self::Alert => 20,
        }
    }
}
