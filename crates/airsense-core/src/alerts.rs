//! Per-tick alert evaluation and the three status LEDs

use embedded_hal::digital::{Error as _, ErrorKind, OutputPin};
use log::{debug, warn};

use crate::display_manager::{TextSize, TextSurface};
use crate::metrics::{AlertLevel, Metric};
use crate::sensors::LEFT_MARGIN;

/// Tracks the most severe alert level seen during the current tick.
#[derive(Debug, Default)]
pub struct AlertEvaluator {
    level: AlertLevel,
}

impl AlertEvaluator {
    pub const fn new() -> Self {
        Self {
            level: AlertLevel::Normal,
        }
    }

    /// Start a new tick.
    pub fn reset(&mut self) {
        self.level = AlertLevel::Normal;
    }

    /// Aggregate level for the tick so far.
    pub fn level(&self) -> AlertLevel {
        self.level
    }

    /// Assess one metric, fold it into the tick's level and draw its label.
    ///
    /// Warning and alert labels are drawn at `cursor`, which then advances by
    /// the level's row height. Normal metrics draw nothing.
    pub fn evaluate<T: TextSurface>(
        &mut self,
        metric: Metric,
        value: f32,
        surface: &mut T,
        cursor: &mut i32,
    ) -> AlertLevel {
        let level = AlertLevel::assess(metric, value);
        self.level = self.level.max(level);

        if let Some(label) = level.label() {
            warn!(
                "{} {}: {:.1} {}",
                metric.label(),
                label,
                value,
                metric.unit()
            );
            surface.draw_text(label, LEFT_MARGIN, *cursor, TextSize::Small);
            *cursor += level.row_height();
        }

        level
    }
}

/// Green, yellow and red indicator outputs. Exactly one is lit after every
/// [`StatusLeds::show`].
pub struct StatusLeds<G, Y, R> {
    green: G,
    yellow: Y,
    red: R,
}

impl<G, Y, R> StatusLeds<G, Y, R>
where
    G: OutputPin,
    Y: OutputPin,
    R: OutputPin,
{
    pub fn new(green: G, yellow: Y, red: R) -> Self {
        Self { green, yellow, red }
    }

    /// Light the indicator for `level`, switching the other two off first.
    pub fn show(&mut self, level: AlertLevel) -> Result<(), ErrorKind> {
        self.green.set_low().map_err(|e| e.kind())?;
        self.yellow.set_low().map_err(|e| e.kind())?;
        self.red.set_low().map_err(|e| e.kind())?;

        match level {
            AlertLevel::Normal => self.green.set_high().map_err(|e| e.kind())?,
            AlertLevel::Warning => self.yellow.set_high().map_err(|e| e.kind())?,
            AlertLevel::Alert => self.red.set_high().map_err(|e| e.kind())?,
        }

        debug!("Status LED set for {:?}", level);
        Ok(())
    }

    /// Give back the three pins.
    pub fn release(self) -> (G, Y, R) {
        (self.green, self.yellow, self.red)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockPin, RecordingSurface};

    #[test]
    fn test_one_alert_forces_alert_level() {
        let mut surface = RecordingSurface::default();
        let mut evaluator = AlertEvaluator::new();
        let mut cursor = 0;

        evaluator.evaluate(Metric::Temperature, 22.0, &mut surface, &mut cursor);
        evaluator.evaluate(Metric::Humidity, 72.0, &mut surface, &mut cursor);
        evaluator.evaluate(Metric::Eco2, 2500.0, &mut surface, &mut cursor);
        evaluator.evaluate(Metric::Noise, 40.0, &mut surface, &mut cursor);

        assert_eq!(evaluator.level(), AlertLevel::Alert);
    }

    #[test]
    fn test_all_normal_stays_normal_and_draws_nothing() {
        let mut surface = RecordingSurface::default();
        let mut evaluator = AlertEvaluator::new();
        let mut cursor = 100;

        for metric in Metric::ALL {
            evaluator.evaluate(metric, 0.0, &mut surface, &mut cursor);
        }

        assert_eq!(evaluator.level(), AlertLevel::Normal);
        assert_eq!(cursor, 100);
        assert!(surface.texts.is_empty());
    }

    #[test]
    fn test_labels_advance_cursor() {
        let mut surface = RecordingSurface::default();
        let mut evaluator = AlertEvaluator::new();
        let mut cursor = 50;

        evaluator.evaluate(Metric::Tvoc, 700.0, &mut surface, &mut cursor);
        assert_eq!(cursor, 65);
        evaluator.evaluate(Metric::Tvoc, 5000.0, &mut surface, &mut cursor);
        assert_eq!(cursor, 85);

        assert_eq!(surface.lines(), ["Warning", "ALERT"]);
        assert_eq!(surface.texts[0].y, 50);
        assert_eq!(surface.texts[1].y, 65);
    }

    #[test]
    fn test_reset_returns_to_normal() {
        let mut surface = RecordingSurface::default();
        let mut evaluator = AlertEvaluator::new();
        let mut cursor = 0;

        evaluator.evaluate(Metric::Light, 99.0, &mut surface, &mut cursor);
        assert_eq!(evaluator.level(), AlertLevel::Alert);

        evaluator.reset();
        assert_eq!(evaluator.level(), AlertLevel::Normal);
    }

    #[test]
    fn test_exactly_one_led_lit_for_every_level() {
        let (green, yellow, red) = (MockPin::new(), MockPin::new(), MockPin::new());
        let mut leds = StatusLeds::new(green.clone(), yellow.clone(), red.clone());

        for (level, expected) in [
            (AlertLevel::Alert, [false, false, true]),
            (AlertLevel::Normal, [true, false, false]),
            (AlertLevel::Warning, [false, true, false]),
            (AlertLevel::Alert, [false, false, true]),
        ] {
            leds.show(level).unwrap();
            let lit = [green.is_high(), yellow.is_high(), red.is_high()];
            assert_eq!(lit, expected, "wrong LEDs for {:?}", level);
            assert_eq!(lit.iter().filter(|on| **on).count(), 1);
        }
    }

    #[test]
    fn test_led_error_is_reported() {
        let green = MockPin::failing();
        let mut leds = StatusLeds::new(green, MockPin::new(), MockPin::new());
        assert_eq!(leds.show(AlertLevel::Normal), Err(ErrorKind::Other));
    }
}
