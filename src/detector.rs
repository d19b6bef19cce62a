use crate::{color::distance, models::Color};

/// Returns true if `current` should be sent to the lighting controller, given the last color
/// that was sent
pub fn should_emit(current: Color, previous: Option<Color>, threshold: f64) -> bool {
    match previous {
        None => true,
        Some(previous) => f64::from(distance(current, previous)) >= threshold,
    }
}

/// Debounces dominant colors against the last emitted one
#[derive(Debug, Clone)]
pub struct ChangeDetector {
    threshold: f64,
    previous: Option<Color>,
}

impl ChangeDetector {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            previous: None,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn previous(&self) -> Option<Color> {
        self.previous
    }

    pub fn should_emit(&self, current: Color) -> bool {
        should_emit(current, self.previous, self.threshold)
    }

    /// Remember `color` as the last emitted color
    pub fn record(&mut self, color: Color) {
        self.previous = Some(color);
    }

    /// Forget the last emitted color, so the next color is always emitted
    pub fn reset(&mut self) {
        self.previous = None;
    }
}
