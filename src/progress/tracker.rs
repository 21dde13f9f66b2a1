/// Normalizes a stream of elapsed-time marks into monotonic progress.
///
/// Engine log lines can arrive retried or out of order; a new mark is only
/// applied when strictly greater than every previously applied one, so
/// reported progress never moves backward.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    total: Option<f64>,
    elapsed: Option<f64>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_total(total: f64) -> Self {
        Self {
            total: Some(total),
            elapsed: None,
        }
    }

    /// Set the total duration once the probe resolves it. Ignores
    /// non-positive values.
    pub fn set_total(&mut self, total: f64) {
        if total > 0.0 {
            self.total = Some(total);
        }
    }

    pub fn total(&self) -> Option<f64> {
        self.total
    }

    pub fn elapsed(&self) -> Option<f64> {
        self.elapsed
    }

    /// Apply a new elapsed mark. Returns `true` only when the mark advanced
    /// past the last applied value.
    pub fn advance(&mut self, elapsed: f64) -> bool {
        match self.elapsed {
            Some(current) if elapsed <= current => false,
            _ => {
                self.elapsed = Some(elapsed);
                true
            }
        }
    }

    /// `round(min(elapsed / total, 1.0) * 100)`, clamped to `[0, 100]`.
    /// `None` until both an elapsed mark and a total are known.
    pub fn percent(&self) -> Option<u8> {
        let elapsed = self.elapsed?;
        let total = self.total.filter(|t| *t > 0.0)?;

        let ratio = (elapsed / total).clamp(0.0, 1.0);
        Some((ratio * 100.0).round() as u8)
    }
}
