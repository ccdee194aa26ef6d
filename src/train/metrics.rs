/// Running weighted mean of a scalar metric (loss, PSNR, batch time).
///
/// `val` is the most recent value; `average()` is `sum / count`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunningMetric {
    pub val: f64,
    pub sum: f64,
    pub count: f64,
}

impl RunningMetric {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// `sum += value * weight; count += weight`
    pub fn update(&mut self, value: f64, weight: f64) {
        self.val = value;
        self.sum += value * weight;
        self.count += weight;
    }

    /// 0 until the first update.
    pub fn average(&self) -> f64 {
        if self.count == 0.0 {
            return 0.0;
        }
        self.sum / self.count
    }
}
