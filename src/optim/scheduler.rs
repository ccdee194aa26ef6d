/// Epoch-level learning-rate policy.
pub trait LrScheduler {
    /// Advances one epoch. `metric` is the latest validation loss; schedules
    /// that do not react to it ignore it. Returns the new learning rate.
    fn step(&mut self, metric: f64) -> f64;

    fn learning_rate(&self) -> f64;
}

/// Multiplies the learning rate by `gamma` every `step_size` epochs:
/// lr_t = lr_0 · gamma^(⌊t / step_size⌋)
#[derive(Debug, Clone)]
pub struct StepLr {
    initial_lr: f64,
    step_size: usize,
    gamma: f64,
    epoch: usize,
}

impl StepLr {
    pub fn new(initial_lr: f64, step_size: usize, gamma: f64) -> StepLr {
        StepLr { initial_lr, step_size, gamma, epoch: 0 }
    }
}

impl LrScheduler for StepLr {
    fn step(&mut self, _metric: f64) -> f64 {
        self.epoch += 1;
        self.learning_rate()
    }

    fn learning_rate(&self) -> f64 {
        if self.step_size == 0 {
            return self.initial_lr;
        }
        let decays = (self.epoch / self.step_size) as i32;
        self.initial_lr * self.gamma.powi(decays)
    }
}
