use crate::error::{Error, Result};
use crate::network::model::Model;
use crate::optim::optimizer::Optimizer;

/// Adam with L2 weight decay folded into the gradient.
///
/// g_t = ∇θ + λθ
/// m_t = β1·m + (1−β1)·g_t,  v_t = β2·v + (1−β2)·g_t²
/// θ ← θ − lr · m̂_t / (√v̂_t + ε)
pub struct Adam {
    lr: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    weight_decay: f64,
    t: u64,
    m: Vec<Vec<f64>>,
    v: Vec<Vec<f64>>,
}

impl Adam {
    pub fn new(lr: f64, weight_decay: f64) -> Adam {
        Adam {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            weight_decay,
            t: 0,
            m: Vec::new(),
            v: Vec::new(),
        }
    }

    pub fn step_count(&self) -> u64 {
        self.t
    }
}

impl Optimizer for Adam {
    fn step(&mut self, model: &mut dyn Model) -> Result<()> {
        let mut params = model.parameters_mut();
        if self.m.is_empty() {
            self.m = params.iter().map(|p| vec![0.0; p.value.len()]).collect();
            self.v = self.m.clone();
        }
        if self.m.len() != params.len() {
            return Err(Error::Model(format!(
                "optimizer tracks {} parameters, model has {}",
                self.m.len(),
                params.len()
            )));
        }

        self.t += 1;
        let bias1 = 1.0 - self.beta1.powi(self.t as i32);
        let bias2 = 1.0 - self.beta2.powi(self.t as i32);

        for (i, param) in params.iter_mut().enumerate() {
            let grads = param.grad.data().to_vec();
            let (m, v) = (&mut self.m[i], &mut self.v[i]);
            for (j, (w, g)) in param.value.data_mut().iter_mut().zip(grads).enumerate() {
                let g = g + self.weight_decay * *w;
                m[j] = self.beta1 * m[j] + (1.0 - self.beta1) * g;
                v[j] = self.beta2 * v[j] + (1.0 - self.beta2) * g * g;
                let m_hat = m[j] / bias1;
                let v_hat = v[j] / bias2;
                *w -= self.lr * m_hat / (v_hat.sqrt() + self.epsilon);
            }
        }
        Ok(())
    }

    fn learning_rate(&self) -> f64 {
        self.lr
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.lr = lr;
    }
}
