pub mod anneal;
pub mod gradient;
pub mod nelder_mead;

use crate::config::Method;

/// Forward-difference step shared by the default gradient and the cost
/// function's own implementation.
pub const FD_STEP: f64 = 1e-3;

/// Capability the optimisers consume: an evaluation and, for the gradient
/// variant, a derivative. The default derivative is a forward difference on
/// a scratch copy of `x`.
pub trait Objective {
    fn evaluate(&self, x: &[f64]) -> f64;

    fn gradient(&self, x: &[f64]) -> Vec<f64> {
        let fx = self.evaluate(x);
        let mut probe = x.to_vec();
        let mut gradient = vec![0.0; x.len()];
        for i in 0..x.len() {
            let original = probe[i];
            probe[i] = original + FD_STEP;
            let slope = (self.evaluate(&probe) - fx) / FD_STEP;
            probe[i] = original;
            gradient[i] = if slope.is_finite() { slope } else { 0.0 };
        }
        gradient
    }
}

#[derive(Debug, Clone)]
pub struct OptimizeResult {
    pub x: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
}

/// Runs the configured local optimiser from `x0`. The annealer is the only
/// variant that consumes randomness; it draws from the caller's stream so
/// seeded runs stay reproducible.
pub fn minimize<F: Objective>(
    method: Method,
    objective: &F,
    x0: &[f64],
    rng: &mut fastrand::Rng,
) -> OptimizeResult {
    match method {
        Method::NelderMead => {
            nelder_mead::minimize(objective, x0, &nelder_mead::NelderMeadOptions::default())
        }
        Method::GradientDescent => {
            gradient::minimize(objective, x0, &gradient::GradientOptions::default())
        }
        Method::SimulatedAnnealing => {
            anneal::minimize(objective, x0, &anneal::AnnealOptions::default(), rng)
        }
    }
}
