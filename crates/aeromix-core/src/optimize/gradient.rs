use super::{Objective, OptimizeResult};

const RMS_EPSILON: f64 = 1e-8;
const STEP_GROWTH: f64 = 1.2;
const STEP_SHRINK: f64 = 0.5;
const STEP_MIN: f64 = 1e-10;
const STEP_MAX: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct GradientOptions {
    pub tolerance: f64,
    pub max_iterations: usize,
    pub initial_step: f64,
    /// Scale steps by a running RMS of the gradient instead of taking the
    /// raw gradient direction.
    pub use_rmsprop: bool,
    pub rms_decay: f64,
}

impl Default for GradientOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-5,
            max_iterations: 2000,
            initial_step: 0.05,
            use_rmsprop: true,
            rms_decay: 0.9,
        }
    }
}

/// Gradient descent with backtracking step control: a step that lowers the
/// cost is kept and the step size grows, a step that raises it is rejected
/// and the step size halves.
pub fn minimize<F: Objective>(
    objective: &F,
    x0: &[f64],
    options: &GradientOptions,
) -> OptimizeResult {
    let mut x = x0.to_vec();
    let mut fx = objective.evaluate(&x);
    let mut step = options.initial_step;
    let mut sq_avg = vec![0.0; x.len()];
    let mut iterations = 0;

    for _ in 0..options.max_iterations {
        iterations += 1;

        let gradient = objective.gradient(&x);
        let norm = gradient.iter().map(|g| g * g).sum::<f64>().sqrt();
        if norm < options.tolerance {
            break;
        }

        let direction: Vec<f64> = if options.use_rmsprop {
            gradient
                .iter()
                .zip(sq_avg.iter_mut())
                .map(|(g, avg)| {
                    *avg = options.rms_decay * *avg + (1.0 - options.rms_decay) * g * g;
                    g / (avg.sqrt() + RMS_EPSILON)
                })
                .collect()
        } else {
            gradient
        };

        let candidate: Vec<f64> = x
            .iter()
            .zip(&direction)
            .map(|(v, d)| v - step * d)
            .collect();
        let candidate_value = objective.evaluate(&candidate);

        if candidate_value < fx {
            let improvement = fx - candidate_value;
            x = candidate;
            fx = candidate_value;
            step = (step * STEP_GROWTH).min(STEP_MAX);
            if improvement < options.tolerance {
                break;
            }
        } else {
            step *= STEP_SHRINK;
            if step < STEP_MIN {
                break;
            }
        }
    }

    OptimizeResult {
        x,
        value: fx,
        iterations,
    }
}
