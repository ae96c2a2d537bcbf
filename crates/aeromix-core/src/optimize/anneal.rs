use super::{Objective, OptimizeResult};

#[derive(Debug, Clone)]
pub struct AnnealOptions {
    pub initial_temperature: f64,
    pub final_temperature: f64,
    /// Geometric cooling factor per sweep.
    pub cooling: f64,
    pub moves_per_sweep: usize,
    /// Box perturbation half-width at temperature 1.
    pub step_scale: f64,
}

impl Default for AnnealOptions {
    fn default() -> Self {
        Self {
            initial_temperature: 1.0,
            final_temperature: 1e-4,
            cooling: 0.95,
            moves_per_sweep: 20,
            step_scale: 0.25,
        }
    }
}

/// Metropolis annealer with geometric cooling. Moves are uniform box
/// perturbations whose width shrinks with the temperature; the best visited
/// point is returned, not the final one.
pub fn minimize<F: Objective>(
    objective: &F,
    x0: &[f64],
    options: &AnnealOptions,
    rng: &mut fastrand::Rng,
) -> OptimizeResult {
    let mut current = x0.to_vec();
    let mut current_value = objective.evaluate(&current);
    let mut best = current.clone();
    let mut best_value = current_value;

    let mut temperature = options.initial_temperature;
    let mut evaluations = 0;

    while temperature > options.final_temperature {
        for _ in 0..options.moves_per_sweep {
            let width = options.step_scale * temperature;
            let candidate: Vec<f64> = current
                .iter()
                .map(|&v| v + (rng.f64() * 2.0 - 1.0) * width)
                .collect();
            let candidate_value = objective.evaluate(&candidate);
            evaluations += 1;

            let delta = candidate_value - current_value;
            if !delta.is_finite() {
                continue;
            }

            if delta < 0.0 || rng.f64() < (-delta / temperature).exp() {
                current = candidate;
                current_value = candidate_value;
                if current_value < best_value {
                    best.copy_from_slice(&current);
                    best_value = current_value;
                }
            }
        }
        temperature *= options.cooling;
    }

    OptimizeResult {
        x: best,
        value: best_value,
        iterations: evaluations,
    }
}
