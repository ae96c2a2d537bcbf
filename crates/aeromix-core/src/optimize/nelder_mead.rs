use super::{Objective, OptimizeResult};
use std::cmp::Ordering;

const ALPHA: f64 = 1.0; // reflection
const GAMMA: f64 = 2.0; // expansion
const RHO: f64 = 0.5; // contraction
const SIGMA: f64 = 0.5; // shrink

#[derive(Debug, Clone)]
pub struct NelderMeadOptions {
    /// Terminate when the simplex value spread falls below this.
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Relative size of the initial simplex around x0.
    pub perturbation: f64,
}

impl Default for NelderMeadOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-5,
            max_iterations: 2000,
            perturbation: 0.05,
        }
    }
}

/// x0 plus one vertex per coordinate, perturbed by 5% of its magnitude
/// (an absolute 0.001 where the coordinate is zero).
fn initial_simplex(x0: &[f64], perturbation: f64) -> Vec<Vec<f64>> {
    let mut vertices = vec![x0.to_vec()];
    for i in 0..x0.len() {
        let step = if x0[i] == 0.0 {
            0.001
        } else {
            perturbation * x0[i].abs()
        };
        let mut vertex = x0.to_vec();
        vertex[i] += step;
        vertices.push(vertex);
    }
    vertices
}

fn value_order(a: f64, b: f64) -> Ordering {
    match a.partial_cmp(&b) {
        Some(order) => order,
        None => a.is_nan().cmp(&b.is_nan()),
    }
}

/// Derivative-free downhill simplex.
pub fn minimize<F: Objective>(
    objective: &F,
    x0: &[f64],
    options: &NelderMeadOptions,
) -> OptimizeResult {
    let n = x0.len();
    let mut simplex: Vec<(Vec<f64>, f64)> = initial_simplex(x0, options.perturbation)
        .into_iter()
        .map(|vertex| {
            let value = objective.evaluate(&vertex);
            (vertex, value)
        })
        .collect();

    let mut iterations = 0;
    for _ in 0..options.max_iterations {
        iterations += 1;
        simplex.sort_by(|a, b| value_order(a.1, b.1));

        let best = simplex[0].1;
        let worst = simplex[n].1;
        if (worst - best).abs() < options.tolerance {
            break;
        }

        // Centroid of all vertices except the worst.
        let mut centroid = vec![0.0; n];
        for (vertex, _) in &simplex[..n] {
            for (c, v) in centroid.iter_mut().zip(vertex) {
                *c += v / n as f64;
            }
        }

        let reflect = |from: &[f64], factor: f64| -> Vec<f64> {
            centroid
                .iter()
                .zip(from)
                .map(|(c, v)| c + factor * (c - v))
                .collect()
        };

        let reflected = reflect(&simplex[n].0, ALPHA);
        let reflected_value = objective.evaluate(&reflected);

        if reflected_value < simplex[0].1 {
            // Keep pushing in the same direction.
            let expanded: Vec<f64> = centroid
                .iter()
                .zip(&reflected)
                .map(|(c, r)| c + GAMMA * (r - c))
                .collect();
            let expanded_value = objective.evaluate(&expanded);
            simplex[n] = if expanded_value < reflected_value {
                (expanded, expanded_value)
            } else {
                (reflected, reflected_value)
            };
        } else if reflected_value < simplex[n - 1].1 {
            simplex[n] = (reflected, reflected_value);
        } else {
            let contracted: Vec<f64> = centroid
                .iter()
                .zip(&simplex[n].0)
                .map(|(c, v)| c + RHO * (v - c))
                .collect();
            let contracted_value = objective.evaluate(&contracted);
            if contracted_value < simplex[n].1 {
                simplex[n] = (contracted, contracted_value);
            } else {
                // Shrink everything toward the best vertex.
                let best_vertex = simplex[0].0.clone();
                for (vertex, value) in simplex.iter_mut().skip(1) {
                    for (v, b) in vertex.iter_mut().zip(&best_vertex) {
                        *v = b + SIGMA * (*v - b);
                    }
                    *value = objective.evaluate(vertex);
                }
            }
        }
    }

    simplex.sort_by(|a, b| value_order(a.1, b.1));
    let (x, value) = simplex.swap_remove(0);
    OptimizeResult {
        x,
        value,
        iterations,
    }
}
