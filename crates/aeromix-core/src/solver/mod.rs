pub mod cost;

use crate::config::Config;
use crate::optimize::minimize;
use crate::types::{CellSolution, Fractions, PerSpecies, PointData, SpeciesParams};
use cost::CostFunction;
use tracing::{debug, info};

/// Equal-quarter starting point for the inner optimiser.
const INITIAL_FRACTIONS: [f64; 4] = [0.25, 0.25, 0.25, 0.25];

fn uniform_in(rng: &mut fastrand::Rng, range: &[f64; 2]) -> f64 {
    range[0] + rng.f64() * (range[1] - range[0])
}

/// Draws one species-parameter tuple from the configured ranges. δ is
/// sampled in its raw form and transformed to δ' = δ/(1+δ) before emission.
pub fn draw_params(config: &Config, rng: &mut fastrand::Rng) -> SpeciesParams {
    let gf = PerSpecies::from_fn(|sp| uniform_in(rng, config.gf_range.get(sp)));
    let delta = PerSpecies::from_fn(|sp| uniform_in(rng, config.delta_range.get(sp)));
    let mre = PerSpecies::from_fn(|sp| uniform_in(rng, config.m_range.get(sp)));

    SpeciesParams {
        gf,
        delta_prime: delta.map(|&d| d / (1.0 + d)),
        mre,
    }
}

/// One optimised Monte-Carlo draw that passed the acceptance test.
struct Candidate {
    residual: f64,
    fractions: Fractions,
    params: SpeciesParams,
}

/// Two-level stochastic inverse solver for a single grid cell: an outer
/// Monte-Carlo loop over parameter draws and an inner least-squares solve
/// for the fractions given each draw.
pub struct MonteCarloSolver<'a> {
    config: &'a Config,
}

impl<'a> MonteCarloSolver<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    pub fn solve(&self, data: &PointData, rng: &mut fastrand::Rng) -> CellSolution {
        let mut accepted: Vec<Candidate> = Vec::new();

        for _ in 0..self.config.n_samples {
            let params = draw_params(self.config, rng);
            let objective = CostFunction::new(data, &params, &self.config.lr, &self.config.cv);
            let result = minimize(self.config.method, &objective, &INITIAL_FRACTIONS, rng);

            if result.value >= 0.0 && result.value < self.config.epsilon {
                accepted.push(Candidate {
                    residual: result.value,
                    fractions: Fractions::from_slice(&result.x),
                    params,
                });
            }
        }

        debug!(
            i = data.i,
            j = data.j,
            accepted = accepted.len(),
            "cell sampling finished"
        );

        if accepted.is_empty() {
            info!(i = data.i, j = data.j, "no accepted samples for cell");
            return CellSolution::invalid();
        }

        // Stable ascending by residual; anything non-finite sinks to the end
        // and is excluded from the averaging window.
        accepted.sort_by(|a, b| match a.residual.partial_cmp(&b.residual) {
            Some(order) => order,
            None => a.residual.is_nan().cmp(&b.residual.is_nan()),
        });
        let finite = accepted.iter().filter(|c| c.residual.is_finite()).count();
        let take = self.config.n1.min(finite);
        if take == 0 {
            return CellSolution::invalid();
        }

        let mut solution = average(&accepted[..take]);
        solution.differences = self.diagnostics(data, &solution);
        solution
    }

    /// Percentage deviation of each equation's left-hand side, re-evaluated
    /// at the averaged solution, from the observation.
    fn diagnostics(&self, data: &PointData, solution: &CellSolution) -> [f64; 4] {
        let objective =
            CostFunction::new(data, &solution.params, &self.config.lr, &self.config.cv);
        let lhs = objective.equation_lhs(&solution.fractions);
        [
            (1.0 - lhs[0]) * 100.0,
            (data.delta_prime - lhs[1]) / data.delta_prime * 100.0,
            (data.gf - lhs[2]) / data.gf * 100.0,
            (data.mre - lhs[3]) / data.mre * 100.0,
        ]
    }
}

/// Component-wise mean over the top candidates: residual, every fraction and
/// every species parameter.
fn average(candidates: &[Candidate]) -> CellSolution {
    let count = candidates.len() as f64;
    let mut residual = 0.0;
    let mut fractions = Fractions::default();
    let mut gf = PerSpecies::default();
    let mut delta_prime = PerSpecies::default();
    let mut mre = PerSpecies::default();

    for candidate in candidates {
        residual += candidate.residual;
        fractions.add_assign(&candidate.fractions);
        gf.add_assign(&candidate.params.gf);
        delta_prime.add_assign(&candidate.params.delta_prime);
        mre.add_assign(&candidate.params.mre);
    }

    let scale = 1.0 / count;
    CellSolution {
        residual: residual * scale,
        fractions: fractions.scaled(scale),
        params: SpeciesParams {
            gf: gf.scaled(scale),
            delta_prime: delta_prime.scaled(scale),
            mre: mre.scaled(scale),
        },
        is_valid: true,
        differences: [0.0; 4],
    }
}
