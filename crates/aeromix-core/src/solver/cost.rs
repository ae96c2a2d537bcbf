use crate::optimize::{Objective, FD_STEP};
use crate::types::{Fractions, PerSpecies, PointData, SpeciesParams};

/// Large finite sentinel; the cost never returns a non-finite value.
pub const COST_CEILING: f64 = 1e10;

/// Total volume below this takes the refractive-index regularisation branch.
pub const VOLUME_FLOOR: f64 = 1e-8;

const WEIGHT_FLOOR: f64 = 1e-8;
const NEGATIVITY_WEIGHT: f64 = 1e3;
const SUM_PENALTY_WEIGHT: f64 = 1e4;
const SUM_TOLERANCE: f64 = 0.01;

/// Weighted residual of the four mixing equations for one cell and one
/// sampled parameter set. Pure and deterministic; the same (data, params, x)
/// always yields the same value.
pub struct CostFunction<'a> {
    data: &'a PointData,
    params: &'a SpeciesParams,
    lr: &'a PerSpecies<f64>,
    cv: &'a PerSpecies<f64>,
}

impl<'a> CostFunction<'a> {
    pub fn new(
        data: &'a PointData,
        params: &'a SpeciesParams,
        lr: &'a PerSpecies<f64>,
        cv: &'a PerSpecies<f64>,
    ) -> Self {
        Self {
            data,
            params,
            lr,
            cv,
        }
    }

    /// Per-species volume weights V_k = n_k * LR_k * CV_k and their total.
    fn volumes(&self, n: &Fractions) -> (PerSpecies<f64>, f64) {
        let volumes = n.mul(&self.lr.mul(self.cv));
        let total = volumes.sum();
        (volumes, total)
    }

    /// Left-hand sides of the four equations: fraction sum, mixed δ',
    /// mixed G_f, volume-weighted refractive index. The last is 0 when the
    /// total volume falls under the regularisation floor.
    pub fn equation_lhs(&self, n: &Fractions) -> [f64; 4] {
        let (volumes, v_tot) = self.volumes(n);
        let m_mix = if v_tot > VOLUME_FLOOR {
            self.params.mre.dot(&volumes) / v_tot
        } else {
            0.0
        };
        [
            n.sum(),
            self.params.delta_prime.dot(n),
            self.params.gf.dot(n),
            m_mix,
        ]
    }
}

impl Objective for CostFunction<'_> {
    fn evaluate(&self, x: &[f64]) -> f64 {
        if x.len() != 4 {
            return COST_CEILING;
        }
        let n = Fractions::from_slice(x);
        let (volumes, v_tot) = self.volumes(&n);

        let eq1 = n.sum() - 1.0;
        let eq2 = self.params.delta_prime.dot(&n) - self.data.delta_prime;
        let eq3 = self.params.gf.dot(&n) - self.data.gf;
        let eq4 = if v_tot > VOLUME_FLOOR {
            self.params.mre.dot(&volumes) / v_tot - self.data.mre
        } else {
            0.0
        };

        // Adaptive weights normalise each residual by its observation.
        let w2 = 1.0 / WEIGHT_FLOOR.max(self.data.delta_prime.abs());
        let w3 = 1.0 / WEIGHT_FLOOR.max(self.data.gf.abs());
        let w4 = 1.0 / WEIGHT_FLOOR.max(self.data.mre.abs());

        let eps1 = eq1;
        let eps2 = w2 * eq2;
        let eps3 = w3 * eq3;
        let eps4 = w4 * eq4;

        let mut residual = (eps1 * eps1 + eps2 * eps2 + eps3 * eps3 + eps4 * eps4).sqrt();

        if eq1.abs() > SUM_TOLERANCE {
            residual += SUM_PENALTY_WEIGHT * eq1 * eq1;
        }

        let negativity: f64 = n.as_array().iter().map(|&v| (-v).max(0.0).powi(2)).sum();
        let total = residual + NEGATIVITY_WEIGHT * negativity;

        if total.is_finite() {
            total
        } else {
            COST_CEILING
        }
    }

    /// Forward finite differences on a scratch copy; a non-finite probe
    /// reports that component as 0.
    fn gradient(&self, x: &[f64]) -> Vec<f64> {
        let fx = self.evaluate(x);
        let mut probe = x.to_vec();
        let mut gradient = vec![0.0; x.len()];

        for i in 0..x.len() {
            let original = probe[i];
            probe[i] = original + FD_STEP;
            let fxh = self.evaluate(&probe);
            probe[i] = original;

            let slope = (fxh - fx) / FD_STEP;
            gradient[i] = if slope.is_finite() { slope } else { 0.0 };
        }
        gradient
    }
}
