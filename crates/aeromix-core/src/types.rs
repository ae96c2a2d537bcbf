use serde::{Deserialize, Serialize};

/// The four aerosol species the classifier retrieves: mineral dust,
/// urban/anthropogenic, sea-salt and water-soluble/biomass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Species {
    Dust,
    Urban,
    Sea,
    Water,
}

impl Species {
    pub const ALL: [Species; 4] = [Species::Dust, Species::Urban, Species::Sea, Species::Water];

    /// Short key used in config sections and output file names.
    pub fn key(self) -> &'static str {
        match self {
            Species::Dust => "d",
            Species::Urban => "u",
            Species::Sea => "s",
            Species::Water => "w",
        }
    }
}

/// One value per species. Deserialises from the `{d, u, s, w}` mappings the
/// config file uses for constants and sampling ranges.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerSpecies<T> {
    pub d: T,
    pub u: T,
    pub s: T,
    pub w: T,
}

impl<T> PerSpecies<T> {
    pub fn from_fn(mut f: impl FnMut(Species) -> T) -> Self {
        Self {
            d: f(Species::Dust),
            u: f(Species::Urban),
            s: f(Species::Sea),
            w: f(Species::Water),
        }
    }

    pub fn get(&self, species: Species) -> &T {
        match species {
            Species::Dust => &self.d,
            Species::Urban => &self.u,
            Species::Sea => &self.s,
            Species::Water => &self.w,
        }
    }

    pub fn get_mut(&mut self, species: Species) -> &mut T {
        match species {
            Species::Dust => &mut self.d,
            Species::Urban => &mut self.u,
            Species::Sea => &mut self.s,
            Species::Water => &mut self.w,
        }
    }

    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> PerSpecies<U> {
        PerSpecies {
            d: f(&self.d),
            u: f(&self.u),
            s: f(&self.s),
            w: f(&self.w),
        }
    }
}

impl PerSpecies<f64> {
    pub fn splat(value: f64) -> Self {
        Self::from_fn(|_| value)
    }

    pub fn sum(&self) -> f64 {
        self.d + self.u + self.s + self.w
    }

    /// Elementwise product.
    pub fn mul(&self, other: &Self) -> Self {
        Self {
            d: self.d * other.d,
            u: self.u * other.u,
            s: self.s * other.s,
            w: self.w * other.w,
        }
    }

    pub fn dot(&self, other: &Self) -> f64 {
        self.mul(other).sum()
    }

    pub fn add_assign(&mut self, other: &Self) {
        self.d += other.d;
        self.u += other.u;
        self.s += other.s;
        self.w += other.w;
    }

    pub fn scaled(&self, factor: f64) -> Self {
        self.map(|v| v * factor)
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.d, self.u, self.s, self.w]
    }

    pub fn from_slice(x: &[f64]) -> Self {
        Self {
            d: x[0],
            u: x[1],
            s: x[2],
            w: x[3],
        }
    }
}

/// Volumetric mixing fractions (n_d, n_u, n_s, n_w).
pub type Fractions = PerSpecies<f64>;

/// Observation at a single (altitude, time) grid cell. `delta_prime` is the
/// transformed depolarisation δ' = δ/(1+δ), with δ already converted from
/// the percentage stored in the input field.
#[derive(Debug, Clone, Copy)]
pub struct PointData {
    pub i: usize,
    pub j: usize,
    pub delta_prime: f64,
    pub gf: f64,
    pub mre: f64,
}

impl PointData {
    /// A cell enters the solver only when all three observables are finite
    /// and strictly positive.
    pub fn is_processable(&self) -> bool {
        self.delta_prime.is_finite()
            && self.gf.is_finite()
            && self.mre.is_finite()
            && self.delta_prime > 0.0
            && self.gf > 0.0
            && self.mre > 0.0
    }
}

/// One Monte-Carlo draw of per-species microphysical parameters.
/// `delta_prime` holds δ'_k = δ_k/(1+δ_k), precomputed at sampling time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpeciesParams {
    pub gf: PerSpecies<f64>,
    pub delta_prime: PerSpecies<f64>,
    pub mre: PerSpecies<f64>,
}

/// Aggregated retrieval for one cell. `differences` carries the four
/// per-equation percentage deviations of the averaged solution from the
/// observation.
#[derive(Debug, Clone, Copy)]
pub struct CellSolution {
    pub residual: f64,
    pub fractions: Fractions,
    pub params: SpeciesParams,
    pub is_valid: bool,
    pub differences: [f64; 4],
}

impl CellSolution {
    pub fn invalid() -> Self {
        Self {
            residual: f64::NAN,
            fractions: Fractions::default(),
            params: SpeciesParams::default(),
            is_valid: false,
            differences: [f64::NAN; 4],
        }
    }
}
