use crate::error::{AeromixError, AmResult};
use crate::types::{PerSpecies, Species};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Inclusive sampling interval [low, high].
pub type Range = [f64; 2];

/// Local optimiser selected for the inner least-squares solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Method {
    #[default]
    #[serde(rename = "nelder-mead")]
    NelderMead,
    #[serde(rename = "gradient")]
    GradientDescent,
    #[serde(rename = "simann")]
    SimulatedAnnealing,
}

impl Method {
    pub fn parse(s: &str) -> AmResult<Self> {
        match s {
            "nelder-mead" => Ok(Method::NelderMead),
            "gradient" => Ok(Method::GradientDescent),
            "simann" => Ok(Method::SimulatedAnnealing),
            other => Err(AeromixError::Config(format!(
                "unknown method '{}' (expected nelder-mead, gradient or simann)",
                other
            ))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Method::NelderMead => "nelder-mead",
            Method::GradientDescent => "gradient",
            Method::SimulatedAnnealing => "simann",
        }
    }
}

/// Run configuration, loaded once from YAML and shared read-only across
/// workers. CLI flags are merged on top after loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Species lidar ratios (sr).
    #[serde(rename = "LR")]
    pub lr: PerSpecies<f64>,

    /// Species backscatter-to-volume conversion constants.
    #[serde(rename = "CV")]
    pub cv: PerSpecies<f64>,

    /// Sampling ranges for the depolarisation ratio δ (not δ').
    pub delta_range: PerSpecies<Range>,

    /// Sampling ranges for the growth factor G_f.
    #[serde(rename = "Gf_range")]
    pub gf_range: PerSpecies<Range>,

    /// Sampling ranges for the real refractive-index proxy m.
    pub m_range: PerSpecies<Range>,

    /// Outer Monte-Carlo draws per cell.
    #[serde(rename = "NSamples")]
    pub n_samples: usize,

    /// Number of best accepted samples averaged into the cell solution.
    #[serde(rename = "N1")]
    pub n1: usize,

    /// Residual acceptance threshold.
    pub epsilon: f64,

    /// Worker thread count.
    pub workers: usize,

    pub method: Method,

    /// Root seed. When set, every cell gets a deterministic stream
    /// (seed + row*cols + col) and two runs produce identical outputs.
    pub seed: Option<u64>,

    pub log_level: String,
    pub log_file: Option<PathBuf>,

    /// Fractional digits for output matrices.
    pub decimals_default: usize,
    /// Fractional digits for the GF_* output matrices.
    pub decimals_gf: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lr: PerSpecies {
                d: 45.0,
                u: 60.0,
                s: 23.0,
                w: 35.0,
            },
            cv: PerSpecies {
                d: 0.70,
                u: 0.55,
                s: 0.90,
                w: 0.60,
            },
            delta_range: PerSpecies {
                d: [0.20, 0.35],
                u: [0.03, 0.10],
                s: [0.01, 0.03],
                w: [0.02, 0.07],
            },
            gf_range: PerSpecies {
                d: [1.00, 1.20],
                u: [1.10, 1.60],
                s: [1.70, 2.20],
                w: [1.30, 1.80],
            },
            m_range: PerSpecies {
                d: [1.50, 1.56],
                u: [1.55, 1.65],
                s: [1.36, 1.41],
                w: [1.40, 1.47],
            },
            n_samples: 100,
            n1: 10,
            epsilon: 0.1,
            workers: default_workers(),
            method: Method::default(),
            seed: None,
            log_level: "info".to_string(),
            log_file: None,
            decimals_default: 4,
            decimals_gf: 3,
        }
    }
}

pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> AmResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = serde_yaml_ng::from_str(&content)?;
        Ok(config)
    }

    /// Rejects configurations the solver cannot run with. Called after CLI
    /// overrides are applied.
    pub fn validate(&self) -> AmResult<()> {
        if self.n_samples == 0 {
            return Err(AeromixError::Config("NSamples must be >= 1".into()));
        }
        if self.n1 == 0 {
            return Err(AeromixError::Config("N1 must be >= 1".into()));
        }
        if !(self.epsilon > 0.0) {
            return Err(AeromixError::Config("epsilon must be > 0".into()));
        }
        if self.workers == 0 {
            return Err(AeromixError::Config("workers must be >= 1".into()));
        }
        for species in Species::ALL {
            for (name, ranges) in [
                ("delta_range", &self.delta_range),
                ("Gf_range", &self.gf_range),
                ("m_range", &self.m_range),
            ] {
                let [low, high] = *ranges.get(species);
                if !low.is_finite() || !high.is_finite() || low > high {
                    return Err(AeromixError::Config(format!(
                        "{}.{}: invalid interval [{}, {}]",
                        name,
                        species.key(),
                        low,
                        high
                    )));
                }
            }
        }
        Ok(())
    }
}
