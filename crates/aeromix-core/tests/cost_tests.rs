use aeromix_core::config::Config;
use aeromix_core::optimize::Objective;
use aeromix_core::solver::cost::{CostFunction, COST_CEILING};
use aeromix_core::types::{Fractions, PerSpecies, PointData, SpeciesParams};

fn fixture_params() -> SpeciesParams {
    let delta = PerSpecies {
        d: 0.30,
        u: 0.06,
        s: 0.02,
        w: 0.04,
    };
    SpeciesParams {
        gf: PerSpecies {
            d: 1.10,
            u: 1.35,
            s: 1.95,
            w: 1.55,
        },
        delta_prime: delta.map(|&d| d / (1.0 + d)),
        mre: PerSpecies {
            d: 1.530,
            u: 1.600,
            s: 1.385,
            w: 1.435,
        },
    }
}

fn fixture_point() -> PointData {
    PointData {
        i: 0,
        j: 0,
        delta_prime: 0.09,
        gf: 1.45,
        mre: 1.50,
    }
}

#[test]
fn cost_is_deterministic() {
    let config = Config::default();
    let data = fixture_point();
    let params = fixture_params();
    let cost = CostFunction::new(&data, &params, &config.lr, &config.cv);

    let x = [0.3, 0.2, 0.25, 0.25];
    let a = cost.evaluate(&x);
    let b = cost.evaluate(&x);
    assert_eq!(a.to_bits(), b.to_bits());
}

#[test]
fn cost_is_finite_for_finite_inputs() {
    let config = Config::default();
    let data = fixture_point();
    let params = fixture_params();
    let cost = CostFunction::new(&data, &params, &config.lr, &config.cv);

    let candidates: [[f64; 4]; 6] = [
        [0.25, 0.25, 0.25, 0.25],
        [-1.0, -1.0, -1.0, -1.0],
        [1e6, 1e6, 1e6, 1e6],
        [0.0, 0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0, 0.0],
        [-1e8, 1e8, 0.5, 0.5],
    ];
    for x in candidates {
        let value = cost.evaluate(&x);
        assert!(value.is_finite(), "non-finite cost for {:?}: {}", x, value);
    }
}

#[test]
fn wrong_arity_returns_the_sentinel() {
    let config = Config::default();
    let data = fixture_point();
    let params = fixture_params();
    let cost = CostFunction::new(&data, &params, &config.lr, &config.cv);

    assert_eq!(cost.evaluate(&[0.25, 0.25, 0.25]), COST_CEILING);
    assert_eq!(cost.evaluate(&[0.2; 5]), COST_CEILING);
    assert_eq!(cost.evaluate(&[]), COST_CEILING);
}

#[test]
fn exact_mixture_yields_near_zero_residual() {
    let config = Config::default();
    let params = fixture_params();
    let fractions = Fractions::splat(0.25);

    // Synthesize the observation from the mixing equations themselves.
    let probe = fixture_point();
    let scratch = CostFunction::new(&probe, &params, &config.lr, &config.cv);
    let lhs = scratch.equation_lhs(&fractions);

    let data = PointData {
        i: 0,
        j: 0,
        delta_prime: lhs[1],
        gf: lhs[2],
        mre: lhs[3],
    };
    let cost = CostFunction::new(&data, &params, &config.lr, &config.cv);
    let value = cost.evaluate(&fractions.as_array());
    assert!(value < 1e-9, "expected ~0 residual, got {}", value);
}

#[test]
fn negativity_penalty_raises_the_cost() {
    let config = Config::default();
    let data = fixture_point();
    // Identical parameters across species make the equations depend only on
    // the fraction sum, isolating the penalty term.
    let params = SpeciesParams {
        gf: PerSpecies::splat(1.4),
        delta_prime: PerSpecies::splat(0.1),
        mre: PerSpecies::splat(1.5),
    };
    let cost = CostFunction::new(&data, &params, &config.lr, &config.cv);

    let base = cost.evaluate(&[0.25, 0.25, 0.25, 0.25]);
    let shifted = cost.evaluate(&[0.5, 0.5, 0.25, -0.25]);

    // Both points have sum 1 and identical mixing equations, so the gap is
    // exactly the quadratic negativity penalty 1000 * 0.25^2.
    let gap = shifted - base;
    assert!((gap - 62.5).abs() < 1e-9, "unexpected penalty gap: {}", gap);
}

#[test]
fn sum_violation_penalty_dominates() {
    let config = Config::default();
    let data = fixture_point();
    let params = fixture_params();
    let cost = CostFunction::new(&data, &params, &config.lr, &config.cv);

    // Sum 2.0 leaves e1 = 1.0, far past the 0.01 tolerance.
    let value = cost.evaluate(&[0.5, 0.5, 0.5, 0.5]);
    assert!(value >= 1e4, "sum penalty missing: {}", value);
}

#[test]
fn vanishing_volume_uses_the_regularisation_branch() {
    let config = Config {
        cv: PerSpecies::splat(0.0),
        ..Config::default()
    };
    let data = fixture_point();
    let params = fixture_params();
    let cost = CostFunction::new(&data, &params, &config.lr, &config.cv);

    let value = cost.evaluate(&[0.25, 0.25, 0.25, 0.25]);
    assert!(value.is_finite());

    // With V_tot = 0 the refractive-index equation drops out entirely;
    // equation_lhs mirrors the same branch.
    let lhs = cost.equation_lhs(&Fractions::splat(0.25));
    assert_eq!(lhs[3], 0.0);
}

#[test]
fn gradient_is_a_finite_4_vector() {
    let config = Config::default();
    let data = fixture_point();
    let params = fixture_params();
    let cost = CostFunction::new(&data, &params, &config.lr, &config.cv);

    for x in [
        [0.25, 0.25, 0.25, 0.25],
        [-0.5, 1.5, 0.0, 0.0],
        [1e4, -1e4, 0.1, 0.9],
    ] {
        let gradient = cost.gradient(&x);
        assert_eq!(gradient.len(), 4);
        assert!(gradient.iter().all(|g| g.is_finite()), "{:?}", gradient);
    }
}

#[test]
fn gradient_does_not_mutate_its_input() {
    let config = Config::default();
    let data = fixture_point();
    let params = fixture_params();
    let cost = CostFunction::new(&data, &params, &config.lr, &config.cv);

    let x = [0.3, 0.2, 0.25, 0.25];
    let before = x;
    let _ = cost.gradient(&x);
    assert_eq!(x, before);
}

#[test]
fn gradient_points_uphill_away_from_the_optimum() {
    let config = Config::default();
    let params = fixture_params();
    let fractions = Fractions {
        d: 1.0,
        u: 0.0,
        s: 0.0,
        w: 0.0,
    };
    let probe = fixture_point();
    let scratch = CostFunction::new(&probe, &params, &config.lr, &config.cv);
    let lhs = scratch.equation_lhs(&fractions);
    let data = PointData {
        i: 0,
        j: 0,
        delta_prime: lhs[1],
        gf: lhs[2],
        mre: lhs[3],
    };
    let cost = CostFunction::new(&data, &params, &config.lr, &config.cv);

    // A step against the gradient from a perturbed point must not increase
    // the cost for a locally smooth objective.
    let x = [0.9, 0.05, 0.03, 0.02];
    let gradient = cost.gradient(&x);
    let fx = cost.evaluate(&x);
    let step = 1e-4;
    let moved: Vec<f64> = x.iter().zip(&gradient).map(|(v, g)| v - step * g).collect();
    assert!(cost.evaluate(&moved) <= fx + 1e-6);
}
