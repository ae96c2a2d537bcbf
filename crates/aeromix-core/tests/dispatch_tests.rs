use aeromix_core::config::Config;
use aeromix_core::dispatch::{check_shapes, process_grid};
use aeromix_core::matrix::MatrixData;
use aeromix_core::types::{PerSpecies, Species};

/// 2x2 grid: cell (0,0) is a clean dust-like observation, (0,1) has a NaN
/// depolarisation (negative input at read time), (1,0) a zero growth factor
/// and (1,1) a clean mixed observation.
fn fixture_inputs() -> (MatrixData, MatrixData, MatrixData) {
    let mut dep = MatrixData::new_nan(2, 2);
    let mut gf = MatrixData::new_nan(2, 2);
    let mut mre = MatrixData::new_nan(2, 2);

    // Depolarisation is a percentage in the input field.
    dep.set(0, 0, 30.0);
    gf.set(0, 0, 1.10);
    mre.set(0, 0, 1.53);

    gf.set(0, 1, 1.4);
    mre.set(0, 1, 1.5);

    dep.set(1, 0, 5.0);
    gf.set(1, 0, 0.0);
    mre.set(1, 0, 1.5);

    dep.set(1, 1, 8.0);
    gf.set(1, 1, 1.45);
    mre.set(1, 1, 1.50);

    (dep, gf, mre)
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.n_samples = 60;
    config.n1 = 5;
    config.workers = 2;
    config.seed = Some(1234);
    config
}

#[test]
fn shape_check_rejects_mismatched_inputs() {
    let a = MatrixData::new_nan(100, 200);
    let b = MatrixData::new_nan(100, 199);
    assert!(check_shapes(&[&a, &a]).is_ok());
    assert!(check_shapes(&[&a, &b]).is_err());

    let config = test_config();
    assert!(process_grid(&a, &b, &a, &config).is_err());
}

#[test]
fn unprocessable_cells_stay_nan_in_every_field() {
    let (dep, gf, mre) = fixture_inputs();
    let config = test_config();

    let output = process_grid(&dep, &gf, &mre, &config).unwrap();

    // (0,1) had NaN depolarisation, (1,0) a non-positive growth factor.
    for (name, field) in output.fields() {
        for (i, j) in [(0, 1), (1, 0)] {
            assert!(
                field.get(i, j).is_nan(),
                "{} not NaN at ({}, {})",
                name,
                i,
                j
            );
        }
    }
    assert_eq!(output.stats.cells, 4);
    assert_eq!(output.stats.skipped, 2);
    assert_eq!(output.stats.dispatched, 2);
}

#[test]
fn processable_cells_are_written_once_solved() {
    let (dep, gf, mre) = fixture_inputs();
    let config = test_config();

    let output = process_grid(&dep, &gf, &mre, &config).unwrap();

    assert_eq!(output.stats.valid + output.stats.empty, 2);
    if output.stats.valid > 0 {
        // At least the fraction fields must carry finite values where the
        // solver succeeded.
        let solved = (0..2)
            .flat_map(|i| (0..2).map(move |j| (i, j)))
            .filter(|&(i, j)| output.residuals.get(i, j).is_finite())
            .count();
        assert_eq!(solved, output.stats.valid);
    }
}

#[test]
fn output_shapes_match_the_input_grid() {
    let (dep, gf, mre) = fixture_inputs();
    let config = test_config();

    let mut output = process_grid(&dep, &gf, &mre, &config).unwrap();

    let mut reference = MatrixData::new_nan(2, 2);
    reference.heights = vec![120.0, 240.0];
    reference.times = vec!["00:00".into(), "00:30".into()];
    output.adopt_labels(&reference);

    let fields = output.fields();
    assert_eq!(fields.len(), 21);
    for (_, field) in &fields {
        assert_eq!(field.rows, 2);
        assert_eq!(field.cols, 2);
        assert_eq!(field.heights, reference.heights);
        assert_eq!(field.times, reference.times);
    }

    let names: Vec<&str> = fields.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "residuals", "n_d", "n_u", "n_s", "n_w", "GF_d", "GF_u", "GF_s", "GF_w", "delta_d",
            "delta_u", "delta_s", "delta_w", "mre_d", "mre_u", "mre_s", "mre_w", "diff_eq1",
            "diff_eq2", "diff_eq3", "diff_eq4",
        ]
    );
}

#[test]
fn seeded_runs_are_elementwise_identical() {
    let (dep, gf, mre) = fixture_inputs();
    let config = test_config();

    let a = process_grid(&dep, &gf, &mre, &config).unwrap();
    let b = process_grid(&dep, &gf, &mre, &config).unwrap();

    for ((name, field_a), (_, field_b)) in a.fields().into_iter().zip(b.fields()) {
        for i in 0..2 {
            for j in 0..2 {
                let (va, vb) = (field_a.get(i, j), field_b.get(i, j));
                if va.is_nan() {
                    assert!(vb.is_nan(), "{} diverged at ({}, {})", name, i, j);
                } else {
                    assert!(
                        (va - vb).abs() < 1e-12,
                        "{} diverged at ({}, {}): {} vs {}",
                        name,
                        i,
                        j,
                        va,
                        vb
                    );
                }
            }
        }
    }
}

#[test]
fn stored_delta_is_the_inverse_transform_of_delta_prime() {
    let mut config = test_config();
    // Pin δ so the averaged δ' is known exactly.
    config.delta_range = PerSpecies {
        d: [0.30, 0.30],
        u: [0.06, 0.06],
        s: [0.02, 0.02],
        w: [0.04, 0.04],
    };
    config.gf_range = PerSpecies::from_fn(|_| [1.10, 1.10]);
    config.m_range = PerSpecies::from_fn(|_| [1.53, 1.53]);

    let mut dep = MatrixData::new_nan(1, 1);
    let mut gf = MatrixData::new_nan(1, 1);
    let mut mre = MatrixData::new_nan(1, 1);
    dep.set(0, 0, 30.0);
    gf.set(0, 0, 1.10);
    mre.set(0, 0, 1.53);

    let output = process_grid(&dep, &gf, &mre, &config).unwrap();
    assert_eq!(output.stats.valid, 1);

    let expected = PerSpecies {
        d: 0.30,
        u: 0.06,
        s: 0.02,
        w: 0.04,
    };
    for species in Species::ALL {
        let stored = output.delta.get(species).get(0, 0);
        // δ' = δ/(1+δ) on the way in, δ = δ'/(1−δ') on the way out.
        assert!(
            (stored - expected.get(species)).abs() < 1e-9,
            "delta_{} = {}",
            species.key(),
            stored
        );
    }
}

#[test]
fn all_nan_grid_dispatches_nothing() {
    let dep = MatrixData::new_nan(3, 4);
    let gf = MatrixData::new_nan(3, 4);
    let mre = MatrixData::new_nan(3, 4);
    let config = test_config();

    let output = process_grid(&dep, &gf, &mre, &config).unwrap();
    assert_eq!(output.stats.cells, 12);
    assert_eq!(output.stats.skipped, 12);
    assert_eq!(output.stats.dispatched, 0);
    assert_eq!(output.stats.valid, 0);
    assert!(output.residuals.values().iter().all(|v| v.is_nan()));
}
