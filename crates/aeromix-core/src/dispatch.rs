use crate::config::Config;
use crate::error::{AeromixError, AmResult};
use crate::matrix::MatrixData;
use crate::solver::MonteCarloSolver;
use crate::types::{CellSolution, PerSpecies, PointData, Species};
use crossbeam_channel::{bounded, unbounded};
use tracing::info;

/// Cell accounting for one grid run. `cells` is the full grid size;
/// `skipped` cells never reached a worker, `empty` cells ran but produced no
/// accepted sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridStats {
    pub cells: usize,
    pub dispatched: usize,
    pub valid: usize,
    pub empty: usize,
    pub skipped: usize,
}

/// The 21 retrieval fields, each a full-grid matrix pre-filled with NaN and
/// written at most once per cell.
pub struct GridOutput {
    pub residuals: MatrixData,
    pub fractions: PerSpecies<MatrixData>,
    pub gf: PerSpecies<MatrixData>,
    pub delta: PerSpecies<MatrixData>,
    pub mre: PerSpecies<MatrixData>,
    pub differences: [MatrixData; 4],
    pub stats: GridStats,
}

impl GridOutput {
    fn new_nan(rows: usize, cols: usize) -> Self {
        Self {
            residuals: MatrixData::new_nan(rows, cols),
            fractions: PerSpecies::from_fn(|_| MatrixData::new_nan(rows, cols)),
            gf: PerSpecies::from_fn(|_| MatrixData::new_nan(rows, cols)),
            delta: PerSpecies::from_fn(|_| MatrixData::new_nan(rows, cols)),
            mre: PerSpecies::from_fn(|_| MatrixData::new_nan(rows, cols)),
            differences: std::array::from_fn(|_| MatrixData::new_nan(rows, cols)),
            stats: GridStats::default(),
        }
    }

    fn write_cell(&mut self, i: usize, j: usize, solution: &CellSolution) {
        self.residuals.set(i, j, solution.residual);
        for species in Species::ALL {
            self.fractions
                .get_mut(species)
                .set(i, j, *solution.fractions.get(species));
            self.gf
                .get_mut(species)
                .set(i, j, *solution.params.gf.get(species));
            // Stored as δ, the inverse of the δ' the solver works in.
            let dp = *solution.params.delta_prime.get(species);
            self.delta.get_mut(species).set(i, j, dp / (1.0 - dp));
            self.mre
                .get_mut(species)
                .set(i, j, *solution.params.mre.get(species));
        }
        for (field, value) in self.differences.iter_mut().zip(solution.differences) {
            field.set(i, j, value);
        }
    }

    /// Copies the input grid's labels onto every output field.
    pub fn adopt_labels(&mut self, reference: &MatrixData) {
        self.residuals.adopt_labels(reference);
        for species in Species::ALL {
            self.fractions.get_mut(species).adopt_labels(reference);
            self.gf.get_mut(species).adopt_labels(reference);
            self.delta.get_mut(species).adopt_labels(reference);
            self.mre.get_mut(species).adopt_labels(reference);
        }
        for field in &mut self.differences {
            field.adopt_labels(reference);
        }
    }

    /// All output fields in a stable order, keyed by their file stem.
    pub fn fields(&self) -> Vec<(String, &MatrixData)> {
        let mut fields = vec![("residuals".to_string(), &self.residuals)];
        for species in Species::ALL {
            fields.push((format!("n_{}", species.key()), self.fractions.get(species)));
        }
        for species in Species::ALL {
            fields.push((format!("GF_{}", species.key()), self.gf.get(species)));
        }
        for species in Species::ALL {
            fields.push((format!("delta_{}", species.key()), self.delta.get(species)));
        }
        for species in Species::ALL {
            fields.push((format!("mre_{}", species.key()), self.mre.get(species)));
        }
        for (index, field) in self.differences.iter().enumerate() {
            fields.push((format!("diff_eq{}", index + 1), field));
        }
        fields
    }
}

/// Rejects runs whose input fields disagree on shape.
pub fn check_shapes(matrices: &[&MatrixData]) -> AmResult<()> {
    let Some(first) = matrices.first() else {
        return Ok(());
    };
    for matrix in &matrices[1..] {
        if matrix.rows != first.rows || matrix.cols != first.cols {
            return Err(AeromixError::Shape(format!(
                "{}x{} vs {}x{}",
                first.rows, first.cols, matrix.rows, matrix.cols
            )));
        }
    }
    Ok(())
}

struct CellTask {
    data: PointData,
    seed: Option<u64>,
}

fn point_data(
    i: usize,
    j: usize,
    dep: &MatrixData,
    gf: &MatrixData,
    mre: &MatrixData,
) -> PointData {
    // The depolarisation field stores percentages.
    let delta = dep.get(i, j) / 100.0;
    PointData {
        i,
        j,
        delta_prime: delta / (1.0 + delta),
        gf: gf.get(i, j),
        mre: mre.get(i, j),
    }
}

/// Runs the solver over every processable cell of the grid.
///
/// Producer, workers and collector are connected by a bounded task channel
/// (capacity 2x the worker count, so a saturated pool back-pressures the
/// producer) and a result channel drained on the calling thread. Cells are
/// disjoint, so each output cell is written by exactly one result.
pub fn process_grid(
    dep: &MatrixData,
    gf: &MatrixData,
    mre: &MatrixData,
    config: &Config,
) -> AmResult<GridOutput> {
    check_shapes(&[dep, gf, mre])?;

    let (rows, cols) = (dep.rows, dep.cols);
    let workers = config.workers.max(1);
    let mut output = GridOutput::new_nan(rows, cols);

    info!(
        rows,
        cols,
        workers,
        method = config.method.name(),
        "starting grid run"
    );

    let (task_tx, task_rx) = bounded::<CellTask>(2 * workers);
    let (result_tx, result_rx) = unbounded::<(usize, usize, CellSolution)>();

    let (dispatched, skipped) = std::thread::scope(|scope| {
        for _ in 0..workers {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                let solver = MonteCarloSolver::new(config);
                // Stream forked per worker; seeded tasks override it below.
                let mut worker_rng = fastrand::Rng::new();
                for task in task_rx {
                    let mut rng = match task.seed {
                        Some(seed) => fastrand::Rng::with_seed(seed),
                        None => fastrand::Rng::with_seed(worker_rng.u64(..)),
                    };
                    let solution = solver.solve(&task.data, &mut rng);
                    if result_tx.send((task.data.i, task.data.j, solution)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(task_rx);
        drop(result_tx);

        // The producer gets its own thread so back-pressure on the task
        // queue cannot deadlock against the result drain below.
        let producer = scope.spawn(move || {
            let mut dispatched = 0usize;
            let mut skipped = 0usize;
            for i in 0..rows {
                for j in 0..cols {
                    let data = point_data(i, j, dep, gf, mre);
                    if !data.is_processable() {
                        skipped += 1;
                        continue;
                    }
                    let seed = config
                        .seed
                        .map(|root| root.wrapping_add((i * cols + j) as u64));
                    if task_tx.send(CellTask { data, seed }).is_err() {
                        // All workers are gone; nothing left to feed.
                        return (dispatched, skipped);
                    }
                    dispatched += 1;
                }
            }
            (dispatched, skipped)
        });

        for (i, j, solution) in &result_rx {
            if solution.is_valid {
                output.write_cell(i, j, &solution);
                output.stats.valid += 1;
            } else {
                output.stats.empty += 1;
            }
        }

        producer.join().expect("producer thread panicked")
    });

    output.stats.cells = rows * cols;
    output.stats.dispatched = dispatched;
    output.stats.skipped = skipped;

    info!(
        dispatched,
        valid = output.stats.valid,
        empty = output.stats.empty,
        skipped,
        "grid run finished"
    );

    Ok(output)
}
