use aeromix_core::config::{Config, Method};
use aeromix_core::dispatch::{check_shapes, process_grid};
use aeromix_core::error::AmResult;
use aeromix_core::matrix::{read_matrix, write_histogram, write_matrix, MatrixData};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, Level};

mod report;

/// Input file names, fixed by the upstream processing chain.
const DEP_FILE: &str = "Dep.txt";
const FL_CAP_FILE: &str = "FL_cap.txt";
const MRE_FILE: &str = "mre.txt";

#[derive(Parser, Debug)]
#[command(
    name = "aeromix",
    author,
    version,
    about = "Aerosol mixing-fraction retrieval from lidar depolarisation, growth-factor and refractive-index fields"
)]
struct Cli {
    /// Path to the YAML configuration
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Directory containing Dep.txt, FL_cap.txt and mre.txt
    #[arg(long, default_value = ".")]
    input_dir: PathBuf,

    /// Directory receiving the output matrices
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Override the configured worker count
    #[arg(long)]
    workers: Option<usize>,

    /// Override the Monte-Carlo draws per cell
    #[arg(long)]
    nsamples: Option<usize>,

    /// Override the number of best samples averaged per cell
    #[arg(long)]
    n1: Option<usize>,

    /// Override the residual acceptance threshold
    #[arg(long)]
    epsilon: Option<f64>,

    /// debug | info | warn | error
    #[arg(long)]
    log_level: Option<String>,

    /// nelder-mead | gradient | simann
    #[arg(long)]
    method: Option<String>,

    /// Root seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Write a histogram of the residual field to this path
    #[arg(long)]
    residual_hist: Option<PathBuf>,

    #[arg(long, default_value_t = 50)]
    hist_bins: usize,
}

/// File-loaded values lose to flags.
fn apply_overrides(config: &mut Config, cli: &Cli) -> AmResult<()> {
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if let Some(n_samples) = cli.nsamples {
        config.n_samples = n_samples;
    }
    if let Some(n1) = cli.n1 {
        config.n1 = n1;
    }
    if let Some(epsilon) = cli.epsilon {
        config.epsilon = epsilon;
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(method) = &cli.method {
        config.method = Method::parse(method)?;
    }
    if let Some(seed) = cli.seed {
        config.seed = Some(seed);
    }
    Ok(())
}

fn init_logging(config: &Config) {
    let level = match config.log_level.as_str() {
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Diagnostics go to stderr so stdout stays clean for the summary table.
    match &config.log_file {
        Some(path) => match std::fs::File::create(path) {
            Ok(file) => tracing_subscriber::fmt()
                .with_max_level(level)
                .with_ansi(false)
                .with_writer(Arc::new(file))
                .init(),
            Err(e) => {
                eprintln!("cannot open log file {}: {}", path.display(), e);
                tracing_subscriber::fmt()
                    .with_max_level(level)
                    .with_writer(std::io::stderr)
                    .init();
            }
        },
        None => tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .init(),
    }
}

fn read_input(dir: &Path, name: &str) -> MatrixData {
    let path = dir.join(name);
    read_matrix(&path).unwrap_or_else(|e| {
        error!("Failed to read {}: {}", path.display(), e);
        process::exit(1);
    })
}

fn main() {
    let cli = Cli::parse();

    // Logging comes up only after the config is final, so load failures go
    // straight to stderr.
    let mut config = match Config::load_from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to read config {}: {}", cli.config.display(), e);
            process::exit(1);
        }
    };
    if let Err(e) = apply_overrides(&mut config, &cli).and_then(|_| config.validate()) {
        eprintln!("Invalid configuration: {}", e);
        process::exit(1);
    }

    init_logging(&config);
    info!(config = %cli.config.display(), "configuration loaded");

    let dep = read_input(&cli.input_dir, DEP_FILE);
    let fl = read_input(&cli.input_dir, FL_CAP_FILE);
    let mre = read_input(&cli.input_dir, MRE_FILE);

    if let Err(e) = check_shapes(&[&dep, &fl, &mre]) {
        error!("Input matrices have incompatible sizes: {}", e);
        process::exit(1);
    }

    info!(
        rows = dep.rows,
        cols = dep.cols,
        workers = config.workers,
        nsamples = config.n_samples,
        "starting aerosol classification"
    );

    let started = Instant::now();
    let mut output = match process_grid(&dep, &fl, &mre, &config) {
        Ok(output) => output,
        Err(e) => {
            error!("Grid run failed: {}", e);
            process::exit(1);
        }
    };
    output.adopt_labels(&dep);

    let mut written = 0usize;
    let mut failed = 0usize;
    for (name, matrix) in output.fields() {
        let decimals = if name.starts_with("GF") {
            config.decimals_gf
        } else {
            config.decimals_default
        };
        let path = cli.output_dir.join(format!("{}.txt", name));
        match write_matrix(&path, matrix, decimals) {
            Ok(()) => {
                info!(file = %path.display(), "result written");
                written += 1;
            }
            Err(e) => {
                error!(file = %path.display(), "failed to write result: {}", e);
                failed += 1;
            }
        }
    }

    if let Some(hist_path) = &cli.residual_hist {
        let result = output
            .residuals
            .hist(0.0, 0.0, cli.hist_bins)
            .and_then(|hist| write_histogram(hist_path, &hist));
        match result {
            Ok(()) => info!(file = %hist_path.display(), "residual histogram written"),
            Err(e) => error!("failed to write residual histogram: {}", e),
        }
    }

    report::print_summary(&output.stats, started.elapsed());

    if written == 0 && failed > 0 {
        error!("all output writes failed");
        process::exit(1);
    }

    info!("aerosol classification completed");
}
