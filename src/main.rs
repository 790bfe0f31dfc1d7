//! Benchmark driver for the multiplication strategies.
//!
//! `parmatmul bench 7` multiplies two random 128×128 matrices with every
//! strategy, prints the timings, and checks every product against the
//! standard one. The hidden `worker` subcommand is what the process engine
//! runs in its children.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{Level, warn};
use tracing_subscriber::FmtSubscriber;

use parmatmul::process::{WorkerJob, artifact};
use parmatmul::{
    DEFAULT_WORKERS, EngineConfig, Kernel, MAX_WORKERS, Matrix, ProcessEngine, ThreadEngine, Timed,
    Verdict, WorkerCommand, multiply_standard, multiply_transposed, time,
};

/// Square matrix multiplication benchmark: standard, transposed, threads, processes
#[derive(Parser, Debug)]
#[command(name = "parmatmul")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Multiply two random 2^EXPONENT × 2^EXPONENT matrices with every strategy
    Bench(BenchArgs),

    /// Compute one partition for the process engine
    #[command(hide = true)]
    Worker(WorkerJob),
}

#[derive(Args, Debug)]
struct BenchArgs {
    /// Base-2 exponent of the side length (0..=10)
    #[arg(value_parser = clap::value_parser!(u32).range(0..=10))]
    exponent: u32,

    /// Seed for the random inputs (B uses seed + 1)
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Spawned workers for the parallel strategies, not counting the caller
    #[arg(
        short,
        long,
        default_value_t = DEFAULT_WORKERS,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(0..=MAX_WORKERS as u64)
    )]
    workers: usize,

    /// Give up on workers after this many milliseconds
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Kernel used by the parallel strategies
    #[arg(long, default_value = "standard")]
    kernel: Kernel,

    /// Print A, B and every product
    #[arg(long)]
    print: bool,

    /// Keep process artifacts (and the serial product) in this directory
    #[arg(long, value_name = "DIR")]
    artifact_dir: Option<PathBuf>,

    /// Skip the process-parallel strategy
    #[arg(long)]
    skip_processes: bool,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Bench(args) => bench(&args),
        Commands::Worker(job) => {
            job.run()
                .with_context(|| format!("worker for partition {} failed", job.partition))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn bench(args: &BenchArgs) -> Result<ExitCode> {
    let n = 1usize << args.exponent;
    println!("n = {}", n);

    let a = Matrix::random(n, args.seed)?;
    let b = Matrix::random(n, args.seed.wrapping_add(1))?;
    if args.print {
        println!("A:\n{}", a);
        println!("B:\n{}", b);
    }

    let mut config = EngineConfig::default()
        .with_workers(args.workers)
        .with_kernel(args.kernel);
    if let Some(ms) = args.timeout_ms {
        config = config.with_timeout(Duration::from_millis(ms));
    }

    let standard = run_strategy("standard", || multiply_standard(&a, &b))?;
    report("standard", &standard, args.print);

    if let Some(dir) = &args.artifact_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating {}", dir.display()))?;
        artifact::write_matrix(&artifact::serial_path(dir), &standard.value)?;
    }

    let mut results = Vec::new();

    let transposed = run_strategy("transposed", || multiply_transposed(&a, &b))?;
    report("transposed", &transposed, args.print);
    results.push(("transposed", transposed));

    let threads = ThreadEngine::new(config.clone());
    let threaded = run_strategy("threaded", || threads.multiply(&a, &b))?;
    report("threaded", &threaded, args.print);
    results.push(("threaded", threaded));

    if !args.skip_processes {
        let command = WorkerCommand::current_exe().context("locating worker executable")?;
        let mut processes = ProcessEngine::new(command, config);
        if let Some(dir) = &args.artifact_dir {
            processes = processes.with_artifact_dir(dir);
        }
        let forked = run_strategy("process", || processes.multiply(&a, &b))?;
        report("process", &forked, args.print);
        results.push(("process", forked));
    }

    let mut overall = Verdict::Same;
    for (name, result) in &results {
        let verdict = Verdict::compare(&standard.value, &result.value);
        if !verdict.is_same() {
            warn!(strategy = *name, %verdict, "product differs from standard");
            if overall.is_same() {
                overall = verdict;
            }
        }
    }

    println!("{}", overall.report_line());
    if overall.is_same() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn run_strategy<F>(name: &str, f: F) -> Result<Timed<Matrix>>
where
    F: FnOnce() -> parmatmul::Result<Matrix>,
{
    let timed = time(f);
    let value = timed
        .value
        .with_context(|| format!("{} multiplication failed", name))?;
    Ok(Timed {
        value,
        wall: timed.wall,
        cpu: timed.cpu,
    })
}

fn report(name: &str, result: &Timed<Matrix>, print: bool) {
    if print {
        println!("A x B using {} multiplication:\n{}", name, result.value);
    }
    match result.cpu {
        Some(cpu) => println!(
            "Time elapsed after {} multiplication: {:.6} seconds (cpu {:.6} seconds)",
            name,
            result.wall.as_secs_f64(),
            cpu.as_secs_f64()
        ),
        None => println!(
            "Time elapsed after {} multiplication: {:.6} seconds",
            name,
            result.wall.as_secs_f64()
        ),
    }
}
