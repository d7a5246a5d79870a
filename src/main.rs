use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use mr_analytics::configuration::{get_configuration, EngineSettings, Settings};
use mr_analytics::jobs::{keywords, matrix, retail, similarity};
use mr_analytics::pipeline::{Pipeline, Stage};
use mr_analytics::telemetry::init_tracing;
use mr_analytics::{record_stream, MapReduce, ParallelMapReduce, SequentialMapReduce};

#[derive(Parser, Debug)]
#[command(
    name = "mr-analytics",
    version,
    about = "Batch analytics jobs on an in-process MapReduce engine"
)]
struct Cli {
    /// TOML settings file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[arg(short, long, global = true)]
    workers: Option<usize>,
    /// Records per map partition
    #[arg(long, global = true)]
    partition_size: Option<usize>,
    /// Run on the calling thread instead of a worker pool
    #[arg(long, global = true)]
    sequential: bool,
    /// Write results here instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,
    #[arg(short = 'k', long, global = true)]
    top_k: Option<usize>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Most common title keywords
    Keywords { input: PathBuf },
    /// Most common title keywords per genre
    GenreKeywords { input: PathBuf },
    /// Customers with the highest total revenue
    TopBuyers { input: PathBuf },
    /// Best-selling product by quantity and by revenue
    BestSeller {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Paper summaries most similar to a query
    Similarity {
        input: PathBuf,
        #[arg(long)]
        query: Option<String>,
    },
    /// Multiply two matrices given as element tuples
    Matrix {
        left: PathBuf,
        right: PathBuf,
        /// Row count of the left matrix
        #[arg(long)]
        rows: Option<usize>,
        /// Column count of the right matrix
        #[arg(long)]
        cols: Option<usize>,
    },
    /// Convert a dense matrix into element tuples
    Tuples {
        input: PathBuf,
        #[arg(long, default_value = "A")]
        name: String,
    },
    /// Verify matrix job output against the dense operands
    Check {
        left: PathBuf,
        right: PathBuf,
        /// Output of the matrix job
        product: PathBuf,
        #[arg(long, default_value_t = 1e-10)]
        tolerance: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("mr-analytics")?;
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    let lines = run(&cli, settings).await?;

    let mut out: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    for line in lines {
        writeln!(out, "{line}")?;
    }
    out.flush()?;
    Ok(())
}

fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let mut settings = get_configuration(cli.config.as_deref())?;
    if let Some(workers) = cli.workers {
        settings.engine.workers = workers;
    }
    if let Some(size) = cli.partition_size {
        settings.engine.partition_size = size;
    }
    if let Some(k) = cli.top_k {
        settings.jobs.top_k = k;
    }
    settings.engine.validate()?;
    Ok(settings)
}

async fn run(cli: &Cli, mut settings: Settings) -> anyhow::Result<Vec<String>> {
    let engine = settings.engine.clone();
    let sequential = cli.sequential;

    let lines = match &cli.command {
        Command::Keywords { input } => {
            let job = keywords::top_keywords(&settings.jobs);
            run_job(job, read_lines(&[input])?, engine, sequential)
                .await?
                .into_iter()
                .map(|(_, c)| format!("{}\t{}", c.payload, c.score))
                .collect()
        }
        Command::GenreKeywords { input } => {
            let job = keywords::top_genre_keywords(&settings.jobs);
            run_job(job, read_lines(&[input])?, engine, sequential)
                .await?
                .into_iter()
                .map(|(genre, c)| format!("{genre}\t{}\t{}", c.payload, c.score))
                .collect()
        }
        Command::TopBuyers { input } => {
            let job = retail::top_buyers(&settings.jobs);
            run_job(job, read_lines(&[input])?, engine, sequential)
                .await?
                .into_iter()
                .map(|(_, c)| format!("{}\t{:.2}", c.payload, c.score))
                .collect()
        }
        Command::BestSeller { inputs } => {
            run_job(retail::best_seller(), read_lines(inputs)?, engine, sequential)
                .await?
                .into_iter()
                .map(|(metric, c)| format!("{metric}\t{}\t{:.2}", c.payload, c.score))
                .collect()
        }
        Command::Similarity { input, query } => {
            if let Some(query) = query {
                settings.jobs.query = query.clone();
            }
            let job = similarity::most_similar(&settings.jobs);
            run_job(job, read_lines(&[input])?, engine, sequential)
                .await?
                .into_iter()
                .map(|(_, c)| format!("{}\t{}", c.payload, c.score))
                .collect()
        }
        Command::Matrix {
            left,
            right,
            rows,
            cols,
        } => {
            let mut matrix_settings = settings.jobs.matrix.clone();
            if let Some(rows) = rows {
                matrix_settings.left_rows = *rows;
            }
            if let Some(cols) = cols {
                matrix_settings.right_cols = *cols;
            }
            let job = matrix::matrix_product(matrix_settings)?;
            run_job(job, read_lines(&[left, right])?, engine, sequential)
                .await?
                .iter()
                .map(|(cell, value)| matrix::format_cell(cell, *value))
                .collect()
        }
        Command::Tuples { input, name } => matrix::dense_tuples(name, &read_dense(input)?),
        Command::Check {
            left,
            right,
            product,
            tolerance,
        } => {
            let product = read_lines(&[product])?
                .iter()
                .filter(|line| !line.trim().is_empty())
                .map(|line| matrix::parse_cell(line))
                .collect::<anyhow::Result<Vec<_>>>()?;
            matrix::check_product(&read_dense(left)?, &read_dense(right)?, &product, *tolerance)?;
            info!(cells = product.len(), "product verified");
            vec![format!("ok\t{} cells", product.len())]
        }
    };
    Ok(lines)
}

async fn run_job<P, O>(
    pipeline: Pipeline<P, String, O>,
    input: Vec<String>,
    settings: EngineSettings,
    sequential: bool,
) -> anyhow::Result<Vec<O>>
where
    P: Stage<String, O> + 'static,
    O: Send + 'static,
{
    let input = record_stream(input);
    let output = if sequential {
        SequentialMapReduce::new(input, pipeline, settings).run().await?
    } else {
        ParallelMapReduce::new(input, pipeline, settings).run().await?
    };
    info!(
        records = output.records.len(),
        skipped = output.report.skipped_records(),
        "job finished"
    );
    Ok(output.records)
}

fn read_lines<P: AsRef<Path>>(paths: &[P]) -> anyhow::Result<Vec<String>> {
    let mut lines = Vec::new();
    for path in paths {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        lines.extend(contents.lines().map(str::to_string));
    }
    Ok(lines)
}

fn read_dense(path: &Path) -> anyhow::Result<Vec<Vec<f64>>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    matrix::parse_dense(&contents).with_context(|| format!("Bad matrix in {}", path.display()))
}
