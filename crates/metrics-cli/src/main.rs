mod rows;

use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use log::debug;
use metrics_aggregate::{AggregationSpec, Expansion};
use metrics_model::Metric;
use metrics_storage::{Store, StoreError, StoredMetric};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "metrics")]
#[command(about = "Store survey metrics, aggregate raw responses and query observations.")]
struct Cli {
    /// Increase log verbosity (`-v` debug, `-vv` trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Import a metric JSON document together with its observations.
    Import(ImportArgs),
    /// Print stored metrics as JSON documents.
    Export(ExportArgs),
    /// Count CSV rows into observations of a metric.
    Aggregate(AggregateArgs),
    /// Print the observations of a metric that match dimension filters.
    Query(QueryArgs),
}

#[derive(Debug, Args)]
struct ImportArgs {
    /// SQLite database file; created when missing.
    #[arg(long)]
    db: PathBuf,

    /// Metric JSON document.
    #[arg(long)]
    input: PathBuf,
}

#[derive(Debug, Args)]
struct ExportArgs {
    #[arg(long)]
    db: PathBuf,

    /// Export only this metric. Without it, all metrics are printed as an array.
    #[arg(long)]
    metric: Option<String>,
}

#[derive(Debug, Args)]
struct AggregateArgs {
    #[arg(long)]
    db: PathBuf,

    /// Target metric; created when missing.
    #[arg(long)]
    metric: String,

    /// Title for a newly created metric.
    #[arg(long)]
    title: Option<String>,

    /// Description for a newly created metric.
    #[arg(long)]
    description: Option<String>,

    /// CSV file of raw rows.
    #[arg(long)]
    input: PathBuf,

    /// Aggregation job as JSON (`field`, `answer_dimension`, `dimensions`, `expansion`).
    #[arg(long, conflicts_with_all = ["field", "answer_dimension", "dimensions", "per_dimension"])]
    spec: Option<PathBuf>,

    /// Field holding the answer: a column name, or an index with `--no-header`.
    #[arg(long, required_unless_present = "spec")]
    field: Option<String>,

    /// Dimension name recorded for the answer value.
    #[arg(long, required_unless_present = "spec")]
    answer_dimension: Option<String>,

    /// Extra dimension as `FIELD=NAME`. Repeatable; order matters.
    #[arg(long = "dimension", value_parser = parse_key_value)]
    dimensions: Vec<(String, String)>,

    /// Count each extra dimension against the answers alone, without
    /// combining dimensions. By default every pass crosses all candidates
    /// accumulated so far.
    #[arg(long)]
    per_dimension: bool,

    /// Treat the first CSV record as data; fields are then column indexes.
    #[arg(long)]
    no_header: bool,
}

#[derive(Debug, Args)]
struct QueryArgs {
    #[arg(long)]
    db: PathBuf,

    #[arg(long)]
    metric: String,

    /// Require a dimension value, as `KEY=VALUE`. Repeatable.
    #[arg(long = "equals", value_parser = parse_key_value)]
    equals: Vec<(String, String)>,

    /// Require a dimension key to be unset. Repeatable.
    #[arg(long = "absent")]
    absent: Vec<String>,

    /// Group the matches by their value for this key.
    #[arg(long)]
    group_by: Option<String>,
}

fn parse_key_value(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got `{raw}`")),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn write_json(out: &mut dyn Write, value: &impl Serialize) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value).context("serialize json")?;
    writeln!(out)?;
    Ok(())
}

fn import(args: &ImportArgs, out: &mut dyn Write) -> Result<()> {
    let json = fs::read_to_string(&args.input)
        .with_context(|| format!("read metric document {}", args.input.display()))?;
    let metric = Metric::from_json_str(&json)
        .with_context(|| format!("parse metric document {}", args.input.display()))?;

    let store = Store::open_path(&args.db).with_context(|| format!("open {}", args.db.display()))?;
    store
        .add_metric_json(&metric)
        .with_context(|| format!("import metric {}", metric.id))?;

    writeln!(
        out,
        "imported metric {} ({} observations)",
        metric.id,
        metric.observations.len()
    )?;
    Ok(())
}

fn export(args: &ExportArgs, out: &mut dyn Write) -> Result<()> {
    let store = Store::open_path(&args.db).with_context(|| format!("open {}", args.db.display()))?;
    match &args.metric {
        Some(id) => write_json(out, &store.get_metric(id)?.to_json()?),
        None => write_json(out, &store.export_json()?),
    }
}

fn aggregation_spec(args: &AggregateArgs) -> Result<AggregationSpec> {
    if let Some(path) = &args.spec {
        let json = fs::read_to_string(path)
            .with_context(|| format!("read aggregation job {}", path.display()))?;
        return serde_json::from_str(&json)
            .with_context(|| format!("parse aggregation job {}", path.display()));
    }

    let (Some(field), Some(answer_dimension)) = (&args.field, &args.answer_dimension) else {
        bail!("--field and --answer-dimension are required without --spec");
    };

    let has_header = !args.no_header;
    let mut spec = AggregationSpec::new(rows::parse_field(field, has_header)?, answer_dimension.as_str());
    for (field, name) in &args.dimensions {
        spec = spec.dimension(rows::parse_field(field, has_header)?, name.as_str());
    }
    if args.per_dimension {
        spec = spec.expansion(Expansion::PerDimension);
    }
    Ok(spec)
}

fn metric_for_aggregation(store: &Store, args: &AggregateArgs) -> Result<StoredMetric> {
    match store.get_metric(&args.metric) {
        Ok(metric) => Ok(metric),
        Err(StoreError::MetricNotFound(_)) => {
            debug!("creating metric {}", args.metric);
            let title = args.title.as_deref().unwrap_or(&args.metric);
            let description = args.description.as_deref().unwrap_or_default();
            Ok(store.add_metric(&args.metric, title, description)?)
        }
        Err(err) => Err(err.into()),
    }
}

fn aggregate(args: &AggregateArgs, out: &mut dyn Write) -> Result<()> {
    let spec = aggregation_spec(args)?;

    let input = File::open(&args.input).with_context(|| format!("open {}", args.input.display()))?;
    let rows = rows::read_rows(BufReader::new(input), !args.no_header)
        .with_context(|| format!("read rows from {}", args.input.display()))?;

    let store = Store::open_path(&args.db).with_context(|| format!("open {}", args.db.display()))?;
    let mut metric = metric_for_aggregation(&store, args)?;
    let stored = metric
        .add_aggregate_observations(&rows, &spec)
        .with_context(|| format!("aggregate into metric {}", args.metric))?;

    writeln!(
        out,
        "stored {stored} observations in metric {} from {} rows",
        args.metric,
        rows.len()
    )?;
    Ok(())
}

fn query(args: &QueryArgs, out: &mut dyn Write) -> Result<()> {
    let store = Store::open_path(&args.db).with_context(|| format!("open {}", args.db.display()))?;
    let metric = store.get_metric(&args.metric)?;

    let mut query = metric.observations();
    for (key, value) in &args.equals {
        query = query.filter_by_dimension(key, value);
    }
    for key in &args.absent {
        query = query.filter_by_dimension_not_set(key);
    }

    match &args.group_by {
        Some(key) => write_json(out, &query.fetch_by_dimension(key)?),
        None => write_json(out, &query.fetch()?),
    }
}

fn run(cli: &Cli, out: &mut dyn Write) -> Result<()> {
    match &cli.command {
        Command::Import(args) => import(args, out),
        Command::Export(args) => export(args, out),
        Command::Aggregate(args) => aggregate(args, out),
        Command::Query(args) => query(args, out),
    }
}

fn is_broken_pipe(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .is_some_and(|e| e.kind() == io::ErrorKind::BrokenPipe)
            || cause
                .downcast_ref::<serde_json::Error>()
                .and_then(|e| e.io_error_kind())
                .is_some_and(|kind| kind == io::ErrorKind::BrokenPipe)
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match run(&cli, &mut out).and_then(|()| out.flush().map_err(Into::into)) {
        Err(err) if is_broken_pipe(&err) => Ok(()),
        result => result,
    }
}
