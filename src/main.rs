//! Renewable annotator entry point: CLI wiring, startup checks, and the
//! replay and score loops on one current-thread runtime.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::process;
use std::rc::Rc;

use anyhow::{Context, bail};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use renewable_annotator::cluster::{InMemoryCluster, LogPublisher, ResourceDirectory};
use renewable_annotator::config::AnnotatorConfig;
use renewable_annotator::devices::SourceKind;
use renewable_annotator::error::Error;
use renewable_annotator::io::export::CsvPublisher;
use renewable_annotator::sim::clock::SystemClock;
use renewable_annotator::sim::consumption::SyntheticUsage;
use renewable_annotator::sim::replay::{Replay, ReplaySettings, feed_for};
use renewable_annotator::sim::score::ScoreMonitor;
use renewable_annotator::sim::series::prepare_series;

/// In-memory cluster size when no resources are configured.
const DEFAULT_RESOURCES: usize = 4;

/// Parsed CLI arguments.
#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    config_path: Option<PathBuf>,
    preset: Option<String>,
    annotations_out: Option<PathBuf>,
    resources: Option<usize>,
    help: bool,
}

fn print_help() {
    eprintln!("renewable-annotator - publish renewable-energy annotations onto cluster resources");
    eprintln!();
    eprintln!("Usage: renewable-annotator [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <path>           Load configuration from a TOML file");
    eprintln!(
        "  --preset <name>           Use a built-in preset ({})",
        AnnotatorConfig::PRESETS.join(", ")
    );
    eprintln!("  --annotations-out <path>  Also write every published annotation to CSV");
    eprintln!("  --resources <n>           In-memory cluster size (default: {DEFAULT_RESOURCES})");
    eprintln!("  --help                    Show this help message");
    eprintln!();
    eprintln!("If neither --config nor --preset is given, the baseline preset is used.");
    eprintln!("Ctrl-C stops the replay at the next opportunity.");
}

fn parse_args(args: &[String]) -> Result<CliArgs, String> {
    let mut cli = CliArgs::default();
    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        let mut value = || {
            i += 1;
            args.get(i)
                .cloned()
                .ok_or_else(|| format!("{flag} requires an argument"))
        };
        match flag {
            "--help" | "-h" => cli.help = true,
            "--config" => cli.config_path = Some(PathBuf::from(value()?)),
            "--preset" => cli.preset = Some(value()?),
            "--annotations-out" => cli.annotations_out = Some(PathBuf::from(value()?)),
            "--resources" => {
                let raw = value()?;
                let n = raw
                    .parse::<usize>()
                    .map_err(|_| format!("--resources value \"{raw}\" is not a valid count"))?;
                cli.resources = Some(n);
            }
            other => return Err(format!("unknown argument \"{other}\"")),
        }
        i += 1;
    }
    if cli.config_path.is_some() && cli.preset.is_some() {
        return Err("--config and --preset are mutually exclusive".to_string());
    }
    Ok(cli)
}

fn load_config(cli: &CliArgs) -> anyhow::Result<AnnotatorConfig> {
    let config = match (&cli.config_path, &cli.preset) {
        (Some(path), _) => AnnotatorConfig::from_toml_file(path),
        (None, Some(name)) => AnnotatorConfig::from_preset(name),
        (None, None) => Ok(AnnotatorConfig::baseline()),
    }
    .map_err(|e| Error::Config(vec![e]))?;

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        return Err(Error::Config(errors).into());
    }
    Ok(config)
}

fn build_cluster(config: &AnnotatorConfig, default_size: usize) -> InMemoryCluster {
    if config.replay.resources.is_empty() {
        return InMemoryCluster::with_nodes(default_size);
    }
    let mut cluster = InMemoryCluster::new();
    for id in &config.replay.resources {
        cluster.add_resource(id.as_str(), [("role", "node")]);
    }
    cluster
}

fn open_sink(path: Option<&Path>) -> anyhow::Result<Option<CsvPublisher<std::io::BufWriter<std::fs::File>>>> {
    path.map(|p| {
        CsvPublisher::create(p).with_context(|| format!("cannot create annotation CSV {}", p.display()))
    })
    .transpose()
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = match parse_args(&args) {
        Ok(cli) => cli,
        Err(msg) => {
            eprintln!("error: {msg}");
            print_help();
            process::exit(1);
        }
    };
    if cli.help {
        print_help();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,renewable_annotator=debug")),
        )
        .init();

    let config = load_config(&cli)?;
    let cluster = Rc::new(RefCell::new(build_cluster(
        &config,
        cli.resources.unwrap_or(DEFAULT_RESOURCES),
    )));
    let filter = config.replay.resource_filter.clone();

    let resources = cluster
        .list_resources(filter.as_deref())
        .map_err(Error::from)
        .context("listing cluster resources")?;
    if resources.is_empty() {
        bail!(Error::NoResources);
    }

    let rows = prepare_series(&config)?;

    let equipment = config.replay.equipment.strategy();
    let assignments = equipment.assign(&resources);
    for entry in assignments.iter() {
        info!(resource = %entry.resource_id, equipment = %entry.kind, "equipment assigned");
    }
    info!(
        policy = equipment.name(),
        mixed = assignments.count(SourceKind::Mixed),
        solar = assignments.count(SourceKind::Solar),
        wind = assignments.count(SourceKind::Wind),
        "equipment map ready"
    );

    let sink = open_sink(cli.annotations_out.as_deref())?;
    let publisher = (Rc::clone(&cluster), (LogPublisher, sink));
    let mut replay = Replay::new(
        ReplaySettings::from_config(&config),
        assignments,
        publisher,
        SystemClock,
    );
    if config.replay.consumption {
        replay = replay.with_consumption(Box::new(SyntheticUsage::new(
            resources.clone(),
            config.pipeline.seed,
        )));
    }
    let mut monitor = ScoreMonitor::new(
        &config.scoring,
        Rc::clone(&cluster),
        Some(Rc::clone(&cluster)),
        SystemClock,
        filter,
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    let mut feed = feed_for(config.replay.feed, rows);

    let replay_task = async {
        let summary = replay.run(feed.as_mut(), stop_rx.clone()).await;
        let _ = stop_tx.send(true);
        summary
    };
    let monitor_task = monitor.run(stop_rx.clone());
    let mut ctrl_rx = stop_rx.clone();
    let ctrl_c_task = async {
        tokio::select! {
            res = tokio::signal::ctrl_c() => match res {
                Ok(()) => {
                    info!("stop signal received");
                    let _ = stop_tx.send(true);
                }
                Err(e) => warn!(error = %e, "cannot listen for ctrl-c"),
            },
            _ = ctrl_rx.wait_for(|stopped| *stopped) => {}
        }
    };

    let (summary, cycles, ()) = tokio::join!(replay_task, monitor_task, ctrl_c_task);

    let (_, (_, sink)) = replay.into_publisher();
    if let Some(sink) = sink {
        sink.into_inner().context("flushing annotation CSV")?;
    }

    println!(
        "ticks={} published={} failures={} stopped={} score_cycles={}",
        summary.ticks, summary.published, summary.failures, summary.stopped, cycles
    );
    Ok(())
}
