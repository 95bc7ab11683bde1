use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vantage::geo::{detect_vpn_proxy, VpnAssessment};
use vantage::routes::{
    analyze_path_performance, detect_suspicious_paths, filter_trackable_paths,
    group_similar_paths, PathGroup, PerformanceRecorder, PerformanceSample, SuspiciousReport,
};
use vantage::{Config, Enricher, RequestMetadata};

#[derive(Parser)]
#[command(name = "vantage")]
#[command(about = "Request enrichment: client IP trust, geo resolution and route analytics", long_about = None)]
struct Cli {
    /// Configuration file (TOML, JSON or YAML); VANTAGE_* variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enrich JSON lines of request metadata into JSON lines of records
    Enrich {
        /// Input file, stdin when omitted
        input: Option<PathBuf>,
        /// Print a performance report for timed requests to stderr at the end
        #[arg(long)]
        perf: bool,
    },
    /// Filter, group and scan a list of paths, one per line
    Routes {
        /// Input file, stdin when omitted
        input: Option<PathBuf>,
    },
    /// Summarize `<path> <duration_ms>` lines per route pattern
    Perf {
        /// Input file, stdin when omitted
        input: Option<PathBuf>,
    },
    /// Check addresses against the VPN/hosting heuristics
    Vpn {
        #[arg(required = true)]
        ips: Vec<IpAddr>,
    },
}

#[derive(Serialize)]
struct RoutesReport {
    total_paths: usize,
    trackable: Vec<String>,
    groups: Vec<PathGroup>,
    suspicious: SuspiciousReport,
}

#[derive(Serialize)]
struct VpnLine {
    ip: IpAddr,
    #[serde(flatten)]
    assessment: VpnAssessment,
}

fn open_input(path: Option<&Path>) -> Result<Box<dyn BufRead>> {
    match path {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open input file {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

/// Non-empty, trimmed input lines with their 1-based line numbers
fn read_lines(path: Option<&Path>) -> Result<Vec<(usize, String)>> {
    let mut lines = Vec::new();
    for (idx, line) in open_input(path)?.lines().enumerate() {
        let line = line.context("Failed to read input")?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            lines.push((idx + 1, trimmed.to_string()));
        }
    }
    Ok(lines)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

fn run_enrich(config: &Config, input: Option<&Path>, perf: bool) -> Result<()> {
    let mut enricher = Enricher::from_config(config)?;
    if perf {
        let recorder = PerformanceRecorder::with_reservoir_capacity(
            config.routes.compile()?.performance,
            config.routes.reservoir_capacity,
        );
        enricher = enricher.with_recorder(Arc::new(recorder));
    }

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut enriched = 0usize;

    for (line_no, line) in read_lines(input)? {
        let metadata: RequestMetadata = match serde_json::from_str(&line) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(line = line_no, error = %e, "skipping malformed request metadata");
                continue;
            }
        };

        let record = enricher.enrich(&metadata);
        serde_json::to_writer(&mut out, &record)?;
        out.write_all(b"\n")?;
        enriched += 1;
    }
    out.flush()?;
    info!("Enriched {} requests", enriched);

    if let Some(recorder) = enricher.recorder() {
        let report = serde_json::to_string_pretty(&recorder.report())?;
        eprintln!("{report}");
    }
    Ok(())
}

fn run_routes(config: &Config, input: Option<&Path>) -> Result<()> {
    let options = config.routes.compile()?;
    let paths: Vec<String> = read_lines(input)?.into_iter().map(|(_, line)| line).collect();

    let trackable = filter_trackable_paths(&paths, &options.filter);
    let groups = group_similar_paths(&trackable, &options.grouping);
    let suspicious = detect_suspicious_paths(&paths, &options.suspicious);

    print_json(&RoutesReport {
        total_paths: paths.len(),
        trackable,
        groups,
        suspicious,
    })
}

fn parse_sample(line: &str) -> Option<PerformanceSample> {
    let (path, duration) = line.rsplit_once(char::is_whitespace)?;
    let duration_ms = duration.trim().parse().ok()?;
    Some(PerformanceSample::new(path.trim(), duration_ms))
}

fn run_perf(config: &Config, input: Option<&Path>) -> Result<()> {
    let options = config.routes.compile()?;

    let mut samples = Vec::new();
    for (line_no, line) in read_lines(input)? {
        match parse_sample(&line) {
            Some(sample) => samples.push(sample),
            None => warn!(line = line_no, "expected '<path> <duration_ms>', skipping"),
        }
    }

    print_json(&analyze_path_performance(&samples, &options.performance))
}

fn run_vpn(ips: &[IpAddr]) -> Result<()> {
    for &ip in ips {
        let line = serde_json::to_string(&VpnLine {
            ip,
            assessment: detect_vpn_proxy(ip),
        })?;
        println!("{line}");
    }
    Ok(())
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Enrich { input, perf } => run_enrich(&config, input.as_deref(), perf),
        Commands::Routes { input } => run_routes(&config, input.as_deref()),
        Commands::Perf { input } => run_perf(&config, input.as_deref()),
        Commands::Vpn { ips } => run_vpn(&ips),
    }
}
