use anyhow::Result;
use clap::Parser;
use proxyip_validator::{
    engine::EngineConfig,
    output::{self, OutputPaths},
    proxy::{CheckerConfig, OwnIpResolver, ProxyChecker, ProxyParser},
    tui::{ProgressMode, ProgressRenderer},
    Config, Orchestrator,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::Level;

/// Validate TLS relay proxies against the Cloudflare metadata endpoint
#[derive(Parser)]
#[command(name = "proxyip-validator", version)]
#[command(about = "Validate TLS relay proxies with sharded, bounded-concurrency probes")]
struct Cli {
    /// Candidate list: `host:port` / `host,port` lines or a JSON array
    #[arg(default_value = "raw.txt")]
    input: PathBuf,

    /// Number of execution units (defaults to the number of cores)
    #[arg(short = 'u', long)]
    units: Option<usize>,

    /// Concurrent probes per execution unit
    #[arg(short = 'n', long, default_value_t = 50)]
    concurrency: usize,

    /// Probe timeout in milliseconds
    #[arg(long = "timeout-ms", default_value_t = 5000)]
    timeout_ms: u64,

    /// Batched report interval in milliseconds
    #[arg(long = "report-ms", default_value_t = 500)]
    report_ms: u64,

    /// Own-address lookup timeout in seconds
    #[arg(long = "lookup-timeout", default_value_t = 10)]
    lookup_timeout: u64,

    /// Use this own address instead of looking it up
    #[arg(long = "own-ip")]
    own_ip: Option<String>,

    /// JSON output file
    #[arg(long, default_value = "proxyip.json")]
    json: PathBuf,

    /// Flat text output file
    #[arg(long, default_value = "proxyip.txt")]
    txt: PathBuf,

    /// Flat CSV output file
    #[arg(long, default_value = "proxyip.csv")]
    csv: PathBuf,

    /// Directory for per-country files
    #[arg(long = "country-dir", default_value = "active_proxies")]
    country_dir: PathBuf,

    /// Progress display
    #[arg(long, value_enum, default_value_t = ProgressMode::Auto)]
    progress: ProgressMode,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn log_level(&self) -> Level {
        if self.quiet {
            return Level::ERROR;
        }
        match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }

    fn config(&self) -> Config {
        let progress = self.progress.resolve();
        let mut engine = EngineConfig::new()
            .with_concurrency(self.concurrency)
            .with_report_interval(Duration::from_millis(self.report_ms))
            .with_progress_interval(progress.refresh_interval());
        if let Some(units) = self.units {
            engine = engine.with_units(units);
        }

        Config::new()
            .with_input(self.input.clone())
            .with_engine(engine)
            .with_checker(
                CheckerConfig::new().with_timeout(Duration::from_millis(self.timeout_ms)),
            )
            .with_lookup_timeout(Duration::from_secs(self.lookup_timeout))
            .with_output(OutputPaths {
                json: self.json.clone(),
                txt: self.txt.clone(),
                csv: self.csv.clone(),
                country_dir: self.country_dir.clone(),
            })
            .with_progress(progress)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = cli.config();
    let renderer = ProgressRenderer::new(config.progress);

    let candidates = match ProxyParser::parse_file(&config.input) {
        Ok(candidates) => candidates,
        Err(e) => {
            eprintln!("[ERROR] {}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    let own_ip = match cli.own_ip.clone() {
        Some(ip) => ip,
        None => {
            let resolver = OwnIpResolver::with_timeout(config.lookup_timeout);
            OwnIpResolver::resolve_or_sentinel(resolver).await
        }
    };

    renderer.banner(
        &own_ip,
        candidates.len(),
        config.engine.unit_count(),
        config.engine.concurrency,
    );

    let checker = ProxyChecker::with_config(config.checker.clone())?;
    let orchestrator = Orchestrator::new(Arc::new(checker), config.engine.clone());

    let (progress_tx, progress_rx) = watch::channel(Default::default());
    let display = tokio::spawn(renderer.follow(progress_rx));

    let outcome = orchestrator
        .run(candidates, &own_ip, Some(progress_tx))
        .await?;
    let _ = display.await;

    let summary_renderer = ProgressRenderer::new(config.progress);
    summary_renderer.summary(&outcome.stats, outcome.elapsed);

    match output::write_all(outcome.verified.as_slice(), &config.output) {
        Ok(written) => {
            tracing::info!(
                records = written.records,
                country_files = written.country_files,
                "results written"
            );
            if written.records > 0 && config.progress != ProgressMode::Off {
                println!(
                    "{} country files written to {}",
                    written.country_files,
                    config.output.country_dir.display()
                );
            }
        }
        Err(e) => {
            eprintln!("[ERROR] failed to save results: {:#}", e);
        }
    }

    Ok(ExitCode::SUCCESS)
}
