//! llrp-inventory - run one inventory-and-access session against an LLRP reader.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::Parser;
use llrp_inventory as app;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use app::config::{AppConfig, ConfigLoadResult};
use app::session::{self, OUTCOME_SUCCESS, Scenario};

/// Inventory tags and run an access operation on an Impinj LLRP reader.
#[derive(Parser)]
#[command(name = "llrp-inventory", version)]
struct Cli {
    /// Reader host name or address
    host: Option<String>,

    /// Access password (decimal or 0x-prefixed hex)
    #[arg(short = 'p', long, value_parser = parse_u32)]
    password: Option<u32>,

    /// New access password for scenario 1
    #[arg(short = 'n', long, value_parser = parse_u32)]
    new_password: Option<u32>,

    /// Backscatter the serialized TID with every report
    #[arg(short = 't', long)]
    tid: bool,

    /// Reduce read range when switching to the private profile
    #[arg(short = 's', long)]
    short_range: bool,

    /// Access scenario 0-11
    #[arg(short = 'q', long, value_parser = clap::value_parser!(u8).range(0..=11))]
    scenario: Option<u8>,

    /// Verbose output (repeat for message dumps)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Seconds to collect reports
    #[arg(long)]
    duration: Option<u64>,

    /// Request reports every N seconds instead of streaming
    #[arg(long)]
    poll: Option<u64>,

    /// Config file (default: user config directory)
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    /// Command line values override the config file.
    fn apply(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            config.reader.host = host.clone();
        }
        if let Some(password) = self.password {
            config.operation.password = password;
        }
        if let Some(new_password) = self.new_password {
            config.operation.new_password = new_password;
        }
        if self.tid {
            config.operation.backscatter_tid = true;
        }
        if self.short_range {
            config.operation.short_range = true;
        }
        if let Some(scenario) = self.scenario {
            config.operation.scenario = scenario;
        }
        if self.verbose > 0 {
            config.session.verbosity = self.verbose.min(2);
        }
        if let Some(duration) = self.duration {
            config.monitor.duration_secs = duration;
        }
        if self.poll.is_some() {
            config.monitor.poll_interval_secs = self.poll;
        }
    }
}

fn parse_u32(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("'{s}' is not a 32-bit number: {e}"))
}

fn load_config(explicit: Option<&Path>) -> anyhow::Result<AppConfig> {
    let path = explicit.map_or_else(AppConfig::default_path, Path::to_path_buf);
    match AppConfig::try_load(&path) {
        ConfigLoadResult::Loaded(config) => Ok(config),
        ConfigLoadResult::Missing if explicit.is_some() => bail!("config file {} not found", path.display()),
        ConfigLoadResult::Missing => Ok(AppConfig::default()),
        ConfigLoadResult::Invalid(e) => Err(e).with_context(|| format!("invalid config {}", path.display())),
    }
}

/// Diagnostics go to stderr, and to a daily file when a log directory is
/// configured. Stdout carries only report lines.
fn init_logging(config: &AppConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let level = match config.session.verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).boxed();

    let (file_layer, guard) = match &config.logging.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir).with_context(|| format!("cannot create log directory {}", dir.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "llrp-inventory.log"));
            let layer = fmt::layer().with_ansi(false).with_writer(writer).boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;
    Ok(guard)
}

fn try_main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    cli.apply(&mut config);

    let _guard = init_logging(&config)?;

    let scenario = Scenario::from_number(config.operation.scenario);
    tracing::info!(
        "llrp-inventory {} reader {} scenario {} ({})",
        env!("CARGO_PKG_VERSION"),
        config.reader.host,
        scenario.number(),
        scenario.description()
    );

    let outcome = session::run(&config);
    if outcome == OUTCOME_SUCCESS {
        Ok(ExitCode::SUCCESS)
    } else {
        tracing::error!("Session failed with outcome {outcome}");
        Ok(ExitCode::from(2))
    }
}

fn main() -> ExitCode {
    match try_main() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}
