//! viewkey: import a Zcash viewing key and list its transactions.
//!
//! `import` runs a background import job and polls it until it finishes.
//! `parse` reads an existing `list-tx` report without touching the network.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use viewkey_core::{AppConfig, BirthdayHeight};
use viewkey_jobs::{ImportReport, ImportRequest, JobManager, JobStatus};
use viewkey_report::{parse_report, to_csv, BirthdayFilter, Transaction};
use zeroize::Zeroizing;

#[derive(Parser)]
#[command(name = "viewkey")]
#[command(about = "Import a Zcash viewing key and list its transactions")]
#[command(version)]
struct Cli {
    /// Wallets directory (overrides config file)
    #[arg(long, global = true, env = "VIEWKEY_WALLETS_DIR")]
    wallets_dir: Option<PathBuf>,

    /// Exports directory (overrides config file)
    #[arg(long, global = true, env = "VIEWKEY_EXPORTS_DIR")]
    exports_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan the chain for a viewing key and print its transactions
    Import {
        /// Unified or Sapling full viewing key
        #[arg(long, env = "VIEWKEY_KEY", hide_env_values = true)]
        key: Zeroizing<String>,

        /// Block height to start scanning from
        #[arg(long)]
        birthday: BirthdayHeight,

        /// Wallet label passed to the scanning tool
        #[arg(long)]
        name: Option<String>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,

        /// Poll interval in milliseconds
        #[arg(long, default_value_t = 1000)]
        poll_ms: u64,
    },

    /// Parse an existing list-tx report
    Parse {
        /// Report file
        file: PathBuf,

        /// Drop transactions mined below this height
        #[arg(long)]
        birthday: Option<BirthdayHeight>,

        /// Print CSV instead of JSON
        #[arg(long)]
        csv: bool,
    },

    /// Show the configuration file path and effective settings
    Config {
        /// Write the configuration file, without environment or command-line overrides
        #[arg(long)]
        save: bool,
    },
}

fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,viewkey=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    let file_config = AppConfig::load().context("failed to load configuration")?;
    let config = effective_config(&file_config, cli.wallets_dir, cli.exports_dir, |name| {
        std::env::var(name).ok()
    })?;

    match cli.command {
        Command::Import {
            key,
            birthday,
            name,
            json,
            poll_ms,
        } => {
            import(
                &config,
                key.as_str(),
                birthday,
                name,
                json,
                Duration::from_millis(poll_ms.max(50)),
            )
            .await
        }
        Command::Parse {
            file,
            birthday,
            csv,
        } => parse(&file, birthday, csv),
        Command::Config { save } => show_config(&config, &file_config, save),
    }
}

/// Layer environment and command-line overrides over the file configuration.
fn effective_config<F>(
    file_config: &AppConfig,
    wallets_dir: Option<PathBuf>,
    exports_dir: Option<PathBuf>,
    lookup: F,
) -> anyhow::Result<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = file_config.clone();
    config.apply_env(lookup);
    if let Some(dir) = wallets_dir {
        config.paths.wallets_dir = dir;
    }
    if let Some(dir) = exports_dir {
        config.paths.exports_dir = dir;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn import(
    config: &AppConfig,
    key: &str,
    birthday: BirthdayHeight,
    name: Option<String>,
    json: bool,
    poll_interval: Duration,
) -> anyhow::Result<()> {
    let request = ImportRequest::from_raw(Some(key), Some(birthday), name.as_deref())?;

    config
        .paths
        .ensure_directories()
        .context("failed to create data directories")?;

    let manager = JobManager::from_config(config);
    let id = manager.create(request)?;
    info!(job_id = %id, "import started");

    let mut last_line = String::new();
    loop {
        let snapshot = manager.poll(&id)?;
        let line = format!("[{:>3}%] {}", snapshot.progress, snapshot.message);
        if line != last_line {
            eprintln!("{line} ({}s)", snapshot.elapsed);
            last_line = line;
        }

        match snapshot.status {
            JobStatus::Done => {
                let report = snapshot
                    .result
                    .context("job finished without a result")?;
                return print_report(&report, json);
            }
            JobStatus::Failed => {
                let reason = snapshot.error.unwrap_or(snapshot.message);
                bail!("{reason}");
            }
            JobStatus::Queued | JobStatus::Running => {
                tokio::time::sleep(poll_interval).await;
            }
        }
    }
}

fn print_report(report: &ImportReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!(
        "Wallet {} ({}) from height {}: {} transaction(s), {} below birthday dropped",
        report.wallet_name,
        report.slug,
        report.birthday,
        report.transactions.len(),
        report.dropped_below_birthday
    );
    for tx in &report.transactions {
        print_transaction(tx);
    }
    Ok(())
}

fn print_transaction(tx: &Transaction) {
    let height = tx
        .mined_height
        .map(|h| h.to_string())
        .or_else(|| tx.mined_height_raw.clone())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{}  {:>9}  {:<20}  {}",
        tx.txid,
        height,
        tx.mined_time.as_deref().unwrap_or("-"),
        tx.amount.as_deref().unwrap_or("-")
    );
    for memo in tx.outputs.iter().filter_map(|o| o.memo.as_deref()) {
        println!("    memo: {memo}");
    }
}

fn parse(file: &Path, birthday: Option<BirthdayHeight>, csv: bool) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    let outcome = BirthdayFilter::new(birthday).apply(parse_report(&text));
    debug!(
        kept = outcome.transactions.len(),
        dropped = outcome.dropped,
        "parsed {}",
        file.display()
    );

    if csv {
        print!("{}", to_csv(&outcome.transactions));
    } else {
        println!("{}", serde_json::to_string_pretty(&outcome.transactions)?);
    }
    Ok(())
}

/// Print the effective settings; `save` writes only what came from the file.
fn show_config(effective: &AppConfig, file_config: &AppConfig, save: bool) -> anyhow::Result<()> {
    let path = AppConfig::config_path()?;
    println!("# {}", path.display());
    println!("{}", toml::to_string_pretty(effective)?);
    if save {
        file_config.save()?;
        eprintln!("Saved configuration to {}", path.display());
    }
    Ok(())
}
