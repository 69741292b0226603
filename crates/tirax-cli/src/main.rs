//! 🚀 tirax-cli: hand it two tapes, get back one transcript per ATM.
//!
//! ```text
//! tirax pull-tira/sbmdebst10_auth_tira_die031725.rpt pull-tira/sbmdebst10_auth_tira_ncr031725.rpt
//! ```
//!
//! 📦 Thin wrapper: parse args, set up logging, load config, run, print the table.
//! The positional paths win over whatever `tirax.toml` says about report files.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tirax::common::Vendor;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// 🏧 Split ATM journal tapes into per-terminal transcripts and store them.
#[derive(Debug, Parser)]
#[command(name = "tirax", version, about)]
struct Cli {
    /// Diebold journal tape
    #[arg(value_name = "DIEBOLD_REPORT")]
    diebold_report: Option<PathBuf>,

    /// NCR journal tape
    #[arg(value_name = "NCR_REPORT")]
    ncr_report: Option<PathBuf>,

    /// Config file; skipped quietly if it does not exist
    #[arg(long, short, env = "TIRAX_CONFIG", default_value = "tirax.toml")]
    config: PathBuf,

    /// Don't draw progress bars
    #[arg(long)]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // 📡 RUST_LOG=tirax=debug if you want to watch every run get filed
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config_file = cli.config.as_path();
    let config_file_if_it_exists = match config_file.try_exists().context(format!(
        "💀 Could not check whether the config file exists. Was looking here: '{}'",
        config_file.display()
    ))? {
        true => Some(config_file),
        false => None,
    };

    let mut app_config = tirax::app_config::load_config(config_file_if_it_exists)
        .context("💀 In tirax-cli, main, we couldn't load the configuration. A sink is required, either in the file or via TIRAX_SINK_CONFIG__*")?;

    for (vendor, path) in [
        (Vendor::Diebold, cli.diebold_report),
        (Vendor::Ncr, cli.ncr_report),
    ] {
        if let Some(path) = path {
            app_config.override_report_file(vendor, path.to_string_lossy().into_owned());
        }
    }
    if cli.no_progress {
        app_config.runtime.show_progress = false;
    }

    let summary = match tirax::run(app_config).await {
        Ok(summary) => summary,
        Err(err) => {
            error!("💀 error: {}", err);
            for cause in err.chain().skip(1) {
                error!("⚠️  cause: {}", cause);
            }
            std::process::exit(1);
        }
    };

    println!("{}", summary.render_table());

    if summary.has_failures() {
        for failure in summary.failures() {
            error!("💀 {} report: {}", failure.vendor, failure.kind);
            // -- 🧅 the whole onion, one layer per line
            for cause in failure.error.chain() {
                error!("⚠️  cause: {}", cause);
            }
        }
        std::process::exit(1);
    }

    Ok(())
}
