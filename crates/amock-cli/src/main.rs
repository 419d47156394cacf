//! # amock
//!
//! Controller for the accel-mock injection library. `amock mock` stages the
//! shim and an override configuration on a host and registers the library in
//! `/etc/ld.so.preload`, so every process started while the mock is active
//! sees the configured GPU/NPU telemetry instead of the real hardware's.

mod controller;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use amock_config::ConfigStore;
use controller::{Controller, MockConfig};

#[derive(Parser)]
#[command(name = "amock", version, about = "AI accelerator telemetry mock controller")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stage the injection library and keep the mock active until interrupted
    Mock {
        /// Mock configuration file to stage
        #[arg(short, long)]
        config: PathBuf,
        /// Directory the library and configuration are staged into
        #[arg(short = 'd', long, default_value = "/opt/gpu_mock")]
        gpu_mock_dir: PathBuf,
        /// Injection library to stage
        #[arg(short, long, default_value = "libamock_shim.so")]
        library: PathBuf,
        /// Loader preload file the library is registered in
        #[arg(long, default_value = "/etc/ld.so.preload")]
        preload_file: PathBuf,
    },
    /// Parse a configuration file and report the overrides it defines
    Check {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print the version
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match Cli::parse().command {
        Commands::Mock {
            config,
            gpu_mock_dir,
            library,
            preload_file,
        } => {
            let config = config
                .canonicalize()
                .with_context(|| format!("failed to resolve {}", config.display()))?;
            let mut controller = Controller::new(MockConfig {
                config_path: config,
                mock_dir: gpu_mock_dir,
                library_path: library,
                preload_file,
            });
            controller.start()?;
            info!("mock active; press Ctrl-C to tear down");
            tokio::signal::ctrl_c()
                .await
                .context("failed to wait for interrupt")?;
            controller.stop()?;
        }
        Commands::Check { config } => {
            let store = ConfigStore::open(&config)?;
            print!("{}", summarize(&store));
        }
        Commands::Version => {
            println!("amock {}", env!("CARGO_PKG_VERSION"));
        }
    }
    Ok(())
}

/// Human-readable account of the override tree: per subsystem, the global
/// scalars and the per-device field names.
fn summarize(store: &ConfigStore) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    let Some(table) = store.table() else {
        return out;
    };
    for (subsystem, node) in table {
        let Some(entries) = node.as_table() else {
            continue;
        };
        let _ = writeln!(out, "[{subsystem}]");
        for (key, value) in entries {
            match value.as_table() {
                Some(device) => {
                    let fields: Vec<&str> = device.keys().map(String::as_str).collect();
                    let _ = writeln!(out, "  device {key}: {}", fields.join(", "));
                }
                None => {
                    let _ = writeln!(out, "  {key} = {value}");
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_lists_globals_and_device_fields() {
        let store = ConfigStore::from_toml_str(
            "[gpus]\ncard_count = 4\n\n[gpus.2]\ndram_ue = 7\nuuid = \"GPU-0\"\n",
        )
        .unwrap();
        let summary = summarize(&store);
        assert!(summary.contains("[gpus]"));
        assert!(summary.contains("card_count = 4"));
        assert!(summary.contains("device 2: dram_ue, uuid"));
    }

    #[test]
    fn nested_device_tables_keep_per_device_grouping() {
        let store = ConfigStore::from_toml_str(
            "[ascend_npus]\ncard_count = 2\n\n[ascend_npus.1.0]\nfault_codes = [1]\n",
        )
        .unwrap();
        let summary = summarize(&store);
        assert!(summary.contains("[ascend_npus]"));
        assert!(summary.contains("device 1: 0"));
    }
}
