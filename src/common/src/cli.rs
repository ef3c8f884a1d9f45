use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Common CLI arguments shared by every maintenance command
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    #[arg(long, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "ENVELOPE_MAINT__DATABASE__DSN", help = "MongoDB connection string")]
    pub dsn: Option<String>,

    #[arg(long, env = "ENVELOPE_MAINT__DATABASE__DATABASE", help = "Target database name")]
    pub db: Option<String>,

    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, help = "Enable quiet mode (minimal output)")]
    pub quiet: bool,
}

/// Housekeeping subcommands available alongside the maintenance operations
#[derive(Subcommand, Debug, Clone)]
pub enum CommonCommands {
    /// Show effective configuration and exit
    Config {
        #[arg(long, help = "Show configuration in JSON format")]
        json: bool,
    },
    /// Validate configuration and exit
    Validate,
}

/// Utility functions for CLI operations
pub mod utils {
    use super::*;
    use crate::config::Configuration;
    use anyhow::{Context, Result};

    /// Initialize logging based on CLI arguments
    pub fn init_logging(args: &CommonArgs) {
        let level = if args.quiet {
            "warn"
        } else if args.verbose {
            "debug"
        } else {
            "info"
        };

        // SAFETY: Setting RUST_LOG environment variable is safe for logging configuration
        unsafe {
            std::env::set_var("RUST_LOG", level);
        }
        tracing_subscriber::fmt::init();
    }

    /// Load configuration, applying CLI overrides on top of file/env sources
    pub fn load_config(args: &CommonArgs) -> Result<Configuration> {
        let mut config = match &args.config {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Configuration::load_from_path(path).context("Failed to load configuration")?
            }
            None => Configuration::load().context("Failed to load configuration")?,
        };

        if let Some(dsn) = &args.dsn {
            config.database.dsn = dsn.clone();
        }
        if let Some(db) = &args.db {
            config.database.database = db.clone();
        }

        Ok(config)
    }

    /// Display configuration in human-readable or JSON format
    pub fn display_config(config: &Configuration, json: bool) -> Result<()> {
        if json {
            let json = serde_json::to_string_pretty(config)
                .context("Failed to serialize configuration to JSON")?;
            println!("{json}");
        } else {
            println!("Envelope maintenance configuration:");
            println!("===================================");
            println!("Database DSN: {}", config.database.dsn);
            println!("Database name: {}", config.database.database);
        }
        Ok(())
    }

    /// Validate configuration and report any issues
    pub fn validate_config(config: &Configuration) -> Result<()> {
        log::info!("Validating configuration...");

        if config.database.dsn.is_empty() {
            anyhow::bail!("Database DSN cannot be empty");
        }

        if !config.database.dsn.starts_with("mongodb://")
            && !config.database.dsn.starts_with("mongodb+srv://")
        {
            anyhow::bail!(
                "Database DSN must be a mongodb:// or mongodb+srv:// connection string, got: {}",
                config.database.dsn
            );
        }

        if config.database.database.is_empty() {
            anyhow::bail!("Database name cannot be empty");
        }

        log::info!("✅ Configuration validation passed");
        Ok(())
    }

    /// Handle housekeeping commands that don't touch the datastore.
    /// Version reporting is left to clap's `--version` on the binary, so
    /// the output carries the binary's own name and version.
    pub fn handle_common_command(command: &CommonCommands, config: &Configuration) -> Result<()> {
        match command {
            CommonCommands::Config { json } => display_config(config, *json),
            CommonCommands::Validate => validate_config(config),
        }
    }
}
