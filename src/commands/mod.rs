pub mod maintenance;

use clap::{Parser, Subcommand};
use common::cli::{CommonArgs, CommonCommands, utils};

/// Envelope store maintenance — purge duplicated upload chunks and restore
/// the unique chunk index
#[derive(Parser)]
#[command(name = "envelope-maintenance", version, about)]
pub struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report duplicated chunk groups and the affected files (read-only)
    Scan,
    /// Delete duplicated chunk groups with their envelopes, then recreate
    /// the unique chunk index
    #[command(long_about = "Delete duplicated chunk groups with their envelopes, then recreate \
the unique chunk index.\n\n\
The cascade runs in a fixed order (read-models, files, events, in-progress \
markers, chunks) without a surrounding transaction: if a step fails, the \
deletions already performed are NOT rolled back. Every step is idempotent, \
so the recovery strategy is to re-run this command. Run it during a \
maintenance window; concurrent writers can reintroduce duplicates and make \
the index build fail.")]
    Reconcile,
    #[command(flatten)]
    Common(CommonCommands),
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        utils::init_logging(&self.common);
        let config = utils::load_config(&self.common)?;

        match self.command {
            Commands::Scan => maintenance::scan(&config).await,
            Commands::Reconcile => maintenance::reconcile(&config).await,
            Commands::Common(ref cmd) => utils::handle_common_command(cmd, &config),
        }
    }
}
