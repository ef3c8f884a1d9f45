use anyhow::{Context, Result};
use common::config::Configuration;
use reconciler::{MongoStore, Reconciler};

/// Run the read-only detection phase and dump the report.
pub async fn scan(config: &Configuration) -> Result<()> {
    let store = connect(config).await?;
    let reconciler = Reconciler::new(&store);

    let report = reconciler.scan().await.context("Scan failed")?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.is_clean() {
        log::info!("No duplicated chunk groups found");
    } else {
        log::warn!(
            "{} duplicated chunk group(s) across {} file(s); run 'reconcile' to purge them",
            report.duplicates.len(),
            report.file_ids().len()
        );
    }
    Ok(())
}

/// Run the full procedure: scan, cascade delete, index rebuild.
pub async fn reconcile(config: &Configuration) -> Result<()> {
    let store = connect(config).await?;
    let reconciler = Reconciler::new(&store);

    let report = reconciler.scan().await.context("Scan failed")?;

    // Audit dump goes out before anything destructive happens.
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.is_clean() {
        log::info!("No duplicated chunk groups; ensuring the unique index is in place");
    }

    let outcome = reconciler
        .apply(report)
        .await
        .context("Reconcile failed; the store may be partially cleaned, re-run to resume")?;

    println!("{}", serde_json::to_string_pretty(&outcome.deleted)?);
    println!("Unique chunk index: {}", outcome.index_name);
    Ok(())
}

async fn connect(config: &Configuration) -> Result<MongoStore> {
    MongoStore::connect(&config.database)
        .await
        .context("Failed to connect to the upload store")
}
