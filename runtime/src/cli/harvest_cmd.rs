//! `omms-harvest harvest` — fetch one record per work item.

use crate::cli::progress_bar;
use crate::config::HarvestConfig;
use crate::extraction::ExtractorKind;
use crate::pool::Harvester;
use crate::progress::{self, ProgressEmitter};
use crate::session::chromium::ChromiumSessionFactory;
use crate::table_io;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Run the harvest command.
pub async fn run(
    config: HarvestConfig,
    extractor: ExtractorKind,
    show_progress: bool,
    json: bool,
) -> Result<()> {
    config.validate()?;

    let items = table_io::read_work_items(&config.input_path)?;
    let total = items.len();
    info!("Loaded {total} entries from {}", config.input_path.display());

    let factory = ChromiumSessionFactory::discover(
        config.chromium_path.as_deref(),
        config.headless,
        config.standard_timeout(),
    )
    .context("cannot start browser sessions")?;

    let (tx, rx) = progress::channel();
    let bar = if show_progress {
        Some(tokio::spawn(progress_bar::drive(rx, total as u64)))
    } else {
        drop(rx);
        None
    };

    let output_path = config.output_path.clone();
    let harvester = Harvester::new(Arc::new(factory), config)
        .with_extractor(extractor.build())
        .with_progress(ProgressEmitter::new(Some(tx)));
    let report = harvester.run(items).await;
    // Dropping the harvester closes the channel and lets the bar finish.
    drop(harvester);
    if let Some(bar) = bar {
        let _ = bar.await;
    }

    table_io::write_records(&output_path, &report.records)?;

    let secs = report.elapsed.as_secs_f64();
    if json {
        let summary = serde_json::json!({
            "output": output_path.display().to_string(),
            "total": total,
            "records": report.records.len(),
            "degraded": report.degraded(),
            "lost": report.lost_items(),
            "elapsed_secs": secs,
            "partitions": report.partitions,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Data saved to {}", output_path.display());
        println!("Total entries processed: {total}");
        println!(
            "Records written: {} ({} without data, {} lost to navigation failures)",
            report.records.len(),
            report.degraded(),
            report.lost_items()
        );
        println!("Total execution time: {secs:.2} seconds");
        println!("Total execution time: {:.2} minutes", secs / 60.0);
    }

    Ok(())
}
