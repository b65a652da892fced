//! `omms-harvest taxonomy` — enumerate districts and blocks into a work list.

use crate::config::HarvestConfig;
use crate::session::chromium::ChromiumSessionFactory;
use crate::session::SessionFactory;
use crate::table_io;
use crate::taxonomy;
use anyhow::{Context, Result};
use tracing::warn;

/// Run the taxonomy command.
pub async fn run(config: HarvestConfig) -> Result<()> {
    config.validate()?;

    let factory = ChromiumSessionFactory::discover(
        config.chromium_path.as_deref(),
        config.headless,
        config.standard_timeout(),
    )
    .context("cannot start browser session")?;
    let mut session = factory.open_session().await?;

    let result = taxonomy::enumerate(session.as_mut(), &config.states, &config).await;
    if let Err(e) = session.close().await {
        warn!("failed to close session: {e}");
    }
    let entries = result?;

    table_io::write_work_items(&config.taxonomy_path, &entries)?;
    println!(
        "Recorded {} blocks across {} states to {}",
        entries.len(),
        config.states.len(),
        config.taxonomy_path.display()
    );
    Ok(())
}
