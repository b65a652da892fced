//! Enumerate every state/district/block combination reachable on the portal.
//!
//! This is a one-time offline step whose output seeds the harvest work list.
//! It runs on a single session with no retries, navigation included: the
//! first failure aborts the walk and is returned to the caller.

use crate::config::HarvestConfig;
use crate::error::SessionResult;
use crate::navigation::navigate_once;
use crate::portal;
use crate::records::BlockTaxonomyEntry;
use crate::selection::Field;
use crate::session::{RemoteSession, SelectOption};
use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{debug, info};

/// Walk districts and blocks for each of `states`.
pub async fn enumerate(
    session: &mut dyn RemoteSession,
    states: &[String],
    config: &HarvestConfig,
) -> Result<Vec<BlockTaxonomyEntry>> {
    navigate_once(session, config)
        .await
        .context("could not reach the road wise progress page")?;

    let mut entries = Vec::new();
    for state in states {
        let before = entries.len();
        enumerate_state(session, state, config, &mut entries)
            .await
            .with_context(|| format!("failed to enumerate {state}"))?;
        info!("{state}: recorded {} blocks", entries.len() - before);
    }
    Ok(entries)
}

async fn enumerate_state(
    session: &mut dyn RemoteSession,
    state: &str,
    config: &HarvestConfig,
    entries: &mut Vec<BlockTaxonomyEntry>,
) -> SessionResult<()> {
    let timeout = config.standard_timeout();
    let settle = config.taxonomy_settle();

    for (field, label) in [
        (Field::State, state),
        (Field::Year, config.year_label.as_str()),
        (Field::Scheme, config.scheme_label.as_str()),
    ] {
        let locator = field.locator();
        session.wait_until_visible(&locator, timeout).await?;
        session.select_option_by_label(&locator, label).await?;
    }
    sleep(settle).await;

    let district_list = Field::District.locator();
    session.wait_until_visible(&district_list, timeout).await?;
    let districts = session.read_options(&district_list).await?;

    let block_list = Field::Block.locator();
    for district in districts.iter().filter(|o| o.value != portal::SENTINEL_VALUE) {
        debug!("Selecting district: {}", district.label);
        session
            .select_option_by_value(&district_list, &district.value)
            .await?;
        sleep(settle).await;

        session.wait_until_visible(&block_list, timeout).await?;
        let blocks = session.read_options(&block_list).await?;
        for block in blocks_to_record(&blocks) {
            debug!("Recording block: {} for district {}", block.label, district.label);
            entries.push(BlockTaxonomyEntry::new(state, &district.label, &block.label));
        }
    }
    Ok(())
}

/// The block options that become taxonomy entries.
///
/// A district with no subdivision lists only the sentinel; that sentinel is
/// then the district's single block. Otherwise sentinels are skipped.
pub fn blocks_to_record(options: &[SelectOption]) -> Vec<&SelectOption> {
    match options {
        [only] if only.value == portal::SENTINEL_VALUE => vec![only],
        _ => options
            .iter()
            .filter(|o| o.value != portal::SENTINEL_VALUE)
            .collect(),
    }
}

async fn sleep(d: Duration) {
    if !d.is_zero() {
        tokio::time::sleep(d).await;
    }
}
