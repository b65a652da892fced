//! Record extraction from the rendered report table.
//!
//! The report is rendered inside an embedded frame. Its table shape depends on
//! the block selection: a specific block yields a table headed "Block Name",
//! "All Blocks" yields the district summary headed "District Name". In both
//! cases the data row is the row directly after the header row.
//!
//! How that row maps to output fields is a [`RowExtractor`] strategy, so the
//! positional contract can be swapped without touching retry or concurrency.

use crate::config::HarvestConfig;
use crate::error::{RetryError, SessionResult};
use crate::portal;
use crate::records::{RecordFields, WorkItem};
use crate::session::{HeaderedRow, RemoteSession};
use std::sync::Arc;
use tracing::warn;

/// Maps a header row and its data row to the three output fields.
pub trait RowExtractor: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, row: &HeaderedRow) -> RecordFields;
}

/// Takes the cells at offsets 2, 3 and 4 of the data row.
///
/// Assumes a stable column order. Rows with fewer than five cells yield empty
/// fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionalExtractor;

impl RowExtractor for PositionalExtractor {
    fn name(&self) -> &'static str {
        "positional"
    }

    fn extract(&self, row: &HeaderedRow) -> RecordFields {
        match row.cells.get(2..5) {
            Some([total_works, road_length, sanction_cost]) => RecordFields::new(
                total_works.as_str(),
                road_length.as_str(),
                sanction_cost.as_str(),
            ),
            _ => RecordFields::empty(),
        }
    }
}

pub const TOTAL_WORKS_COLUMN: &str = "Total No. Of Works";
pub const ROAD_LENGTH_COLUMN: &str = "Road Length";
pub const SANCTION_COST_COLUMN: &str = "Sanction Cost";

/// Looks each field up by its column title in the header row.
///
/// Titles match case-insensitively, either exactly or as a prefix of the
/// header cell (the portal appends units such as "(Km)"). Missing columns
/// yield empty fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderNameExtractor;

impl HeaderNameExtractor {
    fn column(row: &HeaderedRow, title: &str) -> String {
        let title = title.to_lowercase();
        row.header
            .iter()
            .position(|h| h.trim().to_lowercase().starts_with(&title))
            .and_then(|idx| row.cells.get(idx))
            .cloned()
            .unwrap_or_default()
    }
}

impl RowExtractor for HeaderNameExtractor {
    fn name(&self) -> &'static str {
        "header-name"
    }

    fn extract(&self, row: &HeaderedRow) -> RecordFields {
        RecordFields::new(
            Self::column(row, TOTAL_WORKS_COLUMN),
            Self::column(row, ROAD_LENGTH_COLUMN),
            Self::column(row, SANCTION_COST_COLUMN),
        )
    }
}

/// Extraction strategy selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ExtractorKind {
    #[default]
    Positional,
    HeaderName,
}

impl ExtractorKind {
    pub fn build(self) -> Arc<dyn RowExtractor> {
        match self {
            ExtractorKind::Positional => Arc::new(PositionalExtractor),
            ExtractorKind::HeaderName => Arc::new(HeaderNameExtractor),
        }
    }
}

/// Show the report for the current selections and extract its data row.
///
/// Never fails: once `config.extraction_retry` is exhausted the result is
/// three empty fields. Selections are not re-applied between attempts.
pub async fn fetch_record(
    session: &mut dyn RemoteSession,
    item: &WorkItem,
    extractor: &dyn RowExtractor,
    config: &HarvestConfig,
) -> RecordFields {
    try_fetch_record(session, item, extractor, config)
        .await
        .unwrap_or_else(|err| {
            warn!("Error fetching data for {item} - {err}");
            RecordFields::empty()
        })
}

/// Like [`fetch_record`], but hands the final error to the caller.
pub async fn try_fetch_record(
    session: &mut dyn RemoteSession,
    item: &WorkItem,
    extractor: &dyn RowExtractor,
    config: &HarvestConfig,
) -> Result<RecordFields, RetryError> {
    let header_label = portal::header_label_for(&item.block);
    let mut retry = config.extraction_retry.begin("Data fetching");
    loop {
        match fetch_once(session, header_label, config).await {
            Ok(row) => return Ok(extractor.extract(&row)),
            Err(e) => retry.failed(e).await?,
        }
    }
}

async fn fetch_once(
    session: &mut dyn RemoteSession,
    header_label: &str,
    config: &HarvestConfig,
) -> SessionResult<HeaderedRow> {
    let timeout = config.standard_timeout();
    session
        .click_when_clickable(&portal::locator(portal::VIEW_BUTTON), timeout)
        .await?;
    session.wait_until_page_ready(timeout).await?;

    // The frame must be left on every path, or the next item's lookups would
    // resolve inside the stale report document.
    let read = read_in_frame(session, header_label, config).await;
    let exited = session.exit_frame().await;
    let row = read?;
    exited?;
    Ok(row)
}

async fn read_in_frame(
    session: &mut dyn RemoteSession,
    header_label: &str,
    config: &HarvestConfig,
) -> SessionResult<HeaderedRow> {
    session
        .enter_frame(
            &portal::locator(portal::REPORT_FRAME),
            config.standard_timeout(),
        )
        .await?;
    session
        .read_row_after_header(header_label, config.table_timeout())
        .await
}
