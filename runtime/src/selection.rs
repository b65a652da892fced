//! The dependent dropdown cascade: State → Year → Scheme → District → Block.
//!
//! Each dropdown repopulates the ones below it asynchronously, so every
//! selection is followed by a settle delay before the next control is read.
//! [`SelectionState`] mirrors what has been applied on the page and enforces
//! the cascade order.

use crate::config::HarvestConfig;
use crate::error::{RetryError, SessionResult};
use crate::portal;
use crate::records::WorkItem;
use crate::retry::uniform_delay;
use crate::session::{Locator, RemoteSession};
use std::fmt;
use tracing::warn;

/// One dropdown of the cascade, in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    State,
    Year,
    Scheme,
    District,
    Block,
}

impl Field {
    /// All fields, upstream first.
    pub const CASCADE: [Field; 5] = [
        Field::State,
        Field::Year,
        Field::Scheme,
        Field::District,
        Field::Block,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub fn locator(self) -> Locator {
        portal::locator(match self {
            Field::State => portal::STATE_LIST,
            Field::Year => portal::YEAR_LIST,
            Field::Scheme => portal::SCHEME_LIST,
            Field::District => portal::DISTRICT_LIST,
            Field::Block => portal::BLOCK_LIST,
        })
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::State => write!(f, "State"),
            Self::Year => write!(f, "Year"),
            Self::Scheme => write!(f, "Scheme"),
            Self::District => write!(f, "District"),
            Self::Block => write!(f, "Block"),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("cannot select {field} before {missing} is selected")]
    OutOfOrder { field: Field, missing: Field },

    #[error("failed to select '{label}' for {field}: {source}")]
    Failed {
        field: Field,
        label: String,
        #[source]
        source: RetryError,
    },
}

/// The dropdown values currently applied in one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    applied: [Option<String>; 5],
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `field` now shows `label`.
    ///
    /// Every upstream field must already be applied. All downstream fields are
    /// invalidated, since the page repopulates them.
    pub fn apply(&mut self, field: Field, label: &str) -> Result<(), SelectionError> {
        let idx = field.index();
        if let Some(missing) = Field::CASCADE[..idx]
            .iter()
            .find(|f| self.applied[f.index()].is_none())
        {
            return Err(SelectionError::OutOfOrder {
                field,
                missing: *missing,
            });
        }
        self.applied[idx] = Some(label.to_string());
        for slot in &mut self.applied[idx + 1..] {
            *slot = None;
        }
        Ok(())
    }

    /// Forget `field` and everything below it.
    pub fn invalidate_from(&mut self, field: Field) {
        for slot in &mut self.applied[field.index()..] {
            *slot = None;
        }
    }

    pub fn value(&self, field: Field) -> Option<&str> {
        self.applied[field.index()].as_deref()
    }

    /// The first field that still needs a value.
    pub fn next_field(&self) -> Option<Field> {
        Field::CASCADE
            .into_iter()
            .find(|f| self.applied[f.index()].is_none())
    }

    pub fn is_complete(&self) -> bool {
        self.next_field().is_none()
    }
}

/// Select `label` in the dropdown for `field`, then wait for dependents to settle.
///
/// Retried under `config.selection_retry`.
pub async fn select(
    session: &mut dyn RemoteSession,
    field: Field,
    label: &str,
    config: &HarvestConfig,
) -> Result<(), SelectionError> {
    let locator = field.locator();
    let mut retry = config
        .selection_retry
        .begin(format!("Dropdown selection ({field})"));
    loop {
        match select_once(session, &locator, label, config).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                if let Err(source) = retry.failed(e).await {
                    warn!("Failed to select '{label}' from {field} dropdown: {source}");
                    return Err(SelectionError::Failed {
                        field,
                        label: label.to_string(),
                        source,
                    });
                }
            }
        }
    }
}

async fn select_once(
    session: &mut dyn RemoteSession,
    locator: &Locator,
    label: &str,
    config: &HarvestConfig,
) -> SessionResult<()> {
    session
        .wait_until_visible(locator, config.standard_timeout())
        .await?;
    session.select_option_by_label(locator, label).await?;
    let settle = uniform_delay(config.settle_min_ms, config.settle_max_ms);
    if !settle.is_zero() {
        tokio::time::sleep(settle).await;
    }
    Ok(())
}

/// Apply all five selections for `item`, in cascade order.
///
/// Stops at the first field whose retries are exhausted; `state` then reflects
/// only the fields that are known to be applied.
pub async fn select_cascade(
    session: &mut dyn RemoteSession,
    state: &mut SelectionState,
    item: &WorkItem,
    config: &HarvestConfig,
) -> Result<(), SelectionError> {
    let steps = [
        (Field::State, item.state.as_str()),
        (Field::Year, config.year_label.as_str()),
        (Field::Scheme, config.scheme_label.as_str()),
        (Field::District, item.district.as_str()),
        (Field::Block, item.block.as_str()),
    ];

    for (field, label) in steps {
        if let Err(e) = select(session, field, label, config).await {
            state.invalidate_from(field);
            return Err(e);
        }
        state.apply(field, label)?;
    }
    Ok(())
}
