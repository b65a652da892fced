// Copyright 2026 OMMS Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Remote session abstraction for browser-driven harvesting.
//!
//! Defines the `SessionFactory` and `RemoteSession` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide). The harvesting
//! pipeline only ever talks to these traits, so it can be exercised against an
//! in-memory portal in tests.

pub mod chromium;

use crate::error::SessionResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// An XPath expression addressing one element in the current document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator(pub String);

impl Locator {
    pub fn xpath(expr: impl Into<String>) -> Self {
        Self(expr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One `<option>` of a dropdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    /// The option's `value` attribute.
    pub value: String,
    /// The visible label.
    pub label: String,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// A header row and the row rendered directly beneath it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderedRow {
    /// Cell texts of the row carrying the header label.
    pub header: Vec<String>,
    /// Cell texts of the following sibling row.
    pub cells: Vec<String>,
}

/// Launches fresh, independent sessions.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Create a new session backed by its own browser instance.
    async fn open_session(&self) -> SessionResult<Box<dyn RemoteSession>>;
}

/// A single browser instance driven through the report protocol.
///
/// All lookups resolve against the current addressing context: the top-level
/// document, or the embedded frame entered with [`enter_frame`](Self::enter_frame).
#[async_trait]
pub trait RemoteSession: Send {
    /// Start loading a URL.
    async fn open(&mut self, url: &str) -> SessionResult<()>;
    /// Wait until the document reports `readyState == "complete"`.
    async fn wait_until_page_ready(&mut self, timeout: Duration) -> SessionResult<()>;
    /// Wait until the element is visible and enabled, then click it.
    async fn click_when_clickable(&mut self, locator: &Locator, timeout: Duration)
        -> SessionResult<()>;
    /// Wait until the element is present and visible.
    async fn wait_until_visible(&mut self, locator: &Locator, timeout: Duration)
        -> SessionResult<()>;
    /// Select the option whose visible text equals `label`.
    async fn select_option_by_label(&mut self, locator: &Locator, label: &str)
        -> SessionResult<()>;
    /// Select the option whose `value` attribute equals `value`.
    async fn select_option_by_value(&mut self, locator: &Locator, value: &str)
        -> SessionResult<()>;
    /// List all options of a dropdown, in document order.
    async fn read_options(&mut self, locator: &Locator) -> SessionResult<Vec<SelectOption>>;
    /// Switch the addressing context into the frame at `locator`.
    async fn enter_frame(&mut self, locator: &Locator, timeout: Duration) -> SessionResult<()>;
    /// Switch the addressing context back to the top-level document.
    async fn exit_frame(&mut self) -> SessionResult<()>;
    /// Wait for a table containing `header_label`, then read the header row
    /// and the row after it.
    async fn read_row_after_header(
        &mut self,
        header_label: &str,
        timeout: Duration,
    ) -> SessionResult<HeaderedRow>;
    /// Release the browser instance.
    async fn close(self: Box<Self>) -> SessionResult<()>;
}
