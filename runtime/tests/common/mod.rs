//! Scripted in-memory portal for driving the harvest pipeline without a browser.
//!
//! `FakePortal` models the menu path, the five-level dropdown cascade, the
//! report frame and its result table. Failures can be injected per label or
//! per step, and every session interaction is counted in shared [`PortalStats`].

#![allow(dead_code)]

use async_trait::async_trait;
use omms_harvest::error::{SessionError, SessionResult};
use omms_harvest::portal;
use omms_harvest::session::{HeaderedRow, Locator, RemoteSession, SelectOption, SessionFactory};
use omms_harvest::{RecordFields, WorkItem};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const YEARS: [&str; 2] = ["2008-2009", "2009-2010"];
pub const SCHEMES: [&str; 2] = ["PMGSY1", "PMGSY2"];

// ── Portal Script ──

/// Counters shared by every session of one portal.
#[derive(Debug, Default, Clone)]
pub struct PortalStats {
    pub sessions_opened: usize,
    pub sessions_closed: usize,
    pub page_opens: usize,
    pub select_attempts: HashMap<String, usize>,
    pub view_clicks: usize,
    pub frame_enters: usize,
    pub frame_exits: usize,
    pub table_reads: usize,
    /// Sessions that were closed while still addressing the report frame.
    pub closed_inside_frame: usize,
}

impl PortalStats {
    pub fn select_attempts(&self, label: &str) -> usize {
        self.select_attempts.get(label).copied().unwrap_or(0)
    }
}

#[derive(Debug, Default)]
struct Script {
    /// state -> district -> blocks
    taxonomy: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    figures: HashMap<WorkItem, RecordFields>,
    /// Remaining forced failures for a dropdown label.
    select_failures: HashMap<String, u32>,
    table_failures: u32,
    launch_failures: u32,
    /// Remaining page loads that fail the way a dropped connection does.
    open_failures: u32,
    navigation_broken: bool,
    /// Every report row renders with only this many cells.
    truncate_rows: Option<usize>,
    stats: PortalStats,
}

/// An in-memory portal shared by all sessions it opens.
#[derive(Clone, Default)]
pub struct FakePortal {
    script: Arc<Mutex<Script>>,
}

impl FakePortal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a block (or "All Blocks" for a district without subdivision).
    pub fn with_block(self, state: &str, district: &str, block: &str) -> Self {
        {
            let mut script = self.lock();
            let blocks = script
                .taxonomy
                .entry(state.to_string())
                .or_default()
                .entry(district.to_string())
                .or_default();
            if block != portal::ALL_BLOCKS {
                blocks.push(block.to_string());
            }
        }
        self
    }

    /// Register every item of a work list.
    pub fn with_items(self, items: &[WorkItem]) -> Self {
        items.iter().fold(self, |portal, item| {
            portal.with_block(&item.state, &item.district, &item.block)
        })
    }

    /// Fix the figures rendered for one item instead of the derived ones.
    pub fn with_figures(self, item: &WorkItem, fields: RecordFields) -> Self {
        self.lock().figures.insert(item.clone(), fields);
        self
    }

    /// Make the next `times` selections of `label` fail with a stale element.
    pub fn fail_select(self, label: &str, times: u32) -> Self {
        self.lock().select_failures.insert(label.to_string(), times);
        self
    }

    /// Make the next `times` table reads time out.
    pub fn fail_table(self, times: u32) -> Self {
        self.lock().table_failures = times;
        self
    }

    /// Make the next `times` session launches fail.
    pub fn fail_launch(self, times: u32) -> Self {
        self.lock().launch_failures = times;
        self
    }

    /// Make the next `times` page loads fail.
    pub fn fail_open(self, times: u32) -> Self {
        self.lock().open_failures = times;
        self
    }

    /// The primary menu never appears.
    pub fn break_navigation(self) -> Self {
        self.lock().navigation_broken = true;
        self
    }

    pub fn truncate_rows(self, cells: usize) -> Self {
        self.lock().truncate_rows = Some(cells);
        self
    }

    pub fn stats(&self) -> PortalStats {
        self.lock().stats.clone()
    }

    /// The figures the report shows for `item`.
    pub fn expected(&self, item: &WorkItem) -> RecordFields {
        let script = self.lock();
        figures_for(&script, item)
    }

    pub fn session(&self) -> FakeSession {
        self.lock().stats.sessions_opened += 1;
        FakeSession {
            script: Arc::clone(&self.script),
            page: Page::Blank,
            selected: Default::default(),
            report: None,
            in_frame: false,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }
}

fn figures_for(script: &Script, item: &WorkItem) -> RecordFields {
    script.figures.get(item).cloned().unwrap_or_else(|| {
        RecordFields::new(
            (item.district.len() + item.block.len()).to_string(),
            format!("{}.5", item.block.len() * 3),
            format!("{}00", item.state.len()),
        )
    })
}

#[async_trait]
impl SessionFactory for FakePortal {
    async fn open_session(&self) -> SessionResult<Box<dyn RemoteSession>> {
        {
            let mut script = self.lock();
            if script.launch_failures > 0 {
                script.launch_failures -= 1;
                return Err(SessionError::Launch("no browser".into()));
            }
        }
        Ok(Box::new(self.session()))
    }
}

// ── Session ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Page {
    Blank,
    Home,
    MenuOpen,
    Report,
}

const LISTS: [&str; 5] = [
    portal::STATE_LIST,
    portal::YEAR_LIST,
    portal::SCHEME_LIST,
    portal::DISTRICT_LIST,
    portal::BLOCK_LIST,
];

/// One simulated browser: its page, cascade selections and frame context.
pub struct FakeSession {
    script: Arc<Mutex<Script>>,
    page: Page,
    /// Selected labels, indexed like `LISTS`.
    selected: [Option<String>; 5],
    /// The selection the report frame currently renders.
    report: Option<WorkItem>,
    in_frame: bool,
}

impl FakeSession {
    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    fn list_index(locator: &Locator) -> Option<usize> {
        LISTS.iter().position(|xpath| *xpath == locator.as_str())
    }

    /// Top-level lookups fail while the frame is the addressing context.
    fn require_report_page(&self, locator: &Locator) -> SessionResult<()> {
        if self.in_frame || self.page != Page::Report {
            return Err(SessionError::NotFound(locator.to_string()));
        }
        Ok(())
    }

    fn options(&self, list: usize) -> Vec<SelectOption> {
        let script = self.lock();
        let labels: Vec<String> = match list {
            0 => script.taxonomy.keys().cloned().collect(),
            1 => YEARS.iter().map(|s| s.to_string()).collect(),
            2 => SCHEMES.iter().map(|s| s.to_string()).collect(),
            3 => {
                let mut out = vec!["All Districts".to_string()];
                if let Some(districts) = self.selected[0]
                    .as_ref()
                    .and_then(|s| script.taxonomy.get(s))
                {
                    out.extend(districts.keys().cloned());
                }
                return with_sentinel(out);
            }
            _ => {
                let mut out = vec![portal::ALL_BLOCKS.to_string()];
                if let (Some(state), Some(district)) = (&self.selected[0], &self.selected[3]) {
                    if let Some(blocks) = script.taxonomy.get(state).and_then(|d| d.get(district)) {
                        out.extend(blocks.iter().cloned());
                    }
                }
                return with_sentinel(out);
            }
        };
        labels
            .into_iter()
            .enumerate()
            .map(|(i, label)| SelectOption::new((i + 1).to_string(), label))
            .collect()
    }

    fn apply(&mut self, list: usize, label: String) {
        self.selected[list] = Some(label);
        // The page repopulates dependent lists after a state or district change.
        match list {
            0 => {
                self.selected[3] = None;
                self.selected[4] = None;
            }
            3 => self.selected[4] = None,
            _ => {}
        }
    }
}

/// First label gets the sentinel value, the rest get positional values.
fn with_sentinel(labels: Vec<String>) -> Vec<SelectOption> {
    labels
        .into_iter()
        .enumerate()
        .map(|(i, label)| {
            let value = if i == 0 {
                portal::SENTINEL_VALUE.to_string()
            } else {
                (100 + i).to_string()
            };
            SelectOption::new(value, label)
        })
        .collect()
}

#[async_trait]
impl RemoteSession for FakeSession {
    async fn open(&mut self, url: &str) -> SessionResult<()> {
        let dropped = {
            let mut script = self.lock();
            script.stats.page_opens += 1;
            let dropped = script.open_failures > 0;
            if dropped {
                script.open_failures -= 1;
            }
            dropped
        };
        if dropped {
            self.page = Page::Blank;
            return Err(SessionError::timeout(
                format!("navigation to {url} (net::ERR_CONNECTION_RESET)"),
                Duration::ZERO,
            ));
        }
        self.page = Page::Home;
        self.selected = Default::default();
        self.report = None;
        self.in_frame = false;
        Ok(())
    }

    async fn wait_until_page_ready(&mut self, _timeout: Duration) -> SessionResult<()> {
        if self.page == Page::Blank {
            return Err(SessionError::timeout("document ready", Duration::ZERO));
        }
        Ok(())
    }

    async fn click_when_clickable(&mut self, locator: &Locator, timeout: Duration) -> SessionResult<()> {
        match (locator.as_str(), self.page) {
            (portal::PRIMARY_MENU, Page::Home) if !self.lock().navigation_broken => {
                self.page = Page::MenuOpen;
                Ok(())
            }
            (portal::REPORT_MENU_ENTRY, Page::MenuOpen) => {
                self.page = Page::Report;
                Ok(())
            }
            (portal::VIEW_BUTTON, Page::Report) if !self.in_frame => {
                let [Some(state), Some(_), Some(_), Some(district), Some(block)] = &self.selected
                else {
                    return Err(SessionError::timeout(locator.to_string(), timeout));
                };
                let item = WorkItem::new(state, district, block);
                self.lock().stats.view_clicks += 1;
                self.report = Some(item);
                Ok(())
            }
            _ => Err(SessionError::timeout(locator.to_string(), timeout)),
        }
    }

    async fn wait_until_visible(&mut self, locator: &Locator, _timeout: Duration) -> SessionResult<()> {
        self.require_report_page(locator)?;
        match Self::list_index(locator) {
            Some(_) => Ok(()),
            None => Err(SessionError::NotFound(locator.to_string())),
        }
    }

    async fn select_option_by_label(&mut self, locator: &Locator, label: &str) -> SessionResult<()> {
        {
            let mut script = self.lock();
            *script
                .stats
                .select_attempts
                .entry(label.to_string())
                .or_default() += 1;
            if let Some(remaining) = script.select_failures.get_mut(label) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(SessionError::StaleElement(label.to_string()));
                }
            }
        }
        self.require_report_page(locator)?;
        let list =
            Self::list_index(locator).ok_or_else(|| SessionError::NotFound(locator.to_string()))?;
        if !self.options(list).iter().any(|o| o.label == label) {
            return Err(SessionError::NotFound(format!("option '{label}'")));
        }
        self.apply(list, label.to_string());
        Ok(())
    }

    async fn select_option_by_value(&mut self, locator: &Locator, value: &str) -> SessionResult<()> {
        self.require_report_page(locator)?;
        let list =
            Self::list_index(locator).ok_or_else(|| SessionError::NotFound(locator.to_string()))?;
        let option = self
            .options(list)
            .into_iter()
            .find(|o| o.value == value)
            .ok_or_else(|| SessionError::NotFound(format!("option value '{value}'")))?;
        self.apply(list, option.label);
        Ok(())
    }

    async fn read_options(&mut self, locator: &Locator) -> SessionResult<Vec<SelectOption>> {
        self.require_report_page(locator)?;
        let list =
            Self::list_index(locator).ok_or_else(|| SessionError::NotFound(locator.to_string()))?;
        Ok(self.options(list))
    }

    async fn enter_frame(&mut self, locator: &Locator, timeout: Duration) -> SessionResult<()> {
        if self.in_frame || locator.as_str() != portal::REPORT_FRAME || self.report.is_none() {
            return Err(SessionError::timeout(locator.to_string(), timeout));
        }
        self.lock().stats.frame_enters += 1;
        self.in_frame = true;
        Ok(())
    }

    async fn exit_frame(&mut self) -> SessionResult<()> {
        if self.in_frame {
            self.lock().stats.frame_exits += 1;
        }
        self.in_frame = false;
        Ok(())
    }

    async fn read_row_after_header(
        &mut self,
        header_label: &str,
        timeout: Duration,
    ) -> SessionResult<HeaderedRow> {
        let mut script = self.lock();
        script.stats.table_reads += 1;
        if script.table_failures > 0 {
            script.table_failures -= 1;
            return Err(SessionError::timeout("result table", timeout));
        }
        let item = match (&self.report, self.in_frame) {
            (Some(item), true) => item.clone(),
            _ => return Err(SessionError::NotFound("result table".into())),
        };

        let (label, name) = if item.block == portal::ALL_BLOCKS {
            (portal::DISTRICT_HEADER, item.district.clone())
        } else {
            (portal::BLOCK_HEADER, item.block.clone())
        };
        if label != header_label {
            return Err(SessionError::timeout(
                format!("table headed '{header_label}'"),
                timeout,
            ));
        }

        let fields = figures_for(&script, &item);
        let mut cells = vec![
            "1".to_string(),
            name,
            fields.total_works,
            fields.road_length,
            fields.sanction_cost,
            "0".to_string(),
        ];
        if let Some(n) = script.truncate_rows {
            cells.truncate(n);
        }
        Ok(HeaderedRow {
            header: vec![
                "Sr. No.".to_string(),
                label.to_string(),
                "Total No. Of Works".to_string(),
                "Road Length (Km)".to_string(),
                "Sanction Cost (Rs. Lakhs)".to_string(),
                "Expenditure".to_string(),
            ],
            cells,
        })
    }

    async fn close(self: Box<Self>) -> SessionResult<()> {
        let mut script = self.lock();
        script.stats.sessions_closed += 1;
        if self.in_frame {
            script.stats.closed_inside_frame += 1;
        }
        Ok(())
    }
}

// ── Work Lists ──

pub fn item(state: &str, district: &str, block: &str) -> WorkItem {
    WorkItem::new(state, district, block)
}

/// `n` distinct blocks spread over a few districts of one state.
pub fn work_list(n: usize) -> Vec<WorkItem> {
    (0..n)
        .map(|i| item("Bihar", &format!("District {}", i % 3), &format!("Block {i}")))
        .collect()
}
