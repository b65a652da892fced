// Copyright 2026 OMMS Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Work partitioning and the concurrent partition executor.
//!
//! The work list is split into contiguous chunks, one per worker. Each worker
//! runs as its own tokio task and owns a dedicated session for its whole
//! lifetime, so no session state is ever shared or locked. Results are merged
//! in the order workers finish.

use crate::config::{HarvestConfig, NavigationFailurePolicy};
use crate::extraction::{try_fetch_record, PositionalExtractor, RowExtractor};
use crate::navigation::navigate_to_report;
use crate::progress::{HarvestEventKind, ProgressEmitter};
use crate::records::{RecordFields, ResultRecord, WorkItem};
use crate::selection::{select_cascade, SelectionState};
use crate::session::{RemoteSession, SessionFactory};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::ops::Range;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Split `len` items into at most `session_count` contiguous ranges.
///
/// The chunk size is the ceiling of `len / session_count`, so only the last
/// range can be shorter. A count of zero is treated as one.
pub fn partition_ranges(len: usize, session_count: usize) -> Vec<Range<usize>> {
    if len == 0 {
        return Vec::new();
    }
    let chunk = len.div_ceil(session_count.max(1));
    (0..len)
        .step_by(chunk)
        .map(|start| start..(start + chunk).min(len))
        .collect()
}

/// Borrowing view of [`partition_ranges`].
pub fn partition<T>(items: &[T], session_count: usize) -> Vec<&[T]> {
    partition_ranges(items.len(), session_count)
        .into_iter()
        .map(|r| &items[r])
        .collect()
}

/// How a partition ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionOutcome {
    /// Every item produced a record.
    Completed,
    /// The session never reached the report page.
    NavigationFailed,
    /// No session could be launched.
    SessionUnavailable,
    /// The worker panicked while processing its items.
    WorkerPanicked,
}

impl PartitionOutcome {
    pub fn is_lost(self) -> bool {
        !matches!(self, PartitionOutcome::Completed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PartitionSummary {
    pub index: usize,
    /// Positions of the partition's items in the input list.
    pub range: Range<usize>,
    pub outcome: PartitionOutcome,
    /// Records contributed to the output.
    pub records: usize,
    /// Contributed records whose extracted fields are all empty.
    pub degraded: usize,
}

/// Everything a harvest run produced.
#[derive(Debug, Clone)]
pub struct HarvestReport {
    /// Records in completion order.
    pub records: Vec<ResultRecord>,
    /// Partition summaries in completion order.
    pub partitions: Vec<PartitionSummary>,
    pub elapsed: Duration,
}

impl HarvestReport {
    pub fn degraded(&self) -> usize {
        self.partitions.iter().map(|p| p.degraded).sum()
    }

    /// Input items that have no record because their partition was lost.
    pub fn lost_items(&self) -> usize {
        self.partitions
            .iter()
            .filter(|p| p.outcome.is_lost())
            .map(|p| p.range.len() - p.records)
            .sum()
    }
}

/// Runs a work list across concurrently executing partitions.
pub struct Harvester {
    factory: Arc<dyn SessionFactory>,
    config: Arc<HarvestConfig>,
    extractor: Arc<dyn RowExtractor>,
    progress: ProgressEmitter,
}

impl Harvester {
    pub fn new(factory: Arc<dyn SessionFactory>, config: HarvestConfig) -> Self {
        Self {
            factory,
            config: Arc::new(config),
            extractor: Arc::new(PositionalExtractor),
            progress: ProgressEmitter::disabled(),
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn RowExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_progress(mut self, progress: ProgressEmitter) -> Self {
        self.progress = progress;
        self
    }

    /// Harvest one record per work item.
    ///
    /// Output order is completion order, not input order. Every item of a
    /// partition whose navigation succeeded has exactly one record; items of
    /// lost partitions are dropped or filled with empty records depending on
    /// `config.navigation_failure`.
    pub async fn run(&self, items: Vec<WorkItem>) -> HarvestReport {
        let started = Instant::now();
        let total = items.len();
        let ranges = partition_ranges(total, self.config.worker_count);
        info!(
            "Harvesting {total} entries across {} partitions",
            ranges.len()
        );

        let mut workers = FuturesUnordered::new();
        for (index, range) in ranges.into_iter().enumerate() {
            let worker = PartitionWorker {
                index,
                offset: range.start,
                total,
                factory: Arc::clone(&self.factory),
                config: Arc::clone(&self.config),
                extractor: Arc::clone(&self.extractor),
                progress: self.progress.clone(),
                finished: AtomicUsize::new(0),
            };
            let handle = tokio::spawn(worker.run(items[range.clone()].to_vec()));
            workers.push(async move { (index, range, handle.await) });
        }

        let mut records = Vec::with_capacity(total);
        let mut partitions = Vec::new();
        while let Some((index, range, joined)) = workers.next().await {
            let mut result = joined.unwrap_or_else(|e| {
                error!("Partition {index} worker failed: {e}");
                PartitionResult::lost(PartitionOutcome::WorkerPanicked)
            });

            if result.outcome.is_lost()
                && self.config.navigation_failure == NavigationFailurePolicy::Placeholder
            {
                result.records = items[range.clone()]
                    .iter()
                    .cloned()
                    .map(ResultRecord::empty)
                    .collect();
                result.degraded = result.records.len();
            }

            partitions.push(PartitionSummary {
                index,
                range,
                outcome: result.outcome,
                records: result.records.len(),
                degraded: result.degraded,
            });
            records.extend(result.records);
        }

        HarvestReport {
            records,
            partitions,
            elapsed: started.elapsed(),
        }
    }
}

struct PartitionResult {
    outcome: PartitionOutcome,
    records: Vec<ResultRecord>,
    degraded: usize,
}

impl PartitionResult {
    fn lost(outcome: PartitionOutcome) -> Self {
        Self {
            outcome,
            records: Vec::new(),
            degraded: 0,
        }
    }
}

/// One partition's worker: owns its session from launch to close.
struct PartitionWorker {
    index: usize,
    /// Input position of the partition's first item.
    offset: usize,
    total: usize,
    factory: Arc<dyn SessionFactory>,
    config: Arc<HarvestConfig>,
    extractor: Arc<dyn RowExtractor>,
    progress: ProgressEmitter,
    /// Items that already produced their record.
    finished: AtomicUsize,
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

impl PartitionWorker {
    async fn run(self, chunk: Vec<WorkItem>) -> PartitionResult {
        let started = Instant::now();
        let items = chunk.len();

        let mut session = match self.factory.open_session().await {
            Ok(session) => session,
            Err(e) => {
                warn!("Partition {}: failed to open session: {e}", self.index);
                self.progress.emit(HarvestEventKind::NavigationFailed {
                    partition: self.index,
                    items,
                });
                return PartitionResult::lost(PartitionOutcome::SessionUnavailable);
            }
        };
        self.progress.emit(HarvestEventKind::PartitionStarted {
            partition: self.index,
            items,
        });

        let processed = AssertUnwindSafe(self.process(session.as_mut(), chunk))
            .catch_unwind()
            .await;

        if let Err(e) = session.close().await {
            warn!("Partition {}: failed to close session: {e}", self.index);
        }

        let result = processed.unwrap_or_else(|panic| {
            let finished = self.finished.load(Ordering::Relaxed);
            error!(
                "Partition {} worker panicked after {finished} of {items} entries: {}",
                self.index,
                panic_message(&*panic)
            );
            self.progress.emit(HarvestEventKind::WorkerPanicked {
                partition: self.index,
                unfinished: items - finished,
            });
            PartitionResult::lost(PartitionOutcome::WorkerPanicked)
        });

        self.progress.emit(HarvestEventKind::PartitionFinished {
            partition: self.index,
            records: result.records.len(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        });
        result
    }

    /// Log and report a failed item; returns the fields it is recorded with.
    fn degrade(&self, message: String) -> RecordFields {
        warn!("{message}");
        self.progress.emit(HarvestEventKind::Warning { message });
        RecordFields::empty()
    }

    async fn process(&self, session: &mut dyn RemoteSession, chunk: Vec<WorkItem>) -> PartitionResult {
        if !navigate_to_report(session, &self.config).await {
            self.progress.emit(HarvestEventKind::NavigationFailed {
                partition: self.index,
                items: chunk.len(),
            });
            return PartitionResult::lost(PartitionOutcome::NavigationFailed);
        }

        let mut state = SelectionState::new();
        let mut records = Vec::with_capacity(chunk.len());
        let mut degraded = 0;

        for (i, item) in chunk.into_iter().enumerate() {
            let position = self.offset + i + 1;
            info!("[{position}/{}] Fetching data for {item}", self.total);
            self.progress.emit(HarvestEventKind::ItemStarted {
                position,
                total: self.total,
                state: item.state.clone(),
                district: item.district.clone(),
                block: item.block.clone(),
            });

            let fields = match select_cascade(session, &mut state, &item, &self.config).await {
                Ok(()) => {
                    try_fetch_record(session, &item, self.extractor.as_ref(), &self.config)
                        .await
                        .unwrap_or_else(|e| {
                            self.degrade(format!("Error fetching data for {item} - {e}"))
                        })
                }
                Err(e) => self.degrade(format!("Skipping {item}: {e}")),
            };

            if fields.is_empty() {
                degraded += 1;
            }
            self.progress.emit(HarvestEventKind::ItemFinished {
                position,
                populated: !fields.is_empty(),
            });
            records.push(ResultRecord::new(item, fields));
            self.finished.fetch_add(1, Ordering::Relaxed);
        }

        PartitionResult {
            outcome: PartitionOutcome::Completed,
            records,
            degraded,
        }
    }
}
