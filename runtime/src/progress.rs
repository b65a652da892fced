// Copyright 2026 OMMS Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Progress event types and broadcast channel for harvest telemetry.
//!
//! Workers emit `HarvestEvent`s while processing their partitions. Events flow
//! through a `tokio::sync::broadcast` channel to every subscriber (the CLI
//! progress bar, tests). When no subscriber exists, events are silently dropped.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A progress event emitted during a harvest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestEvent {
    /// Monotonically increasing sequence number, shared across workers.
    pub seq: u64,
    /// The kind of progress event.
    pub kind: HarvestEventKind,
}

/// The specific kind of progress event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HarvestEventKind {
    /// A worker acquired its session and is about to navigate.
    PartitionStarted { partition: usize, items: usize },
    /// A worker could not reach the report page; its items were not fetched.
    NavigationFailed { partition: usize, items: usize },
    /// A work item is about to be fetched. `position` is 1-based over the whole run.
    ItemStarted {
        position: usize,
        total: usize,
        state: String,
        district: String,
        block: String,
    },
    /// A work item produced its record.
    ItemFinished { position: usize, populated: bool },
    /// A worker finished its partition.
    PartitionFinished {
        partition: usize,
        records: usize,
        elapsed_ms: u64,
    },
    /// A worker panicked; `unfinished` items of its partition have no record.
    WorkerPanicked { partition: usize, unfinished: usize },
    /// An item was recorded with empty fields, or another non-fatal problem occurred.
    Warning { message: String },
}

/// Sender handle for emitting progress events.
pub type ProgressSender = tokio::sync::broadcast::Sender<HarvestEvent>;

/// Receiver handle for consuming progress events.
pub type ProgressReceiver = tokio::sync::broadcast::Receiver<HarvestEvent>;

/// Create a new progress broadcast channel with a bounded buffer.
///
/// Each item produces two events; slow subscribers see `Lagged` rather than
/// blocking workers.
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    tokio::sync::broadcast::channel(1024)
}

/// Cloneable emitter handed to every worker.
#[derive(Debug, Clone, Default)]
pub struct ProgressEmitter {
    tx: Option<ProgressSender>,
    seq: Arc<AtomicU64>,
}

impl ProgressEmitter {
    pub fn new(tx: Option<ProgressSender>) -> Self {
        Self {
            tx,
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// An emitter that drops everything.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Emit an event, silently ignoring send errors (which occur when no
    /// receivers are listening).
    pub fn emit(&self, kind: HarvestEventKind) {
        if let Some(ref sender) = self.tx {
            let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
            let _ = sender.send(HarvestEvent { seq, kind });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = HarvestEvent {
            seq: 1,
            kind: HarvestEventKind::ItemStarted {
                position: 3,
                total: 10,
                state: "Bihar".to_string(),
                district: "Patna".to_string(),
                block: "All Blocks".to_string(),
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("ItemStarted"));
        assert!(json.contains("Patna"));

        let parsed: HarvestEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.seq, 1);
        assert_eq!(parsed.kind, event.kind);
    }

    #[test]
    fn test_sequence_shared_across_clones() {
        let (tx, mut rx) = channel();
        let a = ProgressEmitter::new(Some(tx));
        let b = a.clone();
        a.emit(HarvestEventKind::Warning { message: "a".into() });
        b.emit(HarvestEventKind::Warning { message: "b".into() });

        assert_eq!(rx.try_recv().unwrap().seq, 1);
        assert_eq!(rx.try_recv().unwrap().seq, 2);
    }

    #[test]
    fn test_channel_no_receivers() {
        let (tx, rx) = channel();
        drop(rx);
        // Should not panic
        ProgressEmitter::new(Some(tx)).emit(HarvestEventKind::Warning {
            message: "test".to_string(),
        });
    }

    #[test]
    fn test_disabled_emitter() {
        ProgressEmitter::disabled().emit(HarvestEventKind::Warning {
            message: "test".to_string(),
        });
    }
}
