// Copyright 2026 OMMS Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Concurrent harvester for the OMMS road-wise progress report.
//!
//! The pipeline partitions a work list of state/district/block queries across
//! independent browser sessions, drives each session through the report's
//! dropdown cascade and extracts one record per query from the rendered table.

pub mod cli;
pub mod config;
pub mod error;
pub mod extraction;
pub mod navigation;
pub mod pool;
pub mod portal;
pub mod progress;
pub mod records;
pub mod retry;
pub mod selection;
pub mod session;
pub mod table_io;
pub mod taxonomy;

pub use config::{HarvestConfig, NavigationFailurePolicy};
pub use error::{RetryError, SessionError, SessionResult};
pub use pool::{partition, partition_ranges, HarvestReport, Harvester};
pub use records::{BlockTaxonomyEntry, RecordFields, ResultRecord, WorkItem};
