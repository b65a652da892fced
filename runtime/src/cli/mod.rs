//! CLI subcommand implementations for the omms-harvest binary.

pub mod doctor;
pub mod harvest_cmd;
pub mod progress_bar;
pub mod taxonomy_cmd;
