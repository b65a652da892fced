//! CSV reading and writing for work lists, taxonomy caches and results.

use crate::records::{ResultRecord, WorkItem};
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::io::{Read, Write};
use std::path::Path;

pub const WORK_ITEM_HEADER: [&str; 3] = ["State", "District", "Block"];

pub const RESULT_HEADER: [&str; 6] = [
    "State",
    "District",
    "Block",
    "Total No. Of Works",
    "Road Length",
    "Sanction Cost",
];

/// Read a work list. The header must be exactly `State,District,Block`.
pub fn read_work_items(path: &Path) -> Result<Vec<WorkItem>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open work list {}", path.display()))?;
    read_work_items_from(file).with_context(|| format!("invalid work list {}", path.display()))
}

pub fn read_work_items_from<R: Read>(reader: R) -> Result<Vec<WorkItem>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let headers = rdr.headers()?.clone();
    let found: Vec<&str> = headers.iter().collect();
    if found != WORK_ITEM_HEADER {
        bail!(
            "expected header {:?}, found {:?}",
            WORK_ITEM_HEADER.join(","),
            found.join(",")
        );
    }

    let mut items = Vec::new();
    for (line, row) in rdr.deserialize::<WorkItem>().enumerate() {
        let item = row.with_context(|| format!("bad row {}", line + 2))?;
        items.push(item);
    }
    Ok(items)
}

/// Write a work list (or taxonomy cache), always including the header.
pub fn write_work_items(path: &Path, items: &[WorkItem]) -> Result<()> {
    write_rows(path, &WORK_ITEM_HEADER, items)
}

/// Write harvested records, always including the header.
pub fn write_records(path: &Path, records: &[ResultRecord]) -> Result<()> {
    write_rows(path, &RESULT_HEADER, records)
}

fn write_rows<T: Serialize>(path: &Path, header: &[&str], rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    write_rows_to(file, header, rows).with_context(|| format!("failed to write {}", path.display()))
}

fn write_rows_to<W: Write, T: Serialize>(writer: W, header: &[&str], rows: &[T]) -> Result<()> {
    // Header is written by hand so that empty outputs still carry it.
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    wtr.write_record(header)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}
