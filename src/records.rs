use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::scoring::StudentRecord;

pub const RECORD_FILE_EXT: &str = ".json";
pub const DEFAULT_OUTPUT_DIR: &str = "standings";

/// One student's entry in the record file, keyed by login at the top level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problems: Option<BTreeMap<String, f64>>,
    pub total: f64,
}

#[derive(Debug, Clone)]
pub struct RecordOptions {
    pub output_dir: PathBuf,
    /// Whether all-zero records (typically roster backfills) still carry a
    /// per-problem breakdown.
    pub include_zero_breakdown: bool,
}

impl Default for RecordOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            include_zero_breakdown: false,
        }
    }
}

pub fn to_entries(
    records: &BTreeMap<String, StudentRecord>,
    include_zero_breakdown: bool,
) -> BTreeMap<String, RecordEntry> {
    records
        .iter()
        .map(|(login, r)| {
            let has_credit = r.problems.values().any(|v| *v > 0.0);
            let problems = if include_zero_breakdown || has_credit {
                Some(r.problems.clone())
            } else {
                None
            };
            (
                login.clone(),
                RecordEntry {
                    name: r.name.clone(),
                    group: r.group.clone(),
                    problems,
                    total: r.total,
                },
            )
        })
        .collect()
}

/// Writes `<output_dir>/<contest name>.json`, creating the folder if needed.
/// Tab-indented to stay diffable against historical record files.
pub fn write_records(
    contest_name: &str,
    entries: &BTreeMap<String, RecordEntry>,
    opts: &RecordOptions,
) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(&opts.output_dir)
        .with_context(|| format!("creating output dir {}", opts.output_dir.display()))?;
    let path = opts
        .output_dir
        .join(format!("{}{}", contest_name, RECORD_FILE_EXT));

    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut ser = serde_json::Serializer::with_formatter(BufWriter::new(file), formatter);
    entries
        .serialize(&mut ser)
        .with_context(|| format!("writing {}", path.display()))?;

    log::info!("wrote {} record(s) to {}", entries.len(), path.display());
    Ok(path)
}

pub fn read_records(path: &Path) -> anyhow::Result<BTreeMap<String, RecordEntry>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading record file {}", path.display()))?;
    let entries = serde_json::from_str(&text)
        .with_context(|| format!("parsing record file {}", path.display()))?;
    Ok(entries)
}

/// Ledger seeding order: by group (shorter group labels first, then
/// lexicographic), then by display name within the group.
pub fn sorted_for_ledger(
    entries: &BTreeMap<String, RecordEntry>,
) -> Vec<(String, RecordEntry)> {
    let mut out: Vec<(String, RecordEntry)> = entries
        .iter()
        .map(|(login, e)| (login.clone(), e.clone()))
        .collect();
    out.sort_by(|(la, a), (lb, b)| {
        let ga = a.group.clone().unwrap_or_default();
        let gb = b.group.clone().unwrap_or_default();
        (ga.len(), ga, &a.name, la).cmp(&(gb.len(), gb, &b.name, lb))
    });
    out
}
