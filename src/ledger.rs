use std::collections::BTreeMap;
use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};

use crate::error::EngineError;
use crate::records::RecordEntry;

/// Fixed column scheme of the roster sheet. Rows are keyed by login; display
/// name and group are carried as display attributes only, so two students
/// sharing a name can no longer merge into one row.
pub const LOGIN_COL: usize = 0;
pub const NAME_COL: usize = 1;
pub const GROUP_COL: usize = 2;
pub const FIRST_ASSIGNMENT_COL: usize = 3;
/// Row 0 holds headers; student rows start below it.
pub const HEADER_ROWS: usize = 1;

/// Boundary to the persistent ledger. `read_column` stops at the first blank
/// cell: trailing blanks below the data are not data, and that rule defines
/// the effective row count of the key column. Value cells are read with
/// `read_cells` instead, positionally and blanks included — a hole in a score
/// column must not hide the stored values below it.
pub trait Sheet {
    fn read_column(&self, col: usize) -> Result<Vec<String>, EngineError>;
    fn read_cells(
        &self,
        col: usize,
        start_row: usize,
        count: usize,
    ) -> Result<Vec<String>, EngineError>;
    fn write_range(
        &mut self,
        col: usize,
        start_row: usize,
        values: &[String],
    ) -> Result<(), EngineError>;
    /// Appends identity rows directly below the current data rows of the
    /// login column.
    fn append_rows(&mut self, rows: &[Vec<String>]) -> Result<(), EngineError>;
    /// Overwrites the fixed metadata cell holding the last-run stamp.
    fn write_stamp(&mut self, value: &str) -> Result<(), EngineError>;
}

/// One (login, value) pair to merge, with identity cells for rows that may
/// need creating.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerUpdate {
    pub login: String,
    pub name: String,
    pub group: Option<String>,
    pub value: f64,
}

impl LedgerUpdate {
    pub fn from_record(login: &str, entry: &RecordEntry) -> Self {
        Self {
            login: login.to_string(),
            name: entry.name.clone(),
            group: entry.group.clone(),
            value: entry.total,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncOutcome {
    pub merged: usize,
    pub appended: usize,
    /// Logins with no ledger row, skipped because the run was append-only.
    pub skipped: Vec<EngineError>,
}

/// Column index for assignment number `n` (1-based, as the operator counts
/// homework on the sheet).
pub fn assignment_column(number: usize) -> usize {
    FIRST_ASSIGNMENT_COL + number.saturating_sub(1)
}

/// Merge a batch of per-student values into one assignment column.
///
/// Existing rows are located by login (first occurrence wins when a corrupted
/// sheet repeats one; we warn and keep going). Values merge by max, so
/// re-running an earlier, lower-scoring batch never regresses the ledger, and
/// untouched rows keep their cells verbatim. In append-only mode unknown
/// logins are skipped; otherwise a new identity row is appended and its value
/// lands through the same column write.
pub fn sync_assignment(
    sheet: &mut dyn Sheet,
    updates: &[LedgerUpdate],
    value_col: usize,
    append_only: bool,
) -> Result<SyncOutcome, EngineError> {
    let logins = sheet.read_column(LOGIN_COL)?;
    let data_logins: &[String] = logins.get(HEADER_ROWS..).unwrap_or(&[]);
    // The login column alone defines the row count; the value column is read
    // cell by cell so blanks (an unseeded header, a hole for one student)
    // never truncate what is already stored below them.
    let data_existing = sheet.read_cells(value_col, HEADER_ROWS, data_logins.len())?;

    let mut index: HashMap<&str, usize> = HashMap::new();
    for (pos, login) in data_logins.iter().enumerate() {
        if index.contains_key(login.as_str()) {
            log::warn!("duplicate ledger row for login {:?}; keeping the first", login);
            continue;
        }
        index.insert(login.as_str(), pos);
    }

    // Untouched cells are written back verbatim, blanks included.
    let mut column: Vec<String> = data_existing;

    let mut outcome = SyncOutcome::default();
    let mut new_rows: Vec<Vec<String>> = Vec::new();
    let mut new_values: Vec<f64> = Vec::new();

    for update in updates {
        match index.get(update.login.as_str()) {
            Some(&pos) => {
                let current = parse_cell(&column[pos]);
                let merged = current.max(update.value);
                column[pos] = format_value(merged);
                outcome.merged += 1;
            }
            None if append_only => {
                log::warn!(
                    "append-only sync: no ledger row for {:?}, skipping",
                    update.login
                );
                outcome.skipped.push(EngineError::LedgerRowNotFound {
                    login: update.login.clone(),
                });
            }
            None => {
                new_rows.push(vec![
                    update.login.clone(),
                    update.name.clone(),
                    update.group.clone().unwrap_or_default(),
                ]);
                new_values.push(update.value);
                outcome.appended += 1;
            }
        }
    }

    if !new_rows.is_empty() {
        sheet.append_rows(&new_rows)?;
        for v in new_values {
            column.push(format_value(v));
        }
    }

    sheet.write_range(value_col, HEADER_ROWS, &column)?;
    log::info!(
        "ledger sync: merged {}, appended {}, skipped {}",
        outcome.merged,
        outcome.appended,
        outcome.skipped.len()
    );
    Ok(outcome)
}

/// Stamps the run's completion time. Plain overwrite, no merge semantics.
pub fn stamp_run(sheet: &mut dyn Sheet, at: DateTime<FixedOffset>) -> Result<(), EngineError> {
    sheet.write_stamp(&at.format("%Y-%m-%d %H:%M:%S %z").to_string())
}

/// Seeds identity columns for a ledger created from scratch, in the given
/// (already sorted) order. Logins that already have a row are left alone, so
/// re-running a create pass over a populated ledger never duplicates rows.
pub fn seed_identity(
    sheet: &mut dyn Sheet,
    entries: &[(String, RecordEntry)],
) -> Result<(), EngineError> {
    let existing = sheet.read_column(LOGIN_COL)?;
    let present: std::collections::HashSet<&str> = existing
        .get(HEADER_ROWS..)
        .unwrap_or(&[])
        .iter()
        .map(|s| s.as_str())
        .collect();

    let rows: Vec<Vec<String>> = entries
        .iter()
        .filter(|(login, _)| !present.contains(login.as_str()))
        .map(|(login, e)| {
            vec![
                login.clone(),
                e.name.clone(),
                e.group.clone().unwrap_or_default(),
            ]
        })
        .collect();
    if rows.is_empty() {
        return Ok(());
    }
    sheet.append_rows(&rows)
}

fn parse_cell(cell: &str) -> f64 {
    cell.trim().parse::<f64>().unwrap_or(0.0)
}

fn format_value(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

/// Convenience for callers holding a record document: one update per entry,
/// in ledger seeding order.
pub fn updates_from_records(entries: &BTreeMap<String, RecordEntry>) -> Vec<LedgerUpdate> {
    crate::records::sorted_for_ledger(entries)
        .iter()
        .map(|(login, e)| LedgerUpdate::from_record(login, e))
        .collect()
}
