use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::ledger::Sheet;

/// Local snapshot of the ledger grid, persisted as JSON. Stands in for the
/// remote sheet transport, which stays outside this engine; same cell
/// semantics, including blanks.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SheetSnapshot {
    #[serde(default)]
    pub grid: Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stamp: Option<String>,
}

#[derive(Debug, Default)]
pub struct JsonSheet {
    path: Option<PathBuf>,
    snapshot: SheetSnapshot,
}

impl JsonSheet {
    /// In-memory sheet; nothing is persisted. Used by tests and dry runs.
    pub fn in_memory(grid: Vec<Vec<String>>) -> Self {
        Self {
            path: None,
            snapshot: SheetSnapshot { grid, stamp: None },
        }
    }

    /// Opens an existing snapshot, or starts an empty sheet with a header row
    /// when the file does not exist yet.
    pub fn open(path: &Path, headers: &[String]) -> anyhow::Result<Self> {
        let snapshot = if path.exists() {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading ledger snapshot {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing ledger snapshot {}", path.display()))?
        } else {
            SheetSnapshot {
                grid: vec![headers.to_vec()],
                stamp: None,
            }
        };
        Ok(Self {
            path: Some(path.to_path_buf()),
            snapshot,
        })
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let text = serde_json::to_string_pretty(&self.snapshot)
            .context("serializing ledger snapshot")?;
        std::fs::write(path, text)
            .with_context(|| format!("writing ledger snapshot {}", path.display()))?;
        Ok(())
    }

    pub fn snapshot(&self) -> &SheetSnapshot {
        &self.snapshot
    }

    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.snapshot
            .grid
            .get(row)
            .and_then(|r| r.get(col))
            .map(|s| s.as_str())
            .unwrap_or("")
    }

    /// Number of data rows, defined by the first blank in the login column.
    fn data_height(&self) -> usize {
        let mut h = 0;
        while !self.cell(h, 0).trim().is_empty() {
            h += 1;
        }
        h
    }

    fn set_cell(&mut self, row: usize, col: usize, value: String) {
        let grid = &mut self.snapshot.grid;
        while grid.len() <= row {
            grid.push(Vec::new());
        }
        let r = &mut grid[row];
        while r.len() <= col {
            r.push(String::new());
        }
        r[col] = value;
    }
}

impl Sheet for JsonSheet {
    fn read_column(&self, col: usize) -> Result<Vec<String>, EngineError> {
        let mut out = Vec::new();
        let mut row = 0;
        loop {
            let v = self.cell(row, col);
            if v.trim().is_empty() {
                break;
            }
            out.push(v.to_string());
            row += 1;
        }
        Ok(out)
    }

    fn read_cells(
        &self,
        col: usize,
        start_row: usize,
        count: usize,
    ) -> Result<Vec<String>, EngineError> {
        Ok((0..count)
            .map(|i| self.cell(start_row + i, col).to_string())
            .collect())
    }

    fn write_range(
        &mut self,
        col: usize,
        start_row: usize,
        values: &[String],
    ) -> Result<(), EngineError> {
        for (i, v) in values.iter().enumerate() {
            self.set_cell(start_row + i, col, v.clone());
        }
        Ok(())
    }

    fn append_rows(&mut self, rows: &[Vec<String>]) -> Result<(), EngineError> {
        let mut at = self.data_height();
        for row in rows {
            for (col, v) in row.iter().enumerate() {
                self.set_cell(at, col, v.clone());
            }
            at += 1;
        }
        Ok(())
    }

    fn write_stamp(&mut self, value: &str) -> Result<(), EngineError> {
        self.snapshot.stamp = Some(value.to_string());
        Ok(())
    }
}
