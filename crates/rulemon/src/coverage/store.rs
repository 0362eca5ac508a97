//! Durable coverage tables.
//!
//! The on-disk form is a comma-separated table:
//!
//! ```text
//! #rulemon-coverage,v1
//! RAIN:enum,NUM_VEHICLES:count,124.0,170.0
//! NONE,3,COVERED,INVALID
//! ```
//!
//! Line one is the format tag. The header names every variable with its
//! column kind, then one column per micro-bin. Rows are written in key order
//! so identical lattices serialize identically.

use super::cell::CellState;
use super::space::{CoverageKey, CoverageSpace};
use super::variable::{ColumnKind, CoverageVariable};
use crate::assertion::RuleId;
use crate::result::{RulemonError, RulemonResult};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Format tag written on the first line
pub const FORMAT_TAG: &str = "#rulemon-coverage";

/// Current format version
pub const FORMAT_VERSION: u32 = 1;

/// Lattice rows keyed by macro case
pub type CoverageRows = BTreeMap<CoverageKey, Vec<CellState>>;

/// Backing storage for a coverage lattice
pub trait CoverageStore: fmt::Debug {
    /// Load previously saved rows; `Ok(None)` when nothing was saved yet
    fn load(&mut self, space: &CoverageSpace, bins: &[RuleId])
        -> RulemonResult<Option<CoverageRows>>;

    /// Replace the stored lattice
    fn save(&mut self, space: &CoverageSpace, bins: &[RuleId], rows: &CoverageRows)
        -> RulemonResult<()>;
}

/// Render a lattice to its table text
#[must_use]
pub fn encode_table(space: &CoverageSpace, bins: &[RuleId], rows: &CoverageRows) -> String {
    let mut out = format!("{FORMAT_TAG},v{FORMAT_VERSION}\n");

    let header: Vec<String> = space
        .variables()
        .map(|v| format!("{}:{}", v.name(), v.kind().tag()))
        .chain(bins.iter().map(ToString::to_string))
        .collect();
    out.push_str(&header.join(","));
    out.push('\n');

    for (key, cells) in rows {
        let line: Vec<String> = key
            .values()
            .iter()
            .map(|value| value.cell())
            .chain(cells.iter().map(|cell| cell.label().to_string()))
            .collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

/// Parse table text against the configured space and bins
pub fn decode_table(
    text: &str,
    space: &CoverageSpace,
    bins: &[RuleId],
) -> RulemonResult<CoverageRows> {
    let mut lines = text.lines().enumerate().map(|(i, line)| (i + 1, line));

    let expected_tag = format!("{FORMAT_TAG},v{FORMAT_VERSION}");
    match lines.next() {
        Some((_, tag)) if tag.trim() == expected_tag => {}
        Some((_, tag)) => {
            return Err(RulemonError::schema(format!(
                "unsupported format tag '{}', expected '{expected_tag}'",
                tag.trim()
            )))
        }
        None => return Err(RulemonError::schema("empty coverage file")),
    }

    let (_, header) = lines
        .next()
        .ok_or_else(|| RulemonError::schema("missing header row"))?;
    check_header(header, space, bins)?;

    let variables: Vec<CoverageVariable> = space.variables().collect();
    let width = variables.len() + bins.len();
    let mut rows = CoverageRows::new();

    for (line_no, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        let cells: Vec<&str> = line.split(',').map(str::trim).collect();
        if cells.len() != width {
            return Err(RulemonError::malformed_row(
                line_no,
                format!("expected {width} columns, got {}", cells.len()),
            ));
        }

        let mut values = Vec::with_capacity(variables.len());
        for (variable, cell) in variables.iter().zip(&cells) {
            let value = variable
                .parse_cell(cell)
                .ok_or_else(|| RulemonError::UnknownLabel {
                    line: line_no,
                    variable: variable.name().to_string(),
                    label: (*cell).to_string(),
                })?;
            values.push(value);
        }
        let key = space
            .key_from_values(values)
            .map_err(|e| RulemonError::malformed_row(line_no, e.to_string()))?;

        let mut states = Vec::with_capacity(bins.len());
        for (bin, cell) in bins.iter().zip(&cells[variables.len()..]) {
            let state = CellState::from_label(cell).ok_or_else(|| RulemonError::UnknownLabel {
                line: line_no,
                variable: bin.to_string(),
                label: (*cell).to_string(),
            })?;
            states.push(state);
        }

        if rows.insert(key, states).is_some() {
            return Err(RulemonError::malformed_row(line_no, "duplicate coverage key"));
        }
    }
    Ok(rows)
}

fn check_header(header: &str, space: &CoverageSpace, bins: &[RuleId]) -> RulemonResult<()> {
    let columns: Vec<&str> = header.split(',').map(str::trim).collect();
    let width = space.len() + bins.len();
    if columns.len() != width {
        return Err(RulemonError::schema(format!(
            "header has {} columns, configuration expects {width}",
            columns.len()
        )));
    }

    for (variable, column) in space.variables().zip(&columns) {
        let (name, tag) = column
            .split_once(':')
            .ok_or_else(|| RulemonError::schema(format!("column '{column}' has no type tag")))?;
        let kind = ColumnKind::from_tag(tag)
            .ok_or_else(|| RulemonError::schema(format!("unknown column type '{tag}'")))?;
        if name != variable.name() || kind != variable.kind() {
            return Err(RulemonError::schema(format!(
                "column '{column}' does not match configured variable {}:{}",
                variable.name(),
                variable.kind().tag()
            )));
        }
    }

    for (bin, column) in bins.iter().zip(&columns[space.len()..]) {
        if *column != bin.to_string() {
            return Err(RulemonError::schema(format!(
                "micro-bin column '{column}' does not match configured rule {bin}"
            )));
        }
    }
    Ok(())
}

/// Write `contents` to a sibling temp file, then rename over `path`
pub(crate) fn write_atomic(path: &Path, contents: &str) -> RulemonResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Coverage table in a file on disk
#[derive(Debug, Clone)]
pub struct CsvCoverageFile {
    path: PathBuf,
}

impl CsvCoverageFile {
    /// Create a store backed by `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CoverageStore for CsvCoverageFile {
    fn load(
        &mut self,
        space: &CoverageSpace,
        bins: &[RuleId],
    ) -> RulemonResult<Option<CoverageRows>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path)?;
        decode_table(&text, space, bins).map(Some)
    }

    fn save(
        &mut self,
        space: &CoverageSpace,
        bins: &[RuleId],
        rows: &CoverageRows,
    ) -> RulemonResult<()> {
        write_atomic(&self.path, &encode_table(space, bins, rows))
    }
}

/// In-memory store holding the encoded table text
#[derive(Debug, Clone, Default)]
pub struct MemoryCoverageStore {
    text: Option<String>,
    saves: usize,
}

impl MemoryCoverageStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with table text
    #[must_use]
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            saves: 0,
        }
    }

    /// Last saved table text
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Number of saves so far
    #[must_use]
    pub const fn saves(&self) -> usize {
        self.saves
    }
}

impl CoverageStore for MemoryCoverageStore {
    fn load(
        &mut self,
        space: &CoverageSpace,
        bins: &[RuleId],
    ) -> RulemonResult<Option<CoverageRows>> {
        self.text
            .as_deref()
            .map(|text| decode_table(text, space, bins))
            .transpose()
    }

    fn save(
        &mut self,
        space: &CoverageSpace,
        bins: &[RuleId],
        rows: &CoverageRows,
    ) -> RulemonResult<()> {
        self.text = Some(encode_table(space, bins, rows));
        self.saves += 1;
        Ok(())
    }
}
