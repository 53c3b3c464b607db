use serde::{Deserialize, Serialize};

/// One extracted holding: a label (stock, fund, ...) and the amount invested in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub label: String,
    pub amount: f64,
}

impl TableRow {
    pub fn new(label: impl Into<String>, amount: f64) -> Self {
        Self {
            label: label.into(),
            amount,
        }
    }
}

/// Holdings table produced by the extraction normalizer.
///
/// Rows keep the order they had in the model output. Duplicate labels are
/// kept as separate rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioTable {
    rows: Vec<TableRow>,
}

impl PortfolioTable {
    pub fn new(rows: Vec<TableRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sum of all amounts, recomputed from the rows on every call.
    pub fn total_invested(&self) -> f64 {
        self.rows.iter().map(|r| r.amount).sum()
    }
}

/// Result of normalizing a raw model response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Extraction {
    Table { table: PortfolioTable },
    Empty,
}

impl Extraction {
    pub fn table(&self) -> Option<&PortfolioTable> {
        match self {
            Extraction::Table { table } => Some(table),
            Extraction::Empty => None,
        }
    }
}

/// Counters for everything the normalizer skipped or dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeStats {
    pub lines_seen: usize,
    pub blank_or_comment_lines: usize,
    pub separator_lines: usize,
    pub malformed_rows: usize,
    pub invalid_amounts: usize,
    pub header: Option<Vec<String>>,
    pub columns_swapped: bool,
    pub rows_kept: usize,
}

impl NormalizeStats {
    pub fn rows_dropped(&self) -> usize {
        self.malformed_rows + self.invalid_amounts
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Normalized {
    pub outcome: Extraction,
    pub stats: NormalizeStats,
}
