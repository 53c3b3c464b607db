use std::sync::OnceLock;

use csv::{ReaderBuilder, StringRecord, Trim};
use regex::Regex;
use tracing::{debug, info};

use crate::models::{Extraction, NormalizeStats, Normalized, PortfolioTable, TableRow};

/// Header keywords that mark the second column as the amount column.
const AMOUNT_HEADER_KEYWORDS: [&str; 2] = ["amount", "invest"];

const CURRENCY_GLYPHS: [char; 13] = ['$', '€', '£', '¥', '₹', '₩', '₽', '₺', '₫', '₦', '₱', '฿', '¢'];

const GROUP_SEPARATORS: [char; 6] = [',', '_', '\'', ' ', '\u{00A0}', '\u{202F}'];

/// Characters wrapped around cells by the model (quotes, markdown emphasis).
const CELL_WRAPPERS: [char; 4] = ['"', '\'', '*', '`'];

fn currency_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:rs\.?|inr|usd|eur|gbp)\s*|\s*(?:rs\.?|inr|usd|eur|gbp)$").unwrap()
    })
}

/// Matches whitespace between a delimiter and an opening/closing quote, which
/// would otherwise stop the CSV reader from treating the field as quoted.
fn quote_padding_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#",[ \t]+""#).unwrap())
}

fn trailing_quote_padding_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""[ \t]+,"#).unwrap())
}

#[derive(Debug, PartialEq)]
enum LineKind {
    Blank,
    Comment,
    Separator,
    Content,
}

fn classify_line(line: &str) -> LineKind {
    if line.is_empty() {
        return LineKind::Blank;
    }

    if line.starts_with('#') || line.starts_with("//") || line.starts_with("```") || line.starts_with("<!--") {
        return LineKind::Comment;
    }

    let only_rule_chars = line
        .chars()
        .all(|c| matches!(c, '-' | '|' | ':' | '+' | '=' | ' ' | '\t'));
    if only_rule_chars && line.chars().any(|c| c == '-' || c == '=') {
        return LineKind::Separator;
    }

    LineKind::Content
}

/// Replace typographic quotes with their ASCII equivalents.
pub fn normalize_quotes(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' | '\u{00AB}' | '\u{00BB}' => '"',
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' => '\'',
            other => other,
        })
        .collect()
}

/// Split one content line into trimmed fields.
///
/// Markdown rows are split on their pipes so commas inside a cell survive.
/// Everything else goes through the CSV reader so quoted fields may hold commas.
fn split_fields(line: &str) -> Vec<String> {
    if line.contains('|') {
        let inner = line.trim_start_matches('|').trim_end_matches('|');
        return inner.split('|').map(|f| f.trim().to_string()).collect();
    }

    let line = quote_padding_re().replace_all(line, ",\"");
    let line = trailing_quote_padding_re().replace_all(&line, "\",");

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(line.as_bytes());

    let mut record = StringRecord::new();
    match reader.read_record(&mut record) {
        Ok(true) => record.iter().map(|f| f.trim().to_string()).collect(),
        _ => Vec::new(),
    }
}

fn clean_label(raw: &str) -> String {
    raw.trim().trim_matches(&CELL_WRAPPERS[..]).trim().to_string()
}

/// Parse an amount cell, stripping currency markers and digit grouping.
///
/// Returns `None` for anything that is not a finite, non-negative number.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let unwrapped = raw.trim().trim_matches(&CELL_WRAPPERS[..]).trim();
    let without_code = currency_code_re().replace_all(unwrapped, "");

    let cleaned: String = without_code
        .chars()
        .filter(|c| !CURRENCY_GLYPHS.contains(c) && !GROUP_SEPARATORS.contains(c))
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    let value = cleaned.parse::<f64>().ok()?;
    if value.is_finite() && value >= 0.0 {
        Some(value)
    } else {
        None
    }
}

fn mentions_amount(header_field: &str) -> bool {
    let lower = header_field.to_lowercase();
    AMOUNT_HEADER_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Turn a free-text model response into a holdings table.
///
/// Never fails: lines and rows that cannot be used are dropped and counted
/// in the returned stats. When no data row survives the outcome is
/// [`Extraction::Empty`].
pub fn normalize(raw_text: &str) -> Normalized {
    let mut stats = NormalizeStats::default();
    let mut header: Option<Vec<String>> = None;
    let mut pending: Vec<(String, String)> = Vec::new();

    for raw_line in raw_text.lines() {
        stats.lines_seen += 1;
        let line = normalize_quotes(raw_line.trim());

        match classify_line(&line) {
            LineKind::Blank | LineKind::Comment => {
                stats.blank_or_comment_lines += 1;
                continue;
            }
            LineKind::Separator => {
                stats.separator_lines += 1;
                continue;
            }
            LineKind::Content => {}
        }

        let fields = split_fields(&line);
        if fields.len() != 2 || fields.iter().any(|f| f.is_empty()) {
            debug!("Dropping malformed row ({} fields): {}", fields.len(), line);
            stats.malformed_rows += 1;
            continue;
        }

        let mut fields = fields.into_iter();
        let (first, second) = match (fields.next(), fields.next()) {
            (Some(a), Some(b)) => (a, b),
            _ => continue,
        };

        if header.is_none() {
            header = Some(vec![first, second]);
        } else {
            pending.push((first, second));
        }
    }

    let swap = header
        .as_ref()
        .map(|h| !mentions_amount(&h[1]))
        .unwrap_or(false);

    let mut rows = Vec::with_capacity(pending.len());
    for (first, second) in pending {
        let (label_raw, amount_raw) = if swap { (second, first) } else { (first, second) };

        let label = clean_label(&label_raw);
        if label.is_empty() {
            debug!("Dropping row with empty label (amount cell: {})", amount_raw);
            stats.malformed_rows += 1;
            continue;
        }

        match parse_amount(&amount_raw) {
            Some(amount) => rows.push(TableRow { label, amount }),
            None => {
                debug!("Dropping row '{}': unparseable amount '{}'", label, amount_raw);
                stats.invalid_amounts += 1;
            }
        }
    }

    stats.header = header;
    stats.columns_swapped = swap;
    stats.rows_kept = rows.len();

    info!(
        "Normalized model output: {} rows kept, {} dropped, {} separator lines, columns swapped: {}",
        stats.rows_kept,
        stats.rows_dropped(),
        stats.separator_lines,
        stats.columns_swapped
    );

    let outcome = if rows.is_empty() {
        Extraction::Empty
    } else {
        Extraction::Table { table: PortfolioTable::new(rows) }
    };

    Normalized { outcome, stats }
}
