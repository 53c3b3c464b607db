use proptest::prelude::*;

use riskfolio_backend::models::{AnalysisOutcome, Extraction, PortfolioTable, TableRow};
use riskfolio_backend::services::concentration_service::analyze;
use riskfolio_backend::services::extraction_service::normalize;

fn label() -> impl Strategy<Value = String> {
    "[A-Z][A-Za-z]{0,11}( [A-Z][a-z]{1,8})?"
}

fn group_indian(value: u64) -> String {
    let digits = value.to_string();
    if digits.len() <= 3 {
        return digits;
    }
    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups = Vec::new();
    let mut rest = head;
    while rest.len() > 2 {
        let (a, b) = rest.split_at(rest.len() - 2);
        groups.push(b.to_string());
        rest = a;
    }
    groups.push(rest.to_string());
    groups.reverse();
    format!("{},{}", groups.join(","), tail)
}

/// Text built from the characters the row splitter and amount cleaner react to
fn table_like_text() -> impl Strategy<Value = String> {
    r#"[,|"“”₹$0-9a-zA-Z .\n\t_'-]{0,400}"#
}

/// Lines assembled from cell fragments so that quoting, pipes and grouping
/// combine more often than uniform characters would
fn table_like_lines() -> impl Strategy<Value = String> {
    let cell = prop_oneof![
        label(),
        "[0-9]{1,3}(,[0-9]{2,3}){0,3}(\\.[0-9]{1,2})?",
        Just("\"1,20,000\"".to_string()),
        Just("“₹5,000”".to_string()),
        Just("$ 2,500".to_string()),
        Just("---".to_string()),
        Just(String::new()),
    ];
    let line = prop::collection::vec(cell, 0..4).prop_flat_map(|cells| {
        prop_oneof![
            Just(cells.join(", ")),
            Just(format!("| {} |", cells.join(" | "))),
            Just(cells.join(",")),
        ]
    });
    prop::collection::vec(line, 0..20).prop_map(|lines| lines.join("\n"))
}

fn assert_sane(raw: &str) -> Result<(), TestCaseError> {
    let normalized = normalize(raw);
    prop_assert_eq!(
        normalized.stats.rows_kept,
        normalized.outcome.table().map(|t| t.len()).unwrap_or(0)
    );
    if let Some(table) = normalized.outcome.table() {
        prop_assert!(!table.is_empty());
        prop_assert!(table.rows().iter().all(|r| r.amount.is_finite() && r.amount >= 0.0));
        if let AnalysisOutcome::Analyzed(result) = analyze(table, 30.0).unwrap() {
            let sum: f64 = result.rows.iter().map(|r| r.allocation_percent).sum();
            prop_assert!((sum - 100.0).abs() < 1e-6);
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    #[test]
    fn normalize_never_panics(raw in "\\PC{0,400}") {
        assert_sane(&raw)?;
    }

    #[test]
    fn normalize_survives_table_like_characters(raw in table_like_text()) {
        assert_sane(&raw)?;
    }

    #[test]
    fn normalize_survives_table_like_lines(raw in table_like_lines()) {
        assert_sane(&raw)?;
    }

    #[test]
    fn well_formed_csv_keeps_every_row(rows in prop::collection::vec((label(), 0u32..10_000_000), 1..30)) {
        let mut raw = String::from("Stock, Amount Invested\n");
        for (l, a) in &rows {
            raw.push_str(&format!("{}, {}\n", l, a));
        }

        let normalized = normalize(&raw);
        let table = normalized.outcome.table().expect("table");
        prop_assert_eq!(table.len(), rows.len());
        for (row, (l, a)) in table.rows().iter().zip(rows.iter()) {
            prop_assert_eq!(&row.label, l);
            prop_assert_eq!(row.amount, *a as f64);
        }
    }

    #[test]
    fn markdown_separators_never_become_rows(rows in prop::collection::vec((label(), 1u32..1_000_000), 1..20)) {
        let mut raw = String::from("| Stock | Amount |\n|---|---|\n");
        for (l, a) in &rows {
            raw.push_str(&format!("| {} | {} |\n|---|---|\n", l, a));
        }

        let normalized = normalize(&raw);
        let table = normalized.outcome.table().expect("table");
        prop_assert_eq!(table.len(), rows.len());
        prop_assert!(table.rows().iter().all(|r| !r.label.contains('-')));
        prop_assert_eq!(normalized.stats.separator_lines, rows.len() + 1);
    }

    #[test]
    fn grouped_and_currency_amounts_parse(value in 0u64..10_000_000_000) {
        let raw = format!(
            "Stock,Amount\nA,\"{}\"\nB,₹{}\n| C | ${} |",
            group_indian(value),
            value,
            group_indian(value)
        );

        let normalized = normalize(&raw);
        let table = normalized.outcome.table().expect("table");
        prop_assert_eq!(table.len(), 3);
        prop_assert!(table.rows().iter().all(|r| r.amount == value as f64));
    }

    #[test]
    fn swapped_header_still_yields_numeric_amounts(rows in prop::collection::vec((label(), 0u32..1_000_000), 1..20)) {
        let mut raw = String::from("Amount, Stock\n");
        for (l, a) in &rows {
            raw.push_str(&format!("{}, {}\n", a, l));
        }

        let normalized = normalize(&raw);
        prop_assert!(normalized.stats.columns_swapped);
        let table = normalized.outcome.table().expect("table");
        prop_assert_eq!(table.len(), rows.len());
        for (row, (l, a)) in table.rows().iter().zip(rows.iter()) {
            prop_assert_eq!(&row.label, l);
            prop_assert_eq!(row.amount, *a as f64);
        }
    }

    #[test]
    fn allocations_sum_to_hundred(amounts in prop::collection::vec(0.0f64..1_000_000_000.0, 1..50)) {
        let table = PortfolioTable::new(
            amounts.iter().enumerate().map(|(i, a)| TableRow::new(format!("H{}", i), *a)).collect(),
        );

        match analyze(&table, 30.0).unwrap() {
            AnalysisOutcome::Analyzed(result) => {
                let sum: f64 = result.rows.iter().map(|r| r.allocation_percent).sum();
                prop_assert!((sum - 100.0).abs() < 1e-6);
                prop_assert!(result.flagged.iter().all(|r| r.allocation_percent > 30.0));
                prop_assert_eq!(result.flagged.is_empty(), !result.is_concentrated());
            }
            AnalysisOutcome::NoSignal { row_count } => {
                prop_assert_eq!(table.total_invested(), 0.0);
                prop_assert_eq!(row_count, amounts.len());
            }
        }
    }
}

#[test]
fn empty_extraction_is_distinct_from_zero_row() {
    assert_eq!(normalize("Stock, Amount\n").outcome, Extraction::Empty);
    assert!(normalize("Stock, Amount\nCash, 0\n").outcome.table().is_some());
}
