//! Conversion between `Initiative` values and the rows of the sheet that mirrors them.
//!
//! The sheet has a fixed column layout, one initiative per row below a header row:
//!
//! | ID | Name | Target | Current | Type | Transactions |
//! |----|------|--------|---------|------|--------------|
//! | 1  | Gala | 1000   | 250     | event | `[{"date":"2024-03-01","amount":250,...}]` |
//!
//! The Transactions cell holds the initiative's transactions as a JSON array.

use crate::model::category::FALLBACK_CATEGORY;
use crate::model::initiative::parse_transactions;
use crate::model::{Amount, Initiative};
use crate::Result;
use anyhow::Context;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The known columns of the sheet, in sheet order.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitiativeColumn {
    Id,
    Name,
    Target,
    Current,
    #[serde(rename = "type")]
    Type,
    Transactions,
}

serde_plain::derive_display_from_serialize!(InitiativeColumn);
serde_plain::derive_fromstr_from_deserialize!(InitiativeColumn);

impl InitiativeColumn {
    pub const ALL: [InitiativeColumn; COLUMN_COUNT] = [
        InitiativeColumn::Id,
        InitiativeColumn::Name,
        InitiativeColumn::Target,
        InitiativeColumn::Current,
        InitiativeColumn::Type,
        InitiativeColumn::Transactions,
    ];

    /// The text of this column's header cell.
    pub fn header(&self) -> &'static str {
        match self {
            InitiativeColumn::Id => ID_STR,
            InitiativeColumn::Name => NAME_STR,
            InitiativeColumn::Target => TARGET_STR,
            InitiativeColumn::Current => CURRENT_STR,
            InitiativeColumn::Type => TYPE_STR,
            InitiativeColumn::Transactions => TRANSACTIONS_STR,
        }
    }

    /// The zero-based position of this column in a row.
    pub fn index(&self) -> usize {
        *self as usize
    }
}

pub(super) const ID_STR: &str = "ID";
pub(super) const NAME_STR: &str = "Name";
pub(super) const TARGET_STR: &str = "Target";
pub(super) const CURRENT_STR: &str = "Current";
pub(super) const TYPE_STR: &str = "Type";
pub(super) const TRANSACTIONS_STR: &str = "Transactions";
pub(super) const COLUMN_COUNT: usize = 6;

/// The header row written above the data rows.
pub fn header_row() -> Vec<String> {
    InitiativeColumn::ALL
        .iter()
        .map(|c| c.header().to_string())
        .collect()
}

/// Converts `initiatives` to rows suitable for writing to the sheet, header row first.
pub fn to_rows(initiatives: &[Initiative]) -> Result<Vec<Vec<String>>> {
    let mut rows = Vec::with_capacity(initiatives.len() + 1);
    rows.push(header_row());
    for initiative in initiatives {
        rows.push(to_row(initiative)?);
    }
    Ok(rows)
}

fn to_row(initiative: &Initiative) -> Result<Vec<String>> {
    let transactions = serde_json::to_string(initiative.transactions()).with_context(|| {
        format!(
            "Unable to serialize the transactions of initiative {}",
            initiative.id()
        )
    })?;
    Ok(vec![
        initiative.id().to_string(),
        initiative.name().to_string(),
        initiative.target().to_cell(),
        initiative.current().to_cell(),
        initiative.kind().to_string(),
        transactions,
    ])
}

/// Parses rows downloaded from the sheet.
///
/// Returns `None` when there is nothing but blank rows below the header row. Blank rows are
/// skipped. Numeric cells that do not parse become 0, a missing type becomes `other` and a missing
/// Transactions cell becomes an empty list. A Transactions cell that is not a JSON array is an
/// error, but the transactions inside it are read leniently.
pub fn from_rows<S, R, I>(rows: I) -> Result<Option<Vec<Initiative>>>
where
    S: Into<String>,
    R: IntoIterator<Item = S>,
    I: IntoIterator<Item = R>,
{
    let mut rows = rows.into_iter();
    // The header row is not validated, only skipped.
    if rows.next().is_none() {
        return Ok(None);
    }

    let mut initiatives = Vec::new();
    for (row_ix, row) in rows.enumerate() {
        let values: Vec<String> = row.into_iter().map(|s| s.into()).collect();
        if values.iter().all(|v| v.trim().is_empty()) {
            continue;
        }
        // row_ix + 2 because the sheet is 1-indexed and the header was skipped.
        let initiative = from_row(&values)
            .with_context(|| format!("Unable to parse the initiative in sheet row {}", row_ix + 2))?;
        initiatives.push(initiative);
    }

    if initiatives.is_empty() {
        return Ok(None);
    }
    Ok(Some(initiatives))
}

fn from_row(values: &[String]) -> Result<Initiative> {
    let cell = |col: InitiativeColumn| values.get(col.index()).map(|s| s.trim()).unwrap_or("");

    let kind = match cell(InitiativeColumn::Type) {
        "" => FALLBACK_CATEGORY.to_string(),
        kind => kind.to_string(),
    };

    let transactions = match cell(InitiativeColumn::Transactions) {
        "" => Vec::new(),
        json => parse_transactions(json).context("The Transactions cell is not a JSON array")?,
    };

    Ok(Initiative::from_parts(
        parse_id(cell(InitiativeColumn::Id)),
        cell(InitiativeColumn::Name).to_string(),
        parse_amount(cell(InitiativeColumn::Target)),
        parse_amount(cell(InitiativeColumn::Current)),
        kind,
        transactions,
    ))
}

fn parse_id(s: &str) -> u64 {
    s.parse::<u64>()
        .ok()
        .or_else(|| Decimal::from_str(s).ok().and_then(|d| d.trunc().to_u64()))
        .unwrap_or(0)
}

fn parse_amount(s: &str) -> Amount {
    Amount::from_str(s).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Transaction;
    use chrono::NaiveDate;

    fn amount(s: &str) -> Amount {
        Amount::from_str(s).unwrap()
    }

    #[test]
    fn test_header_row() {
        assert_eq!(
            header_row(),
            vec!["ID", "Name", "Target", "Current", "Type", "Transactions"]
        );
    }

    #[test]
    fn test_column_display_and_index() {
        assert_eq!(InitiativeColumn::Type.to_string(), "type");
        assert_eq!(
            InitiativeColumn::from_str("transactions").unwrap(),
            InitiativeColumn::Transactions
        );
        assert_eq!(InitiativeColumn::Current.index(), 3);
    }

    #[test]
    fn test_to_rows() {
        let mut gala = Initiative::new(1, "Gala", amount("1000"), "event");
        gala.push_transaction(Transaction::new(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            amount("250"),
            "Ana",
            "tickets",
        ));
        let rows = to_rows(&[gala]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[1],
            vec![
                "1",
                "Gala",
                "1000",
                "250",
                "event",
                r#"[{"date":"2024-03-01","amount":250,"source":"Ana","description":"tickets"}]"#
            ]
        );
    }

    #[test]
    fn test_from_rows_header_only() {
        let rows = vec![header_row()];
        assert!(from_rows(rows).unwrap().is_none());
        assert!(from_rows(Vec::<Vec<String>>::new()).unwrap().is_none());
    }

    #[test]
    fn test_from_rows_defaults() {
        let rows = vec![
            vec!["ID", "Name", "Target", "Current", "Type", "Transactions"],
            vec!["abc", "Walkathon", "lots", "₱1,200", ""],
            vec![],
            vec!["7", "Shirts", "300", "0", "merchandise", "[]"],
        ];
        let initiatives = from_rows(rows).unwrap().unwrap();
        assert_eq!(initiatives.len(), 2);

        let walk = &initiatives[0];
        assert_eq!(walk.id(), 0);
        assert_eq!(walk.name(), "Walkathon");
        assert_eq!(walk.target(), Amount::ZERO);
        assert_eq!(walk.current(), amount("1200"));
        assert_eq!(walk.kind(), "other");
        assert!(walk.transactions().is_empty());

        assert_eq!(initiatives[1].id(), 7);
        assert_eq!(initiatives[1].kind(), "merchandise");
    }

    #[test]
    fn test_from_rows_bad_transactions_cell() {
        let rows = vec![
            vec!["ID", "Name", "Target", "Current", "Type", "Transactions"],
            vec!["1", "Gala", "1000", "0", "event", "not json"],
        ];
        let err = from_rows(rows).unwrap_err();
        assert!(format!("{err:#}").contains("sheet row 2"));
    }

    #[test]
    fn test_from_rows_keeps_hand_edited_transactions() {
        let rows = vec![
            vec!["ID", "Name", "Target", "Current", "Type", "Transactions"],
            vec![
                "1",
                "Gala",
                "1000",
                "25",
                "event",
                r#"[{"date":"3/1/2024","amount":25,"source":"Ana"},{"date":"2024-03-02","amount":"n/a"}]"#,
            ],
        ];
        let initiatives = from_rows(rows).unwrap().unwrap();
        let transactions = initiatives[0].transactions();
        assert_eq!(transactions.len(), 2);
        assert_eq!(transactions[0].date(), "3/1/2024");
        assert_eq!(transactions[1].amount(), Amount::ZERO);
        assert_eq!(transactions[1].source(), "");
        // The Current cell is kept as written.
        assert_eq!(initiatives[0].current(), amount("25"));
    }

    #[test]
    fn test_rows_read_back() {
        let mut gala = Initiative::new(3, "Gala", amount("1000.5"), "event");
        gala.push_transaction(Transaction::new(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            amount("99.99"),
            "Ana",
            "tickets",
        ));
        let rows = to_rows(&[gala.clone()]).unwrap();
        let parsed = from_rows(rows).unwrap().unwrap();
        assert_eq!(parsed, vec![gala]);
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("12"), 12);
        assert_eq!(parse_id("12.0"), 12);
        assert_eq!(parse_id(""), 0);
        assert_eq!(parse_id("x"), 0);
    }
}
