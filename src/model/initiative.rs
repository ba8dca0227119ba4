use crate::model::Amount;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

/// The description given to a transaction when none was entered.
pub const NO_DESCRIPTION: &str = "No description";

/// A single fundraising goal with a target amount and accumulated progress.
///
/// `current` only grows through `push_transaction`, which keeps it equal to the sum of the
/// transaction amounts. Initiatives read back from a sheet keep whatever `current` the sheet had.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Initiative {
    id: u64,
    name: String,
    target: Amount,
    current: Amount,
    #[serde(rename = "type")]
    kind: String,
    transactions: Vec<Transaction>,
}

impl Initiative {
    /// Creates an initiative with nothing raised yet.
    pub(crate) fn new(id: u64, name: impl Into<String>, target: Amount, kind: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            target,
            current: Amount::ZERO,
            kind: kind.into(),
            transactions: Vec::new(),
        }
    }

    /// Rebuilds an initiative exactly as it was stored remotely.
    pub(crate) fn from_parts(
        id: u64,
        name: String,
        target: Amount,
        current: Amount,
        kind: String,
        transactions: Vec<Transaction>,
    ) -> Self {
        Self {
            id,
            name,
            target,
            current,
            kind,
            transactions,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> Amount {
        self.target
    }

    pub fn current(&self) -> Amount {
        self.current
    }

    /// The category label of this initiative, e.g. `raffle`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// What is left to raise. Negative once the target has been exceeded.
    pub fn remaining(&self) -> Amount {
        self.target - self.current
    }

    /// `current` as a percentage of `target`.
    pub fn progress(&self) -> Decimal {
        self.current.percent_of(self.target)
    }

    /// Appends `transaction` and adds its amount to `current`, returning the new `current`.
    /// Nothing changes and `None` is returned when the sum does not fit in an `Amount`.
    pub(crate) fn push_transaction(&mut self, transaction: Transaction) -> Option<Amount> {
        let current = self.current.checked_add(transaction.amount)?;
        self.current = current;
        self.transactions.push(transaction);
        Some(current)
    }
}

/// One recorded contribution toward an `Initiative`.
///
/// Transactions entered here always have a `YYYY-MM-DD` date. Ones read back from a sheet may
/// have been edited by hand, so their fields are taken as found: the date text is kept as is, an
/// amount that is not a number becomes 0 and a missing source is empty.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default, deserialize_with = "lenient_text")]
    date: String,
    #[serde(default, deserialize_with = "lenient_amount")]
    amount: Amount,
    #[serde(default, deserialize_with = "lenient_text")]
    source: String,
    #[serde(default = "no_description", deserialize_with = "lenient_text")]
    description: String,
}

impl Transaction {
    pub(crate) fn new(
        date: NaiveDate,
        amount: Amount,
        source: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            date: date.to_string(),
            amount,
            source: source.into(),
            description: description.into(),
        }
    }

    /// `YYYY-MM-DD`, unless the transaction was edited in the sheet.
    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

fn no_description() -> String {
    NO_DESCRIPTION.to_string()
}

/// Parses the JSON array held in a sheet's Transactions cell. Only text that is not a JSON array
/// is an error; elements that are not objects are skipped.
pub(crate) fn parse_transactions(json: &str) -> serde_json::Result<Vec<Transaction>> {
    let values: Vec<Value> = serde_json::from_str(json)?;
    let mut transactions = Vec::with_capacity(values.len());
    for value in values {
        match Transaction::deserialize(&value) {
            Ok(transaction) => transactions.push(transaction),
            Err(e) => warn!("Skipping the transaction {value}: {e}"),
        }
    }
    Ok(transactions)
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

fn lenient_amount<'de, D>(deserializer: D) -> Result<Amount, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(Amount::deserialize(&value).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn amount(s: &str) -> Amount {
        Amount::from_str(s).unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::from_str(s).unwrap()
    }

    #[test]
    fn test_push_transaction_accumulates() {
        let mut initiative = Initiative::new(1, "Gala", amount("1000"), "event");
        initiative.push_transaction(Transaction::new(date("2024-03-01"), amount("250"), "Ana", "tickets"));
        initiative.push_transaction(Transaction::new(date("2024-02-01"), amount("100.5"), "Ben", "door"));
        assert_eq!(initiative.current(), amount("350.5"));
        assert_eq!(initiative.remaining(), amount("649.5"));
        assert_eq!(initiative.progress(), Decimal::new(3505, 2));
        // Entry order is kept even when dates go backwards.
        assert_eq!(initiative.transactions()[1].source(), "Ben");
    }

    #[test]
    fn test_initiative_json_shape() {
        let mut initiative = Initiative::new(2, "Raffle", amount("500"), "raffle");
        initiative.push_transaction(Transaction::new(date("2024-01-15"), amount("20"), "Cara", NO_DESCRIPTION));
        let json = serde_json::to_value(&initiative).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": 2,
                "name": "Raffle",
                "target": 500,
                "current": 20,
                "type": "raffle",
                "transactions": [
                    {"date": "2024-01-15", "amount": 20, "source": "Cara", "description": "No description"}
                ]
            })
        );
    }

    #[test]
    fn test_transaction_description_defaults_when_missing() {
        let t: Transaction =
            serde_json::from_str(r#"{"date":"2024-05-05","amount":12.5,"source":"Dee"}"#).unwrap();
        assert_eq!(t.description(), NO_DESCRIPTION);
        assert_eq!(t.amount(), amount("12.5"));
    }

    #[test]
    fn test_parse_transactions_keeps_odd_entries() {
        let json = r#"[
            {"date": "3/1/2024", "amount": 25, "source": "Ana"},
            {"date": "2024-03-02", "amount": "lots", "description": "pledge"},
            {"amount": 10, "source": 42},
            "not a transaction"
        ]"#;
        let transactions = parse_transactions(json).unwrap();
        assert_eq!(transactions.len(), 3);
        assert_eq!(transactions[0].date(), "3/1/2024");
        assert_eq!(transactions[0].amount(), amount("25"));
        assert_eq!(transactions[1].amount(), Amount::ZERO);
        assert_eq!(transactions[1].source(), "");
        assert_eq!(transactions[1].description(), "pledge");
        assert_eq!(transactions[2].date(), "");
        assert_eq!(transactions[2].source(), "42");
        assert_eq!(transactions[2].description(), NO_DESCRIPTION);
    }

    #[test]
    fn test_parse_transactions_rejects_broken_json() {
        assert!(parse_transactions("[{").is_err());
        assert!(parse_transactions(r#"{"date": "2024-01-01"}"#).is_err());
        assert!(parse_transactions("[]").unwrap().is_empty());
    }
}
