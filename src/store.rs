//! The in-memory collection of initiatives and the category set, and the user actions that change
//! them.

use crate::error::{Outcome, Rejection};
use crate::model::{normalize_category, Amount, Categories, Initiative, Transaction, NO_DESCRIPTION};
use chrono::{Local, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;
use tracing::debug;

/// The data needed to record a contribution. Text fields are taken as the user typed them and are
/// validated by `LocalStore::add_transaction`.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct NewTransaction {
    pub initiative_id: u64,
    pub amount: String,
    pub source: String,
    /// Defaults to "No description" when `None` or blank.
    pub description: Option<String>,
    /// `YYYY-MM-DD`. Defaults to today when `None` or blank.
    pub date: Option<String>,
}

/// Holds the initiatives in entry order together with the set of initiative types.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct LocalStore {
    initiatives: Vec<Initiative>,
    categories: Categories,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initiatives(&self) -> &[Initiative] {
        &self.initiatives
    }

    pub fn initiative(&self, id: u64) -> Option<&Initiative> {
        self.initiatives.iter().find(|i| i.id() == id)
    }

    pub fn categories(&self) -> &Categories {
        &self.categories
    }

    /// Adds an initiative with nothing raised yet and returns its id, which is one more than the
    /// largest id in the store (1 for an empty store).
    pub fn add_initiative(&mut self, name: &str, target: &str, kind: &str) -> Outcome<u64> {
        let name = name.trim();
        if name.is_empty() {
            return Outcome::Rejected(Rejection::EmptyName);
        }
        let target = match parse_positive(target) {
            Some(target) => target,
            None => return Outcome::Rejected(Rejection::InvalidTarget(target.to_string())),
        };
        if !self.categories.contains(kind) {
            return Outcome::Rejected(Rejection::UnknownCategory(kind.to_string()));
        }

        let id = match self.next_id() {
            Some(id) => id,
            None => return Outcome::Rejected(Rejection::IdsExhausted),
        };
        self.initiatives
            .push(Initiative::new(id, name, target, normalize_category(kind)));
        debug!("Added initiative {id} '{name}' with target {target}");
        Outcome::Accepted(id)
    }

    /// Records a transaction against an existing initiative and returns that initiative's new
    /// `current` amount.
    pub fn add_transaction(&mut self, new: NewTransaction) -> Outcome<Amount> {
        let amount = match parse_positive(&new.amount) {
            Some(amount) => amount,
            None => return Outcome::Rejected(Rejection::InvalidAmount(new.amount)),
        };
        let source = new.source.trim();
        if source.is_empty() {
            return Outcome::Rejected(Rejection::EmptySource);
        }
        let date = match new.date.as_deref().map(str::trim) {
            None | Some("") => today(),
            Some(s) => match NaiveDate::from_str(s) {
                Ok(date) => date,
                Err(_) => return Outcome::Rejected(Rejection::InvalidDate(s.to_string())),
            },
        };
        let description = match new.description.as_deref().map(str::trim) {
            None | Some("") => NO_DESCRIPTION,
            Some(s) => s,
        };

        let initiative = match self
            .initiatives
            .iter_mut()
            .find(|i| i.id() == new.initiative_id)
        {
            Some(initiative) => initiative,
            None => return Outcome::Rejected(Rejection::UnknownInitiative(new.initiative_id)),
        };
        let transaction = Transaction::new(date, amount, source, description);
        let current = match initiative.push_transaction(transaction) {
            Some(current) => current,
            None => return Outcome::Rejected(Rejection::AmountTooLarge(new.amount)),
        };
        debug!(
            "Added {amount} from '{source}' to initiative {}",
            initiative.id()
        );
        Outcome::Accepted(current)
    }

    /// Adds a new initiative type. The label is stored lowercase.
    pub fn add_category(&mut self, label: &str) -> Outcome<String> {
        let normalized = normalize_category(label);
        if normalized.is_empty() {
            return Outcome::Rejected(Rejection::EmptyCategory);
        }
        if !self.categories.insert(&normalized) {
            return Outcome::Rejected(Rejection::DuplicateCategory(normalized));
        }
        debug!("Added category '{normalized}'");
        Outcome::Accepted(normalized)
    }

    /// Replaces every initiative, e.g. with the rows read from the sheet. Categories are kept.
    pub(crate) fn replace_initiatives(&mut self, initiatives: Vec<Initiative>) {
        self.initiatives = initiatives;
    }

    pub fn total_target(&self) -> Amount {
        self.initiatives.iter().map(|i| i.target()).sum()
    }

    pub fn total_current(&self) -> Amount {
        self.initiatives.iter().map(|i| i.current()).sum()
    }

    /// Total current as a percentage of total target, 0 when the total target is 0.
    pub fn overall_progress(&self) -> Decimal {
        self.total_current().percent_of(self.total_target())
    }

    pub fn summary(&self) -> Summary {
        let total_target = self.total_target();
        let total_current = self.total_current();
        Summary {
            total_target,
            total_current,
            remaining: total_target - total_current,
            overall_progress: total_current.percent_of(total_target),
        }
    }

    /// `None` once an initiative holds the largest possible id.
    fn next_id(&self) -> Option<u64> {
        self.initiatives
            .iter()
            .map(|i| i.id())
            .max()
            .unwrap_or(0)
            .checked_add(1)
    }
}

/// The aggregate figures shown above the initiative list.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Summary {
    pub total_target: Amount,
    pub total_current: Amount,
    pub remaining: Amount,
    /// A percentage, e.g. `50` for half way.
    pub overall_progress: Decimal,
}

impl Summary {
    /// The progress rounded to `dp` decimal places, always printing exactly `dp` places.
    pub fn progress_text(&self, dp: u32) -> String {
        let mut rounded = self
            .overall_progress
            .round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(dp);
        rounded.to_string()
    }
}

fn parse_positive(s: &str) -> Option<Amount> {
    Amount::from_str(s).ok().filter(|a| a.is_positive())
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}
