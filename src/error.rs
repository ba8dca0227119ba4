use std::fmt::{Display, Formatter};

pub type Error = anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// The outcome of a user action that can be refused. A refused action leaves all state as it was.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Outcome<T> {
    Accepted(T),
    Rejected(Rejection),
}

impl<T> Outcome<T> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted(_))
    }

    pub fn is_rejected(&self) -> bool {
        !self.is_accepted()
    }

    /// Returns the accepted value, if any.
    pub fn accepted(self) -> Option<T> {
        match self {
            Outcome::Accepted(value) => Some(value),
            Outcome::Rejected(_) => None,
        }
    }

    /// Returns the rejection reason, if any.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Outcome::Accepted(_) => None,
            Outcome::Rejected(reason) => Some(reason),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Accepted(value) => Outcome::Accepted(f(value)),
            Outcome::Rejected(reason) => Outcome::Rejected(reason),
        }
    }
}

/// Why an action was refused.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Rejection {
    /// The initiative name was empty.
    EmptyName,
    /// The target could not be parsed as a positive amount.
    InvalidTarget(String),
    /// The initiative type is not in the category set.
    UnknownCategory(String),
    /// The transaction amount could not be parsed as a positive amount.
    InvalidAmount(String),
    /// Adding the transaction amount would take the initiative past the largest amount there is.
    AmountTooLarge(String),
    /// The transaction source was empty.
    EmptySource,
    /// The transaction date was not a `YYYY-MM-DD` date.
    InvalidDate(String),
    /// No initiative has this id.
    UnknownInitiative(u64),
    /// Every initiative id is taken.
    IdsExhausted,
    /// The category label was empty.
    EmptyCategory,
    /// The category already exists (compared case-insensitively).
    DuplicateCategory(String),
    /// A read or write against the remote sheet is still outstanding.
    Busy,
    /// The remote sheet could not be initialized or read.
    Remote(String),
}

impl Display for Rejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::EmptyName => write!(f, "the initiative name must not be empty"),
            Rejection::InvalidTarget(s) => write!(f, "'{s}' is not a valid positive target"),
            Rejection::UnknownCategory(s) => write!(f, "'{s}' is not a known initiative type"),
            Rejection::InvalidAmount(s) => write!(f, "'{s}' is not a valid positive amount"),
            Rejection::AmountTooLarge(s) => {
                write!(f, "adding '{s}' would make the amount raised too large")
            }
            Rejection::IdsExhausted => write!(f, "no initiative id is left to assign"),
            Rejection::EmptySource => write!(f, "the transaction source must not be empty"),
            Rejection::InvalidDate(s) => write!(f, "'{s}' is not a date in YYYY-MM-DD format"),
            Rejection::UnknownInitiative(id) => write!(f, "no initiative has id {id}"),
            Rejection::EmptyCategory => write!(f, "the category label must not be empty"),
            Rejection::DuplicateCategory(s) => write!(f, "the category '{s}' already exists"),
            Rejection::Busy => write!(f, "a sheet request is still in progress"),
            Rejection::Remote(s) => write!(f, "{s}"),
        }
    }
}

impl std::error::Error for Rejection {}
