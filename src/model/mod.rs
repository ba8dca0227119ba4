//! Types that represent the core data model, such as `Initiative` and `Transaction`.
mod amount;
mod category;
pub mod grid;
mod initiative;

pub use amount::{Amount, AmountError};
pub use category::{Categories, DEFAULT_CATEGORIES, FALLBACK_CATEGORY};
pub(crate) use category::normalize as normalize_category;
pub use initiative::{Initiative, Transaction, NO_DESCRIPTION};
