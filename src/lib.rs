//! fundraise-sync keeps a collection of fundraising initiatives, the contributions made toward
//! them and the set of initiative types. A `session::Session` mirrors the initiatives to a Google
//! sheet, writing the whole collection once changes have settled.

pub mod api;
pub mod args;
pub mod commands;
mod config;
mod error;
pub mod export;
pub mod model;
pub mod session;
pub mod store;
mod sync;
mod utils;


pub use api::Mode;
pub use config::Config;
pub use error::{Error, Outcome, Rejection, Result};
