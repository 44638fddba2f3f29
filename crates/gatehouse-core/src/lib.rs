//! Gatehouse core: the offline check-in ledger for a seasonal membership club.
//!
//! Front-desk staff work against a locally cached member roster. Check-ins and
//! alerts accumulate in a key-value store for the day and are drained to the
//! club server by the [`sync`] module.

pub mod checkin;
pub mod config;
pub mod directory;
pub mod error;
pub mod ledger;
pub mod model;
pub mod season;
pub mod storage;
pub mod sync;
pub mod validation;

pub use error::{GateError, Result};
