//! Load-or-create, resync and prune primitives over the store.
//!
//! - [`pool`]: pool creation and full aggregate resync
//! - [`bucket`] / [`lend`]: deposit book and per-lender LP
//! - [`loan`]: borrower positions
//! - [`account`], [`token`]: cross-pool aggregates
//! - [`allowance`]: LP allowances and transferors
//! - [`policy`]: which fields are re-fetched and which accumulate

pub mod account;
pub mod allowance;
pub mod bucket;
pub mod lend;
pub mod loan;
pub mod policy;
pub mod pool;
pub mod token;
