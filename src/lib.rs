pub mod contest;
pub mod deadlines;
pub mod error;
pub mod ledger;
pub mod records;
pub mod roster;
pub mod scoring;
pub mod store;
