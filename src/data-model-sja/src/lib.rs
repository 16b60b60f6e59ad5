pub mod accounting;
pub mod db;
pub mod errors;
pub mod models;
pub mod results;
pub mod script_info;
pub mod store;
pub mod summary;
pub mod tables;

// Make test_helpers available for tests in this crate and dependent crates
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use errors::Error;
pub use script_info::{ResultSchema, SchemaError, ScriptInfo};
pub use store::{CandidateSource, ResultRepository};
