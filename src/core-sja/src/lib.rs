pub mod analysis;
pub mod common;
pub mod errors;
pub mod llms;

pub use analysis::{RepairPolicy, ScriptAnalyzer, analyze, validate};
pub use errors::Error;
pub use llms::{ChatModel, LlmProvider};
