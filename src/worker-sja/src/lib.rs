pub mod errors;
pub mod work;

pub use errors::Error;

pub use work::{BatchReport, JobDisposition, JobResult, handle_job, handle_result, process_job, run_batch};
