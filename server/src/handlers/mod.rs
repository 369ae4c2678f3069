//! HTTP handlers, one module per resource:
//! - `health`: liveness
//! - `upload`: PDF uploads
//! - `jobs`: job submission, listing and status
//! - `summaries`: results of finished jobs and their translations

pub mod health;
pub mod jobs;
pub mod summaries;
pub mod upload;

pub use health::health;
pub use jobs::{create_job, get_job, list_jobs};
pub use summaries::{get_summary, translate_summary};
pub use upload::upload;
