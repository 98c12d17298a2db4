pub mod error;
pub mod report;
pub mod runner;

pub use error::ExporterError;
pub use report::{PushOutcome, RunReport, WindowOutcome, WindowReport};
pub use runner::{RunState, SloExporter, JOB_NAME};
