mod driver;
mod error;
mod membership;
mod metrics;
mod record;
mod report;
mod scenario;
mod select;
mod warmup;

pub mod runner;

pub use driver::RequestDriver;
pub use error::{Error, Result};
pub use membership::{MembershipSchedule, MembershipStep};
pub use metrics::{AggregateReport, Aggregator, OperationSummary, RecordSink};
pub use record::{IterationEvent, Outcome, RequestRecord};
pub use replikr_http::{HttpClient, HttpTransportErrorKind};
pub use report::{csv_report, write_report_file};
pub use scenario::{Endpoint, Executor, ExecutorKind, OperationKind, Scenario};
pub use select::{RoundRobin, Selector, UniformRandom};
pub use warmup::run_warmup;
