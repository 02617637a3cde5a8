//! Contract checks for HTTP JSON APIs.
//!
//! A [`Suite`] of [`Scenario`]s is executed through a [`Transport`]; each
//! captured exchange is checked against its assertions and an optional JSON
//! Schema, and the resulting [`Verdict`]s stream into a [`ReportSink`].

pub mod cli;
pub mod environment;
pub mod error;
pub mod http;
pub mod logging;
pub mod report;
pub mod runner;
pub mod schema;
pub mod testing;

pub use error::{ConfigError, HarnessError, ReportError, SchemaLoadError, SuiteError, TransportError};
pub use http::{
    Exchange, HttpMethod, RequestBody, RequestDescriptor, ReqwestTransport, ResponseCapture,
    Transport, TransportConfig,
};
pub use report::{ReportSink, RunSummary};
pub use runner::{CancelHandle, Harness, HarnessConfig};
pub use schema::{SchemaDocument, SchemaStore, Violation};
pub use testing::{Assertion, Outcome, Scenario, Suite, Verdict, VerdictAssembler};
