pub mod config;
mod error;
pub mod logger;
pub mod metrics;
pub mod registry;
mod reporter;

pub use config::{ReporterConfig, SamplingOptions};
pub use error::{Result, StatusError};
pub use metrics::{MetricsProvider, Report, Sample, SysinfoMetrics, SystemMemory};
pub use registry::{NodeClient, NodeRegistry, RosMaster, RosNodeClient, RpcError};
pub use reporter::StatusReporter;
