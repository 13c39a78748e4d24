pub mod merge;
pub mod orchestrator;
pub mod probe;
pub mod report;
pub mod resolver;
pub mod status;

// Re-export commonly used items
pub use merge::merge;
pub use orchestrator::{build_probers, Orchestrator};
pub use probe::Prober;
pub use report::{read_token_file, DashboardClient, ReportSink, StdoutReporter};
pub use resolver::{ClientPool, KubeResolver, PrometheusEndpointResolver};
pub use status::*;
