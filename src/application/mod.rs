// Application layer - the provisioning workflow and the façade exposed to
// the HTTP boundary and the CLI.

pub mod error;
mod metrics;
mod provisioner;
mod service;
mod shutdown;

pub use error::*;
pub use metrics::*;
pub use provisioner::*;
pub use service::*;
pub use shutdown::*;
