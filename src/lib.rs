pub mod api;
pub mod application;
pub mod cli;
pub mod domain;
pub mod ledger;
pub mod storage;

pub use application::{ProvisioningService, ServiceError};
pub use domain::*;
