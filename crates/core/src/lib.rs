// readflow Core - Domain, Ports and Pipeline Orchestration
// NO process or storage adapters here; those live in readflow-infra-system

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use error::{AppError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
