pub mod config;
pub mod error;
pub mod types;
pub mod workflow_graph;

pub use config::{ConfigLoader, PlaycheckConfig};
pub use error::AppError;
pub use types::*;
pub use workflow_graph::{Diagnostic, Pipeline, ScenarioContext, Severity, ValidationResult};
