//! CAIRN Registry - Content-Addressed Function Registry
//!
//! Ties the lookup cache to the collaborators around it: a hasher that turns
//! source into keys, a loop analyzer that vets sources before registration,
//! and an executor that runs resolved records.

pub mod analyzer;
pub mod executor;
pub mod hasher;
pub mod registry;
pub mod telemetry;

pub use analyzer::{LoopAnalyzer, SelfReferenceAnalyzer};
pub use executor::{EchoExecutor, ExecutionOutput, Executor};
pub use hasher::{KeyHasher, Sha256KeyHasher};
pub use registry::{FunctionRegistry, Registration};
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig};
