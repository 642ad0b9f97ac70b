//! Execution engine boundary.
//!
//! Running registered code is out of scope for this workspace; the registry
//! only needs somewhere to hand a resolved record and its input.

use async_trait::async_trait;
use cairn_core::{ArtifactId, ExecutionError, FunctionKey, FunctionRecord};
use serde::{Deserialize, Serialize};

/// Result of running a registered function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutput {
    pub key: FunctionKey,
    pub artifact_id: ArtifactId,
    pub value: serde_json::Value,
}

/// Trait for execution engines.
/// Implementations must be thread-safe (Send + Sync).
///
/// # Example
/// ```ignore
/// struct WasmExecutor { /* ... */ }
///
/// #[async_trait]
/// impl Executor for WasmExecutor {
///     async fn execute(&self, record: &FunctionRecord, input: serde_json::Value)
///         -> Result<ExecutionOutput, ExecutionError> {
///         // Instantiate record.artifact_id and call it
///     }
/// }
/// ```
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(
        &self,
        record: &FunctionRecord,
        input: serde_json::Value,
    ) -> Result<ExecutionOutput, ExecutionError>;
}

/// Mock executor for testing.
/// Echoes the input back, tagged with the record it was "run" against.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoExecutor;

impl EchoExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Executor for EchoExecutor {
    async fn execute(
        &self,
        record: &FunctionRecord,
        input: serde_json::Value,
    ) -> Result<ExecutionOutput, ExecutionError> {
        if !record.verify_integrity() {
            return Err(ExecutionError::Failed {
                key: record.key.to_string(),
                reason: "source does not match its content hash".to_string(),
            });
        }
        Ok(ExecutionOutput {
            key: record.key.clone(),
            artifact_id: record.artifact_id,
            value: input,
        })
    }
}
