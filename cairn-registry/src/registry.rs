//! Registry facade: register, resolve and execute functions by content key.

use std::sync::Arc;

use cairn_core::{
    CairnResult, ExecutionError, FunctionKey, FunctionRecord, ValidationError,
};
use cairn_storage::{BackingStore, Lookup, LookupCoordinator, LookupStatsSnapshot};
use tracing::{debug, info};

use crate::analyzer::{LoopAnalyzer, SelfReferenceAnalyzer};
use crate::executor::{EchoExecutor, ExecutionOutput, Executor};
use crate::hasher::{KeyHasher, Sha256KeyHasher};

/// Outcome of [`FunctionRegistry::register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub record: FunctionRecord,
    /// False when an equivalent source was already registered.
    pub created: bool,
}

/// Content-addressed function registry over a [`LookupCoordinator`].
///
/// # Example
///
/// ```ignore
/// let cache = Arc::new(LookupCoordinator::new(store, CascadeConfig::from_env())?);
/// let registry = FunctionRegistry::new(cache);
///
/// let reg = registry.register("double", "fn double(x) { x * 2 }").await?;
/// let out = registry.execute(&reg.record.key, json!(21)).await?;
/// ```
pub struct FunctionRegistry<S: BackingStore + ?Sized> {
    cache: Arc<LookupCoordinator<S>>,
    hasher: Arc<dyn KeyHasher>,
    analyzer: Arc<dyn LoopAnalyzer>,
    executor: Arc<dyn Executor>,
}

impl<S: BackingStore + ?Sized> FunctionRegistry<S> {
    /// Create a registry with the SHA-256 hasher, the self-reference
    /// analyzer and the echo executor.
    pub fn new(cache: Arc<LookupCoordinator<S>>) -> Self {
        Self {
            cache,
            hasher: Arc::new(Sha256KeyHasher::new()),
            analyzer: Arc::new(SelfReferenceAnalyzer::new()),
            executor: Arc::new(EchoExecutor::new()),
        }
    }

    pub fn with_hasher(mut self, hasher: Arc<dyn KeyHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn LoopAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn cache(&self) -> &LookupCoordinator<S> {
        &self.cache
    }

    /// Register `source` under `name`.
    ///
    /// The key is derived from the source. If that key already resolves, the
    /// stored record is returned unchanged and nothing is written.
    pub async fn register(&self, name: &str, source: &str) -> CairnResult<Registration> {
        if name.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "name".to_string(),
            }
            .into());
        }
        if source.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "source".to_string(),
            }
            .into());
        }
        self.analyzer.analyze(name, source)?;

        let key = self.hasher.hash_source(source);
        if let Lookup::Found { record, tier } = self.cache.get(&key).await? {
            debug!(key = %key, fn_name = name, tier = ?tier, "source already registered");
            return Ok(Registration {
                record,
                created: false,
            });
        }

        let record = FunctionRecord::new(key.clone(), source).with_name(name);
        self.cache.add(&key, record.clone()).await?;
        info!(key = %key, fn_name = name, artifact_id = %record.artifact_id, "function registered");
        Ok(Registration {
            record,
            created: true,
        })
    }

    /// Look up a record by key. `None` is a definitive absence.
    pub async fn resolve(&self, key: &FunctionKey) -> CairnResult<Option<FunctionRecord>> {
        Ok(self.cache.get(key).await?.into())
    }

    /// Validate a raw key string, then [`resolve`](Self::resolve) it.
    pub async fn resolve_str(&self, raw: &str) -> CairnResult<Option<FunctionRecord>> {
        Ok(self.cache.lookup(raw).await?.into())
    }

    /// Resolve `key` and hand the record to the executor.
    pub async fn execute(
        &self,
        key: &FunctionKey,
        input: serde_json::Value,
    ) -> CairnResult<ExecutionOutput> {
        let record = self
            .resolve(key)
            .await?
            .ok_or_else(|| ExecutionError::Failed {
                key: key.to_string(),
                reason: "no function registered under this key".to_string(),
            })?;
        Ok(self.executor.execute(&record, input).await?)
    }

    pub fn stats(&self) -> LookupStatsSnapshot {
        self.cache.stats()
    }
}

impl<S: BackingStore + ?Sized> std::fmt::Debug for FunctionRegistry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
