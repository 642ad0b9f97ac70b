//! Per-key single-flight gate.
//!
//! A caller that needs the store for a key first takes that key's gate.
//! Concurrent callers for the same key queue behind it and, once inside,
//! re-run the in-memory cascade, which by then usually answers without a
//! second store call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use cairn_core::FunctionKey;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Gate = Arc<AsyncMutex<()>>;

#[derive(Debug, Default)]
pub(crate) struct InflightRegistry {
    gates: Mutex<HashMap<FunctionKey, Gate>>,
}

impl InflightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the gate for `key`, waiting behind any current holder.
    pub async fn acquire(&self, key: &FunctionKey) -> FlightGuard<'_> {
        let gate = {
            let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(gates.entry(key.clone()).or_default())
        };

        // Built before awaiting so a cancelled waiter still cleans up.
        let mut guard = FlightGuard {
            registry: self,
            key: key.clone(),
            gate,
            permit: None,
            waited: false,
        };

        match Arc::clone(&guard.gate).try_lock_owned() {
            Ok(permit) => guard.permit = Some(permit),
            Err(_) => {
                guard.waited = true;
                guard.permit = Some(Arc::clone(&guard.gate).lock_owned().await);
            }
        }
        guard
    }

    /// Number of keys with a live gate.
    pub fn len(&self) -> usize {
        self.gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Exclusive right to talk to the store about one key.
#[derive(Debug)]
pub(crate) struct FlightGuard<'a> {
    registry: &'a InflightRegistry,
    key: FunctionKey,
    gate: Gate,
    permit: Option<OwnedMutexGuard<()>>,
    waited: bool,
}

impl FlightGuard<'_> {
    /// True if another caller held the gate when this one arrived.
    pub fn waited(&self) -> bool {
        self.waited
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        // Release first so the strong count below only sees the map and us.
        self.permit.take();
        let mut gates = self
            .registry
            .gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if Arc::strong_count(&self.gate) == 2 {
            if let Some(current) = gates.get(&self.key) {
                if Arc::ptr_eq(current, &self.gate) {
                    gates.remove(&self.key);
                }
            }
        }
    }
}
