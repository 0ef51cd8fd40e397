//! In-memory twin store for development and testing.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use herdsync_types::{PatchDocument, PatchOp, TwinAttributes, TwinId, TwinSnapshot};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::traits::TwinStore;

/// Scripted behaviour for the next call of one operation.
#[derive(Debug, Clone)]
pub enum Fault {
    /// Fail the call with this error.
    Fail(StoreError),
    /// Sleep before serving the call normally.
    Delay(Duration),
    /// Another writer sets `field` just before the call is served.
    ExternalWrite { field: String, value: Value },
    /// Serve the call, then sleep before answering.
    StallAfter(Duration),
}

#[derive(Debug, Clone)]
struct StoredTwin {
    version: u64,
    attributes: TwinAttributes,
    /// System keys other than `$dtId` and `$etag`, served back unchanged.
    system: Map<String, Value>,
}

impl StoredTwin {
    fn etag(&self) -> String {
        format!("W/\"{}\"", self.version)
    }
}

/// Twin store held in process memory.
///
/// Patch semantics are strict: `add` on a present path, `replace` on an
/// absent path, or a stale `if_match` all fail with [`StoreError::Conflict`]
/// and leave the twin untouched.
#[derive(Debug, Default)]
pub struct InMemoryTwinStore {
    twins: RwLock<HashMap<TwinId, StoredTwin>>,
    get_faults: Mutex<VecDeque<Fault>>,
    patch_faults: Mutex<VecDeque<Fault>>,
    get_calls: AtomicU64,
    patch_calls: AtomicU64,
    access_denied: AtomicBool,
}

impl InMemoryTwinStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or overwrite a twin.
    pub async fn insert(&self, id: impl Into<TwinId>, attributes: TwinAttributes) {
        self.put(id.into(), attributes, Map::new()).await;
    }

    async fn put(&self, id: TwinId, attributes: TwinAttributes, system: Map<String, Value>) {
        let mut twins = self.twins.write().await;
        let version = twins.get(&id).map(|t| t.version + 1).unwrap_or(1);
        twins.insert(
            id,
            StoredTwin {
                version,
                attributes,
                system,
            },
        );
    }

    /// Load twins from raw documents carrying a `$dtId`.
    pub async fn seed(&self, documents: Vec<Value>) -> StoreResult<usize> {
        let mut count = 0;
        for document in documents {
            let Value::Object(map) = document else {
                return Err(StoreError::Rejected("twin document is not an object".to_string()));
            };
            let id = map
                .get("$dtId")
                .and_then(Value::as_str)
                .map(TwinId::new)
                .ok_or_else(|| StoreError::Rejected("twin document has no $dtId".to_string()))?;
            let mut snapshot = TwinSnapshot::from_document(id.clone(), None, map);
            snapshot.system.remove("$dtId");
            snapshot.system.remove("$etag");
            self.put(id, snapshot.attributes, snapshot.system).await;
            count += 1;
        }
        Ok(count)
    }

    /// Current attributes, bypassing faults and counters.
    pub async fn attributes(&self, id: &TwinId) -> Option<TwinAttributes> {
        self.twins.read().await.get(id).map(|t| t.attributes.clone())
    }

    pub fn push_get_fault(&self, fault: Fault) {
        lock(&self.get_faults).push_back(fault);
    }

    pub fn push_patch_fault(&self, fault: Fault) {
        lock(&self.patch_faults).push_back(fault);
    }

    /// Make `verify_access` fail with an auth error.
    pub fn deny_access(&self) {
        self.access_denied.store(true, Ordering::SeqCst);
    }

    pub fn get_calls(&self) -> u64 {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn patch_calls(&self) -> u64 {
        self.patch_calls.load(Ordering::SeqCst)
    }

    /// Apply the next queued fault. Returns a stall to serve after the call.
    async fn apply_fault(
        &self,
        queue: &Mutex<VecDeque<Fault>>,
        id: &TwinId,
    ) -> StoreResult<Option<Duration>> {
        let fault = lock(queue).pop_front();
        match fault {
            None => Ok(None),
            Some(Fault::StallAfter(stall)) => Ok(Some(stall)),
            Some(Fault::Fail(err)) => Err(err),
            Some(Fault::Delay(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(None)
            }
            Some(Fault::ExternalWrite { field, value }) => {
                let mut twins = self.twins.write().await;
                if let Some(twin) = twins.get_mut(id) {
                    twin.attributes.insert(field, value);
                    twin.version += 1;
                }
                Ok(None)
            }
        }
    }

    fn apply_patch(
        twins: &mut HashMap<TwinId, StoredTwin>,
        id: &TwinId,
        document: &PatchDocument,
        if_match: Option<&str>,
    ) -> StoreResult<()> {
        let twin = twins
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        let conflict = |reason: String| StoreError::Conflict {
            twin_id: id.clone(),
            reason,
        };

        if let Some(expected) = if_match {
            let current = twin.etag();
            if expected != current {
                return Err(conflict(format!("etag {} is now {}", expected, current)));
            }
        }

        for operation in document.operations() {
            let field = operation.field();
            match (operation.op, twin.attributes.contains(&field)) {
                (PatchOp::Add, true) => {
                    return Err(conflict(format!("add on existing path {}", operation.path)));
                }
                (PatchOp::Replace, false) => {
                    return Err(conflict(format!("replace on missing path {}", operation.path)));
                }
                _ => {}
            }
        }

        for operation in document.operations() {
            twin.attributes
                .insert(operation.field(), operation.value.clone());
        }
        twin.version += 1;
        Ok(())
    }
}

fn lock(queue: &Mutex<VecDeque<Fault>>) -> std::sync::MutexGuard<'_, VecDeque<Fault>> {
    queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl TwinStore for InMemoryTwinStore {
    async fn get(&self, id: &TwinId) -> StoreResult<TwinSnapshot> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let stall = self.apply_fault(&self.get_faults, id).await?;

        let snapshot = {
            let twins = self.twins.read().await;
            let twin = twins
                .get(id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            TwinSnapshot::new(id.clone(), Some(twin.etag()), twin.attributes.clone())
                .with_system(twin.system.clone())
        };
        if let Some(stall) = stall {
            tokio::time::sleep(stall).await;
        }
        Ok(snapshot)
    }

    async fn patch(
        &self,
        id: &TwinId,
        document: &PatchDocument,
        if_match: Option<&str>,
    ) -> StoreResult<()> {
        self.patch_calls.fetch_add(1, Ordering::SeqCst);
        let stall = self.apply_fault(&self.patch_faults, id).await?;

        let result = {
            let mut twins = self.twins.write().await;
            Self::apply_patch(&mut twins, id, document, if_match)
        };
        if let Some(stall) = stall {
            tokio::time::sleep(stall).await;
        }
        result
    }

    async fn verify_access(&self) -> StoreResult<()> {
        if self.access_denied.load(Ordering::SeqCst) {
            return Err(StoreError::Auth("access denied".to_string()));
        }
        Ok(())
    }
}
