//! Process-wide runtime context.
//!
//! Owns the shared [`MongoClient`] and the [`ModelRegistry`]. Both are
//! initialized once and shared for the process lifetime; tests can reset
//! the whole context between runs.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use smol_str::SmolStr;

use mooring_schema::{ModelRegistry, RegisteredModel};

use crate::client::MongoClient;
use crate::config::MongoConfig;
use crate::error::{OdmError, OdmResult};
use crate::model::Model;

struct Runtime {
    client: Option<MongoClient>,
    registry: ModelRegistry,
    /// Collections whose declared indexes were already ensured.
    indexed: HashSet<String>,
}

static RUNTIME: Lazy<RwLock<Runtime>> = Lazy::new(|| {
    RwLock::new(Runtime {
        client: None,
        registry: ModelRegistry::new(),
        indexed: HashSet::new(),
    })
});

/// Connect and install the process-wide client.
pub async fn init(config: MongoConfig) -> OdmResult<()> {
    let client = MongoClient::new(config).await?;
    set_client(client);
    Ok(())
}

/// Install a pre-built client as the process-wide connection.
pub fn set_client(client: MongoClient) {
    RUNTIME.write().client = Some(client);
}

/// Get a handle to the process-wide client.
///
/// Errors with a descriptive configuration error if the connection was
/// never initialized.
pub fn client() -> OdmResult<MongoClient> {
    RUNTIME
        .read()
        .client
        .clone()
        .ok_or_else(|| OdmError::config("mooring is not connected; call mooring::init(config) first"))
}

/// Check whether the process-wide client is installed.
pub fn is_connected() -> bool {
    RUNTIME.read().client.is_some()
}

/// Register a model type: validates its schema, derives the shadow schema,
/// and maps the collection name so reference records can be dereferenced
/// by collection name alone.
pub fn register<M: Model>() -> OdmResult<()> {
    RUNTIME
        .write()
        .registry
        .register(M::schema())
        .map_err(OdmError::from)
}

/// Look up a registered model by collection name.
pub fn registered_by_collection(collection: &str) -> Option<RegisteredModel> {
    RUNTIME.read().registry.by_collection(collection).cloned()
}

/// Look up a registered model by model name.
pub fn registered_by_name(name: &str) -> Option<RegisteredModel> {
    RUNTIME.read().registry.by_name(name).cloned()
}

/// The collection a registered model name maps to.
pub fn collection_of(name: &str) -> Option<SmolStr> {
    RUNTIME.read().registry.collection_of(name).cloned()
}

/// Run a closure against the registry.
pub fn with_registry<R>(f: impl FnOnce(&ModelRegistry) -> R) -> R {
    f(&RUNTIME.read().registry)
}

/// Check whether a collection's declared indexes were already ensured.
pub(crate) fn is_indexed(collection: &str) -> bool {
    RUNTIME.read().indexed.contains(collection)
}

/// Record that a collection's declared indexes were ensured. Called only
/// after the indexes are actually in place.
///
/// Returns true the first time a collection is seen, false afterwards.
pub(crate) fn mark_indexed(collection: &str) -> bool {
    RUNTIME.write().indexed.insert(collection.to_string())
}

/// Tear down the whole context: client, registry, and index bookkeeping.
/// Intended for test teardown.
pub fn reset() {
    let mut runtime = RUNTIME.write();
    runtime.client = None;
    runtime.registry.clear();
    runtime.indexed.clear();
}

/// The context is process-wide; unit tests that touch it serialize on this.
#[cfg(test)]
pub(crate) static TEST_LOCK: parking_lot::Mutex<()> = parking_lot::Mutex::new(());
