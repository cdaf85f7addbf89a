// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The distributed registry interface.
//!
//! The registry is a key/value store with prefix watches, the coordination
//! primitive the cluster shares (ZooKeeper, etcd, or similar behind a real
//! deployment). The core only relies on the contract expressed by
//! [`Registry`]: durable `put`, point `get`, and a restartable notification
//! stream that may deliver duplicates and reordered updates across
//! reconnects — consumers de-duplicate by the logical version embedded in
//! the payload.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use sp_rdl_types::RuleKind;

/// Notifications from a registry watch: `(key, new value)` pairs.
pub type WatchStream = UnboundedReceiver<(String, Vec<u8>)>;

/// An error from the registry.
///
/// Registry errors are deliberately coarse. The synchronizer treats them all
/// the same way: the local swap stands, the failure surfaces as a warning.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("registry unavailable: {0}")]
    Unavailable(String),
    #[error("registry request timed out after {0:?}")]
    Timeout(Duration),
}

/// A distributed key/value store with prefix watches.
#[async_trait]
pub trait Registry: Debug + Send + Sync + 'static {
    /// Durably stores `value` under `key`, replacing any existing value.
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), RegistryError>;

    /// Reads the current value of `key`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RegistryError>;

    /// Opens a standing watch over every key under `key_prefix`. The stream
    /// ends when the connection is lost; callers restart it and must
    /// tolerate replayed notifications after doing so.
    async fn watch(&self, key_prefix: &str) -> Result<WatchStream, RegistryError>;
}

/// Registry key layout. One key per (schema, rule kind) pair plus one key
/// for the schema's data source set; keys are opaque to everything else.
pub mod keys {
    use super::RuleKind;

    pub fn schema_prefix(schema: &str) -> String {
        format!("metadata/{schema}")
    }

    pub fn rule_key(schema: &str, kind: RuleKind) -> String {
        format!("metadata/{schema}/rules/{kind}")
    }

    pub fn resource_key(schema: &str) -> String {
        format!("metadata/{schema}/data_sources")
    }
}

/// An in-process [`Registry`], used by tests and single-node deployments.
///
/// A new watch first replays the current value of every key under its
/// prefix, mirroring the resync a real registry client performs on
/// (re)connect, then receives every subsequent matching `put`. Closed
/// watchers are dropped lazily on the next notification.
#[derive(Debug, Default)]
pub struct MemRegistry {
    state: Mutex<MemRegistryState>,
}

#[derive(Debug, Default)]
struct MemRegistryState {
    entries: BTreeMap<String, Vec<u8>>,
    watchers: Vec<(String, UnboundedSender<(String, Vec<u8>)>)>,
}

impl MemRegistry {
    pub fn new() -> MemRegistry {
        MemRegistry::default()
    }
}

#[async_trait]
impl Registry for MemRegistry {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), RegistryError> {
        let mut state = self.state.lock().expect("poisoned");
        state.entries.insert(key.to_string(), value.clone());
        state.watchers.retain(|(prefix, tx)| {
            if !key.starts_with(prefix.as_str()) {
                return true;
            }
            tx.send((key.to_string(), value.clone())).is_ok()
        });
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RegistryError> {
        let state = self.state.lock().expect("poisoned");
        Ok(state.entries.get(key).cloned())
    }

    async fn watch(&self, key_prefix: &str) -> Result<WatchStream, RegistryError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock().expect("poisoned");
        for (key, value) in state.entries.range(key_prefix.to_string()..) {
            if !key.starts_with(key_prefix) {
                break;
            }
            let _ = tx.send((key.clone(), value.clone()));
        }
        state.watchers.push((key_prefix.to_string(), tx));
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_roundtrip() {
        let registry = MemRegistry::new();
        assert_eq!(registry.get("metadata/test").await.unwrap(), None);
        registry.put("metadata/test", b"v1".to_vec()).await.unwrap();
        registry
            .put("metadata/test", b"v2".to_vec())
            .await
            .unwrap();
        assert_eq!(
            registry.get("metadata/test").await.unwrap(),
            Some(b"v2".to_vec())
        );
    }

    #[tokio::test]
    async fn watch_sees_prefixed_puts_only() {
        let registry = MemRegistry::new();
        let mut watch = registry.watch(&keys::schema_prefix("test")).await.unwrap();

        registry
            .put(&keys::rule_key("test", RuleKind::BroadcastTable), b"a".to_vec())
            .await
            .unwrap();
        registry
            .put(&keys::rule_key("other", RuleKind::BroadcastTable), b"b".to_vec())
            .await
            .unwrap();
        registry
            .put(&keys::resource_key("test"), b"c".to_vec())
            .await
            .unwrap();

        let (key, value) = watch.recv().await.unwrap();
        assert_eq!(key, "metadata/test/rules/broadcast_table");
        assert_eq!(value, b"a");
        let (key, value) = watch.recv().await.unwrap();
        assert_eq!(key, "metadata/test/data_sources");
        assert_eq!(value, b"c");
    }
}
