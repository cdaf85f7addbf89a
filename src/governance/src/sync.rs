// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The governance synchronizer: publish and subscribe flows.
//!
//! Publishing is at-least-once. A registry write happens only after the
//! local snapshot swap committed, and a failed write never rolls that swap
//! back; the local state stays authoritative and the failure surfaces to the
//! caller as a warning. Cross-node inconsistency from a lost publish heals
//! on the next successful publish for the same key.
//!
//! Subscribing applies remote changes through the same compare-and-swap as
//! local writers, so a remote change can never clobber a concurrent local
//! commit. Validation is not re-run: the origin node already validated the
//! change against its snapshot, and this node's snapshot converges to the
//! same rule set.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tracing::{debug, warn};
use uuid::Uuid;

use sp_meta::{SchemaResource, SnapshotStore};

use crate::event::ChangeEvent;
use crate::registry::{keys, Registry, RegistryError};

/// Timing knobs for registry traffic.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Bound on a single registry publish.
    pub publish_timeout: Duration,
    /// Initial delay between remote-apply attempts that lost a swap race.
    /// Doubles per attempt; cross-node races can need time to settle.
    pub apply_backoff: Duration,
    /// Remote-apply attempts before the event is abandoned. A later
    /// notification for the key supersedes an abandoned one.
    pub max_apply_attempts: usize,
}

impl Default for SyncConfig {
    fn default() -> SyncConfig {
        SyncConfig {
            publish_timeout: Duration::from_secs(2),
            apply_backoff: Duration::from_millis(50),
            max_apply_attempts: 8,
        }
    }
}

/// An error from the synchronizer.
///
/// None of these fail a statement: publish errors become warnings on an
/// otherwise successful result, and subscribe errors are logged and healed
/// by later notifications.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("malformed change event: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("remote change for schema '{0}' at version {1} lost to concurrent local writes")]
    ApplyConflict(String, u64),
}

/// Keeps this node's snapshot store and the distributed registry converging
/// on the same configuration.
#[derive(Debug)]
pub struct GovernanceSynchronizer<R> {
    registry: Arc<R>,
    store: Arc<SnapshotStore>,
    node: Uuid,
    config: SyncConfig,
}

impl<R: Registry> GovernanceSynchronizer<R> {
    pub fn new(
        registry: Arc<R>,
        store: Arc<SnapshotStore>,
        config: SyncConfig,
    ) -> GovernanceSynchronizer<R> {
        GovernanceSynchronizer {
            registry,
            store,
            node: Uuid::new_v4(),
            config,
        }
    }

    /// The identity stamped on events this node publishes.
    pub fn node_id(&self) -> Uuid {
        self.node
    }

    /// Publishes a committed change to the registry, bounded by the
    /// configured timeout.
    pub async fn publish(&self, event: &ChangeEvent) -> Result<(), SyncError> {
        let key = event.registry_key();
        let payload = event.encode();
        match time::timeout(self.config.publish_timeout, self.registry.put(&key, payload)).await
        {
            Ok(Ok(())) => {
                debug!(key, version = event.version(), "published change event");
                Ok(())
            }
            Ok(Err(err)) => Err(err.into()),
            Err(_) => Err(RegistryError::Timeout(self.config.publish_timeout).into()),
        }
    }

    /// Runs a standing watch for `schema`, applying remote changes until the
    /// watch stream ends. Callers restart it on a lost registry connection;
    /// replayed notifications after a restart are discarded by version.
    pub async fn run(&self, schema: &str) -> Result<(), SyncError> {
        let mut watch = self.registry.watch(&keys::schema_prefix(schema)).await?;
        while let Some((key, payload)) = watch.recv().await {
            match ChangeEvent::decode(&payload) {
                Ok(event) => {
                    if let Err(err) = self.apply_remote(&event).await {
                        warn!(key, %err, "failed to apply remote change");
                    }
                }
                Err(err) => warn!(key, %err, "discarding malformed change event"),
            }
        }
        debug!(schema, "watch stream ended");
        Ok(())
    }

    /// Applies a remote change event to the local snapshot store. Returns
    /// `Ok(false)` if the event was skipped: self-originated, stale or
    /// duplicate by version, or for a schema this node does not know.
    pub async fn apply_remote(&self, event: &ChangeEvent) -> Result<bool, SyncError> {
        if event.origin() == self.node {
            return Ok(false);
        }
        let schema = event.schema();
        let mut backoff = self.config.apply_backoff;
        for attempt in 0..self.config.max_apply_attempts {
            let Some(current) = self.store.read(schema) else {
                debug!(schema, "ignoring change event for unknown schema");
                return Ok(false);
            };
            if event.version() <= current.version() {
                debug!(
                    schema,
                    event_version = event.version(),
                    local_version = current.version(),
                    "discarding stale change event"
                );
                return Ok(false);
            }
            let next = match event {
                ChangeEvent::RuleChanged {
                    config, version, ..
                } => current.with_rule(config.kind(), Some(config.clone()), *version),
                ChangeEvent::RuleDropped { kind, version, .. } => {
                    current.with_rule(*kind, None, *version)
                }
                ChangeEvent::ResourceChanged {
                    data_sources,
                    version,
                    ..
                } => current.with_resource(SchemaResource::new(data_sources.clone()), *version),
            };
            if self.store.swap(schema, &current, next) {
                debug!(schema, version = event.version(), "applied remote change");
                return Ok(true);
            }
            debug!(schema, attempt, "remote apply lost swap race, backing off");
            time::sleep(backoff).await;
            backoff = backoff.saturating_mul(2);
        }
        Err(SyncError::ApplyConflict(
            schema.to_string(),
            event.version(),
        ))
    }
}
