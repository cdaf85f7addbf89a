// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The rule definition handler.
//!
//! Each invocation runs the same machine: read the schema's current
//! snapshot, validate the statement against it, merge a candidate snapshot,
//! and install it by compare-and-swap. A lost swap means another writer
//! committed in between; the whole sequence restarts from a fresh read, so a
//! statement is never applied against a stale base. Conflicts are expected
//! to be rare and resolve quickly, so retries are immediate and bounded.
//!
//! The only side effects are the swap itself and, after it succeeds, the
//! registry publish. Validation failures and exhausted retries publish
//! nothing.

use std::sync::Arc;

use tracing::{debug, warn};

use sp_governance::{ChangeEvent, GovernanceSynchronizer, Registry, SyncError};
use sp_meta::{AlgorithmRegistry, SnapshotStore};
use sp_rdl_types::RuleDefinitionStatement;

use crate::error::{Error, ErrorKind};
use crate::{merge, validate};

/// Knobs for the handler.
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// Total swap attempts per statement before reporting a conflict.
    pub max_swap_attempts: usize,
}

impl Default for HandlerConfig {
    fn default() -> HandlerConfig {
        HandlerConfig {
            max_swap_attempts: 3,
        }
    }
}

/// Acknowledgment of a successfully applied statement.
#[derive(Debug)]
pub struct UpdateResult {
    /// The version of the snapshot the statement produced.
    pub version: u64,
    /// Set when the local swap committed but the registry publish failed;
    /// the local configuration is correct and authoritative, other nodes
    /// converge on the next successful publish.
    pub warning: Option<SyncError>,
}

impl UpdateResult {
    pub fn is_fully_synchronized(&self) -> bool {
        self.warning.is_none()
    }
}

/// Applies rule definition statements to schema metadata.
///
/// Dependencies arrive by injection; the handler reaches no global context.
#[derive(Debug)]
pub struct RuleDefinitionHandler<R> {
    store: Arc<SnapshotStore>,
    synchronizer: Arc<GovernanceSynchronizer<R>>,
    algorithms: Arc<AlgorithmRegistry>,
    config: HandlerConfig,
}

impl<R: Registry> RuleDefinitionHandler<R> {
    pub fn new(
        store: Arc<SnapshotStore>,
        synchronizer: Arc<GovernanceSynchronizer<R>>,
        algorithms: Arc<AlgorithmRegistry>,
        config: HandlerConfig,
    ) -> RuleDefinitionHandler<R> {
        RuleDefinitionHandler {
            store,
            synchronizer,
            algorithms,
            config,
        }
    }

    /// Validates and applies `stmt` to `schema`.
    ///
    /// On success the new snapshot is visible to every local reader before
    /// this returns, and the change has been offered to the registry. On
    /// failure nothing was applied or published.
    pub async fn execute(
        &self,
        schema: &str,
        stmt: &RuleDefinitionStatement,
    ) -> Result<UpdateResult, Error> {
        for attempt in 0..self.config.max_swap_attempts {
            let snapshot = self
                .store
                .read(schema)
                .ok_or_else(|| Error::new(ErrorKind::UnknownSchema(schema.into())))?;
            validate::check_statement(&snapshot, stmt, &self.algorithms)?;

            let version = snapshot.next_version();
            let origin = self.synchronizer.node_id();
            let (next, event) = match stmt.rule_kind() {
                Some(kind) => {
                    let rules = merge::merge_rules(snapshot.rules(), stmt);
                    let event = match rules.get(&kind) {
                        Some(config) => ChangeEvent::RuleChanged {
                            schema: schema.into(),
                            version,
                            origin,
                            config: config.clone(),
                        },
                        None => ChangeEvent::RuleDropped {
                            schema: schema.into(),
                            version,
                            origin,
                            kind,
                        },
                    };
                    (snapshot.with_rules(rules, version), event)
                }
                None => {
                    let resource = merge::merge_resources(snapshot.resource(), stmt);
                    let event = ChangeEvent::ResourceChanged {
                        schema: schema.into(),
                        version,
                        origin,
                        data_sources: resource.data_sources().clone(),
                    };
                    (snapshot.with_resource(resource, version), event)
                }
            };

            if self.store.swap(schema, &snapshot, next) {
                let warning = match self.synchronizer.publish(&event).await {
                    Ok(()) => None,
                    Err(err) => {
                        warn!(schema, %err, "change committed locally but not published");
                        Some(err)
                    }
                };
                return Ok(UpdateResult { version, warning });
            }
            debug!(schema, attempt, "snapshot swap conflict, retrying from a fresh read");
        }
        Err(Error::new(ErrorKind::ConcurrentModification(schema.into())))
    }
}
