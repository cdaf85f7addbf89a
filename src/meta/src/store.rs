// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The metadata snapshot store.
//!
//! One compare-and-swap cell per schema. Query paths load the current
//! snapshot with a single atomic pointer read and never block on
//! reconfiguration; writers race through [`SnapshotStore::swap`], which only
//! installs a successor if the caller's snapshot is still the current one.
//! The outer schema map is read-mostly: it is only written when a schema is
//! created or dropped, never during rule changes.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use arc_swap::ArcSwap;
use tracing::info;

use crate::snapshot::MetaDataSnapshot;

/// Owner of the current [`MetaDataSnapshot`] of every known schema.
///
/// All other components hold at most a point-in-time `Arc` of a snapshot;
/// the store holds the only mutable reference, and mutation is full
/// replacement.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    schemas: RwLock<BTreeMap<String, Arc<ArcSwap<MetaDataSnapshot>>>>,
}

impl SnapshotStore {
    pub fn new() -> SnapshotStore {
        SnapshotStore::default()
    }

    /// Registers a schema with its initial snapshot. Returns `false` without
    /// touching anything if the schema already exists.
    pub fn register_schema(&self, snapshot: MetaDataSnapshot) -> bool {
        let mut schemas = self.schemas.write().expect("poisoned");
        let schema = snapshot.schema().to_string();
        if schemas.contains_key(&schema) {
            return false;
        }
        info!(%schema, "registering schema");
        schemas.insert(schema, Arc::new(ArcSwap::from_pointee(snapshot)));
        true
    }

    /// Drops a schema and its snapshot. Returns `false` if it was not known.
    pub fn drop_schema(&self, schema: &str) -> bool {
        let dropped = self
            .schemas
            .write()
            .expect("poisoned")
            .remove(schema)
            .is_some();
        if dropped {
            info!(%schema, "dropped schema");
        }
        dropped
    }

    pub fn schema_names(&self) -> Vec<String> {
        self.schemas
            .read()
            .expect("poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// The current committed snapshot of `schema`, or `None` for an unknown
    /// schema. Never returns a partially built snapshot.
    pub fn read(&self, schema: &str) -> Option<Arc<MetaDataSnapshot>> {
        let cell = Arc::clone(self.schemas.read().expect("poisoned").get(schema)?);
        Some(cell.load_full())
    }

    /// Installs `next` as the current snapshot of `schema` if and only if
    /// the current snapshot is still `expected` (pointer identity). Returns
    /// `false` on conflict or unknown schema; the caller is expected to
    /// re-read, re-validate, and retry.
    pub fn swap(
        &self,
        schema: &str,
        expected: &Arc<MetaDataSnapshot>,
        next: MetaDataSnapshot,
    ) -> bool {
        let cell = {
            let schemas = self.schemas.read().expect("poisoned");
            match schemas.get(schema) {
                Some(cell) => Arc::clone(cell),
                None => return false,
            }
        };
        let prev = cell.compare_and_swap(expected, Arc::new(next));
        Arc::ptr_eq(&prev, expected)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::thread;

    use sp_rdl_types::RuleKind;

    use super::*;
    use crate::config::{BroadcastTableRuleConfiguration, RuleConfiguration};

    fn broadcast(tables: &[&str]) -> RuleConfiguration {
        RuleConfiguration::BroadcastTable(BroadcastTableRuleConfiguration {
            tables: tables.iter().map(|t| t.to_string()).collect(),
        })
    }

    #[test]
    fn swap_requires_the_current_snapshot() {
        let store = SnapshotStore::new();
        assert!(store.register_schema(MetaDataSnapshot::empty("test")));
        assert!(!store.register_schema(MetaDataSnapshot::empty("test")));

        let s0 = store.read("test").unwrap();
        let s1 = s0.with_rule(
            RuleKind::BroadcastTable,
            Some(broadcast(&["t_1"])),
            s0.next_version(),
        );
        assert!(store.swap("test", &s0, s1));

        // A swap against the superseded snapshot must fail and leave the
        // committed snapshot untouched.
        let stale = s0.with_rule(
            RuleKind::BroadcastTable,
            Some(broadcast(&["t_2"])),
            s0.next_version(),
        );
        assert!(!store.swap("test", &s0, stale));
        let current = store.read("test").unwrap();
        assert_eq!(current.version(), 1);
        assert_eq!(
            current
                .rule(RuleKind::BroadcastTable)
                .unwrap()
                .sub_rule_names(),
            BTreeSet::from(["t_1"])
        );
    }

    #[test]
    fn unknown_schema_reads_none_and_swaps_false() {
        let store = SnapshotStore::new();
        assert!(store.read("nope").is_none());
        let orphan = Arc::new(MetaDataSnapshot::empty("nope"));
        assert!(!store.swap("nope", &orphan, MetaDataSnapshot::empty("nope")));
    }

    #[test]
    fn racing_writers_serialize_through_cas() {
        let store = Arc::new(SnapshotStore::new());
        store.register_schema(MetaDataSnapshot::empty("test"));

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                let table = format!("t_{i}");
                loop {
                    let cur = store.read("test").unwrap();
                    let mut tables: BTreeSet<String> = match cur.rule(RuleKind::BroadcastTable) {
                        Some(RuleConfiguration::BroadcastTable(c)) => c.tables.clone(),
                        Some(_) => unreachable!(),
                        None => BTreeSet::new(),
                    };
                    tables.insert(table.clone());
                    let next = cur.with_rule(
                        RuleKind::BroadcastTable,
                        Some(RuleConfiguration::BroadcastTable(
                            BroadcastTableRuleConfiguration { tables },
                        )),
                        cur.next_version(),
                    );
                    if store.swap("test", &cur, next) {
                        break;
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let current = store.read("test").unwrap();
        assert_eq!(current.version(), 8);
        assert_eq!(
            current
                .rule(RuleKind::BroadcastTable)
                .unwrap()
                .sub_rule_names()
                .len(),
            8
        );
    }
}
