// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Immutable, versioned schema metadata snapshots.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sp_rdl_types::RuleKind;

use crate::config::RuleConfiguration;

/// The connection configuration of one physical data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceConfiguration {
    pub url: String,
    pub username: String,
    pub password: String,
    pub props: BTreeMap<String, String>,
}

/// The physical data sources registered for a schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaResource {
    data_sources: BTreeMap<String, DataSourceConfiguration>,
}

impl SchemaResource {
    pub fn new(data_sources: BTreeMap<String, DataSourceConfiguration>) -> SchemaResource {
        SchemaResource { data_sources }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.data_sources.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&DataSourceConfiguration> {
        self.data_sources.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.data_sources.keys().map(String::as_str)
    }

    pub fn data_sources(&self) -> &BTreeMap<String, DataSourceConfiguration> {
        &self.data_sources
    }

    pub fn len(&self) -> usize {
        self.data_sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data_sources.is_empty()
    }
}

/// The full metadata of one schema at a point in time.
///
/// Snapshots are immutable. Every committed change to a schema's rules or
/// resources produces a new snapshot whose `version` is greater than its
/// predecessor's; the version is embedded in change events so that other
/// nodes can discard duplicate and out-of-order registry notifications.
///
/// Invariant, established by validation before any snapshot is committed:
/// every data source name referenced by any rule configuration exists in the
/// snapshot's resource set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaDataSnapshot {
    schema: String,
    version: u64,
    rules: BTreeMap<RuleKind, RuleConfiguration>,
    resource: SchemaResource,
}

impl MetaDataSnapshot {
    /// Creates the initial snapshot of a schema, at version zero.
    pub fn new(
        schema: impl Into<String>,
        rules: BTreeMap<RuleKind, RuleConfiguration>,
        resource: SchemaResource,
    ) -> MetaDataSnapshot {
        MetaDataSnapshot {
            schema: schema.into(),
            version: 0,
            rules,
            resource,
        }
    }

    /// Creates an empty snapshot: no rules, no resources.
    pub fn empty(schema: impl Into<String>) -> MetaDataSnapshot {
        MetaDataSnapshot::new(schema, BTreeMap::new(), SchemaResource::default())
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// The version the next locally committed successor should carry.
    pub fn next_version(&self) -> u64 {
        self.version + 1
    }

    pub fn rules(&self) -> &BTreeMap<RuleKind, RuleConfiguration> {
        &self.rules
    }

    pub fn rule(&self, kind: RuleKind) -> Option<&RuleConfiguration> {
        self.rules.get(&kind)
    }

    pub fn resource(&self) -> &SchemaResource {
        &self.resource
    }

    /// A successor snapshot with the given rule set, at `version`.
    pub fn with_rules(
        &self,
        rules: BTreeMap<RuleKind, RuleConfiguration>,
        version: u64,
    ) -> MetaDataSnapshot {
        MetaDataSnapshot {
            schema: self.schema.clone(),
            version,
            rules,
            resource: self.resource.clone(),
        }
    }

    /// A successor snapshot with one rule kind replaced (`None` drops the
    /// kind), at `version`. Used when applying remote change events, which
    /// carry a single kind's configuration.
    pub fn with_rule(
        &self,
        kind: RuleKind,
        rule: Option<RuleConfiguration>,
        version: u64,
    ) -> MetaDataSnapshot {
        let mut rules = self.rules.clone();
        match rule {
            Some(rule) => {
                assert_eq!(rule.kind(), kind, "rule configuration kind mismatch");
                rules.insert(kind, rule);
            }
            None => {
                rules.remove(&kind);
            }
        }
        self.with_rules(rules, version)
    }

    /// A successor snapshot with the given resource set, at `version`.
    pub fn with_resource(&self, resource: SchemaResource, version: u64) -> MetaDataSnapshot {
        MetaDataSnapshot {
            schema: self.schema.clone(),
            version,
            rules: self.rules.clone(),
            resource,
        }
    }
}
