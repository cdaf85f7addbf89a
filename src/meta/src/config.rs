// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Rule configurations.
//!
//! A rule configuration is the declarative policy for one concern attached to
//! a logical schema. Each holds its named sub-rules keyed by name, so name
//! uniqueness within a configuration holds by construction. Configurations
//! are immutable once built; the merger produces new instances rather than
//! editing in place.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use sp_rdl_types::RuleKind;

/// A configured algorithm instance: its registered type name and properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmConfiguration {
    pub algorithm_type: String,
    pub props: BTreeMap<String, String>,
}

/// The sharding policy for one logical table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardingTableRuleConfiguration {
    pub logical_table: String,
    pub data_sources: Vec<String>,
    pub sharding_column: Option<String>,
    pub algorithm: Option<AlgorithmConfiguration>,
}

/// Sharding rules for a schema, keyed by logical table name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardingRuleConfiguration {
    pub tables: BTreeMap<String, ShardingTableRuleConfiguration>,
}

/// One readwrite-splitting data source group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadwriteSplittingDataSourceRuleConfiguration {
    pub name: String,
    pub write_data_source_name: String,
    pub read_data_source_names: Vec<String>,
    /// Names an entry in the owning configuration's `load_balancers`. `None`
    /// leaves read selection to the router's default policy.
    pub load_balancer_name: Option<String>,
}

/// Readwrite-splitting rules for a schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadwriteSplittingRuleConfiguration {
    pub data_sources: BTreeMap<String, ReadwriteSplittingDataSourceRuleConfiguration>,
    pub load_balancers: BTreeMap<String, AlgorithmConfiguration>,
}

/// Tables replicated in full to every shard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastTableRuleConfiguration {
    pub tables: BTreeSet<String>,
}

/// The rule configuration of one kind for one schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleConfiguration {
    Sharding(ShardingRuleConfiguration),
    ReadwriteSplitting(ReadwriteSplittingRuleConfiguration),
    BroadcastTable(BroadcastTableRuleConfiguration),
}

impl RuleConfiguration {
    pub fn kind(&self) -> RuleKind {
        match self {
            RuleConfiguration::Sharding(_) => RuleKind::Sharding,
            RuleConfiguration::ReadwriteSplitting(_) => RuleKind::ReadwriteSplitting,
            RuleConfiguration::BroadcastTable(_) => RuleKind::BroadcastTable,
        }
    }

    /// Whether the configuration has no sub-rules left. Emptied
    /// configurations are dropped from the schema's rule set rather than
    /// retained as shells.
    pub fn is_empty(&self) -> bool {
        match self {
            RuleConfiguration::Sharding(c) => c.tables.is_empty(),
            RuleConfiguration::ReadwriteSplitting(c) => c.data_sources.is_empty(),
            RuleConfiguration::BroadcastTable(c) => c.tables.is_empty(),
        }
    }

    /// The names of the sub-rules in this configuration.
    pub fn sub_rule_names(&self) -> BTreeSet<&str> {
        match self {
            RuleConfiguration::Sharding(c) => c.tables.keys().map(String::as_str).collect(),
            RuleConfiguration::ReadwriteSplitting(c) => {
                c.data_sources.keys().map(String::as_str).collect()
            }
            RuleConfiguration::BroadcastTable(c) => {
                c.tables.iter().map(String::as_str).collect()
            }
        }
    }

    /// Every physical data source name the configuration references.
    pub fn referenced_data_sources(&self) -> BTreeSet<&str> {
        match self {
            RuleConfiguration::Sharding(c) => c
                .tables
                .values()
                .flat_map(|t| t.data_sources.iter().map(String::as_str))
                .collect(),
            RuleConfiguration::ReadwriteSplitting(c) => c
                .data_sources
                .values()
                .flat_map(|ds| {
                    std::iter::once(ds.write_data_source_name.as_str())
                        .chain(ds.read_data_source_names.iter().map(String::as_str))
                })
                .collect(),
            RuleConfiguration::BroadcastTable(_) => BTreeSet::new(),
        }
    }
}
