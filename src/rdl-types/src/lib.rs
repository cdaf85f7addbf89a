// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Statement types for the proxy's rule definition language (RDL).
//!
//! The SQL front end parses rule definition statements into the closed set of
//! variants in [`RuleDefinitionStatement`] before handing them to the rule
//! definition handler. The variants here are plain data: they name the rule
//! kind they target and carry the parsed segments needed to build or identify
//! sub-rules, but all validation and merging behavior lives downstream, where
//! the variants are dispatched over exhaustively.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The kinds of rule configuration a schema can carry.
///
/// Data sources are deliberately not a rule kind: resource statements change
/// a schema's physical data source set, not its rule configurations.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum RuleKind {
    /// Sharding table rules.
    Sharding,
    /// Readwrite-splitting rules.
    ReadwriteSplitting,
    /// Broadcast table rules.
    BroadcastTable,
}

impl RuleKind {
    /// A stable lowercase name, used in registry keys and log output.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Sharding => "sharding",
            RuleKind::ReadwriteSplitting => "readwrite_splitting",
            RuleKind::BroadcastTable => "broadcast_table",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The verb of a rule definition statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdlVerb {
    Create,
    Alter,
    Drop,
}

/// A reference to a pluggable algorithm: a registered type name plus its
/// configuration properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmSegment {
    pub name: String,
    pub props: BTreeMap<String, String>,
}

/// One sharding table rule to create or alter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRuleSegment {
    /// The logical table the rule applies to. Doubles as the sub-rule name.
    pub logical_table: String,
    /// The physical data sources the table is sharded across.
    pub data_sources: Vec<String>,
    /// The column sharded on, if single-column sharding is used.
    pub sharding_column: Option<String>,
    /// The sharding algorithm, if one is named explicitly.
    pub algorithm: Option<AlgorithmSegment>,
}

/// One readwrite-splitting data source group to create or alter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadwriteSplittingRuleSegment {
    /// The sub-rule name.
    pub name: String,
    /// The data source that receives writes.
    pub write_data_source: String,
    /// The data sources reads are balanced across.
    pub read_data_sources: Vec<String>,
    /// The load balance algorithm name. `None` leaves the choice to the
    /// router's default policy.
    pub load_balancer: Option<String>,
    /// Properties for the load balance algorithm.
    pub props: BTreeMap<String, String>,
}

/// One physical data source to register or re-register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceSegment {
    pub name: String,
    pub url: String,
    pub username: String,
    pub password: String,
    pub props: BTreeMap<String, String>,
}

/// A parsed rule definition statement.
///
/// The set is closed: the merger and validators match on it exhaustively, so
/// an unhandled variant is a compile error rather than a runtime fallthrough.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleDefinitionStatement {
    CreateShardingTableRule { rules: Vec<TableRuleSegment> },
    AlterShardingTableRule { rules: Vec<TableRuleSegment> },
    DropShardingTableRule { tables: Vec<String> },
    CreateReadwriteSplittingRule { rules: Vec<ReadwriteSplittingRuleSegment> },
    AlterReadwriteSplittingRule { rules: Vec<ReadwriteSplittingRuleSegment> },
    DropReadwriteSplittingRule { names: Vec<String> },
    CreateBroadcastTableRule { tables: Vec<String> },
    AlterBroadcastTableRule { tables: Vec<String> },
    DropBroadcastTableRule { tables: Vec<String> },
    AddResource { data_sources: Vec<DataSourceSegment> },
    AlterResource { data_sources: Vec<DataSourceSegment> },
    DropResource { names: Vec<String> },
}

impl RuleDefinitionStatement {
    /// The rule kind this statement targets, or `None` for resource
    /// statements.
    pub fn rule_kind(&self) -> Option<RuleKind> {
        use RuleDefinitionStatement::*;
        match self {
            CreateShardingTableRule { .. }
            | AlterShardingTableRule { .. }
            | DropShardingTableRule { .. } => Some(RuleKind::Sharding),
            CreateReadwriteSplittingRule { .. }
            | AlterReadwriteSplittingRule { .. }
            | DropReadwriteSplittingRule { .. } => Some(RuleKind::ReadwriteSplitting),
            CreateBroadcastTableRule { .. }
            | AlterBroadcastTableRule { .. }
            | DropBroadcastTableRule { .. } => Some(RuleKind::BroadcastTable),
            AddResource { .. } | AlterResource { .. } | DropResource { .. } => None,
        }
    }

    pub fn verb(&self) -> DdlVerb {
        use RuleDefinitionStatement::*;
        match self {
            CreateShardingTableRule { .. }
            | CreateReadwriteSplittingRule { .. }
            | CreateBroadcastTableRule { .. }
            | AddResource { .. } => DdlVerb::Create,
            AlterShardingTableRule { .. }
            | AlterReadwriteSplittingRule { .. }
            | AlterBroadcastTableRule { .. }
            | AlterResource { .. } => DdlVerb::Alter,
            DropShardingTableRule { .. }
            | DropReadwriteSplittingRule { .. }
            | DropBroadcastTableRule { .. }
            | DropResource { .. } => DdlVerb::Drop,
        }
    }

    /// The sub-rule (or data source) names this statement creates, alters,
    /// or drops, in statement order.
    pub fn target_names(&self) -> Vec<&str> {
        use RuleDefinitionStatement::*;
        match self {
            CreateShardingTableRule { rules } | AlterShardingTableRule { rules } => {
                rules.iter().map(|r| r.logical_table.as_str()).collect()
            }
            DropShardingTableRule { tables } => tables.iter().map(String::as_str).collect(),
            CreateReadwriteSplittingRule { rules } | AlterReadwriteSplittingRule { rules } => {
                rules.iter().map(|r| r.name.as_str()).collect()
            }
            DropReadwriteSplittingRule { names } => names.iter().map(String::as_str).collect(),
            CreateBroadcastTableRule { tables }
            | AlterBroadcastTableRule { tables }
            | DropBroadcastTableRule { tables } => tables.iter().map(String::as_str).collect(),
            AddResource { data_sources } | AlterResource { data_sources } => {
                data_sources.iter().map(|ds| ds.name.as_str()).collect()
            }
            DropResource { names } => names.iter().map(String::as_str).collect(),
        }
    }

    /// The physical data source names this statement references, in
    /// statement order. Resource statements reference none: they define data
    /// sources rather than use them.
    pub fn referenced_data_sources(&self) -> Vec<&str> {
        use RuleDefinitionStatement::*;
        match self {
            CreateShardingTableRule { rules } | AlterShardingTableRule { rules } => rules
                .iter()
                .flat_map(|r| r.data_sources.iter().map(String::as_str))
                .collect(),
            CreateReadwriteSplittingRule { rules } | AlterReadwriteSplittingRule { rules } => {
                rules
                    .iter()
                    .flat_map(|r| {
                        std::iter::once(r.write_data_source.as_str())
                            .chain(r.read_data_sources.iter().map(String::as_str))
                    })
                    .collect()
            }
            DropShardingTableRule { .. }
            | DropReadwriteSplittingRule { .. }
            | CreateBroadcastTableRule { .. }
            | AlterBroadcastTableRule { .. }
            | DropBroadcastTableRule { .. }
            | AddResource { .. }
            | AlterResource { .. }
            | DropResource { .. } => Vec::new(),
        }
    }

    /// The algorithm names this statement references and therefore requires
    /// to resolve in the algorithm registry. Unnamed algorithms fall back to
    /// the default policy and are not listed.
    pub fn referenced_algorithms(&self) -> Vec<&str> {
        use RuleDefinitionStatement::*;
        match self {
            CreateShardingTableRule { rules } | AlterShardingTableRule { rules } => rules
                .iter()
                .filter_map(|r| r.algorithm.as_ref().map(|a| a.name.as_str()))
                .collect(),
            CreateReadwriteSplittingRule { rules } | AlterReadwriteSplittingRule { rules } => {
                rules
                    .iter()
                    .filter_map(|r| r.load_balancer.as_deref())
                    .collect()
            }
            DropShardingTableRule { .. }
            | DropReadwriteSplittingRule { .. }
            | CreateBroadcastTableRule { .. }
            | AlterBroadcastTableRule { .. }
            | DropBroadcastTableRule { .. }
            | AddResource { .. }
            | AlterResource { .. }
            | DropResource { .. } => Vec::new(),
        }
    }
}
