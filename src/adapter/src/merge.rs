// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The configuration merger.
//!
//! Pure transformations from (current configuration, statement) to a new
//! configuration. The merger performs no I/O, consults no registry, and
//! never mutates its inputs, so every merge is testable by plain value
//! comparison. Statements reaching the merger have already been validated;
//! the merger's own preconditions are programmer errors, not runtime
//! conditions.

use std::collections::{BTreeMap, BTreeSet};

use sp_meta::{
    AlgorithmConfiguration, BroadcastTableRuleConfiguration, DataSourceConfiguration,
    ReadwriteSplittingDataSourceRuleConfiguration, ReadwriteSplittingRuleConfiguration,
    RuleConfiguration, SchemaResource, ShardingRuleConfiguration,
    ShardingTableRuleConfiguration,
};
use sp_rdl_types::{
    DataSourceSegment, ReadwriteSplittingRuleSegment, RuleDefinitionStatement, RuleKind,
    TableRuleSegment,
};

/// Merges a validated rule statement into `current`, returning the schema's
/// new rule set. A rule configuration emptied by a drop is removed from the
/// set entirely.
///
/// Panics if handed a resource statement; those are merged by
/// [`merge_resources`].
pub fn merge_rules(
    current: &BTreeMap<RuleKind, RuleConfiguration>,
    stmt: &RuleDefinitionStatement,
) -> BTreeMap<RuleKind, RuleConfiguration> {
    use RuleDefinitionStatement::*;

    let mut rules = current.clone();
    let merged = match stmt {
        CreateShardingTableRule { rules: segments } | AlterShardingTableRule { rules: segments } => {
            let mut config = sharding_config(&rules);
            for segment in segments {
                config
                    .tables
                    .insert(segment.logical_table.clone(), build_table_rule(segment));
            }
            RuleConfiguration::Sharding(config)
        }
        DropShardingTableRule { tables } => {
            let mut config = sharding_config(&rules);
            for table in tables {
                config.tables.remove(table);
            }
            RuleConfiguration::Sharding(config)
        }
        CreateReadwriteSplittingRule { rules: segments }
        | AlterReadwriteSplittingRule { rules: segments } => {
            let mut config = readwrite_splitting_config(&rules);
            for segment in segments {
                config
                    .data_sources
                    .insert(segment.name.clone(), build_readwrite_splitting_rule(segment));
                if let Some(balancer) = &segment.load_balancer {
                    config.load_balancers.insert(
                        balancer.clone(),
                        AlgorithmConfiguration {
                            algorithm_type: balancer.clone(),
                            props: segment.props.clone(),
                        },
                    );
                }
            }
            collect_balancers(&mut config);
            RuleConfiguration::ReadwriteSplitting(config)
        }
        DropReadwriteSplittingRule { names } => {
            let mut config = readwrite_splitting_config(&rules);
            for name in names {
                config.data_sources.remove(name);
            }
            collect_balancers(&mut config);
            RuleConfiguration::ReadwriteSplitting(config)
        }
        CreateBroadcastTableRule { tables } => {
            let mut config = broadcast_config(&rules);
            config.tables.extend(tables.iter().cloned());
            RuleConfiguration::BroadcastTable(config)
        }
        // Alter replaces the broadcast table set wholesale.
        AlterBroadcastTableRule { tables } => {
            RuleConfiguration::BroadcastTable(BroadcastTableRuleConfiguration {
                tables: tables.iter().cloned().collect(),
            })
        }
        DropBroadcastTableRule { tables } => {
            let mut config = broadcast_config(&rules);
            for table in tables {
                config.tables.remove(table);
            }
            RuleConfiguration::BroadcastTable(config)
        }
        AddResource { .. } | AlterResource { .. } | DropResource { .. } => {
            unreachable!("resource statement reached the rule merger")
        }
    };

    if merged.is_empty() {
        rules.remove(&merged.kind());
    } else {
        rules.insert(merged.kind(), merged);
    }
    rules
}

/// Merges a validated resource statement into `current`, returning the
/// schema's new data source set.
///
/// Panics if handed a rule statement; those are merged by [`merge_rules`].
pub fn merge_resources(
    current: &SchemaResource,
    stmt: &RuleDefinitionStatement,
) -> SchemaResource {
    use RuleDefinitionStatement::*;

    let mut data_sources = current.data_sources().clone();
    match stmt {
        AddResource {
            data_sources: segments,
        }
        | AlterResource {
            data_sources: segments,
        } => {
            for segment in segments {
                data_sources.insert(segment.name.clone(), build_data_source(segment));
            }
        }
        DropResource { names } => {
            for name in names {
                data_sources.remove(name);
            }
        }
        _ => unreachable!("rule statement reached the resource merger"),
    }
    SchemaResource::new(data_sources)
}

fn sharding_config(rules: &BTreeMap<RuleKind, RuleConfiguration>) -> ShardingRuleConfiguration {
    match rules.get(&RuleKind::Sharding) {
        Some(RuleConfiguration::Sharding(config)) => config.clone(),
        Some(other) => unreachable!("sharding slot held {:?}", other.kind()),
        None => ShardingRuleConfiguration::default(),
    }
}

fn readwrite_splitting_config(
    rules: &BTreeMap<RuleKind, RuleConfiguration>,
) -> ReadwriteSplittingRuleConfiguration {
    match rules.get(&RuleKind::ReadwriteSplitting) {
        Some(RuleConfiguration::ReadwriteSplitting(config)) => config.clone(),
        Some(other) => unreachable!("readwrite-splitting slot held {:?}", other.kind()),
        None => ReadwriteSplittingRuleConfiguration::default(),
    }
}

fn broadcast_config(
    rules: &BTreeMap<RuleKind, RuleConfiguration>,
) -> BroadcastTableRuleConfiguration {
    match rules.get(&RuleKind::BroadcastTable) {
        Some(RuleConfiguration::BroadcastTable(config)) => config.clone(),
        Some(other) => unreachable!("broadcast slot held {:?}", other.kind()),
        None => BroadcastTableRuleConfiguration::default(),
    }
}

fn build_table_rule(segment: &TableRuleSegment) -> ShardingTableRuleConfiguration {
    ShardingTableRuleConfiguration {
        logical_table: segment.logical_table.clone(),
        data_sources: segment.data_sources.clone(),
        sharding_column: segment.sharding_column.clone(),
        algorithm: segment.algorithm.as_ref().map(|algorithm| {
            AlgorithmConfiguration {
                algorithm_type: algorithm.name.clone(),
                props: algorithm.props.clone(),
            }
        }),
    }
}

fn build_readwrite_splitting_rule(
    segment: &ReadwriteSplittingRuleSegment,
) -> ReadwriteSplittingDataSourceRuleConfiguration {
    ReadwriteSplittingDataSourceRuleConfiguration {
        name: segment.name.clone(),
        write_data_source_name: segment.write_data_source.clone(),
        read_data_source_names: segment.read_data_sources.clone(),
        load_balancer_name: segment.load_balancer.clone(),
    }
}

fn build_data_source(segment: &DataSourceSegment) -> DataSourceConfiguration {
    DataSourceConfiguration {
        url: segment.url.clone(),
        username: segment.username.clone(),
        password: segment.password.clone(),
        props: segment.props.clone(),
    }
}

/// Drops load balancer entries no sub-rule references anymore.
fn collect_balancers(config: &mut ReadwriteSplittingRuleConfiguration) {
    let referenced: BTreeSet<String> = config
        .data_sources
        .values()
        .filter_map(|ds| ds.load_balancer_name.clone())
        .collect();
    config
        .load_balancers
        .retain(|name, _| referenced.contains(name));
}
