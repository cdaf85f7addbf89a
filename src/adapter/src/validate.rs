// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Statement validation.
//!
//! Validators answer, for a (snapshot, statement) pair, whether application
//! is legal, and with which precise error if not. Checks run in a fixed
//! order and fail fast: existence preconditions first, then resource
//! references, then algorithm references. Validators never mutate anything;
//! the handler aborts on the first failure with no partial application.

use std::collections::BTreeSet;

use itertools::Itertools;

use sp_meta::{AlgorithmRegistry, MetaDataSnapshot};
use sp_rdl_types::{DdlVerb, RuleDefinitionStatement, RuleKind};

use crate::error::{Error, ErrorKind};

/// Checks that `stmt` can legally be applied to `snapshot`.
pub fn check_statement(
    snapshot: &MetaDataSnapshot,
    stmt: &RuleDefinitionStatement,
    algorithms: &AlgorithmRegistry,
) -> Result<(), Error> {
    match stmt.rule_kind() {
        Some(kind) => check_rule_statement(snapshot, stmt, kind, algorithms),
        None => check_resource_statement(snapshot, stmt),
    }
}

fn check_rule_statement(
    snapshot: &MetaDataSnapshot,
    stmt: &RuleDefinitionStatement,
    kind: RuleKind,
    algorithms: &AlgorithmRegistry,
) -> Result<(), Error> {
    let schema = snapshot.schema();
    let existing: BTreeSet<&str> = snapshot
        .rule(kind)
        .map(|config| config.sub_rule_names())
        .unwrap_or_default();

    match stmt.verb() {
        DdlVerb::Create => {
            let mut seen = BTreeSet::new();
            let duplicates: Vec<String> = stmt
                .target_names()
                .into_iter()
                .filter(|name| !seen.insert(*name) || existing.contains(name))
                .unique()
                .map(String::from)
                .collect();
            if !duplicates.is_empty() {
                return Err(Error::new(ErrorKind::DuplicateRuleNames {
                    schema: schema.into(),
                    names: duplicates,
                }));
            }
        }
        // An Alter of the broadcast rule replaces the whole table set, so
        // the precondition is that a broadcast configuration exists at all,
        // not that the named tables do.
        DdlVerb::Alter if kind == RuleKind::BroadcastTable => {
            if snapshot.rule(kind).is_none() {
                return Err(Error::new(ErrorKind::RuleNotExists {
                    schema: schema.into(),
                    names: stmt.target_names().into_iter().map(String::from).collect(),
                }));
            }
        }
        DdlVerb::Alter | DdlVerb::Drop => {
            let missing: Vec<String> = stmt
                .target_names()
                .into_iter()
                .filter(|name| !existing.contains(name))
                .unique()
                .map(String::from)
                .collect();
            if !missing.is_empty() {
                return Err(Error::new(ErrorKind::RuleNotExists {
                    schema: schema.into(),
                    names: missing,
                }));
            }
        }
    }

    let missing_resources: Vec<String> = stmt
        .referenced_data_sources()
        .into_iter()
        .filter(|name| !snapshot.resource().contains(name))
        .unique()
        .map(String::from)
        .collect();
    if !missing_resources.is_empty() {
        return Err(Error::new(ErrorKind::ResourceNotExisted {
            schema: schema.into(),
            names: missing_resources,
        }));
    }

    let invalid_algorithms: Vec<String> = stmt
        .referenced_algorithms()
        .into_iter()
        .filter(|name| !algorithms.contains(name))
        .unique()
        .map(String::from)
        .collect();
    if !invalid_algorithms.is_empty() {
        return Err(Error::new(ErrorKind::InvalidAlgorithm {
            names: invalid_algorithms,
        }));
    }

    Ok(())
}

fn check_resource_statement(
    snapshot: &MetaDataSnapshot,
    stmt: &RuleDefinitionStatement,
) -> Result<(), Error> {
    let schema = snapshot.schema();
    let resource = snapshot.resource();

    match stmt {
        RuleDefinitionStatement::AddResource { .. } => {
            let mut seen = BTreeSet::new();
            let duplicates: Vec<String> = stmt
                .target_names()
                .into_iter()
                .filter(|name| !seen.insert(*name) || resource.contains(name))
                .unique()
                .map(String::from)
                .collect();
            if !duplicates.is_empty() {
                return Err(Error::new(ErrorKind::DuplicateResourceNames {
                    schema: schema.into(),
                    names: duplicates,
                }));
            }
        }
        RuleDefinitionStatement::AlterResource { .. }
        | RuleDefinitionStatement::DropResource { .. } => {
            let missing: Vec<String> = stmt
                .target_names()
                .into_iter()
                .filter(|name| !resource.contains(name))
                .unique()
                .map(String::from)
                .collect();
            if !missing.is_empty() {
                return Err(Error::new(ErrorKind::ResourceNotExisted {
                    schema: schema.into(),
                    names: missing,
                }));
            }
            if let RuleDefinitionStatement::DropResource { names } = stmt {
                let referenced: BTreeSet<&str> = snapshot
                    .rules()
                    .values()
                    .flat_map(|config| config.referenced_data_sources())
                    .collect();
                let in_use: Vec<String> = names
                    .iter()
                    .filter(|name| referenced.contains(name.as_str()))
                    .unique()
                    .cloned()
                    .collect();
                if !in_use.is_empty() {
                    return Err(Error::new(ErrorKind::ResourceInUse {
                        schema: schema.into(),
                        names: in_use,
                    }));
                }
            }
        }
        _ => unreachable!("rule statement dispatched to the resource validator"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use sp_meta::{
        DataSourceConfiguration, ReadwriteSplittingDataSourceRuleConfiguration,
        ReadwriteSplittingRuleConfiguration, RuleConfiguration, SchemaResource,
    };
    use sp_rdl_types::ReadwriteSplittingRuleSegment;

    use super::*;

    fn data_source() -> DataSourceConfiguration {
        DataSourceConfiguration {
            url: "jdbc:mock".into(),
            username: "root".into(),
            password: "".into(),
            props: BTreeMap::new(),
        }
    }

    fn resources(names: &[&str]) -> SchemaResource {
        SchemaResource::new(
            names
                .iter()
                .map(|name| (name.to_string(), data_source()))
                .collect(),
        )
    }

    fn rws_config(names: &[&str]) -> RuleConfiguration {
        RuleConfiguration::ReadwriteSplitting(ReadwriteSplittingRuleConfiguration {
            data_sources: names
                .iter()
                .map(|name| {
                    (
                        name.to_string(),
                        ReadwriteSplittingDataSourceRuleConfiguration {
                            name: name.to_string(),
                            write_data_source_name: "ds_write".into(),
                            read_data_source_names: vec!["ds_read_0".into()],
                            load_balancer_name: None,
                        },
                    )
                })
                .collect(),
            load_balancers: BTreeMap::new(),
        })
    }

    fn rws_segment(name: &str, balancer: Option<&str>) -> ReadwriteSplittingRuleSegment {
        ReadwriteSplittingRuleSegment {
            name: name.into(),
            write_data_source: "ds_write".into(),
            read_data_sources: vec!["ds_read_0".into(), "ds_read_1".into()],
            load_balancer: balancer.map(Into::into),
            props: BTreeMap::new(),
        }
    }

    fn snapshot_with(rules: &[RuleConfiguration], resource: SchemaResource) -> MetaDataSnapshot {
        MetaDataSnapshot::new(
            "test",
            rules.iter().map(|r| (r.kind(), r.clone())).collect(),
            resource,
        )
    }

    #[test]
    fn create_rejects_duplicate_rule_names() {
        let snapshot = snapshot_with(
            &[rws_config(&["pr_ds"])],
            resources(&["ds_write", "ds_read_0", "ds_read_1"]),
        );
        let stmt = RuleDefinitionStatement::CreateReadwriteSplittingRule {
            rules: vec![rws_segment("pr_ds", Some("TEST"))],
        };
        let err = check_statement(&snapshot, &stmt, &AlgorithmRegistry::standard()).unwrap_err();
        match err.kind() {
            ErrorKind::DuplicateRuleNames { names, .. } => assert_eq!(names, &["pr_ds"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn existence_is_checked_before_resources() {
        // The statement violates both the existence and the resource
        // preconditions; the existence error must win.
        let snapshot = snapshot_with(&[rws_config(&["pr_ds"])], resources(&[]));
        let stmt = RuleDefinitionStatement::CreateReadwriteSplittingRule {
            rules: vec![rws_segment("pr_ds", None)],
        };
        let err = check_statement(&snapshot, &stmt, &AlgorithmRegistry::standard()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::DuplicateRuleNames { .. }));
    }

    #[test]
    fn create_rejects_missing_resources() {
        let snapshot = snapshot_with(&[], resources(&["ds_read_0", "ds_read_1"]));
        let stmt = RuleDefinitionStatement::CreateReadwriteSplittingRule {
            rules: vec![rws_segment("pr_ds", None)],
        };
        let err = check_statement(&snapshot, &stmt, &AlgorithmRegistry::standard()).unwrap_err();
        match err.kind() {
            ErrorKind::ResourceNotExisted { names, .. } => assert_eq!(names, &["ds_write"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn resources_are_checked_before_algorithms() {
        let snapshot = snapshot_with(&[], resources(&[]));
        let stmt = RuleDefinitionStatement::CreateReadwriteSplittingRule {
            rules: vec![rws_segment("pr_ds", Some("notExistLoadBalancer"))],
        };
        let err = check_statement(&snapshot, &stmt, &AlgorithmRegistry::standard()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::ResourceNotExisted { .. }));
    }

    #[test]
    fn create_rejects_unresolved_load_balancers() {
        let snapshot = snapshot_with(
            &[],
            resources(&["ds_write", "ds_read_0", "ds_read_1"]),
        );
        let stmt = RuleDefinitionStatement::CreateReadwriteSplittingRule {
            rules: vec![rws_segment("pr_ds", Some("notExistLoadBalancer"))],
        };
        let err = check_statement(&snapshot, &stmt, &AlgorithmRegistry::standard()).unwrap_err();
        match err.kind() {
            ErrorKind::InvalidAlgorithm { names } => {
                assert_eq!(names, &["notExistLoadBalancer"])
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn alter_requires_existing_rules() {
        let snapshot = snapshot_with(
            &[],
            resources(&["ds_write", "ds_read_0", "ds_read_1"]),
        );
        let stmt = RuleDefinitionStatement::AlterReadwriteSplittingRule {
            rules: vec![rws_segment("pr_ds", None)],
        };
        let err = check_statement(&snapshot, &stmt, &AlgorithmRegistry::standard()).unwrap_err();
        match err.kind() {
            ErrorKind::RuleNotExists { names, .. } => assert_eq!(names, &["pr_ds"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn alter_broadcast_requires_a_current_rule() {
        let snapshot = snapshot_with(&[], resources(&[]));
        let stmt = RuleDefinitionStatement::AlterBroadcastTableRule {
            tables: vec!["t_1".into()],
        };
        let err = check_statement(&snapshot, &stmt, &AlgorithmRegistry::standard()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::RuleNotExists { .. }));
    }

    #[test]
    fn drop_resource_in_use_is_rejected() {
        let snapshot = snapshot_with(
            &[rws_config(&["pr_ds"])],
            resources(&["ds_write", "ds_read_0", "ds_spare"]),
        );
        let stmt = RuleDefinitionStatement::DropResource {
            names: vec!["ds_write".into()],
        };
        let err = check_statement(&snapshot, &stmt, &AlgorithmRegistry::standard()).unwrap_err();
        match err.kind() {
            ErrorKind::ResourceInUse { names, .. } => assert_eq!(names, &["ds_write"]),
            other => panic!("unexpected error: {other:?}"),
        }

        let stmt = RuleDefinitionStatement::DropResource {
            names: vec!["ds_spare".into()],
        };
        check_statement(&snapshot, &stmt, &AlgorithmRegistry::standard()).unwrap();
    }

    #[test]
    fn add_resource_rejects_duplicates() {
        let snapshot = snapshot_with(&[], resources(&["ds_0"]));
        let stmt = RuleDefinitionStatement::AddResource {
            data_sources: vec![sp_rdl_types::DataSourceSegment {
                name: "ds_0".into(),
                url: "jdbc:mock".into(),
                username: "root".into(),
                password: "".into(),
                props: BTreeMap::new(),
            }],
        };
        let err = check_statement(&snapshot, &stmt, &AlgorithmRegistry::standard()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::DuplicateResourceNames { .. }));
    }
}
