// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Schema metadata for the proxy.
//!
//! A schema's metadata is an immutable [`MetaDataSnapshot`]: its rule
//! configurations plus its registered physical data sources, stamped with a
//! logical version. The [`SnapshotStore`] owns the current snapshot of every
//! schema and replaces snapshots wholesale via compare-and-swap; nothing in
//! the system mutates a snapshot in place, so concurrent readers always
//! observe either the pre-change or the post-change metadata.

pub mod algorithm;
pub mod config;
pub mod snapshot;
pub mod store;

pub use crate::algorithm::AlgorithmRegistry;
pub use crate::config::{
    AlgorithmConfiguration, BroadcastTableRuleConfiguration,
    ReadwriteSplittingDataSourceRuleConfiguration, ReadwriteSplittingRuleConfiguration,
    RuleConfiguration, ShardingRuleConfiguration, ShardingTableRuleConfiguration,
};
pub use crate::snapshot::{DataSourceConfiguration, MetaDataSnapshot, SchemaResource};
pub use crate::store::SnapshotStore;
