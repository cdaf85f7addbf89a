// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Change events.
//!
//! One tagged union covers every kind of configuration change a node can
//! publish; consumers dispatch by matching on the variant. The `origin`
//! field identifies the publishing node so subscribers can skip
//! notifications for changes they made themselves, and `version` is the
//! logical version of the snapshot the change produced, used to discard
//! duplicate and out-of-order registry deliveries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sp_meta::{DataSourceConfiguration, RuleConfiguration};
use sp_rdl_types::RuleKind;

use crate::registry::keys;

/// A committed configuration change, as published to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeEvent {
    /// A rule configuration was created or replaced.
    RuleChanged {
        schema: String,
        version: u64,
        origin: Uuid,
        config: RuleConfiguration,
    },
    /// A rule kind was dropped from the schema entirely.
    RuleDropped {
        schema: String,
        version: u64,
        origin: Uuid,
        kind: RuleKind,
    },
    /// The schema's data source set changed.
    ResourceChanged {
        schema: String,
        version: u64,
        origin: Uuid,
        data_sources: BTreeMap<String, DataSourceConfiguration>,
    },
}

impl ChangeEvent {
    pub fn schema(&self) -> &str {
        match self {
            ChangeEvent::RuleChanged { schema, .. }
            | ChangeEvent::RuleDropped { schema, .. }
            | ChangeEvent::ResourceChanged { schema, .. } => schema,
        }
    }

    pub fn version(&self) -> u64 {
        match self {
            ChangeEvent::RuleChanged { version, .. }
            | ChangeEvent::RuleDropped { version, .. }
            | ChangeEvent::ResourceChanged { version, .. } => *version,
        }
    }

    pub fn origin(&self) -> Uuid {
        match self {
            ChangeEvent::RuleChanged { origin, .. }
            | ChangeEvent::RuleDropped { origin, .. }
            | ChangeEvent::ResourceChanged { origin, .. } => *origin,
        }
    }

    /// The registry key this event is published under.
    pub fn registry_key(&self) -> String {
        match self {
            ChangeEvent::RuleChanged { schema, config, .. } => {
                keys::rule_key(schema, config.kind())
            }
            ChangeEvent::RuleDropped { schema, kind, .. } => keys::rule_key(schema, *kind),
            ChangeEvent::ResourceChanged { schema, .. } => keys::resource_key(schema),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("change event serialization cannot fail")
    }

    pub fn decode(bytes: &[u8]) -> Result<ChangeEvent, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_roundtrip() {
        let event = ChangeEvent::RuleDropped {
            schema: "test".into(),
            version: 7,
            origin: Uuid::new_v4(),
            kind: RuleKind::ReadwriteSplitting,
        };
        let decoded = ChangeEvent::decode(&event.encode()).unwrap();
        assert_eq!(decoded, event);
        assert_eq!(
            decoded.registry_key(),
            "metadata/test/rules/readwrite_splitting"
        );
    }
}
