// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The registry of pluggable algorithm types.
//!
//! Rule configurations reference load balance and sharding algorithms by
//! type name; validation only needs to know whether a name resolves. The
//! registry is populated at bootstrap (built-ins plus any plugins) and is
//! immutable afterwards, so it can be shared freely across handlers.

use std::collections::BTreeSet;

/// Known algorithm type names.
#[derive(Debug, Clone, Default)]
pub struct AlgorithmRegistry {
    types: BTreeSet<String>,
}

impl AlgorithmRegistry {
    /// An empty registry. Useful in tests that exercise resolution failures.
    pub fn empty() -> AlgorithmRegistry {
        AlgorithmRegistry::default()
    }

    /// The registry with the built-in algorithm types.
    pub fn standard() -> AlgorithmRegistry {
        let mut registry = AlgorithmRegistry::empty();
        for ty in ["ROUND_ROBIN", "RANDOM", "WEIGHT", "MOD", "HASH_MOD", "INLINE"] {
            registry.register(ty);
        }
        registry
    }

    pub fn register(&mut self, algorithm_type: impl Into<String>) {
        self.types.insert(algorithm_type.into());
    }

    pub fn contains(&self, algorithm_type: &str) -> bool {
        self.types.contains(algorithm_type)
    }
}
