// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Cross-node propagation of rule configuration changes.
//!
//! Every proxy node is authoritative for its own metadata snapshots; the
//! distributed registry exists to make other nodes' views eventually
//! consistent with committed local changes. The [`GovernanceSynchronizer`]
//! publishes accepted changes to schema-scoped registry keys and, in the
//! other direction, watches those keys and applies remote changes to the
//! local snapshot store with the same compare-and-swap discipline as local
//! writers — but without re-running validation, which the origin node
//! already performed.

pub mod event;
pub mod registry;
pub mod sync;

pub use crate::event::ChangeEvent;
pub use crate::registry::{MemRegistry, Registry, RegistryError, WatchStream};
pub use crate::sync::{GovernanceSynchronizer, SyncConfig, SyncError};
