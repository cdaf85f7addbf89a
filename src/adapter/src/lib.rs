// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Application of rule definition statements.
//!
//! The transport layer hands this crate an already-parsed
//! [`RuleDefinitionStatement`](sp_rdl_types::RuleDefinitionStatement); the
//! [`RuleDefinitionHandler`] validates it against the schema's current
//! metadata snapshot, merges it into a new snapshot, installs the snapshot
//! by compare-and-swap, and publishes the committed change to the rest of
//! the cluster. Validation failures, conflict exhaustion, and
//! synchronization warnings each surface as distinct structured results;
//! nothing is ever partially applied.

pub mod error;
pub mod handler;
pub mod merge;
pub mod validate;

pub use crate::error::{Error, ErrorKind};
pub use crate::handler::{HandlerConfig, RuleDefinitionHandler, UpdateResult};
