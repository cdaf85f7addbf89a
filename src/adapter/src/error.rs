// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

/// An error applying a rule definition statement.
///
/// Validation errors carry the exact offending names so callers never have
/// to re-derive the cause from a message. They are detected before any
/// mutation and are never retried; only `ConcurrentModification` indicates
/// that re-running the identical statement may succeed.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct Error {
    #[from]
    pub(crate) kind: ErrorKind,
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    #[error("duplicate rule names [{}] in schema '{schema}'", .names.join(", "))]
    DuplicateRuleNames { schema: String, names: Vec<String> },
    #[error("rules [{}] do not exist in schema '{schema}'", .names.join(", "))]
    RuleNotExists { schema: String, names: Vec<String> },
    #[error("data sources [{}] do not exist in schema '{schema}'", .names.join(", "))]
    ResourceNotExisted { schema: String, names: Vec<String> },
    #[error("invalid algorithms [{}]", .names.join(", "))]
    InvalidAlgorithm { names: Vec<String> },
    #[error("duplicate data source names [{}] in schema '{schema}'", .names.join(", "))]
    DuplicateResourceNames { schema: String, names: Vec<String> },
    #[error("data sources [{}] are still referenced by rules in schema '{schema}'", .names.join(", "))]
    ResourceInUse { schema: String, names: Vec<String> },
    #[error("schema '{0}' does not exist")]
    UnknownSchema(String),
    #[error("schema '{0}' was modified concurrently")]
    ConcurrentModification(String),
}

impl Error {
    pub(crate) fn new(kind: ErrorKind) -> Error {
        Error { kind }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Reports additional details about the error, if any are available.
    pub fn detail(&self) -> Option<String> {
        match &self.kind {
            ErrorKind::InvalidAlgorithm { .. } => Some(
                "Algorithm names must match a type registered at proxy startup.".into(),
            ),
            ErrorKind::ResourceInUse { .. } => Some(
                "Drop the referencing rules before dropping the data source.".into(),
            ),
            _ => None,
        }
    }

    /// Reports a hint for the user about how the error could be fixed.
    pub fn hint(&self) -> Option<String> {
        match &self.kind {
            ErrorKind::ConcurrentModification(_) => Some("Retry the statement.".into()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_offending_names() {
        let err = Error::new(ErrorKind::ResourceNotExisted {
            schema: "test".into(),
            names: vec!["ds_write".into()],
        });
        assert_eq!(
            err.to_string(),
            "data sources [ds_write] do not exist in schema 'test'"
        );

        let err = Error::new(ErrorKind::DuplicateRuleNames {
            schema: "test".into(),
            names: vec!["pr_ds".into(), "pr_ds_1".into()],
        });
        assert_eq!(
            err.to_string(),
            "duplicate rule names [pr_ds, pr_ds_1] in schema 'test'"
        );
        assert!(err.detail().is_none());
    }
}
