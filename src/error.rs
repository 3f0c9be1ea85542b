//! # Summary
//!
//! Error types surfaced by this crate. Configuration errors are fatal at
//! startup; decode errors only ever cost the offending message.

use std::path::PathBuf;

/// Problems with the peer directory, member identity or CLI configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read peer directory {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid record on line {line}: {record:?} (expected `memberId,host,port`)")]
    Malformed { line: usize, record: String },

    #[error("invalid port on line {line}: {port:?}")]
    InvalidPort { line: usize, port: String },

    #[error("duplicate member {id:?} on line {line}")]
    DuplicateMember { line: usize, id: String },

    #[error("peer directory contains no members")]
    Empty,

    #[error("member {id:?} is not in the peer directory (known: {known:?})")]
    UnknownMember { id: String, known: Vec<String> },

    #[error("members {first:?} and {second:?} share proposer tag {tag}")]
    DuplicateTag { first: String, second: String, tag: u64 },

    #[error("unknown delivery profile {0:?} (expected reliable, standard, latent or failure)")]
    UnknownProfile(String),
}

/// Reasons an inbound wire line could not be turned into a [`crate::Message`].
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("unparseable message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed proposal number {0:?}")]
    ProposalNumber(String),

    #[error("{kind} message is missing field `{field}`")]
    MissingField { kind: &'static str, field: &'static str },

    #[error("PROMISE carries a prior accepted number without a value, or a value without a number")]
    PartialPrior,
}
