//! Fuzzy vendor matching connector.
//!
//! Answers one question for an inbound business document: which known vendor
//! record, if any, matches the partial identifying fields (name, address,
//! tax id) extracted from it. The reference dataset lives in Postgres and is
//! queried through a self-reconnecting executor, so transient connection loss
//! never surfaces to the document pipeline.
//!
//! The crate is the protocol core; the HTTP surface lives in the
//! `vendor-match-web` crate.

pub mod annotation;
pub mod config;
pub mod error;
pub mod import;
pub mod matching;
pub mod policy;
pub mod store;
pub mod webhook;

pub use config::ConnectorConfig;
pub use error::{ConnectorError, RequestShapeError, StoreError};
pub use matching::{
    MatchCriteria, MatchEngine, MatchOutcome, VendorCandidate, NO_MATCH_SENTINEL,
};
pub use store::{PgVendorStore, VendorRecord, VendorStore};
pub use webhook::{VendorMatchHandler, WebhookRequest, WebhookResponse};
