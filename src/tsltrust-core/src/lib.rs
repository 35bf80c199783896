//! # tsltrust-core
//!
//! Trust status list handling: parse ETSI TS 119 612 lists, verify their
//! enveloped XML signatures, follow pointers between lists, and track which
//! instance of each list is current.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PointerResolver                          │
//! │                                                             │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐       │
//! │  │  TslFetcher  │  │ TrustStatus- │  │  Signature-  │       │
//! │  │  (timeout)   │─►│ List::parse  │─►│  Verifier    │       │
//! │  └──────────────┘  └──────────────┘  └──────────────┘       │
//! │                           │                 │               │
//! │                           ▼                 ▼               │
//! │  ┌──────────────────────────────────────────────────┐       │
//! │  │                  TrustGraph                      │       │
//! │  │   (nodes by fingerprint, edges with status)      │       │
//! │  └──────────────────────────────────────────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//!                             │
//!                             ▼
//!   ┌──────────────────────────────────────────────────┐
//!   │                FreshnessTracker                  │
//!   │      (sequence ordering, stale detection)        │
//!   └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Properties
//!
//! - **Tolerant parsing**: only malformed XML or a wrong root element fail;
//!   missing fields degrade to empty values
//! - **Outcomes, not errors**: bad signatures, unreachable pointers and
//!   version anomalies are reported as data
//! - **Immutable lists**: a parsed list never changes and can be shared
//!   across threads

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::pedantic)] // Too strict for production code
#![allow(clippy::doc_markdown)] // Allow element names without backticks
#![allow(clippy::missing_errors_doc)] // Error documentation not required
#![allow(clippy::module_name_repetitions)] // Allow Type in module::Type
#![allow(clippy::must_use_candidate)] // Not all functions need must_use

pub mod c14n;
pub mod config;
pub mod document;
pub mod error;
pub mod fetch;
pub mod freshness;
pub mod graph;
pub mod locale;
pub mod pointer;
pub mod provider;
pub mod resolver;
pub mod signature;
pub mod xml;

pub use config::TrustConfig;
pub use document::{ListSummary, TrustStatusList};
pub use error::TrustError;
pub use fetch::{FetchError, HttpsFetcher, TslFetcher};
pub use freshness::{compare, is_stale, FreshnessReport, FreshnessTracker, ListId};
pub use graph::{
    EdgeStatus, NodeKey, NodeState, ResolutionSummary, TrustEdge, TrustGraph, TrustNode,
};
pub use locale::{Language, LocalizedString};
pub use pointer::{HintCheck, OtherTslPointer};
pub use provider::{
    Address, DigitalIdentity, PostalAddress, ServiceHistoryEntry, TrustService,
    TrustServiceProvider,
};
pub use resolver::PointerResolver;
pub use signature::{
    has_signature, SignatureVerifier, SignerIdentity, VerificationResult, VerificationStatus,
};
pub use tokio_util::sync::CancellationToken;
