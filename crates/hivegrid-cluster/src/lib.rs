//! hivegrid-cluster — authenticated access to HiveGrid cluster nodes.
//!
//! Every admin request carries an HMAC-SHA1 signature over its method,
//! content hash, content type, date and path. The cluster node recomputes
//! the signature with the shared secret and rejects mismatches.
//!
//! # Architecture
//!
//! ```text
//! ClusterClient
//!   ├── app_status() → merge_app_info() → Vec<AppGroup>
//!   ├── app_config() / set_app_config()
//!   └── RemoteCaller (one per cluster)
//!         ├── prepare(): append ips=, signer::sign()
//!         └── call(): TCP (+ TLS) → hyper http1 → JSON
//! ```
//!
//! Requests are sent once. Failures come back as [`CallError`]; nothing
//! is retried, and a timeout covers connect, send and body read together.

pub mod client;
pub mod error;
pub mod query;
pub mod remote;
pub mod signer;
pub mod tls;

pub use client::{ClusterClient, broadcast};
pub use error::{CallError, CallResult, SignError};
pub use remote::{ClusterTarget, RemoteCaller, RemoteRequest, call_remote};
pub use signer::{RequestDescriptor, SignedRequest, sign, verify};
