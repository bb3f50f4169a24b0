//! hivegrid-view — the cluster-wide app view.
//!
//! Each node reports the app versions it hosts. This crate merges those
//! reports into one deterministic structure:
//!
//! ```text
//! Vec<AppGroup>                 sorted by name
//!   └── Vec<VersionGroup>       sorted by version weight
//!         └── Vec<ClusterMember> one per node, sorted by IP
//! ```
//!
//! Nodes that did not report a version are filled in with status `none`,
//! so every version lists the whole cluster.

pub mod merge;
pub mod types;

pub use merge::{merge_app_info, status_summary};
pub use types::{AppGroup, AppReport, ClusterMember, MemberStatus, VersionGroup};
