//! hive-core — shared building blocks for the HiveGrid console.
//!
//! - **`ident`** — app package identifiers (`name_x.y.z_build`) and the
//!   weight encoding that orders versions and builds.
//! - **`config`** — the console's cluster registry, loaded from TOML.

pub mod config;
pub mod ident;

pub use config::{ClusterConfig, ConfigError, ConsoleConfig};
pub use ident::{AppIdentifier, IdentError, weight};
