//! singbox-rules - routing rule editing for a sing-box JSON configuration
//!
//! Turns user rule specs (`domain:google.com`, `192.168.0.0/24`) into validated
//! rules and merges them into the daemon's configuration file with optimistic
//! concurrency and atomic replacement.
//!
//! # Architecture
//!
//! ```text
//!   rule spec + route mode
//!            |
//!     +------v------+
//!     |    rule/    |  RouteMode, validator, parser
//!     +------+------+
//!            | DnsRule / IpRule
//!     +------v------+       +-------------------+
//!     |    app/     +------>|     config/       |
//!     | RuleService |       | ConfigStore.load  |
//!     +------+------+       +---------+---------+
//!            |                        | ConfigHandle
//!            |              +---------v---------+
//!            +------------->| rule-set index    |
//!                           | add / remove      |
//!                           +---------+---------+
//!                                     | changed?
//!                           +---------v---------+
//!                           | ConfigStore.save  |
//!                           | (conflict check,  |
//!                           |  tmp + rename)    |
//!                           +-------------------+
//! ```

pub mod app;
pub mod common;
pub mod config;
pub mod rule;

pub use app::{DnsRuleRequest, IpRuleRequest, RuleService};
pub use common::error::{Error, ErrorKind, Result};
pub use config::{ConfigDocument, ConfigHandle, ConfigStore};
pub use rule::{DnsMatchMode, DnsRule, IpRule, RouteMode};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
