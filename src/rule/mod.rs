//! Routing rules: modes, validation and spec parsing

mod mode;
mod parser;
pub mod validator;

pub use mode::{DnsMatchMode, RouteMode};
pub use parser::{parse_dns_rule_spec, parse_ip_rule_spec, DnsRule, IpRule};
