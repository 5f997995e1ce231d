//! Request-level operations on the routing rules

mod rules;

pub use rules::{DnsRuleRequest, IpRuleRequest, RuleService};
