//! Rule spec parsing
//!
//! DNS spec grammar: `[<type>:]<value>` where `<type>` is one of
//! `full`, `domain`, `keyword`, `regexp` (case-insensitive). IP specs are bare IPv4/CIDR text.

use super::validator::{validate_dns_rule, validate_ip_rule};
use super::{DnsMatchMode, RouteMode};
use crate::common::error::RuleKind;
use crate::{Error, Result};
use std::fmt;

/// Validated DNS rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRule {
    mode: DnsMatchMode,
    route: RouteMode,
    domain: String,
}

impl DnsRule {
    /// Normalize the domain (trim, lower-case) and validate
    pub fn new(mode: DnsMatchMode, route: RouteMode, domain: &str) -> Result<Self> {
        let domain = domain.trim().to_lowercase();
        validate_dns_rule(mode, route, &domain)?;
        Ok(DnsRule { mode, route, domain })
    }

    pub fn mode(&self) -> DnsMatchMode {
        self.mode
    }

    pub fn route(&self) -> RouteMode {
        self.route
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }
}

impl fmt::Display for DnsRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} -> {}", self.mode, self.domain, self.route)
    }
}

/// Validated IP/CIDR rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpRule {
    route: RouteMode,
    ip: String,
}

impl IpRule {
    pub fn new(route: RouteMode, ip: &str) -> Result<Self> {
        let ip = ip.trim();
        validate_ip_rule(route, ip)?;
        Ok(IpRule {
            route,
            ip: ip.to_string(),
        })
    }

    pub fn route(&self) -> RouteMode {
        self.route
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }
}

impl fmt::Display for IpRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.ip, self.route)
    }
}

fn parse_match_mode(token: &str) -> Result<DnsMatchMode> {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return Err(Error::EmptyMatchMode);
    }

    DnsMatchMode::from_prefix(&trimmed.to_lowercase())
        .ok_or_else(|| Error::UnknownMatchMode(token.to_string()))
}

/// Parse a DNS rule spec and its route mode field
pub fn parse_dns_rule_spec(spec: &str, route_mode: &str) -> Result<DnsRule> {
    if spec.trim().is_empty() {
        return Err(Error::EmptyRule);
    }

    let parts: Vec<&str> = spec.split(':').collect();
    let (mode, domain) = match parts.as_slice() {
        [domain] => (DnsMatchMode::Exact, *domain),
        [token, domain] => (parse_match_mode(token)?, *domain),
        _ => return Err(Error::TooManyParts(spec.to_string())),
    };

    let route = RouteMode::parse(route_mode).map_err(|e| Error::route_mode(RuleKind::Dns, e))?;

    DnsRule::new(mode, route, domain)
}

/// Parse an IP rule spec and its route mode field
pub fn parse_ip_rule_spec(ip: &str, route_mode: &str) -> Result<IpRule> {
    let route = RouteMode::parse(route_mode).map_err(|e| Error::route_mode(RuleKind::Ip, e))?;
    IpRule::new(route, ip)
}
