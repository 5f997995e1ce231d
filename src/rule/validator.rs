//! Rule validation predicates
//!
//! Check order is part of the contract. For DNS rules:
//! match mode, route mode, empty domain, whitespace, FQDN grammar (exact only),
//! regex compilation (regex only). For IP rules: route mode, empty IP, IPv4/CIDR grammar.
//! The first failing check wins.
//!
//! Match mode and route mode are closed enums, so the first two checks only fail
//! when a raw tag is converted through [`validate_match_field`] or [`validate_route_tag`].

use super::{DnsMatchMode, RouteMode};
use crate::common::error::{RouteModeError, RuleKind};
use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static DOMAIN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z]{2,}$")
        .expect("domain pattern is valid")
});

static IPV4_CIDR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:[01]?[0-9][0-9]?|2[0-4][0-9]|25[0-5])(?:\.(?:[01]?[0-9][0-9]?|2[0-4][0-9]|25[0-5])){3}(?:/(?:3[0-2]|[12]?[0-9]))?$",
    )
    .expect("ipv4 pattern is valid")
});

/// Fully-qualified domain: at least two labels, alphabetic TLD of 2+ chars
pub fn is_fqdn(domain: &str) -> bool {
    DOMAIN_RE.is_match(domain)
}

/// Dotted-quad IPv4 with an optional `/0`..`/32` prefix
pub fn is_ipv4_cidr(ip: &str) -> bool {
    IPV4_CIDR_RE.is_match(ip)
}

fn has_spaces(domain: &str) -> bool {
    domain.chars().any(|c| c.is_whitespace() || c.is_control())
}

/// Convert a document list field name into a match mode
pub fn validate_match_field(field: &str) -> Result<DnsMatchMode> {
    DnsMatchMode::from_field(field).ok_or(Error::InvalidRuleType)
}

/// Convert a canonical outbound tag into a route mode
pub fn validate_route_tag(rule: RuleKind, tag: &str) -> Result<RouteMode> {
    RouteMode::from_tag(tag)
        .ok_or_else(|| Error::route_mode(rule, RouteModeError::Unknown(tag.to_string())))
}

/// Validate an already normalized DNS rule candidate
pub fn validate_dns_rule(mode: DnsMatchMode, route: RouteMode, domain: &str) -> Result<()> {
    validate_match_field(mode.field())?;
    validate_route_tag(RuleKind::Dns, route.as_str())?;

    if domain.trim().is_empty() {
        return Err(Error::EmptyDomain);
    }

    if has_spaces(domain) {
        return Err(Error::DomainHasSpaces(domain.to_string()));
    }

    match mode {
        DnsMatchMode::Exact if !is_fqdn(domain) => Err(Error::InvalidDomain(domain.to_string())),
        DnsMatchMode::Regex => Regex::new(domain)
            .map(|_| ())
            .map_err(|_| Error::InvalidRegexp(domain.to_string())),
        _ => Ok(()),
    }
}

/// Validate an already trimmed IP rule candidate
pub fn validate_ip_rule(route: RouteMode, ip: &str) -> Result<()> {
    validate_route_tag(RuleKind::Ip, route.as_str())?;

    if ip.is_empty() {
        return Err(Error::EmptyIp);
    }

    if !is_ipv4_cidr(ip) {
        return Err(Error::InvalidIp(ip.to_string()));
    }

    Ok(())
}
