//! Route modes and DNS match modes

use crate::common::error::RouteModeError;
use std::fmt;

/// Traffic disposition a rule triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteMode {
    Proxy,
    Direct,
    Block,
}

impl RouteMode {
    pub const ALL: [RouteMode; 3] = [RouteMode::Proxy, RouteMode::Direct, RouteMode::Block];

    /// Parse user input: trimmed, case-insensitive
    pub fn parse(text: &str) -> std::result::Result<Self, RouteModeError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(RouteModeError::Empty);
        }

        match trimmed.to_lowercase().as_str() {
            "proxy" => Ok(RouteMode::Proxy),
            "direct" => Ok(RouteMode::Direct),
            "block" => Ok(RouteMode::Block),
            _ => Err(RouteModeError::Unknown(text.to_string())),
        }
    }

    /// Exact match against the canonical outbound tag, no trimming or case folding
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == tag)
    }

    /// Outbound tag used in the route section
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteMode::Proxy => "proxy",
            RouteMode::Direct => "direct",
            RouteMode::Block => "block",
        }
    }

    /// DNS server tag used in the dns section
    pub fn dns_server(&self) -> &'static str {
        match self {
            RouteMode::Proxy => "dns-remote",
            RouteMode::Direct => "dns-direct",
            RouteMode::Block => "dns-block",
        }
    }
}

impl fmt::Display for RouteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// DNS matching strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DnsMatchMode {
    /// `full:` or no prefix
    Exact,
    /// `domain:`
    Suffix,
    /// `keyword:`
    Keyword,
    /// `regexp:`
    Regex,
}

impl DnsMatchMode {
    pub const ALL: [DnsMatchMode; 4] = [
        DnsMatchMode::Exact,
        DnsMatchMode::Suffix,
        DnsMatchMode::Keyword,
        DnsMatchMode::Regex,
    ];

    /// Map a user-facing spec prefix. `domain:` is a suffix match.
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "full" => Some(DnsMatchMode::Exact),
            "domain" => Some(DnsMatchMode::Suffix),
            "keyword" => Some(DnsMatchMode::Keyword),
            "regexp" => Some(DnsMatchMode::Regex),
            _ => None,
        }
    }

    /// Document field holding rules of this mode
    pub fn field(&self) -> &'static str {
        match self {
            DnsMatchMode::Exact => "domain",
            DnsMatchMode::Suffix => "domain_suffix",
            DnsMatchMode::Keyword => "domain_keyword",
            DnsMatchMode::Regex => "domain_regex",
        }
    }

    /// Inverse of [`DnsMatchMode::field`]
    pub fn from_field(field: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.field() == field)
    }

    /// Spec prefix that round-trips through the parser
    pub fn prefix(&self) -> &'static str {
        match self {
            DnsMatchMode::Exact => "full",
            DnsMatchMode::Suffix => "domain",
            DnsMatchMode::Keyword => "keyword",
            DnsMatchMode::Regex => "regexp",
        }
    }
}

impl fmt::Display for DnsMatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}
