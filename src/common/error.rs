//! Error types for rule editing

use std::fmt;
use std::io;
use thiserror::Error;

/// Error category, used by callers to pick a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad client input
    Validation,
    /// Optimistic-lock violation; reload and retry
    Conflict,
    /// I/O or configuration failure
    Fatal,
}

/// Which rule family a route mode was parsed for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Dns,
    Ip,
}

impl RuleKind {
    fn code_prefix(self) -> &'static str {
        match self {
            RuleKind::Dns => "DNSRule",
            RuleKind::Ip => "IPRule",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code_prefix())
    }
}

/// Route mode parse failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteModeError {
    #[error("route mode is empty")]
    Empty,

    #[error("route mode '{0}' is unknown")]
    Unknown(String),
}

/// Crate error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("DNS rule is empty")]
    EmptyRule,

    #[error("DNS rule type is empty")]
    EmptyMatchMode,

    #[error("DNS rule type '{0}' is unknown")]
    UnknownMatchMode(String),

    #[error("DNS rule '{0}' has too many parts")]
    TooManyParts(String),

    #[error("rule type is invalid")]
    InvalidRuleType,

    #[error("{source}")]
    InvalidRouteMode {
        rule: RuleKind,
        #[source]
        source: RouteModeError,
    },

    #[error("domain is empty")]
    EmptyDomain,

    #[error("domain '{0}' has spaces")]
    DomainHasSpaces(String),

    #[error("domain '{0}' is invalid")]
    InvalidDomain(String),

    #[error("regexp '{0}' is invalid")]
    InvalidRegexp(String),

    #[error("IP is empty")]
    EmptyIp,

    #[error("IP '{0}' is invalid")]
    InvalidIp(String),

    #[error("the configuration has been modified by another request")]
    Conflict,

    #[error("path to the configuration file is not specified")]
    EmptyPath,

    #[error("{0}")]
    StatRead(#[source] io::Error),

    #[error("{0}")]
    Open(#[source] io::Error),

    #[error("{0}")]
    JsonDecode(#[source] serde_json::Error),

    #[error("{0}")]
    TmpFileCreate(#[source] io::Error),

    /// Encoding or writing the temp file, fsync included
    #[error("{0}")]
    JsonEncode(#[source] io::Error),

    #[error("{0}")]
    TmpFileRename(#[source] io::Error),
}

impl Error {
    pub fn route_mode(rule: RuleKind, source: RouteModeError) -> Self {
        Error::InvalidRouteMode { rule, source }
    }

    /// Error category
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Conflict => ErrorKind::Conflict,
            Error::EmptyPath
            | Error::StatRead(_)
            | Error::Open(_)
            | Error::JsonDecode(_)
            | Error::TmpFileCreate(_)
            | Error::JsonEncode(_)
            | Error::TmpFileRename(_) => ErrorKind::Fatal,
            _ => ErrorKind::Validation,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Error::EmptyRule => "DNSRule_Empty",
            Error::EmptyMatchMode => "DNSRule_EmptyType",
            Error::UnknownMatchMode(_) => "DNSRule_UnknownType",
            Error::TooManyParts(_) => "DNSRule_TooManyParts",
            Error::InvalidRuleType => "DNSRule_InvalidType",
            Error::InvalidRouteMode { rule: RuleKind::Dns, .. } => "DNSRule_InvalidRouteMode",
            Error::InvalidRouteMode { rule: RuleKind::Ip, .. } => "IPRule_InvalidRouteMode",
            Error::EmptyDomain => "DNSRule_EmptyDomain",
            Error::DomainHasSpaces(_) => "DNSRule_DomainHasSpaces",
            Error::InvalidDomain(_) => "DNSRule_InvalidDomain",
            Error::InvalidRegexp(_) => "DNSRule_InvalidRegexp",
            Error::EmptyIp => "IPRule_EmptyIP",
            Error::InvalidIp(_) => "IPRule_InvalidIP",
            Error::Conflict => "Config_Conflict",
            Error::EmptyPath => "Config_EmptyPath",
            Error::StatRead(_) => "Config_StatReadError",
            Error::Open(_) => "Config_OpenError",
            Error::JsonDecode(_) => "Config_JsonDecodeError",
            Error::TmpFileCreate(_) => "Config_TmpFileCreateError",
            Error::JsonEncode(_) => "Config_JsonEncodeError",
            Error::TmpFileRename(_) => "Config_TmpFileRenameError",
        }
    }

    /// Only conflicts are worth retrying, and only after a fresh load
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    /// Message safe to hand to an external caller.
    ///
    /// Fatal errors carry OS and path detail, so they collapse to a generic text.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Fatal => "internal error".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;
