//! Rule service
//!
//! Each call parses its input, loads a fresh handle, applies one mutation and
//! saves only if the document changed. Conflicts are returned, never retried.

use crate::config::{ConfigDocument, ConfigStore};
use crate::rule::{parse_dns_rule_spec, parse_ip_rule_spec, DnsRule, IpRule};
use crate::{Error, ErrorKind, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// DNS rule request body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DnsRuleRequest {
    /// proxy, direct or block
    #[serde(rename = "routeMode", default)]
    pub route_mode: String,

    /// Rule spec, `[<type>:]<value>`
    #[serde(default)]
    pub domain: String,
}

impl DnsRuleRequest {
    pub fn new(domain: impl Into<String>, route_mode: impl Into<String>) -> Self {
        DnsRuleRequest {
            route_mode: route_mode.into(),
            domain: domain.into(),
        }
    }
}

/// IP rule request body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IpRuleRequest {
    #[serde(rename = "routeMode", default)]
    pub route_mode: String,

    /// IPv4 address or CIDR range
    #[serde(default)]
    pub ip: String,
}

impl IpRuleRequest {
    pub fn new(ip: impl Into<String>, route_mode: impl Into<String>) -> Self {
        IpRuleRequest {
            route_mode: route_mode.into(),
            ip: ip.into(),
        }
    }
}

/// Applies rule edits to the configuration file
#[derive(Debug, Clone)]
pub struct RuleService {
    store: ConfigStore,
}

impl RuleService {
    pub fn new(store: ConfigStore) -> Self {
        RuleService { store }
    }

    /// Service over the file named by `CONFIG_PATH`
    pub fn from_env() -> Result<Self> {
        ConfigStore::from_env().map(Self::new).map_err(log_failure)
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Returns whether the file was changed
    pub fn add_dns_rule(&self, req: &DnsRuleRequest) -> Result<bool> {
        let rule = parse_dns_rule_spec(&req.domain, &req.route_mode).map_err(log_failure)?;
        self.apply_dns("add", &rule, ConfigDocument::add_dns_rule)
    }

    /// Returns whether the file was changed
    pub fn remove_dns_rule(&self, req: &DnsRuleRequest) -> Result<bool> {
        let rule = parse_dns_rule_spec(&req.domain, &req.route_mode).map_err(log_failure)?;
        self.apply_dns("remove", &rule, ConfigDocument::remove_dns_rule)
    }

    /// Returns whether the file was changed
    pub fn add_ip_rule(&self, req: &IpRuleRequest) -> Result<bool> {
        let rule = parse_ip_rule_spec(&req.ip, &req.route_mode).map_err(log_failure)?;
        self.apply_ip("add", &rule, ConfigDocument::add_ip_rule)
    }

    /// Returns whether the file was changed
    pub fn remove_ip_rule(&self, req: &IpRuleRequest) -> Result<bool> {
        let rule = parse_ip_rule_spec(&req.ip, &req.route_mode).map_err(log_failure)?;
        self.apply_ip("remove", &rule, ConfigDocument::remove_ip_rule)
    }

    /// Current document
    pub fn config(&self) -> Result<ConfigDocument> {
        self.store
            .load()
            .map(|handle| handle.into_document())
            .map_err(log_failure)
    }

    /// DNS rules currently routed to proxy, direct or block
    pub fn dns_rules(&self) -> Result<Vec<DnsRule>> {
        self.config().map(|doc| doc.dns_rules())
    }

    /// IP rules currently routed to proxy, direct or block
    pub fn ip_rules(&self) -> Result<Vec<IpRule>> {
        self.config().map(|doc| doc.ip_rules())
    }

    fn apply_dns<F>(&self, op: &str, rule: &DnsRule, f: F) -> Result<bool>
    where
        F: FnOnce(&mut ConfigDocument, &DnsRule) -> bool,
    {
        let changed = self.apply(|doc| f(doc, rule)).map_err(log_failure)?;
        info!(op, rule = %rule, changed, "DNS rule request handled");
        Ok(changed)
    }

    fn apply_ip<F>(&self, op: &str, rule: &IpRule, f: F) -> Result<bool>
    where
        F: FnOnce(&mut ConfigDocument, &IpRule) -> bool,
    {
        let changed = self.apply(|doc| f(doc, rule)).map_err(log_failure)?;
        info!(op, rule = %rule, changed, "IP rule request handled");
        Ok(changed)
    }

    fn apply<F>(&self, mutate: F) -> Result<bool>
    where
        F: FnOnce(&mut ConfigDocument) -> bool,
    {
        let mut handle = self.store.load()?;
        if !mutate(handle.document_mut()) {
            return Ok(false);
        }
        self.store.save(&handle)?;
        Ok(true)
    }
}

fn log_failure(e: Error) -> Error {
    match e.kind() {
        ErrorKind::Fatal => error!(code = e.code(), error = %e, "Rule request failed"),
        ErrorKind::Conflict => warn!(code = e.code(), "Rule request conflicted"),
        ErrorKind::Validation => debug!(code = e.code(), error = %e, "Rule request rejected"),
    }
    e
}
