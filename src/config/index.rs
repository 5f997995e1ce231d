//! Rule-set lookup and rule mutation
//!
//! A DNS rule lives in two places: the route rule set of its outbound and the
//! DNS rule set of its server. Both are kept in step. IP rules only live in the
//! route section.

use super::{ConfigDocument, DnsRuleSet, RouteRuleSet};
use crate::common::error::RuleKind;
use crate::rule::validator::validate_route_tag;
use crate::rule::{DnsMatchMode, DnsRule, IpRule, RouteMode};
use tracing::debug;

/// A rule set holding the four domain lists
pub trait DomainBucket {
    /// List for the given match mode
    fn domain_list(&self, mode: DnsMatchMode) -> &Vec<String>;

    /// Mutable list for the given match mode
    fn domain_list_mut(&mut self, mode: DnsMatchMode) -> &mut Vec<String>;

    /// Nothing left but the tag
    fn is_bare(&self) -> bool;
}

macro_rules! impl_domain_bucket {
    ($ty:ty $(, $list:ident)*) => {
        impl DomainBucket for $ty {
            fn domain_list(&self, mode: DnsMatchMode) -> &Vec<String> {
                match mode {
                    DnsMatchMode::Exact => &self.domain,
                    DnsMatchMode::Suffix => &self.domain_suffix,
                    DnsMatchMode::Keyword => &self.domain_keyword,
                    DnsMatchMode::Regex => &self.domain_regex,
                }
            }

            fn domain_list_mut(&mut self, mode: DnsMatchMode) -> &mut Vec<String> {
                match mode {
                    DnsMatchMode::Exact => &mut self.domain,
                    DnsMatchMode::Suffix => &mut self.domain_suffix,
                    DnsMatchMode::Keyword => &mut self.domain_keyword,
                    DnsMatchMode::Regex => &mut self.domain_regex,
                }
            }

            fn is_bare(&self) -> bool {
                self.domain.is_empty()
                    && self.domain_suffix.is_empty()
                    && self.domain_keyword.is_empty()
                    && self.domain_regex.is_empty()
                    $(&& self.$list.is_empty())*
                    && self.extra.is_empty()
            }
        }
    };
}

impl_domain_bucket!(DnsRuleSet);
impl_domain_bucket!(RouteRuleSet, ip_cidr);

fn same_entry(existing: &str, value: &str) -> bool {
    existing.trim().to_lowercase() == value.trim().to_lowercase()
}

/// Append `value` unless an equal entry (ignoring case and surrounding spaces) exists
pub fn upsert(list: &mut Vec<String>, value: &str) -> bool {
    if list.iter().any(|existing| same_entry(existing, value)) {
        return false;
    }
    list.push(value.to_string());
    true
}

/// Delete the first entry equal to `value`, ignoring case and surrounding spaces
pub fn remove_from(list: &mut Vec<String>, value: &str) -> bool {
    match list.iter().position(|existing| same_entry(existing, value)) {
        Some(idx) => {
            list.remove(idx);
            true
        }
        None => false,
    }
}

impl ConfigDocument {
    /// DNS rule set for the route's server tag, appended when missing
    pub fn find_or_create_dns_bucket(&mut self, route: RouteMode) -> &mut DnsRuleSet {
        let server = route.dns_server();
        let rules = &mut self.dns.rules;
        let idx = match rules.iter().position(|r| r.server.as_deref() == Some(server)) {
            Some(idx) => idx,
            None => {
                debug!(server, "Creating DNS rule set");
                rules.push(DnsRuleSet::for_server(server));
                rules.len() - 1
            }
        };
        &mut rules[idx]
    }

    /// Route rule set for the route's outbound tag, appended when missing
    pub fn find_or_create_route_bucket(&mut self, route: RouteMode) -> &mut RouteRuleSet {
        let outbound = route.as_str();
        let rules = &mut self.route.rules;
        let idx = match rules.iter().position(|r| r.outbound.as_deref() == Some(outbound)) {
            Some(idx) => idx,
            None => {
                debug!(outbound, "Creating route rule set");
                rules.push(RouteRuleSet::for_outbound(outbound));
                rules.len() - 1
            }
        };
        &mut rules[idx]
    }

    fn dns_bucket_idx(&self, route: RouteMode) -> Option<usize> {
        let server = route.dns_server();
        self.dns
            .rules
            .iter()
            .position(|r| r.server.as_deref() == Some(server))
    }

    fn route_bucket_idx(&self, route: RouteMode) -> Option<usize> {
        let outbound = route.as_str();
        self.route
            .rules
            .iter()
            .position(|r| r.outbound.as_deref() == Some(outbound))
    }

    /// Add to both the route and the DNS rule set. Returns whether anything changed.
    pub fn add_dns_rule(&mut self, rule: &DnsRule) -> bool {
        let added_to_route = upsert(
            self.find_or_create_route_bucket(rule.route())
                .domain_list_mut(rule.mode()),
            rule.domain(),
        );
        let added_to_dns = upsert(
            self.find_or_create_dns_bucket(rule.route())
                .domain_list_mut(rule.mode()),
            rule.domain(),
        );
        added_to_route || added_to_dns
    }

    /// Remove from both the route and the DNS rule set.
    ///
    /// Missing rule sets are not created. A rule set emptied by the removal is
    /// dropped, so add followed by remove restores the document.
    pub fn remove_dns_rule(&mut self, rule: &DnsRule) -> bool {
        let (mode, domain) = (rule.mode(), rule.domain());

        let idx = self.route_bucket_idx(rule.route());
        let removed_from_route = remove_in(&mut self.route.rules, idx, |set| {
            remove_from(set.domain_list_mut(mode), domain)
        });

        let idx = self.dns_bucket_idx(rule.route());
        let removed_from_dns = remove_in(&mut self.dns.rules, idx, |set| {
            remove_from(set.domain_list_mut(mode), domain)
        });

        removed_from_route || removed_from_dns
    }

    /// Add to the route rule set's `ip_cidr` list
    pub fn add_ip_rule(&mut self, rule: &IpRule) -> bool {
        upsert(
            &mut self.find_or_create_route_bucket(rule.route()).ip_cidr,
            rule.ip(),
        )
    }

    /// Remove from the route rule set's `ip_cidr` list, dropping the set once emptied
    pub fn remove_ip_rule(&mut self, rule: &IpRule) -> bool {
        let idx = self.route_bucket_idx(rule.route());
        remove_in(&mut self.route.rules, idx, |set| {
            remove_from(&mut set.ip_cidr, rule.ip())
        })
    }

    /// DNS rules present in the route section for the known outbounds.
    ///
    /// Rule sets for other outbounds and entries that no longer validate are skipped.
    pub fn dns_rules(&self) -> Vec<DnsRule> {
        let mut rules = Vec::new();
        for set in &self.route.rules {
            let Some(route) = route_of(set) else { continue };
            for mode in DnsMatchMode::ALL {
                for entry in set.domain_list(mode) {
                    match DnsRule::new(mode, route, entry) {
                        Ok(rule) => rules.push(rule),
                        Err(e) => debug!(entry = %entry, error = %e, "Skipping DNS rule"),
                    }
                }
            }
        }
        rules
    }

    /// IP rules present in the route section for the known outbounds
    pub fn ip_rules(&self) -> Vec<IpRule> {
        let mut rules = Vec::new();
        for set in &self.route.rules {
            let Some(route) = route_of(set) else { continue };
            for entry in &set.ip_cidr {
                match IpRule::new(route, entry) {
                    Ok(rule) => rules.push(rule),
                    Err(e) => debug!(entry = %entry, error = %e, "Skipping IP rule"),
                }
            }
        }
        rules
    }
}

fn remove_in<T, F>(sets: &mut Vec<T>, idx: Option<usize>, remove: F) -> bool
where
    T: DomainBucket,
    F: FnOnce(&mut T) -> bool,
{
    let Some(idx) = idx else { return false };
    if !remove(&mut sets[idx]) {
        return false;
    }
    if sets[idx].is_bare() {
        debug!(index = idx, "Dropping emptied rule set");
        sets.remove(idx);
    }
    true
}

fn route_of(set: &RouteRuleSet) -> Option<RouteMode> {
    let tag = set.outbound.as_deref()?;
    validate_route_tag(RuleKind::Dns, tag).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{parse_dns_rule_spec, parse_ip_rule_spec};

    fn doc() -> ConfigDocument {
        r#"{
                "dns": {
                    "rules": [
                        { "domain_suffix": ["YouTube.com "], "server": "dns-remote" },
                        { "domain": ["ya.ru"], "server": "dns-direct" }
                    ]
                },
                "route": {
                    "rules": [
                        { "protocol": "dns", "outbound": "dns-out" },
                        { "domain_suffix": ["youtube.com"], "outbound": "proxy" },
                        { "domain": ["ya.ru"], "ip_cidr": ["10.0.0.0/8"], "outbound": "direct" }
                    ]
                }
            }"#
        .parse()
        .unwrap()
    }

    fn dns(spec: &str, route: &str) -> DnsRule {
        parse_dns_rule_spec(spec, route).unwrap()
    }

    #[test]
    fn test_upsert_and_remove() {
        let mut list = vec![" Google.com".to_string()];
        assert!(!upsert(&mut list, "google.com"));
        assert!(upsert(&mut list, "ya.ru"));
        assert_eq!(list, vec![" Google.com", "ya.ru"]);

        assert!(remove_from(&mut list, "GOOGLE.COM"));
        assert!(!remove_from(&mut list, "google.com"));
        assert_eq!(list, vec!["ya.ru"]);
    }

    #[test]
    fn test_remove_only_first_match() {
        let mut list = vec!["a.com".to_string(), "A.com".to_string()];
        assert!(remove_from(&mut list, "a.com"));
        assert_eq!(list, vec!["A.com"]);
    }

    #[test]
    fn test_find_existing_buckets() {
        let mut doc = doc();
        doc.find_or_create_dns_bucket(RouteMode::Proxy);
        doc.find_or_create_route_bucket(RouteMode::Direct);
        assert_eq!(doc.dns.rules.len(), 2);
        assert_eq!(doc.route.rules.len(), 3);
    }

    #[test]
    fn test_create_missing_buckets() {
        let mut doc = doc();
        let set = doc.find_or_create_dns_bucket(RouteMode::Block);
        assert_eq!(set.server.as_deref(), Some("dns-block"));
        let set = doc.find_or_create_route_bucket(RouteMode::Block);
        assert_eq!(set.outbound.as_deref(), Some("block"));
        assert_eq!(doc.dns.rules.len(), 3);
        assert_eq!(doc.route.rules.len(), 4);
        assert_eq!(doc.route.rules[3].outbound.as_deref(), Some("block"));
    }

    #[test]
    fn test_add_dns_rule_updates_both_sections() {
        let mut doc = doc();
        assert!(doc.add_dns_rule(&dns("keyword:ads", "block")));

        let route = doc.find_or_create_route_bucket(RouteMode::Block);
        assert_eq!(route.domain_keyword, vec!["ads"]);
        let server = doc.find_or_create_dns_bucket(RouteMode::Block);
        assert_eq!(server.domain_keyword, vec!["ads"]);
    }

    #[test]
    fn test_add_dns_rule_is_idempotent() {
        let mut doc = doc();
        let rule = dns("domain:Google.com", "proxy");
        assert!(doc.add_dns_rule(&rule));
        let snapshot = doc.clone();
        assert!(!doc.add_dns_rule(&rule));
        assert_eq!(doc, snapshot);
    }

    #[test]
    fn test_add_dns_rule_fills_missing_half() {
        // present in the DNS section only (with odd case/spacing), missing in route
        let mut doc = doc();
        doc.route.rules[1].domain_suffix.clear();
        assert!(doc.add_dns_rule(&dns("domain:youtube.com", "proxy")));
        assert_eq!(doc.route.rules[1].domain_suffix, vec!["youtube.com"]);
        assert_eq!(doc.dns.rules[0].domain_suffix, vec!["YouTube.com "]);
    }

    #[test]
    fn test_remove_dns_rule() {
        let mut doc = doc();
        assert!(doc.remove_dns_rule(&dns("domain:youtube.com", "proxy")));
        // both proxy sets held only this rule
        assert_eq!(doc.route.rules.len(), 2);
        assert_eq!(doc.dns.rules.len(), 1);
        assert_eq!(doc.dns.rules[0].server.as_deref(), Some("dns-direct"));
        assert!(!doc.remove_dns_rule(&dns("domain:youtube.com", "proxy")));
    }

    #[test]
    fn test_remove_keeps_sets_with_other_entries() {
        let mut doc = doc();
        assert!(doc.remove_dns_rule(&dns("full:ya.ru", "direct")));
        assert_eq!(doc.route.rules.len(), 3);
        assert!(doc.route.rules[2].domain.is_empty());
        assert_eq!(doc.route.rules[2].ip_cidr, vec!["10.0.0.0/8"]);
        assert_eq!(doc.dns.rules.len(), 1);
    }

    #[test]
    fn test_remove_keeps_sets_with_extra_keys() {
        let mut doc: ConfigDocument = r#"{
            "route": {
                "rules": [
                    { "ip_cidr": ["1.1.1.1"], "invert": true, "outbound": "block" }
                ]
            }
        }"#
        .parse()
        .unwrap();
        assert!(doc.remove_ip_rule(&parse_ip_rule_spec("1.1.1.1", "block").unwrap()));
        assert_eq!(doc.route.rules.len(), 1);
        assert!(doc.route.rules[0].ip_cidr.is_empty());
    }

    #[test]
    fn test_add_then_remove_restores_document() {
        let empty: ConfigDocument = r#"{"dns":{"rules":[]},"route":{"rules":[]}}"#.parse().unwrap();
        let mut doc = empty.clone();

        let rule = dns("keyword:ads", "block");
        assert!(doc.add_dns_rule(&rule));
        assert!(doc.remove_dns_rule(&rule));
        assert_eq!(doc, empty);

        let rule = parse_ip_rule_spec("10.0.0.0/8", "proxy").unwrap();
        assert!(doc.add_ip_rule(&rule));
        assert!(doc.remove_ip_rule(&rule));
        assert_eq!(doc.to_json().unwrap(), empty.to_json().unwrap());
    }

    #[test]
    fn test_remove_dns_rule_wrong_mode_is_noop() {
        let mut doc = doc();
        let snapshot = doc.clone();
        assert!(!doc.remove_dns_rule(&dns("keyword:youtube.com", "proxy")));
        assert!(!doc.remove_dns_rule(&dns("domain:youtube.com", "direct")));
        assert_eq!(doc, snapshot);
    }

    #[test]
    fn test_remove_from_missing_bucket_creates_nothing() {
        let mut doc = doc();
        let snapshot = doc.clone();
        assert!(!doc.remove_dns_rule(&dns("keyword:ads", "block")));
        assert!(!doc.remove_ip_rule(&parse_ip_rule_spec("1.1.1.1", "block").unwrap()));
        assert_eq!(doc, snapshot);
    }

    #[test]
    fn test_add_and_remove_ip_rule() {
        let mut doc = doc();
        let rule = parse_ip_rule_spec("192.168.0.0/24", "direct").unwrap();
        assert!(doc.add_ip_rule(&rule));
        assert!(!doc.add_ip_rule(&rule));
        assert_eq!(doc.route.rules[2].ip_cidr, vec!["10.0.0.0/8", "192.168.0.0/24"]);
        assert_eq!(doc.dns.rules.len(), 2);

        assert!(doc.remove_ip_rule(&rule));
        assert_eq!(doc.route.rules[2].ip_cidr, vec!["10.0.0.0/8"]);
    }

    #[test]
    fn test_list_rules() {
        let doc = doc();
        let rules = doc.dns_rules();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0], dns("domain:youtube.com", "proxy"));
        assert_eq!(rules[1], dns("full:ya.ru", "direct"));

        let ips = doc.ip_rules();
        assert_eq!(ips, vec![parse_ip_rule_spec("10.0.0.0/8", "direct").unwrap()]);
    }
}
