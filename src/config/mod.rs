//! sing-box configuration document
//!
//! Only the rule lists and their tags are typed. Every other key of the
//! document (log, inbounds, outbounds, dns servers, ...) is carried in the
//! flattened `extra` maps and written back untouched.

mod index;
mod store;

pub use index::DomainBucket;
pub use store::{ConfigHandle, ConfigStore, CONFIG_PATH_ENV};

use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};
use std::io::{Read, Write};
use std::str::FromStr;

/// Indentation of the saved document
const INDENT: &[u8] = b"    ";

/// Root of the sing-box configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    /// DNS section
    #[serde(default)]
    pub dns: DnsSection,

    /// Route section
    #[serde(default)]
    pub route: RouteSection,

    /// All other top-level keys
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConfigDocument {
    /// Decode from a reader
    pub fn from_reader<R: Read>(reader: R) -> serde_json::Result<Self> {
        serde_json::from_reader(reader)
    }

    /// Encode with 4-space indentation and a trailing newline.
    ///
    /// `<`, `>` and `&` are written literally; regex rules contain them.
    pub fn to_writer<W: Write>(&self, mut writer: W) -> std::io::Result<()> {
        let mut ser = serde_json::Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(INDENT));
        self.serialize(&mut ser)?;
        writer.write_all(b"\n")
    }

    /// Encode into a byte buffer, same format as [`ConfigDocument::to_writer`]
    pub fn to_json(&self) -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.to_writer(&mut buf)?;
        Ok(buf)
    }
}

impl FromStr for ConfigDocument {
    type Err = serde_json::Error;

    fn from_str(content: &str) -> serde_json::Result<Self> {
        serde_json::from_str(content)
    }
}

/// DNS section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DnsSection {
    /// Rule sets, one per DNS server
    #[serde(default)]
    pub rules: Vec<DnsRuleSet>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Route section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteSection {
    /// Rule sets, one per outbound
    #[serde(default)]
    pub rules: Vec<RouteRuleSet>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// DNS rule set keyed by server tag
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DnsRuleSet {
    /// Exact domains
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain_keyword: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain_regex: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain_suffix: Vec<String>,

    /// Server tag (dns-remote, dns-direct, dns-block)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DnsRuleSet {
    pub fn for_server(server: &str) -> Self {
        DnsRuleSet {
            server: Some(server.to_string()),
            ..Default::default()
        }
    }
}

/// Route rule set keyed by outbound tag
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteRuleSet {
    /// Exact domains
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain_keyword: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain_regex: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain_suffix: Vec<String>,

    /// IPv4 addresses and CIDR ranges
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip_cidr: Vec<String>,

    /// Outbound tag (proxy, direct, block). Action-only rules have none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbound: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RouteRuleSet {
    pub fn for_outbound(outbound: &str) -> Self {
        RouteRuleSet {
            outbound: Some(outbound.to_string()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
    "log": {
        "level": "info",
        "timestamp": true
    },
    "dns": {
        "servers": [
            {
                "tag": "dns-remote",
                "address": "tls://8.8.8.8",
                "detour": "proxy"
            }
        ],
        "rules": [
            {
                "domain_suffix": [
                    "youtube.com"
                ],
                "server": "dns-remote"
            }
        ],
        "final": "dns-direct"
    },
    "route": {
        "rules": [
            {
                "protocol": "dns",
                "action": "hijack-dns"
            },
            {
                "domain_suffix": [
                    "youtube.com"
                ],
                "ip_cidr": [
                    "10.0.0.0/8"
                ],
                "outbound": "proxy"
            }
        ],
        "final": "direct",
        "auto_detect_interface": true
    }
}"#;

    #[test]
    fn test_document_decode() {
        let doc = SAMPLE.parse::<ConfigDocument>().unwrap();
        assert_eq!(doc.dns.rules.len(), 1);
        assert_eq!(doc.dns.rules[0].server.as_deref(), Some("dns-remote"));
        assert_eq!(doc.dns.rules[0].domain_suffix, vec!["youtube.com"]);
        assert_eq!(doc.route.rules.len(), 2);
        assert_eq!(doc.route.rules[0].outbound, None);
        assert_eq!(doc.route.rules[0].extra["action"], "hijack-dns");
        assert_eq!(doc.route.rules[1].ip_cidr, vec!["10.0.0.0/8"]);
        assert_eq!(doc.route.extra["final"], "direct");
        assert_eq!(doc.dns.extra["servers"][0]["tag"], "dns-remote");
        assert_eq!(doc.extra["log"]["level"], "info");
    }

    #[test]
    fn test_document_encode_keeps_unknown_keys() {
        let doc = SAMPLE.parse::<ConfigDocument>().unwrap();
        let bytes = doc.to_json().unwrap();
        let reparsed = std::str::from_utf8(&bytes).unwrap().parse::<ConfigDocument>().unwrap();
        assert_eq!(doc, reparsed);

        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["log"]["timestamp"], true);
        assert_eq!(value["route"]["auto_detect_interface"], true);
        assert!(value["route"]["rules"][0].get("outbound").is_none());
    }

    #[test]
    fn test_document_encode_format() {
        let mut doc = ConfigDocument::default();
        doc.dns.rules.push(DnsRuleSet {
            domain_regex: vec!["^a<b>&c$".to_string()],
            ..DnsRuleSet::for_server("dns-block")
        });

        let text = String::from_utf8(doc.to_json().unwrap()).unwrap();
        assert!(text.contains("\n    \"dns\": {"));
        assert!(text.contains("^a<b>&c$"));
        assert!(text.ends_with("}\n"));
    }

    #[test]
    fn test_empty_lists_are_omitted() {
        let set = RouteRuleSet::for_outbound("direct");
        let value = serde_json::to_value(&set).unwrap();
        assert_eq!(value, serde_json::json!({ "outbound": "direct" }));
    }
}
