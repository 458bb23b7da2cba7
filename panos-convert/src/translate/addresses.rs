//! Address entries and inline address literals.

use std::net::IpAddr;
use std::str::FromStr;
use std::sync::OnceLock;

use ipnetwork::IpNetwork;
use regex::Regex;

use crate::objects::{CpObject, ObjectKind};
use crate::scope::ConversionScope;
use crate::source::AddressEntry;

fn ip_literal() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{1,3}\.){3}\d{1,3}(/\d{1,2})?$").expect("static regex"))
}

/// Whether a rule member is a bare IPv4 address or CIDR.
pub fn is_ip_literal(value: &str) -> bool {
    ip_literal().is_match(value.trim())
}

/// Whether [`literal_address`] can build an object for `value`.
pub fn is_convertible_literal(value: &str) -> bool {
    is_ip_literal(value) && host_or_network(value).is_some()
}

/// Host when the value carries no prefix or a full-length one, network
/// otherwise. Returns `None` when the value does not parse.
fn host_or_network(value: &str) -> Option<ObjectKind> {
    let value = value.trim();
    let Some((ip, _)) = value.split_once('/') else {
        let ip = IpAddr::from_str(value).ok()?;
        return Some(ObjectKind::Host {
            ip_address: ip.to_string(),
        });
    };

    let network = IpNetwork::from_str(value).ok()?;
    let full = match network {
        IpNetwork::V4(_) => 32,
        IpNetwork::V6(_) => 128,
    };
    if network.prefix() == full {
        return Some(ObjectKind::Host {
            ip_address: ip.to_string(),
        });
    }

    Some(match network {
        IpNetwork::V4(v4) => ObjectKind::Network {
            subnet: v4.network().to_string(),
            netmask: Some(v4.mask().to_string()),
            mask_length: None,
        },
        IpNetwork::V6(v6) => ObjectKind::Network {
            subnet: v6.network().to_string(),
            netmask: None,
            mask_length: Some(v6.prefix()),
        },
    })
}

fn label(kind: &ObjectKind) -> &'static str {
    match kind {
        ObjectKind::Host { .. } => "address host",
        _ => "address network",
    }
}

/// Convert address entries into hosts, networks, ranges and domains.
///
/// One entry may populate several fields. Each populated field yields its
/// own object and the source name ends up pointing at the last one, in the
/// order ip-netmask, ip-range, fqdn.
pub fn convert_addresses(scope: &mut ConversionScope<'_>, entries: &[AddressEntry]) {
    for entry in entries {
        let source = &entry.meta.name;

        if let Some(value) = &entry.ip_netmask {
            match host_or_network(value) {
                Some(kind) => {
                    let name = scope.issue_name(source, label(&kind));
                    store(scope, entry, CpObject::new(name, kind));
                }
                None => scope.error(format!(
                    "{source} address object is not converted because ip-netmask is invalid: {value}"
                )),
            }
        }

        if let Some(value) = &entry.ip_range {
            match value.split_once('-') {
                Some((from, to)) => {
                    let name = scope.issue_name(source, "address range");
                    let kind = ObjectKind::Range {
                        range_from: from.trim().to_string(),
                        range_to: to.trim().to_string(),
                    };
                    store(scope, entry, CpObject::new(name, kind));
                }
                None => scope.error(format!(
                    "{source} address object is not converted because ip-range is invalid: {value}"
                )),
            }
        }

        if let Some(fqdn) = &entry.fqdn {
            let key = format!(".{}", fqdn.trim());
            let existing = scope
                .base
                .object(&key)
                .filter(|object| object.is_domain())
                .map(|object| object.name.clone());
            let target = match existing {
                Some(name) => name,
                None => {
                    let name = scope.issue_name(&key, "address fqdn");
                    let object = CpObject::new(name, ObjectKind::Domain { fqdn: key })
                        .with_comments(entry.meta.description.as_deref())
                        .with_tags(entry.meta.tags.iter().cloned());
                    scope.base.insert(object)
                }
            };
            scope.base.addresses.insert(source.clone(), target);
        }

        for tag in &entry.meta.tags {
            let tagged = scope.base.address_tags.entry(tag.clone()).or_default();
            if !tagged.contains(source) {
                tagged.push(source.clone());
            }
        }
    }
}

fn store(scope: &mut ConversionScope<'_>, entry: &AddressEntry, object: CpObject) {
    let object = object
        .with_comments(entry.meta.description.as_deref())
        .with_tags(entry.meta.tags.iter().cloned());
    let target = scope.base.insert(object);
    scope.base.addresses.insert(entry.meta.name.clone(), target);
}

/// Object for an inline IPv4 literal used in a rule.
///
/// The first use creates a `Host_<ip>` or `Net_<ip>` object and records it
/// under the literal, so later rules reuse it. Returns the object and
/// whether it was created by this call.
pub fn literal_address(scope: &mut ConversionScope<'_>, literal: &str) -> Option<(CpObject, bool)> {
    if let Some(existing) = scope.base.address(literal) {
        return Some((existing.clone(), false));
    }
    if !is_ip_literal(literal) {
        return None;
    }

    let kind = host_or_network(literal)?;
    let ip = literal.split('/').next().unwrap_or(literal).trim();
    let requested = match kind {
        ObjectKind::Host { .. } => format!("Host_{ip}"),
        _ => format!("Net_{ip}"),
    };
    let name = scope.issue_name(&requested, label(&kind));
    let object = CpObject::new(name, kind);
    let target = scope.base.insert(object.clone());
    scope.base.addresses.insert(literal.to_string(), target);
    Some((object, true))
}
