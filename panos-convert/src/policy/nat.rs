//! NAT rules.
//!
//! Each source rule fans out over its source members, destination members
//! and translated source candidates. A translated port whose original
//! service covers both TCP and UDP needs two target rules, one per
//! protocol, because a target NAT rule translates to a single service.

use std::collections::HashSet;

use tracing::debug;

use super::{check_members, is_network_target, network_target, resolve_members};
use crate::naming::safe_name;
use crate::objects::{CpObject, ObjectKind, Protocol, ANY, FULL_PORT_RANGE};
use crate::package::{NatMethod, NatRule};
use crate::scope::ConversionScope;
use crate::source::{DestinationTranslation, NatRuleEntry, SourceTranslation};

const UNSUPPORTED_NAT_TYPES: [&str; 1] = ["nptv6"];

/// Translated source candidates of one rule. A `None` candidate is the
/// placeholder for "no translation" and keeps the original source.
struct SourcePlan {
    candidates: Vec<Option<String>>,
    is_static: bool,
    bidirectional: bool,
}

/// Service rewrite for a translated port.
enum PortPlan {
    None,
    Single {
        translated: String,
    },
    Split {
        tcp_source: String,
        tcp_translated: String,
        udp_source: String,
        udp_translated: String,
    },
}

#[derive(Default)]
struct ProtocolScan {
    tcp: bool,
    udp: bool,
    tcp_leaves: Vec<String>,
    udp_leaves: Vec<String>,
}

pub fn convert_nat_rules(scope: &mut ConversionScope<'_>, rules: &[NatRuleEntry]) -> Vec<NatRule> {
    debug!(scope = %scope.name, rules = rules.len(), "converting NAT rules");
    let mut out = Vec::new();
    let mut index = 0usize;
    for entry in rules {
        convert_rule(scope, entry, &mut index, &mut out);
    }

    let referenced: Vec<String> = out
        .iter()
        .flat_map(NatRule::references)
        .cloned()
        .collect();
    for name in referenced {
        scope.register_name(&name);
    }
    out
}

fn convert_rule(
    scope: &mut ConversionScope<'_>,
    entry: &NatRuleEntry,
    index: &mut usize,
    out: &mut Vec<NatRule>,
) {
    let name = entry.meta.name.as_str();
    if let Some(nat_type) = entry
        .nat_type
        .as_deref()
        .filter(|nat_type| UNSUPPORTED_NAT_TYPES.contains(nat_type))
    {
        scope.warn(format!(
            "Unsupported nat-type '{nat_type}' for NAT rule '{name}'."
        ));
        return;
    }

    let mut errors = Vec::new();
    let missing = |side: &str, member: &str| {
        format!(
            "{name} NAT rule is not converted because {side} object is not defined or converted: {member}"
        )
    };
    check_members(scope, &entry.source, &mut errors, |member| missing("source", member));
    check_members(scope, &entry.destination, &mut errors, |member| {
        missing("destination", member)
    });

    let service = if entry.service == ANY {
        ANY.to_string()
    } else {
        match scope.base.service_object(&entry.service) {
            Some(object) => object.name.clone(),
            None => {
                errors.push(format!(
                    "{name} NAT rule is not converted because service or group of services object is not defined or converted: {}",
                    entry.service
                ));
                ANY.to_string()
            }
        }
    };

    let dest_none = entry.destination_translation.is_none();
    let translation = match (&entry.destination_translation, &entry.dynamic_destination_translation) {
        (Some(translation), _) => Some((translation, false)),
        (None, Some(_)) if is_bidirectional(scope, entry) => None,
        (None, Some(translation)) => Some((translation, true)),
        (None, None) => None,
    };
    if let Some((translation, dynamic)) = translation {
        check_translated_address(scope, name, translation, dynamic, &mut errors);
    }

    if !errors.is_empty() {
        for error in errors {
            scope.error(error);
        }
        return;
    }

    let source_plan = source_plan(scope, entry);
    let sources = or_any(resolve_members(scope, &entry.source));
    let destinations = or_any(resolve_members(scope, &entry.destination));
    let translated_destination = translation
        .and_then(|(translation, dynamic)| translated_address(scope, translation, dynamic));

    let comments = format!(
        "Matched rule name: {name}. {}",
        entry.meta.description.as_deref().unwrap_or_default()
    )
    .trim_end()
    .to_string();
    let mut port_plan: Option<PortPlan> = None;

    for source in &sources {
        for destination in &destinations {
            for candidate in &source_plan.candidates {
                let rule_name = if *index > 0 {
                    safe_name(&format!("{name}_{index}"))
                } else {
                    safe_name(name)
                };

                let cells = [
                    Some(source),
                    Some(destination),
                    candidate.as_ref(),
                    translated_destination.as_ref(),
                ];
                if cells.into_iter().flatten().any(|cell| is_domain(scope, cell)) {
                    scope.error(format!(
                        "{rule_name} NAT rule contains FQDN object so it can not be converted."
                    ));
                    continue;
                }

                let plan = match port_plan.take() {
                    Some(plan) => plan,
                    None => match translation.and_then(|(t, _)| t.translated_port.as_deref()) {
                        Some(port) => plan_ports(scope, name, &entry.service, port),
                        None => PortPlan::None,
                    },
                };

                let mut rule = NatRule {
                    name: rule_name.clone(),
                    comments: comments.clone(),
                    tags: entry.meta.tags.iter().cloned().collect(),
                    source: source.clone(),
                    destination: destination.clone(),
                    service: service.clone(),
                    translated_source: candidate.clone(),
                    translated_destination: translated_destination.clone(),
                    translated_service: None,
                    method: if candidate.is_some() && source_plan.is_static {
                        NatMethod::Static
                    } else {
                        NatMethod::Hide
                    },
                    enabled: !entry.disabled,
                };

                let mut extra = None;
                match &plan {
                    PortPlan::None => {}
                    PortPlan::Single { translated } => {
                        rule.translated_service = Some(translated.clone());
                    }
                    PortPlan::Split {
                        tcp_source,
                        tcp_translated,
                        udp_source,
                        udp_translated,
                    } => {
                        rule.service = tcp_source.clone();
                        rule.translated_service = Some(tcp_translated.clone());
                        let mut udp = rule.clone();
                        udp.service = udp_source.clone();
                        udp.translated_service = Some(udp_translated.clone());
                        extra = Some(udp);
                    }
                }
                port_plan = Some(plan);

                let mirror = match candidate {
                    Some(translated) if source_plan.bidirectional && dest_none => Some(NatRule {
                        name: format!("{rule_name}_BD"),
                        source: rule.destination.clone(),
                        destination: translated.clone(),
                        translated_source: rule.translated_destination.clone(),
                        translated_destination: Some(rule.source.clone()),
                        ..rule.clone()
                    }),
                    _ => None,
                };

                out.push(rule);
                out.extend(mirror);
                out.extend(extra);
                *index += 1;
            }
        }
    }
}

fn is_domain(scope: &ConversionScope<'_>, name: &str) -> bool {
    scope.base.object(name).is_some_and(CpObject::is_domain)
}

fn or_any(cells: Vec<String>) -> Vec<String> {
    if cells.is_empty() {
        vec![ANY.to_string()]
    } else {
        cells
    }
}

/// Static source translation to a known address marked bi-directional.
fn is_bidirectional(scope: &ConversionScope<'_>, entry: &NatRuleEntry) -> bool {
    matches!(
        &entry.source_translation,
        Some(SourceTranslation::StaticIp {
            translated_address: Some(address),
            bi_directional: true,
        }) if scope.base.address(address).is_some()
    )
}

fn source_plan(scope: &mut ConversionScope<'_>, entry: &NatRuleEntry) -> SourcePlan {
    let name = entry.meta.name.as_str();
    let mut plan = SourcePlan {
        candidates: Vec::new(),
        is_static: false,
        bidirectional: false,
    };

    match &entry.source_translation {
        Some(SourceTranslation::StaticIp {
            translated_address: Some(address),
            bi_directional,
        }) => match scope.base.address(address) {
            Some(object) => {
                plan.candidates.push(Some(object.name.clone()));
                plan.is_static = true;
                plan.bidirectional = *bi_directional;
            }
            None => missing_translated_source(scope, name, address),
        },
        Some(SourceTranslation::StaticIp {
            translated_address: None,
            ..
        })
        | None => {}
        Some(SourceTranslation::DynamicIp {
            translated_addresses,
        }) => {
            for address in translated_addresses {
                match scope.base.network_object(address) {
                    Some(object) => plan.candidates.push(Some(object.name.clone())),
                    None => missing_translated_source(scope, name, address),
                }
            }
        }
        Some(SourceTranslation::DynamicIpAndPort {
            translated_addresses,
            interface_ip,
        }) => {
            for address in translated_addresses {
                match network_target(scope, address) {
                    Some((target, created)) => {
                        if created {
                            created_for_nat(scope, &target);
                        }
                        plan.candidates.push(Some(target));
                    }
                    None => missing_translated_source(scope, name, address),
                }
            }
            if let Some(ip) = interface_ip {
                let target = interface_host(scope, ip);
                plan.candidates.push(Some(target));
            }
        }
    }

    if plan.candidates.is_empty() {
        plan.candidates.push(None);
    }
    plan
}

fn missing_translated_source(scope: &mut ConversionScope<'_>, rule: &str, address: &str) {
    scope.warn(format!(
        "{rule} NAT rule source translation is not converted because translated address is not defined or converted: {address}"
    ));
}

fn created_for_nat(scope: &mut ConversionScope<'_>, target: &str) {
    let kind = match scope.object_kind(target) {
        Some(ObjectKind::Host { .. }) => "host",
        _ => "network",
    };
    scope.warn(format!("{target} {kind} object is created for NAT rule."));
}

/// Host object for an interface address, reused across rules.
fn interface_host(scope: &mut ConversionScope<'_>, raw: &str) -> String {
    if let Some(object) = scope.base.address(raw) {
        return object.name.clone();
    }
    let ip = raw.split('/').next().unwrap_or(raw).trim();
    let name = scope.issue_name(&format!("NatIntf_{ip}"), "address host");
    let target = scope.base.insert(CpObject::host(name, ip));
    scope.base.addresses.insert(raw.to_string(), target.clone());
    created_for_nat(scope, &target);
    target
}

fn check_translated_address(
    scope: &ConversionScope<'_>,
    rule: &str,
    translation: &DestinationTranslation,
    dynamic: bool,
    errors: &mut Vec<String>,
) {
    let Some(address) = translation.translated_address.as_deref() else {
        return;
    };
    let found = if dynamic {
        scope.base.network_object(address).is_some()
    } else {
        is_network_target(scope, address)
    };
    if !found {
        let label = if dynamic {
            "dynamic destination translation"
        } else {
            "destination translation"
        };
        errors.push(format!(
            "{rule} NAT rule is not converted because {label} object is not defined or converted: {address}"
        ));
    }
}

/// Target of a destination translation already checked with
/// [`check_translated_address`].
fn translated_address(
    scope: &mut ConversionScope<'_>,
    translation: &DestinationTranslation,
    dynamic: bool,
) -> Option<String> {
    let address = translation.translated_address.as_deref()?;
    if dynamic {
        scope.base.network_object(address).map(|object| object.name.clone())
    } else {
        network_target(scope, address).map(|(target, _)| target)
    }
}

fn plan_ports(scope: &mut ConversionScope<'_>, rule: &str, service: &str, port: &str) -> PortPlan {
    if service == ANY {
        let tcp_source = nat_service(scope, &format!("Nat_SrcTcp_{rule}"), Protocol::Tcp, FULL_PORT_RANGE);
        let udp_source = nat_service(scope, &format!("Nat_SrcUdp_{rule}"), Protocol::Udp, FULL_PORT_RANGE);
        return PortPlan::Split {
            tcp_source,
            tcp_translated: translated_service(scope, rule, Protocol::Tcp, port),
            udp_source,
            udp_translated: translated_service(scope, rule, Protocol::Udp, port),
        };
    }

    let scan = scan_protocols(scope, service);
    match (scan.tcp, scan.udp) {
        (true, false) => PortPlan::Single {
            translated: translated_service(scope, rule, Protocol::Tcp, port),
        },
        (false, true) => PortPlan::Single {
            translated: translated_service(scope, rule, Protocol::Udp, port),
        },
        (true, true) => {
            let tcp_name = scope.issue_name(&format!("Nat_SrcTcpGrp_{rule}"), "services group");
            let tcp_source = scope
                .base
                .insert(CpObject::service_group(tcp_name, scan.tcp_leaves));
            let udp_name = scope.issue_name(&format!("Nat_SrcUdpGrp_{rule}"), "services group");
            let udp_source = scope
                .base
                .insert(CpObject::service_group(udp_name, scan.udp_leaves));
            PortPlan::Split {
                tcp_source,
                tcp_translated: translated_service(scope, rule, Protocol::Tcp, port),
                udp_source,
                udp_translated: translated_service(scope, rule, Protocol::Udp, port),
            }
        }
        (false, false) => {
            scope.warn(format!(
                "{rule} NAT rule translated port is not converted because the protocol of service {service} is unknown"
            ));
            PortPlan::None
        }
    }
}

/// Protocols of a source service or service group, with the leaf services
/// of each protocol when it is a group.
fn scan_protocols(scope: &ConversionScope<'_>, service: &str) -> ProtocolScan {
    let mut scan = ProtocolScan::default();
    if let Some(object) = scope.base.service(service) {
        let protocol = object
            .protocol()
            .or_else(|| scope.service_protocol(&object.name))
            .or_else(|| scope.base.service_types.get(service).copied());
        match protocol {
            Some(Protocol::Tcp) => scan.tcp = true,
            Some(Protocol::Udp) => scan.udp = true,
            None => {}
        }
        return scan;
    }
    if let Some(group) = scope.base.service_group(service) {
        let mut visited = HashSet::new();
        scan_group(scope, &group.name, &mut visited, &mut scan);
    }
    scan
}

fn scan_group(
    scope: &ConversionScope<'_>,
    name: &str,
    visited: &mut HashSet<String>,
    scan: &mut ProtocolScan,
) {
    if !visited.insert(name.to_string()) {
        return;
    }
    let Some(object) = scope.base.object(name) else {
        return;
    };
    if let Some(members) = object.members() {
        for member in members {
            scan_group(scope, member, visited, scan);
        }
        return;
    }
    match scope.service_protocol(name) {
        Some(Protocol::Tcp) => {
            scan.tcp = true;
            scan.tcp_leaves.push(name.to_string());
        }
        Some(Protocol::Udp) => {
            scan.udp = true;
            scan.udp_leaves.push(name.to_string());
        }
        None => {}
    }
}

fn translated_service(scope: &mut ConversionScope<'_>, rule: &str, protocol: Protocol, port: &str) -> String {
    if let Some(known) = scope.known_service(protocol, port) {
        return known.name;
    }
    let requested = match protocol {
        Protocol::Tcp => format!("Nat_TrTcp_{rule}"),
        Protocol::Udp => format!("Nat_TrUdp_{rule}"),
    };
    nat_service(scope, &requested, protocol, port)
}

fn nat_service(scope: &mut ConversionScope<'_>, requested: &str, protocol: Protocol, port: &str) -> String {
    let label = match protocol {
        Protocol::Tcp => "tcp service",
        Protocol::Udp => "udp service",
    };
    let name = scope.issue_name(requested, label);
    scope
        .base
        .insert(CpObject::service(name, protocol, port, None))
}
