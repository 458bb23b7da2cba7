//! TCP/UDP service entries.
//!
//! A service with several ports or source ports becomes a service group with
//! one leaf per (port, source port) pair. Leaves matching a predefined
//! service are replaced by it.

use crate::objects::{CpObject, Protocol};
use crate::scope::ConversionScope;
use crate::source::{PortSpec, ServiceEntry};

/// Predefined PAN-OS services every configuration can reference.
pub const SERVICE_HTTP: &str = "service-http";
pub const SERVICE_HTTPS: &str = "service-https";
const SERVICE_HTTP_MEMBERS: [&str; 2] = ["http", "HTTP_proxy"];

/// Add the PAN-OS predefined services to the scope's service dictionary.
pub fn seed_predefined_services(scope: &mut ConversionScope<'_>) {
    for member in SERVICE_HTTP_MEMBERS {
        scope.predefined_types.insert(member.to_string(), Protocol::Tcp);
        scope.reserve_name(member);
        scope.base.insert(CpObject::predefined(member));
    }
    let name = scope.issue_name(SERVICE_HTTP, "services group");
    let group = CpObject::service_group(
        name,
        SERVICE_HTTP_MEMBERS.iter().map(|m| m.to_string()).collect(),
    );
    let target = scope.base.insert(group);
    scope.base.services.insert(SERVICE_HTTP.to_string(), target);

    let https = match scope.known_service(Protocol::Tcp, "443") {
        Some(known) => known.name,
        None => {
            let name = scope.issue_name(SERVICE_HTTPS, "tcp service");
            scope
                .base
                .insert(CpObject::service(name, Protocol::Tcp, "443", None))
        }
    };
    scope.base.services.insert(SERVICE_HTTPS.to_string(), https);
}

pub fn convert_services(scope: &mut ConversionScope<'_>, entries: &[ServiceEntry]) {
    for entry in entries {
        if let Some(tcp) = &entry.tcp {
            convert_block(scope, entry, Protocol::Tcp, tcp);
            scope
                .base
                .service_types
                .insert(entry.meta.name.clone(), Protocol::Tcp);
        }
        if let Some(udp) = &entry.udp {
            convert_block(scope, entry, Protocol::Udp, udp);
            scope
                .base
                .service_types
                .insert(entry.meta.name.clone(), Protocol::Udp);
        }
    }
}

fn split_ports(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|port| !port.is_empty())
        .map(str::to_string)
        .collect()
}

/// Rewrite a leading `0` to `1`, so `0-1023` becomes `1-1023`.
///
/// Also rewrites values like `080`; a warning records every rewrite.
pub fn adjust_ports(scope: &mut ConversionScope<'_>, service: &str, port: &str) -> String {
    match port.strip_prefix('0') {
        Some(rest) => {
            let adjusted = format!("1{rest}");
            scope.warn(format!(
                "{service} service port {port} was adjusted to {adjusted}"
            ));
            adjusted
        }
        None => port.to_string(),
    }
}

fn protocol_label(protocol: Protocol) -> &'static str {
    match protocol {
        Protocol::Tcp => "tcp service",
        Protocol::Udp => "udp service",
    }
}

fn convert_block(
    scope: &mut ConversionScope<'_>,
    entry: &ServiceEntry,
    protocol: Protocol,
    spec: &PortSpec,
) {
    let source = &entry.meta.name;
    let mut requested = source.clone();
    if !source.chars().next().is_some_and(char::is_alphabetic) {
        requested = format!("{protocol}_{source}");
        scope.warn(format!(
            "{source} service ({protocol}) was renamed to {requested}"
        ));
    }

    let ports = split_ports(&spec.port);
    let source_ports = spec
        .source_port
        .as_deref()
        .map(split_ports)
        .unwrap_or_default();

    let target = if ports.len() > 1 || source_ports.len() > 1 {
        let group_name = scope.issue_name(&requested, "services group");
        scope.warn(format!(
            "{requested} {} is replaced by service group: {group_name}",
            protocol_label(protocol)
        ));

        let source_ports: Vec<Option<&str>> = if source_ports.is_empty() {
            vec![None]
        } else {
            source_ports.iter().map(|p| Some(p.as_str())).collect()
        };
        let mut members = Vec::new();
        for port in &ports {
            for source_port in &source_ports {
                let mut leaf_name = format!("{requested}_{port}");
                if let Some(source_port) = source_port {
                    leaf_name.push('_');
                    leaf_name.push_str(source_port);
                }
                let leaf = leaf_service(scope, entry, protocol, &leaf_name, port, *source_port);
                scope
                    .base
                    .services
                    .insert(leaf.name.clone(), leaf.name.clone());
                members.push(leaf.name);
            }
        }

        let group = CpObject::service_group(group_name, members)
            .with_comments(entry.meta.description.as_deref())
            .with_tags(entry.meta.tags.iter().cloned());
        scope.base.insert(group)
    } else {
        let port = ports.first().map(String::as_str).unwrap_or_default();
        let source_port = source_ports.first().map(String::as_str);
        leaf_service(scope, entry, protocol, &requested, port, source_port).name
    };

    scope.base.services.insert(source.clone(), target);
}

fn leaf_service(
    scope: &mut ConversionScope<'_>,
    entry: &ServiceEntry,
    protocol: Protocol,
    requested: &str,
    port: &str,
    source_port: Option<&str>,
) -> CpObject {
    let port = adjust_ports(scope, requested, port);
    let source_port = source_port.map(|sp| adjust_ports(scope, requested, sp));

    if source_port.is_none() {
        if let Some(known) = scope.known_service(protocol, &port) {
            return known;
        }
    }

    let name = scope.issue_name(requested, protocol_label(protocol));
    let object = CpObject::service(name, protocol, port, source_port)
        .with_comments(entry.meta.description.as_deref())
        .with_tags(entry.meta.tags.iter().cloned());
    scope.base.insert(object.clone());
    object
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::known::{default_reserved_words, AppsMatch, Catalog};
    use crate::objects::ObjectKind;
    use crate::scope::ConvertOptions;
    use crate::source::EntryMeta;
    use pretty_assertions::assert_eq;

    fn service(name: &str, tcp: Option<&str>, udp: Option<&str>) -> ServiceEntry {
        let spec = |port: &str| PortSpec {
            port: port.to_string(),
            source_port: None,
        };
        ServiceEntry {
            meta: EntryMeta {
                name: name.to_string(),
                ..EntryMeta::default()
            },
            tcp: tcp.map(spec),
            udp: udp.map(spec),
        }
    }

    fn bare_catalog() -> Catalog {
        Catalog::from_parts(
            default_reserved_words(),
            vec![],
            AppsMatch::default(),
            "test".to_string(),
        )
    }

    #[test]
    fn multiple_ports_become_a_group() {
        let catalog = bare_catalog();
        let options = ConvertOptions::new();
        let mut scope = ConversionScope::new("vsys1", &catalog, &options);

        convert_services(&mut scope, &[service("multi", Some("80,443"), None)]);
        let group = scope.base.service("multi").expect("multi");
        assert_eq!(group.name, "multi");
        assert_eq!(
            group.members(),
            Some(&["multi_80".to_string(), "multi_443".to_string()][..])
        );
        for leaf in ["multi_80", "multi_443"] {
            assert_eq!(
                scope.base.object(leaf).and_then(CpObject::protocol),
                Some(Protocol::Tcp)
            );
        }
        assert_eq!(
            scope.diagnostics.warnings,
            vec!["multi tcp service is replaced by service group: multi"]
        );
    }

    #[test]
    fn known_ports_reuse_predefined_services() {
        let catalog = Catalog::embedded();
        let options = ConvertOptions::new();
        let mut scope = ConversionScope::new("vsys1", &catalog, &options);

        convert_services(&mut scope, &[service("web", Some("80,8443"), None)]);
        let group = scope.base.service("web").expect("web");
        assert_eq!(
            group.members(),
            Some(&["http".to_string(), "web_8443".to_string()][..])
        );
        assert_eq!(scope.service_protocol("http"), Some(Protocol::Tcp));
    }

    #[test]
    fn numeric_names_get_protocol_prefix_and_udp_wins_type() {
        let catalog = bare_catalog();
        let options = ConvertOptions::new();
        let mut scope = ConversionScope::new("vsys1", &catalog, &options);

        convert_services(&mut scope, &[service("5000", Some("5000"), Some("5000"))]);
        assert_eq!(scope.base.service_types["5000"], Protocol::Udp);
        assert_eq!(scope.base.services["5000"], "UDP_5000");
        assert!(scope.base.object("TCP_5000").is_some());
        assert!(scope
            .diagnostics
            .warnings
            .contains(&"5000 service (TCP) was renamed to TCP_5000".to_string()));
    }

    #[test]
    fn leading_zero_port_is_adjusted_with_warning() {
        let catalog = bare_catalog();
        let options = ConvertOptions::new();
        let mut scope = ConversionScope::new("vsys1", &catalog, &options);

        convert_services(&mut scope, &[service("low", Some("0-1023"), None)]);
        assert_eq!(
            scope.base.service("low").expect("low").kind,
            ObjectKind::TcpService {
                port: "1-1023".to_string(),
                source_port: None
            }
        );
        assert_eq!(
            scope.diagnostics.warnings,
            vec!["low service port 0-1023 was adjusted to 1-1023"]
        );
    }

    #[test]
    fn source_ports_multiply_leaves() {
        let catalog = bare_catalog();
        let options = ConvertOptions::new();
        let mut scope = ConversionScope::new("vsys1", &catalog, &options);
        let mut entry = service("app", Some("9000"), None);
        entry.tcp = Some(PortSpec {
            port: "9000".to_string(),
            source_port: Some("1000,2000".to_string()),
        });

        convert_services(&mut scope, &[entry]);
        assert_eq!(
            scope.base.service("app").and_then(CpObject::members),
            Some(&["app_9000_1000".to_string(), "app_9000_2000".to_string()][..])
        );
    }

    #[test]
    fn predefined_services_are_seeded() {
        let catalog = Catalog::embedded();
        let options = ConvertOptions::new();
        let mut scope = ConversionScope::new("shared", &catalog, &options);

        seed_predefined_services(&mut scope);
        let http = scope.base.service(SERVICE_HTTP).expect("service-http");
        assert_eq!(
            http.members(),
            Some(&["http".to_string(), "HTTP_proxy".to_string()][..])
        );
        assert_eq!(scope.base.services[SERVICE_HTTPS], "https");
    }
}
