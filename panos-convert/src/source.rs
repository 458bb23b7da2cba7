//! Typed view of a PAN-OS configuration export.
//!
//! Reads the `<config>` tree produced by [`xml_tree::parse`] into owned
//! structs. Only the parts the converter consumes are modeled: shared objects,
//! firewall vsys entries and Panorama device groups with their objects, zones,
//! security rules and NAT rules.
//!
//! Absent member lists default to `any`, matching how PAN-OS treats them.

use chrono::Weekday;
use xml_tree::XmlNode;

use crate::objects::ANY;
use crate::pipeline::ConvertError;

/// Device entry name used by firewall and Panorama exports.
pub const LOCAL_DEVICE_ENTRY: &str = "localhost.localdomain";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PanConfig {
    pub shared: ObjectSet,
    pub device: DeviceEntry,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceEntry {
    pub name: String,
    pub vsys: Vec<ScopeEntry>,
    pub device_groups: Vec<ScopeEntry>,
}

impl DeviceEntry {
    /// Vsys entries first, then device groups.
    pub fn scopes(&self) -> impl Iterator<Item = &ScopeEntry> {
        self.vsys.iter().chain(self.device_groups.iter())
    }

    pub fn scope_count(&self) -> usize {
        self.vsys.len() + self.device_groups.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScopeKind {
    Vsys,
    DeviceGroup,
}

/// One independently converted scope.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeEntry {
    pub name: String,
    pub kind: ScopeKind,
    pub objects: ObjectSet,
    pub zones: Vec<ZoneEntry>,
    pub security_rules: Vec<SecurityRuleEntry>,
    pub nat_rules: Vec<NatRuleEntry>,
}

/// Object collections that exist both in `<shared>` and in every scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectSet {
    pub tags: Vec<String>,
    pub addresses: Vec<AddressEntry>,
    pub address_groups: Vec<AddressGroupEntry>,
    pub services: Vec<ServiceEntry>,
    pub service_groups: Vec<GroupEntry>,
    pub application_groups: Vec<GroupEntry>,
    pub application_filters: Vec<String>,
    pub schedules: Vec<ScheduleEntry>,
}

/// Fields every named object entry carries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryMeta {
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneEntry {
    pub meta: EntryMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressEntry {
    pub meta: EntryMeta,
    pub ip_netmask: Option<String>,
    pub ip_range: Option<String>,
    pub fqdn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressGroupMembers {
    Static(Vec<String>),
    Dynamic { filter: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressGroupEntry {
    pub meta: EntryMeta,
    pub members: AddressGroupMembers,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec {
    pub port: String,
    pub source_port: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceEntry {
    pub meta: EntryMeta,
    pub tcp: Option<PortSpec>,
    pub udp: Option<PortSpec>,
}

/// Service groups and application groups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupEntry {
    pub meta: EntryMeta,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleKind {
    Daily(Vec<String>),
    Weekly(Vec<(Weekday, Vec<String>)>),
    NonRecurring(Vec<String>),
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub meta: EntryMeta,
    pub kind: ScheduleKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RuleType {
    #[default]
    Universal,
    Intrazone,
    Interzone,
}

impl RuleType {
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("intrazone") => RuleType::Intrazone,
            Some("interzone") => RuleType::Interzone,
            _ => RuleType::Universal,
        }
    }

    /// Whether a from/to zone pair is matched by this rule type.
    pub fn accepts(self, from: &str, to: &str) -> bool {
        match self {
            RuleType::Universal => true,
            RuleType::Intrazone => from == to,
            RuleType::Interzone => from != to,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityRuleEntry {
    pub meta: EntryMeta,
    pub from: Vec<String>,
    pub to: Vec<String>,
    pub source: Vec<String>,
    pub destination: Vec<String>,
    pub source_user: Vec<String>,
    pub application: Vec<String>,
    pub service: Vec<String>,
    pub category: Vec<String>,
    pub action: String,
    pub schedule: Option<String>,
    pub rule_type: RuleType,
    pub log_start: Option<String>,
    pub log_end: Option<String>,
    pub disabled: bool,
    pub negate_source: bool,
    pub negate_destination: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceTranslation {
    StaticIp {
        translated_address: Option<String>,
        bi_directional: bool,
    },
    DynamicIp {
        translated_addresses: Vec<String>,
    },
    DynamicIpAndPort {
        translated_addresses: Vec<String>,
        interface_ip: Option<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestinationTranslation {
    pub translated_address: Option<String>,
    pub translated_port: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NatRuleEntry {
    pub meta: EntryMeta,
    pub source: Vec<String>,
    pub destination: Vec<String>,
    pub service: String,
    pub nat_type: Option<String>,
    pub disabled: bool,
    pub source_translation: Option<SourceTranslation>,
    pub destination_translation: Option<DestinationTranslation>,
    pub dynamic_destination_translation: Option<DestinationTranslation>,
}

/// Read a parsed export into a [`PanConfig`].
pub fn read_config(root: &XmlNode) -> Result<PanConfig, ConvertError> {
    if root.tag != "config" {
        return Err(ConvertError::NotPanosConfig {
            tag: root.tag.clone(),
        });
    }

    let shared = root
        .get_child("shared")
        .map(read_object_set)
        .unwrap_or_default();

    let devices = root.entries(&["devices"]);
    let device = devices
        .iter()
        .find(|entry| entry.name() == Some(LOCAL_DEVICE_ENTRY))
        .or_else(|| devices.first())
        .ok_or(ConvertError::MissingDevices)?;

    let device = DeviceEntry {
        name: device.name().unwrap_or_default().to_string(),
        vsys: device
            .entries(&["vsys"])
            .into_iter()
            .map(|node| read_scope(node, ScopeKind::Vsys))
            .collect(),
        device_groups: device
            .entries(&["device-group"])
            .into_iter()
            .map(|node| read_scope(node, ScopeKind::DeviceGroup))
            .collect(),
    };

    if device.scope_count() == 0 {
        return Err(ConvertError::NoScopes {
            device: device.name,
        });
    }

    Ok(PanConfig { shared, device })
}

fn read_scope(node: &XmlNode, kind: ScopeKind) -> ScopeEntry {
    let (security_rules, nat_rules) = match kind {
        ScopeKind::Vsys => (
            read_security_rules(node, "rulebase"),
            read_nat_rules(node, "rulebase"),
        ),
        ScopeKind::DeviceGroup => {
            let mut security = read_security_rules(node, "pre-rulebase");
            security.extend(read_security_rules(node, "post-rulebase"));
            let mut nat = read_nat_rules(node, "pre-rulebase");
            nat.extend(read_nat_rules(node, "post-rulebase"));
            (security, nat)
        }
    };

    ScopeEntry {
        name: node.name().unwrap_or_default().to_string(),
        kind,
        objects: read_object_set(node),
        zones: node
            .entries(&["zone"])
            .into_iter()
            .map(|zone| ZoneEntry { meta: meta(zone) })
            .collect(),
        security_rules,
        nat_rules,
    }
}

fn read_object_set(node: &XmlNode) -> ObjectSet {
    ObjectSet {
        tags: names(node, "tag"),
        addresses: node.entries(&["address"]).into_iter().map(read_address).collect(),
        address_groups: node
            .entries(&["address-group"])
            .into_iter()
            .map(read_address_group)
            .collect(),
        services: node.entries(&["service"]).into_iter().map(read_service).collect(),
        service_groups: node
            .entries(&["service-group"])
            .into_iter()
            .map(|entry| read_group(entry, &["members"]))
            .collect(),
        application_groups: node
            .entries(&["application-group"])
            .into_iter()
            .map(|entry| read_group(entry, &["members"]))
            .collect(),
        application_filters: names(node, "application-filter"),
        schedules: node.entries(&["schedule"]).into_iter().map(read_schedule).collect(),
    }
}

fn names(node: &XmlNode, collection: &str) -> Vec<String> {
    node.entries(&[collection])
        .into_iter()
        .filter_map(|entry| entry.name())
        .map(str::to_string)
        .collect()
}

fn meta(entry: &XmlNode) -> EntryMeta {
    EntryMeta {
        name: entry.name().unwrap_or_default().to_string(),
        description: entry.text_of(&["description"]),
        tags: entry.members(&["tag"]),
    }
}

fn read_address(entry: &XmlNode) -> AddressEntry {
    AddressEntry {
        meta: meta(entry),
        ip_netmask: entry.text_of(&["ip-netmask"]),
        ip_range: entry.text_of(&["ip-range"]),
        fqdn: entry.text_of(&["fqdn"]),
    }
}

fn read_address_group(entry: &XmlNode) -> AddressGroupEntry {
    let members = if let Some(filter) = entry.text_of(&["dynamic", "filter"]) {
        AddressGroupMembers::Dynamic { filter }
    } else {
        AddressGroupMembers::Static(entry.members(&["static"]))
    };
    AddressGroupEntry {
        meta: meta(entry),
        members,
    }
}

fn read_port_spec(entry: &XmlNode, protocol: &str) -> Option<PortSpec> {
    let block = entry.get_path(&["protocol", protocol])?;
    Some(PortSpec {
        port: block.text_of(&["port"])?,
        source_port: block.text_of(&["source-port"]),
    })
}

fn read_service(entry: &XmlNode) -> ServiceEntry {
    ServiceEntry {
        meta: meta(entry),
        tcp: read_port_spec(entry, "tcp"),
        udp: read_port_spec(entry, "udp"),
    }
}

fn read_group(entry: &XmlNode, members: &[&str]) -> GroupEntry {
    GroupEntry {
        meta: meta(entry),
        members: entry.members(members),
    }
}

const WEEKDAYS: [(&str, Weekday); 7] = [
    ("monday", Weekday::Mon),
    ("tuesday", Weekday::Tue),
    ("wednesday", Weekday::Wed),
    ("thursday", Weekday::Thu),
    ("friday", Weekday::Fri),
    ("saturday", Weekday::Sat),
    ("sunday", Weekday::Sun),
];

fn read_schedule(entry: &XmlNode) -> ScheduleEntry {
    let kind = if let Some(recurring) = entry.get_path(&["schedule-type", "recurring"]) {
        if recurring.get_child("daily").is_some() {
            ScheduleKind::Daily(recurring.members(&["daily"]))
        } else if let Some(weekly) = recurring.get_child("weekly") {
            ScheduleKind::Weekly(
                WEEKDAYS
                    .iter()
                    .map(|(tag, day)| (*day, weekly.members(&[tag])))
                    .filter(|(_, members)| !members.is_empty())
                    .collect(),
            )
        } else {
            ScheduleKind::Empty
        }
    } else if entry.get_path(&["schedule-type", "non-recurring"]).is_some() {
        ScheduleKind::NonRecurring(entry.members(&["schedule-type", "non-recurring"]))
    } else {
        ScheduleKind::Empty
    };

    ScheduleEntry {
        meta: meta(entry),
        kind,
    }
}

fn members_or_any(entry: &XmlNode, tag: &str) -> Vec<String> {
    let members = entry.members(&[tag]);
    if members.is_empty() {
        vec![ANY.to_string()]
    } else {
        members
    }
}

fn is_yes(entry: &XmlNode, tag: &str) -> bool {
    entry
        .text_of(&[tag])
        .is_some_and(|value| value.eq_ignore_ascii_case("yes"))
}

fn read_security_rules(scope: &XmlNode, rulebase: &str) -> Vec<SecurityRuleEntry> {
    scope
        .entries(&[rulebase, "security", "rules"])
        .into_iter()
        .map(|entry| SecurityRuleEntry {
            meta: meta(entry),
            from: members_or_any(entry, "from"),
            to: members_or_any(entry, "to"),
            source: members_or_any(entry, "source"),
            destination: members_or_any(entry, "destination"),
            source_user: members_or_any(entry, "source-user"),
            application: members_or_any(entry, "application"),
            service: members_or_any(entry, "service"),
            category: members_or_any(entry, "category"),
            action: entry.text_of(&["action"]).unwrap_or_default(),
            schedule: entry.text_of(&["schedule"]),
            rule_type: RuleType::parse(entry.get_text(&["rule-type"])),
            log_start: entry.text_of(&["log-start"]),
            log_end: entry.text_of(&["log-end"]),
            disabled: is_yes(entry, "disabled"),
            negate_source: is_yes(entry, "negate-source"),
            negate_destination: is_yes(entry, "negate-destination"),
        })
        .collect()
}

fn read_source_translation(entry: &XmlNode) -> Option<SourceTranslation> {
    let block = entry.get_child("source-translation")?;
    if let Some(static_ip) = block.get_child("static-ip") {
        return Some(SourceTranslation::StaticIp {
            translated_address: static_ip.text_of(&["translated-address"]),
            bi_directional: is_yes(static_ip, "bi-directional"),
        });
    }
    if let Some(dynamic_ip) = block.get_child("dynamic-ip") {
        return Some(SourceTranslation::DynamicIp {
            translated_addresses: dynamic_ip.members(&["translated-address"]),
        });
    }
    if let Some(dipp) = block.get_child("dynamic-ip-and-port") {
        return Some(SourceTranslation::DynamicIpAndPort {
            translated_addresses: dipp.members(&["translated-address"]),
            interface_ip: dipp.text_of(&["interface-address", "ip"]),
        });
    }
    None
}

fn read_destination_translation(entry: &XmlNode, tag: &str) -> Option<DestinationTranslation> {
    let block = entry.get_child(tag)?;
    Some(DestinationTranslation {
        translated_address: block.text_of(&["translated-address"]),
        translated_port: block.text_of(&["translated-port"]),
    })
}

fn read_nat_rules(scope: &XmlNode, rulebase: &str) -> Vec<NatRuleEntry> {
    scope
        .entries(&[rulebase, "nat", "rules"])
        .into_iter()
        .map(|entry| NatRuleEntry {
            meta: meta(entry),
            source: members_or_any(entry, "source"),
            destination: members_or_any(entry, "destination"),
            service: entry.text_of(&["service"]).unwrap_or_else(|| ANY.to_string()),
            nat_type: entry.text_of(&["nat-type"]),
            disabled: is_yes(entry, "disabled"),
            source_translation: read_source_translation(entry),
            destination_translation: read_destination_translation(entry, "destination-translation"),
            dynamic_destination_translation: read_destination_translation(
                entry,
                "dynamic-destination-translation",
            ),
        })
        .collect()
}
