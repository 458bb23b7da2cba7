//! Canonical Check Point object model.
//!
//! Every converted object is a [`CpObject`]: the fields shared by all objects
//! (name, comments, tags, incident marker) plus an [`ObjectKind`] carrying the
//! variant-specific payload. Group variants store member *names*; the owning
//! [`crate::scope::ObjectBase`] resolves them back to objects when needed.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{NaiveDateTime, Weekday};
use serde::Serialize;

/// Wildcard used by PAN-OS member lists.
pub const ANY: &str = "any";
/// Service sentinel meaning "whatever ports the application uses".
pub const APPLICATION_DEFAULT: &str = "application-default";
/// Port range used for the synthesized "any" NAT services.
pub const FULL_PORT_RANGE: &str = "1-65535";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionIncident {
    #[default]
    None,
    Informational,
    ManualActionRequired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One enabled `HH:mm-HH:mm` window of a recurring time object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HourRange {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recurrence {
    Daily,
    Weekly(Weekday),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "pattern", rename_all = "snake_case")]
pub enum TimeSpec {
    /// Starts now, never ends, active during up to three hour ranges.
    Recurring {
        recurrence: Recurrence,
        hour_ranges: Vec<HourRange>,
    },
    /// Absolute window.
    Absolute {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

impl TimeSpec {
    /// Start and end formatted as Check Point expects (`dd-Mon-yyyy`, `HH:mm`).
    pub fn absolute_window(&self) -> Option<[String; 4]> {
        match self {
            TimeSpec::Absolute { start, end } => Some([
                start.format("%d-%b-%Y").to_string(),
                start.format("%H:%M").to_string(),
                end.format("%d-%b-%Y").to_string(),
                end.format("%H:%M").to_string(),
            ]),
            TimeSpec::Recurring { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessRoleUser {
    pub name: String,
    /// Full distinguished name when the source user was given in DN form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_dn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectKind {
    Host {
        ip_address: String,
    },
    Network {
        subnet: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        netmask: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        mask_length: Option<u8>,
    },
    Range {
        range_from: String,
        range_to: String,
    },
    Domain {
        fqdn: String,
    },
    Zone,
    TcpService {
        port: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        source_port: Option<String>,
    },
    UdpService {
        port: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        source_port: Option<String>,
    },
    NetworkGroup {
        members: Vec<String>,
    },
    ServiceGroup {
        members: Vec<String>,
    },
    ApplicationGroup {
        members: Vec<String>,
    },
    Time(TimeSpec),
    AccessRole {
        networks: Vec<String>,
        users: Vec<AccessRoleUser>,
        #[serde(skip_serializing_if = "Option::is_none")]
        account_unit: Option<String>,
    },
    /// Object that already exists on the management server.
    Predefined,
}

/// Reporting bucket for an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectCategory {
    Network,
    Service,
    Application,
    Time,
    Zone,
    AccessRole,
    Predefined,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CpObject {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub comments: String,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    pub incident: ConversionIncident,
    #[serde(flatten)]
    pub kind: ObjectKind,
}

impl CpObject {
    pub fn new(name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            name: name.into(),
            comments: String::new(),
            tags: BTreeSet::new(),
            incident: ConversionIncident::None,
            kind,
        }
    }

    pub fn predefined(name: impl Into<String>) -> Self {
        Self::new(name, ObjectKind::Predefined)
    }

    pub fn any() -> Self {
        Self::predefined(ANY)
    }

    pub fn host(name: impl Into<String>, ip: impl Into<String>) -> Self {
        Self::new(
            name,
            ObjectKind::Host {
                ip_address: ip.into(),
            },
        )
    }

    pub fn service(
        name: impl Into<String>,
        protocol: Protocol,
        port: impl Into<String>,
        source_port: Option<String>,
    ) -> Self {
        let port = port.into();
        let kind = match protocol {
            Protocol::Tcp => ObjectKind::TcpService { port, source_port },
            Protocol::Udp => ObjectKind::UdpService { port, source_port },
        };
        Self::new(name, kind)
    }

    pub fn service_group(name: impl Into<String>, members: Vec<String>) -> Self {
        Self::new(name, ObjectKind::ServiceGroup { members })
    }

    pub fn with_comments(mut self, comments: Option<&str>) -> Self {
        self.comments = comments.unwrap_or_default().to_string();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Member names of a group variant.
    pub fn members(&self) -> Option<&[String]> {
        match &self.kind {
            ObjectKind::NetworkGroup { members }
            | ObjectKind::ServiceGroup { members }
            | ObjectKind::ApplicationGroup { members } => Some(members),
            _ => None,
        }
    }

    pub fn protocol(&self) -> Option<Protocol> {
        match self.kind {
            ObjectKind::TcpService { .. } => Some(Protocol::Tcp),
            ObjectKind::UdpService { .. } => Some(Protocol::Udp),
            _ => None,
        }
    }

    pub fn is_predefined(&self) -> bool {
        matches!(self.kind, ObjectKind::Predefined)
    }

    pub fn is_domain(&self) -> bool {
        matches!(self.kind, ObjectKind::Domain { .. })
    }

    pub fn is_service_group(&self) -> bool {
        matches!(self.kind, ObjectKind::ServiceGroup { .. })
    }

    pub fn category(&self) -> ObjectCategory {
        match self.kind {
            ObjectKind::Host { .. }
            | ObjectKind::Network { .. }
            | ObjectKind::Range { .. }
            | ObjectKind::Domain { .. }
            | ObjectKind::NetworkGroup { .. } => ObjectCategory::Network,
            ObjectKind::TcpService { .. }
            | ObjectKind::UdpService { .. }
            | ObjectKind::ServiceGroup { .. } => ObjectCategory::Service,
            ObjectKind::ApplicationGroup { .. } => ObjectCategory::Application,
            ObjectKind::Time(_) => ObjectCategory::Time,
            ObjectKind::Zone => ObjectCategory::Zone,
            ObjectKind::AccessRole { .. } => ObjectCategory::AccessRole,
            ObjectKind::Predefined => ObjectCategory::Predefined,
        }
    }

    /// Short type label used in rename warnings and reports.
    pub fn type_label(&self) -> &'static str {
        match self.kind {
            ObjectKind::Host { .. } => "address host",
            ObjectKind::Network { .. } => "address network",
            ObjectKind::Range { .. } => "address range",
            ObjectKind::Domain { .. } => "address fqdn",
            ObjectKind::Zone => "zone",
            ObjectKind::TcpService { .. } => "tcp service",
            ObjectKind::UdpService { .. } => "udp service",
            ObjectKind::NetworkGroup { .. } => "addresses group",
            ObjectKind::ServiceGroup { .. } => "services group",
            ObjectKind::ApplicationGroup { .. } => "application group",
            ObjectKind::Time(_) => "time",
            ObjectKind::AccessRole { .. } => "access-role",
            ObjectKind::Predefined => "predefined",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn group_variants_expose_members() {
        let group = CpObject::service_group("web", vec!["http".into(), "https".into()]);
        assert_eq!(group.members(), Some(&["http".to_string(), "https".to_string()][..]));
        assert!(group.is_service_group());
        assert_eq!(group.category(), ObjectCategory::Service);

        let host = CpObject::host("srv1", "10.0.0.5");
        assert_eq!(host.members(), None);
        assert_eq!(host.category(), ObjectCategory::Network);
    }

    #[test]
    fn service_constructor_picks_protocol_variant() {
        let udp = CpObject::service("dns", Protocol::Udp, "53", None);
        assert_eq!(udp.protocol(), Some(Protocol::Udp));
        assert_eq!(udp.type_label(), "udp service");
        assert_eq!(CpObject::any().protocol(), None);
    }

    #[test]
    fn absolute_time_formats_for_target() {
        let start = chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|d| d.and_hms_opt(8, 5, 0))
            .expect("valid date");
        let end = chrono::NaiveDate::from_ymd_opt(2024, 12, 31)
            .and_then(|d| d.and_hms_opt(23, 59, 0))
            .expect("valid date");
        let spec = TimeSpec::Absolute { start, end };

        assert_eq!(
            spec.absolute_window(),
            Some([
                "01-Mar-2024".to_string(),
                "08:05".to_string(),
                "31-Dec-2024".to_string(),
                "23:59".to_string()
            ])
        );
    }

    #[test]
    fn serializes_with_flattened_kind() {
        let host = CpObject::host("srv1", "10.0.0.5").with_tags(["dmz"]);
        let json = serde_json::to_value(&host).expect("serialize");
        assert_eq!(json["type"], "host");
        assert_eq!(json["ip_address"], "10.0.0.5");
        assert_eq!(json["tags"][0], "dmz");
    }
}
