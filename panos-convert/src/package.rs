//! Converted policy: layered security rulebase and NAT rules.
//!
//! Rules reference objects by target name; the objects themselves live in the
//! scope's registry.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::objects::ANY;

/// Report-only marker closing the parent layer.
pub const CLEANUP_RULE: &str = "Cleanup rule";
/// Marker closing every sub-policy layer.
pub const SUB_POLICY_CLEANUP: &str = "Sub-Policy Cleanup";
/// Longest package base name the target accepts.
pub const MAX_PACKAGE_NAME_LEN: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Accept,
    Drop,
    SubPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Track {
    None,
    Log,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityRule {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub comments: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub conversion_comments: String,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    pub source: Vec<String>,
    pub destination: Vec<String>,
    pub service: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub application: Vec<String>,
    pub action: RuleAction,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub time: Vec<String>,
    pub track: Track,
    pub enabled: bool,
    pub source_negated: bool,
    pub destination_negated: bool,
    pub layer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_policy_name: Option<String>,
}

fn any() -> Vec<String> {
    vec![ANY.to_string()]
}

fn is_any(cells: &[String]) -> bool {
    cells.is_empty() || (cells.len() == 1 && cells[0] == ANY)
}

impl SecurityRule {
    /// Rule matching everything with the given action.
    pub fn new(name: impl Into<String>, action: RuleAction) -> Self {
        Self {
            name: name.into(),
            comments: String::new(),
            conversion_comments: String::new(),
            tags: BTreeSet::new(),
            source: any(),
            destination: any(),
            service: any(),
            application: Vec::new(),
            action,
            time: Vec::new(),
            track: Track::Log,
            enabled: true,
            source_negated: false,
            destination_negated: false,
            layer: String::new(),
            sub_policy_name: None,
        }
    }

    /// Closing drop-all marker of a layer.
    pub fn cleanup(name: &str, layer: &str) -> Self {
        let mut rule = Self::new(name, RuleAction::Drop);
        rule.track = Track::None;
        rule.layer = layer.to_string();
        rule
    }

    /// A cleanup marker, or a user rule dropping everything.
    pub fn is_cleanup(&self) -> bool {
        if self.name == SUB_POLICY_CLEANUP || self.name == CLEANUP_RULE {
            return true;
        }
        self.action == RuleAction::Drop
            && self.matches_everything()
    }

    /// Accepts everything.
    pub fn is_allow_any(&self) -> bool {
        self.action == RuleAction::Accept && self.matches_everything()
    }

    fn matches_everything(&self) -> bool {
        is_any(&self.source)
            && is_any(&self.destination)
            && is_any(&self.service)
            && self.application.is_empty()
            && self.time.is_empty()
            && !self.source_negated
            && !self.destination_negated
    }

    /// Every object name the rule references.
    pub fn references(&self) -> impl Iterator<Item = &String> {
        self.source
            .iter()
            .chain(&self.destination)
            .chain(&self.service)
            .chain(&self.application)
            .chain(&self.time)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Layer {
    pub name: String,
    pub rules: Vec<SecurityRule>,
    pub applications_and_url_filtering: bool,
}

impl Layer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
            applications_and_url_filtering: false,
        }
    }

    /// Append `rule`, moving it into this layer.
    pub fn push(&mut self, mut rule: SecurityRule) {
        rule.layer = self.name.clone();
        self.rules.push(rule);
    }

    pub fn ends_with_cleanup(&self) -> bool {
        self.rules.last().is_some_and(SecurityRule::is_cleanup)
    }

    /// Rules that came from the source policy or dispatch into a sub-policy.
    pub fn converted_rules(&self) -> usize {
        self.rules
            .iter()
            .filter(|rule| rule.name != CLEANUP_RULE && rule.name != SUB_POLICY_CLEANUP)
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Package {
    pub name: String,
    pub parent_layer: Layer,
    pub sub_policies: Vec<Layer>,
}

impl Package {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let parent_layer = Layer::new(format!("{name} Network"));
        Self {
            name,
            parent_layer,
            sub_policies: Vec::new(),
        }
    }

    pub fn sub_policy(&self, name: &str) -> Option<&Layer> {
        self.sub_policies.iter().find(|layer| layer.name == name)
    }

    /// Close every layer with its cleanup marker.
    pub fn close(&mut self) {
        for layer in &mut self.sub_policies {
            let name = layer.name.clone();
            layer.rules.push(SecurityRule::cleanup(SUB_POLICY_CLEANUP, &name));
        }
        if !self.parent_layer.ends_with_cleanup() {
            let name = self.parent_layer.name.clone();
            self.parent_layer
                .rules
                .push(SecurityRule::cleanup(CLEANUP_RULE, &name));
        }
    }

    pub fn converted_rules(&self) -> usize {
        self.parent_layer.converted_rules()
            + self
                .sub_policies
                .iter()
                .map(Layer::converted_rules)
                .sum::<usize>()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NatMethod {
    Hide,
    Static,
}

/// One NAT rule. `None` translations keep the original value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NatRule {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub comments: String,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    pub source: String,
    pub destination: String,
    pub service: String,
    pub translated_source: Option<String>,
    pub translated_destination: Option<String>,
    pub translated_service: Option<String>,
    pub method: NatMethod,
    pub enabled: bool,
}

impl NatRule {
    pub fn references(&self) -> impl Iterator<Item = &String> {
        [&self.source, &self.destination, &self.service]
            .into_iter()
            .chain(self.translated_source.iter())
            .chain(self.translated_destination.iter())
            .chain(self.translated_service.iter())
    }
}
