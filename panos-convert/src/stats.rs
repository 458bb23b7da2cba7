use std::collections::BTreeMap;

use serde::Serialize;

use crate::objects::{ObjectCategory, ANY};
use crate::package::{
    NatRule, Package, RuleAction, SecurityRule, CLEANUP_RULE, SUB_POLICY_CLEANUP,
};
use crate::scope::{Diagnostics, ObjectBase, ObjectRegistry};

/// Counters printed after a conversion.
///
/// Multi-scope runs aggregate with `-1` for the per-scope counters, so every
/// count is signed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConversionSummary {
    pub rules: i64,
    pub nat_rules: i64,
    pub network_objects: i64,
    pub service_objects: i64,
    pub application_objects: i64,
    pub time_objects: i64,
    pub zones: i64,
    pub access_roles: i64,
    pub warnings: i64,
    pub errors: i64,
    #[serde(flatten)]
    pub policy: PolicyStats,
}

/// Rulebase health counters.
///
/// Rule counters cover rules converted from the source policy; dispatch
/// rules and cleanup markers are left out. Unused objects are converted
/// network and service objects no rule references.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PolicyStats {
    pub disabled_rules: i64,
    /// Rules with `any` as source, destination or service.
    pub any_rules: i64,
    pub time_rules: i64,
    pub uncommented_rules: i64,
    pub unused_network_objects: i64,
    pub unused_service_objects: i64,
}

/// Not counted for aggregate runs.
pub const NOT_COUNTED: i64 = -1;

/// Objects a scope produced and the subset its rules reference.
pub struct ScopeObjects<'a> {
    pub base: &'a ObjectBase,
    pub referenced: &'a ObjectRegistry,
    pub exported: &'a ObjectRegistry,
}

pub fn summarize(
    package: &Package,
    nat_rules: &[NatRule],
    objects: ScopeObjects<'_>,
    diagnostics: &Diagnostics,
) -> ConversionSummary {
    let mut by_category: BTreeMap<ObjectCategory, i64> = BTreeMap::new();
    for object in objects.exported.objects() {
        *by_category.entry(object.category()).or_default() += 1;
    }
    let count = |category| by_category.get(&category).copied().unwrap_or(0);

    ConversionSummary {
        rules: package.converted_rules() as i64,
        nat_rules: nat_rules.len() as i64,
        network_objects: count(ObjectCategory::Network),
        service_objects: count(ObjectCategory::Service),
        application_objects: count(ObjectCategory::Application),
        time_objects: count(ObjectCategory::Time),
        zones: count(ObjectCategory::Zone),
        access_roles: count(ObjectCategory::AccessRole),
        warnings: diagnostics.warnings.len() as i64,
        errors: diagnostics.errors.len() as i64,
        policy: analyze_policy(package, objects.base, objects.referenced),
    }
}

fn is_source_rule(rule: &SecurityRule) -> bool {
    rule.action != RuleAction::SubPolicy && rule.name != CLEANUP_RULE && rule.name != SUB_POLICY_CLEANUP
}

fn is_any_cell(cells: &[String]) -> bool {
    cells.first().is_some_and(|cell| cell == ANY)
}

fn analyze_policy(package: &Package, base: &ObjectBase, referenced: &ObjectRegistry) -> PolicyStats {
    let mut stats = PolicyStats::default();
    let rules = std::iter::once(&package.parent_layer)
        .chain(&package.sub_policies)
        .flat_map(|layer| &layer.rules)
        .filter(|rule| is_source_rule(rule));
    for rule in rules {
        if !rule.enabled {
            stats.disabled_rules += 1;
        }
        if is_any_cell(&rule.source) || is_any_cell(&rule.destination) || is_any_cell(&rule.service) {
            stats.any_rules += 1;
        }
        if !rule.time.is_empty() {
            stats.time_rules += 1;
        }
        if rule.comments.trim().is_empty() {
            stats.uncommented_rules += 1;
        }
    }

    for object in base.objects().filter(|object| !referenced.contains(&object.name)) {
        match object.category() {
            ObjectCategory::Network => stats.unused_network_objects += 1,
            ObjectCategory::Service => stats.unused_service_objects += 1,
            _ => {}
        }
    }
    stats
}

/// Sum object counts over scopes; rule and message counters become `-1`.
pub fn aggregate(summaries: &[ConversionSummary]) -> ConversionSummary {
    if let [single] = summaries {
        return *single;
    }
    let mut total = ConversionSummary {
        rules: NOT_COUNTED,
        nat_rules: NOT_COUNTED,
        warnings: NOT_COUNTED,
        errors: NOT_COUNTED,
        policy: PolicyStats {
            disabled_rules: NOT_COUNTED,
            any_rules: NOT_COUNTED,
            time_rules: NOT_COUNTED,
            uncommented_rules: NOT_COUNTED,
            ..PolicyStats::default()
        },
        ..ConversionSummary::default()
    };
    for summary in summaries {
        total.network_objects += summary.network_objects;
        total.service_objects += summary.service_objects;
        total.application_objects += summary.application_objects;
        total.time_objects += summary.time_objects;
        total.zones += summary.zones;
        total.access_roles += summary.access_roles;
        total.policy.unused_network_objects += summary.policy.unused_network_objects;
        total.policy.unused_service_objects += summary.policy.unused_service_objects;
    }
    total
}

pub fn render(summary: ConversionSummary) -> String {
    let policy = summary.policy;
    format!(
        "convert_summary rules={} nat_rules={} network_objects={} service_objects={} application_objects={} time_objects={} zones={} access_roles={} warnings={} errors={} disabled_rules={} any_rules={} time_rules={} uncommented_rules={} unused_network_objects={} unused_service_objects={}",
        summary.rules,
        summary.nat_rules,
        summary.network_objects,
        summary.service_objects,
        summary.application_objects,
        summary.time_objects,
        summary.zones,
        summary.access_roles,
        summary.warnings,
        summary.errors,
        policy.disabled_rules,
        policy.any_rules,
        policy.time_rules,
        policy.uncommented_rules,
        policy.unused_network_objects,
        policy.unused_service_objects,
    )
}
