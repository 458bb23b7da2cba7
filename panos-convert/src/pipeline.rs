//! Conversion orchestration.
//!
//! The shared objects are converted once into a base that every vsys or
//! device group starts from. Each scope is then converted independently:
//!
//! 1. zones
//! 2. addresses, address groups, services, service groups
//! 3. application filters and groups, schedules
//! 4. security rules into a layered package
//! 5. NAT rules (unless disabled)
//! 6. registration of every converted object, or only of the objects the
//!    rules reference when [`ConvertOptions::skip_unused`] is set
//!
//! Structural problems abort with [`ConvertError`]; everything else is
//! recorded in the scope's diagnostics.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use xml_tree::XmlNode;

use crate::known::Catalog;
use crate::objects::{CpObject, Protocol};
use crate::package::{NatRule, Package};
use crate::policy::nat::convert_nat_rules;
use crate::policy::security::convert_security_rules;
use crate::resolve::address_groups::convert_address_groups;
use crate::resolve::service_groups::convert_service_groups;
use crate::scope::{ConversionScope, ConvertOptions, Diagnostics, ObjectBase};
use crate::source::{read_config, ObjectSet, PanConfig, ScopeEntry, ScopeKind};
use crate::stats::{aggregate, summarize, ConversionSummary, ScopeObjects};
use crate::translate::addresses::convert_addresses;
use crate::translate::applications::{convert_application_filters, convert_application_groups};
use crate::translate::schedules::convert_schedules;
use crate::translate::services::{convert_services, seed_predefined_services};
use crate::translate::zones::convert_zones;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("not a PAN-OS configuration: root element is <{tag}>, expected <config>")]
    NotPanosConfig { tag: String },
    #[error("configuration has no <devices> entry")]
    MissingDevices,
    #[error("device {device} has neither vsys nor device-group entries")]
    NoScopes { device: String },
}

/// Converted output of one vsys or device group.
#[derive(Debug, Clone, Serialize)]
pub struct ScopeResult {
    pub name: String,
    pub kind: ScopeKind,
    pub package: Package,
    pub nat_rules: Vec<NatRule>,
    pub objects: Vec<CpObject>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub summary: ConversionSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutcome {
    /// Messages recorded while converting `<shared>`.
    pub shared: Diagnostics,
    pub scopes: Vec<ScopeResult>,
    pub summary: ConversionSummary,
}

impl ConversionOutcome {
    pub fn has_errors(&self) -> bool {
        !self.shared.errors.is_empty() || self.scopes.iter().any(|scope| !scope.errors.is_empty())
    }
}

/// Shared objects every scope starts from.
struct SharedBase {
    base: ObjectBase,
    predefined_types: BTreeMap<String, Protocol>,
    diagnostics: Diagnostics,
}

/// Parse-tree entry point: read the export, then convert it.
pub fn convert_xml(
    root: &XmlNode,
    catalog: &Catalog,
    options: &ConvertOptions,
) -> Result<ConversionOutcome, ConvertError> {
    let config = read_config(root)?;
    convert_config(&config, catalog, options)
}

pub fn convert_config(
    config: &PanConfig,
    catalog: &Catalog,
    options: &ConvertOptions,
) -> Result<ConversionOutcome, ConvertError> {
    if config.device.scope_count() == 0 {
        return Err(ConvertError::NoScopes {
            device: config.device.name.clone(),
        });
    }

    let shared = convert_shared(&config.shared, catalog, options);
    let scopes: Vec<ScopeResult> = config
        .device
        .scopes()
        .map(|entry| convert_scope(entry, &shared, catalog, options))
        .collect();

    let summaries: Vec<ConversionSummary> = scopes.iter().map(|scope| scope.summary).collect();
    let summary = aggregate(&summaries);
    info!(
        scopes = scopes.len(),
        shared_warnings = shared.diagnostics.warnings.len(),
        shared_errors = shared.diagnostics.errors.len(),
        "conversion finished"
    );

    Ok(ConversionOutcome {
        shared: shared.diagnostics,
        scopes,
        summary,
    })
}

fn convert_shared(objects: &ObjectSet, catalog: &Catalog, options: &ConvertOptions) -> SharedBase {
    debug!("converting shared objects");
    let mut scope = ConversionScope::new("shared", catalog, options);
    seed_predefined_services(&mut scope);
    convert_objects(&mut scope, objects);
    SharedBase {
        base: scope.base,
        predefined_types: scope.predefined_types,
        diagnostics: scope.diagnostics,
    }
}

fn convert_objects(scope: &mut ConversionScope<'_>, objects: &ObjectSet) {
    debug!(scope = %scope.name, "converting network objects");
    convert_addresses(scope, &objects.addresses);
    convert_address_groups(scope, &objects.tags, &objects.address_groups);

    debug!(scope = %scope.name, "converting services");
    convert_services(scope, &objects.services);
    convert_service_groups(scope, &objects.service_groups);

    debug!(scope = %scope.name, "converting applications and schedules");
    convert_application_filters(scope, &objects.application_filters);
    convert_application_groups(scope, &objects.application_groups);
    convert_schedules(scope, &objects.schedules);
}

fn convert_scope(
    entry: &ScopeEntry,
    shared: &SharedBase,
    catalog: &Catalog,
    options: &ConvertOptions,
) -> ScopeResult {
    debug!(scope = %entry.name, kind = ?entry.kind, "converting scope");
    let mut scope = ConversionScope::new(entry.name.clone(), catalog, options)
        .with_base(shared.base.clone(), shared.predefined_types.clone());

    convert_zones(&mut scope, &entry.zones);
    convert_objects(&mut scope, &entry.objects);

    let package = convert_security_rules(&mut scope, &entry.security_rules);
    let nat_rules = if options.convert_nat {
        convert_nat_rules(&mut scope, &entry.nat_rules)
    } else {
        Vec::new()
    };

    let referenced = scope.registry.clone();
    if !options.skip_unused {
        let names: Vec<String> = scope.base.objects().map(|object| object.name.clone()).collect();
        for name in names {
            scope.register_name(&name);
        }
    }

    let objects = ScopeObjects {
        base: &scope.base,
        referenced: &referenced,
        exported: &scope.registry,
    };
    let summary = summarize(&package, &nat_rules, objects, &scope.diagnostics);
    info!(
        scope = %entry.name,
        rules = summary.rules,
        nat_rules = summary.nat_rules,
        warnings = summary.warnings,
        errors = summary.errors,
        "scope converted"
    );

    ScopeResult {
        name: entry.name.clone(),
        kind: entry.kind,
        package,
        nat_rules,
        objects: scope.registry.objects().to_vec(),
        warnings: scope.diagnostics.warnings,
        errors: scope.diagnostics.errors,
        summary,
    }
}
