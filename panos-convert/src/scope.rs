//! Per-pass conversion state.
//!
//! A [`ConversionScope`] owns everything one conversion pass mutates: the
//! sanitizer, the accumulated warnings and errors, the object dictionaries and
//! the registry of objects referenced by the output. Scopes never share
//! mutable state; the shared configuration reaches a scope as a cloned
//! [`ObjectBase`].

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::Serialize;
use tracing::trace;

use crate::known::Catalog;
use crate::naming::NameSanitizer;
use crate::objects::{CpObject, ObjectKind, Protocol};

/// Options that change what a pass converts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertOptions {
    pub convert_nat: bool,
    pub convert_users: bool,
    pub ldap_account_unit: Option<String>,
    /// Register only objects the converted rules reference.
    pub skip_unused: bool,
}

impl ConvertOptions {
    pub fn new() -> Self {
        Self {
            convert_nat: true,
            ..Self::default()
        }
    }
}

/// Warnings and errors recorded during one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl Diagnostics {
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        trace!(%message, "conversion warning");
        self.warnings.push(message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        trace!(%message, "conversion error");
        self.errors.push(message);
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty() && self.errors.is_empty()
    }
}

/// Converted objects plus the dictionaries that map source names onto them.
///
/// `objects` is keyed by target name and holds every object created in the
/// pass. The other maps are keyed by source name and point at target names,
/// so two source entries can share one target object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectBase {
    objects: BTreeMap<String, CpObject>,
    pub zones: BTreeMap<String, String>,
    pub addresses: BTreeMap<String, String>,
    pub address_groups: BTreeMap<String, String>,
    /// Declared tag names.
    pub tags: BTreeSet<String>,
    /// Tag name to the source names of addresses and groups carrying it.
    pub address_tags: BTreeMap<String, Vec<String>>,
    pub services: BTreeMap<String, String>,
    /// Protocol of each source service, UDP winning when both are defined.
    pub service_types: BTreeMap<String, Protocol>,
    pub service_groups: BTreeMap<String, String>,
    pub app_filters: BTreeSet<String>,
    pub app_groups: BTreeMap<String, String>,
    pub schedules: BTreeMap<String, Vec<String>>,
}

impl ObjectBase {
    /// Store an object and return its target name. A later object with the
    /// same name replaces the earlier one.
    pub fn insert(&mut self, object: CpObject) -> String {
        let name = object.name.clone();
        self.objects.insert(name.clone(), object);
        name
    }

    pub fn object(&self, name: &str) -> Option<&CpObject> {
        self.objects.get(name)
    }

    pub fn objects(&self) -> impl Iterator<Item = &CpObject> {
        self.objects.values()
    }

    fn via<'a>(&'a self, dict: &BTreeMap<String, String>, key: &str) -> Option<&'a CpObject> {
        dict.get(key).and_then(|name| self.objects.get(name))
    }

    pub fn zone(&self, source: &str) -> Option<&CpObject> {
        self.via(&self.zones, source)
    }

    pub fn address(&self, source: &str) -> Option<&CpObject> {
        self.via(&self.addresses, source)
    }

    pub fn address_group(&self, source: &str) -> Option<&CpObject> {
        self.via(&self.address_groups, source)
    }

    /// Address, then address group.
    pub fn network_object(&self, source: &str) -> Option<&CpObject> {
        self.address(source).or_else(|| self.address_group(source))
    }

    pub fn service(&self, source: &str) -> Option<&CpObject> {
        self.via(&self.services, source)
    }

    pub fn service_group(&self, source: &str) -> Option<&CpObject> {
        self.via(&self.service_groups, source)
    }

    /// Service, then service group.
    pub fn service_object(&self, source: &str) -> Option<&CpObject> {
        self.service(source).or_else(|| self.service_group(source))
    }

    pub fn app_group(&self, source: &str) -> Option<&CpObject> {
        self.via(&self.app_groups, source)
    }

    pub fn schedule(&self, source: &str) -> Vec<&CpObject> {
        self.schedules
            .get(source)
            .map(|names| names.iter().filter_map(|n| self.objects.get(n)).collect())
            .unwrap_or_default()
    }
}

/// Objects referenced by the converted policy, deduplicated by name.
///
/// Groups are registered after their members so the list can be replayed in
/// order by a script emitter.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObjectRegistry {
    objects: Vec<CpObject>,
    #[serde(skip)]
    present: HashSet<String>,
}

impl ObjectRegistry {
    pub fn contains(&self, name: &str) -> bool {
        self.present.contains(name)
    }

    pub fn objects(&self) -> &[CpObject] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Add `object` and, for groups, every member known to `base`.
    ///
    /// Predefined objects are never added. Returns the member names that were
    /// part of a membership cycle.
    pub fn register(&mut self, base: &ObjectBase, object: &CpObject) -> Vec<String> {
        let mut visiting = HashSet::new();
        let mut cycles = Vec::new();
        self.register_inner(base, object, &mut visiting, &mut cycles);
        cycles
    }

    fn register_inner(
        &mut self,
        base: &ObjectBase,
        object: &CpObject,
        visiting: &mut HashSet<String>,
        cycles: &mut Vec<String>,
    ) {
        if object.is_predefined() || self.present.contains(&object.name) {
            return;
        }
        if !visiting.insert(object.name.clone()) {
            cycles.push(object.name.clone());
            return;
        }
        if let Some(members) = object.members() {
            for member in members {
                if let Some(child) = base.object(member) {
                    self.register_inner(base, child, visiting, cycles);
                }
            }
        }
        visiting.remove(&object.name);
        if self.present.insert(object.name.clone()) {
            self.objects.push(object.clone());
        }
    }
}

pub struct ConversionScope<'a> {
    pub name: String,
    pub catalog: &'a Catalog,
    pub options: &'a ConvertOptions,
    pub diagnostics: Diagnostics,
    pub base: ObjectBase,
    pub registry: ObjectRegistry,
    /// Protocol of predefined services substituted during this pass.
    pub predefined_types: BTreeMap<String, Protocol>,
    names: NameSanitizer,
}

impl<'a> ConversionScope<'a> {
    /// New pass with the catalog's predefined names already taken, so a
    /// converted object never shares a name with a predefined one.
    pub fn new(name: impl Into<String>, catalog: &'a Catalog, options: &'a ConvertOptions) -> Self {
        let mut names = NameSanitizer::new(catalog.reserved_words.clone());
        for predefined in catalog.predefined_names() {
            names.reserve(predefined);
        }
        Self {
            name: name.into(),
            catalog,
            options,
            diagnostics: Diagnostics::default(),
            base: ObjectBase::default(),
            registry: ObjectRegistry::default(),
            predefined_types: BTreeMap::new(),
            names,
        }
    }

    /// Start from a copy of the shared objects. Their names stay taken.
    pub fn with_base(mut self, base: ObjectBase, predefined_types: BTreeMap<String, Protocol>) -> Self {
        for object in base.objects() {
            self.names.reserve(&object.name);
        }
        self.base = base;
        self.predefined_types = predefined_types;
        self
    }

    /// Sanitize `name`, recording a warning if it had to change.
    pub fn issue_name(&mut self, name: &str, label: &str) -> String {
        let issued = self.names.sanitize(name);
        if let Some(warning) = issued.rename_warning(label) {
            self.diagnostics.warn(warning);
        }
        issued.name
    }

    /// Shorten and dedupe a time object name, recording a warning on change.
    pub fn issue_time_name(&mut self, name: &str) -> String {
        let issued = self.names.time_name(name);
        if let Some(warning) = issued.rename_warning("time object") {
            self.diagnostics.warn(warning);
        }
        self.names.reserve(&issued.name);
        issued.name
    }

    /// Take `name` without issuing it.
    pub fn reserve_name(&mut self, name: &str) {
        self.names.reserve(name);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.diagnostics.warn(message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.diagnostics.error(message);
    }

    /// Predefined service matching `protocol`/`port`, remembering its type.
    pub fn known_service(&mut self, protocol: Protocol, port: &str) -> Option<CpObject> {
        let name = self.catalog.known_service(protocol, port)?.to_string();
        self.predefined_types.insert(name.clone(), protocol);
        let object = CpObject::predefined(name);
        if self.base.object(&object.name).is_none() {
            self.base.insert(object.clone());
        }
        Some(object)
    }

    /// Add an object and its members to the output registry.
    pub fn register(&mut self, object: &CpObject) {
        for name in self.registry.register(&self.base, object) {
            self.diagnostics.error(format!(
                "{name} group is part of a membership cycle and its nested members were not expanded"
            ));
        }
    }

    /// Register the object stored under a target name.
    pub fn register_name(&mut self, name: &str) {
        if let Some(object) = self.base.object(name).cloned() {
            self.register(&object);
        }
    }

    /// Protocol of a predefined or converted service by target name.
    pub fn service_protocol(&self, name: &str) -> Option<Protocol> {
        self.predefined_types
            .get(name)
            .copied()
            .or_else(|| self.base.object(name).and_then(CpObject::protocol))
    }

    pub fn object_kind(&self, name: &str) -> Option<&ObjectKind> {
        self.base.object(name).map(|object| &object.kind)
    }
}
