use anyhow::{Context, Result};
use panos_convert::source::{read_config, ScopeEntry, ScopeKind};
use serde::Serialize;
use xml_tree::parse_file;

use crate::cli::{OutputFormat, ScopesArgs};

#[derive(Debug, Serialize)]
struct ScopeInventory<'a> {
    name: &'a str,
    kind: ScopeKind,
    zones: usize,
    addresses: usize,
    address_groups: usize,
    services: usize,
    service_groups: usize,
    application_groups: usize,
    schedules: usize,
    security_rules: usize,
    nat_rules: usize,
}

impl<'a> From<&'a ScopeEntry> for ScopeInventory<'a> {
    fn from(entry: &'a ScopeEntry) -> Self {
        Self {
            name: &entry.name,
            kind: entry.kind,
            zones: entry.zones.len(),
            addresses: entry.objects.addresses.len(),
            address_groups: entry.objects.address_groups.len(),
            services: entry.objects.services.len(),
            service_groups: entry.objects.service_groups.len(),
            application_groups: entry.objects.application_groups.len(),
            schedules: entry.objects.schedules.len(),
            security_rules: entry.security_rules.len(),
            nat_rules: entry.nat_rules.len(),
        }
    }
}

pub fn run_scopes(args: ScopesArgs) -> Result<()> {
    let root = parse_file(&args.input)
        .with_context(|| format!("failed to parse {}", args.input.display()))?;
    let config = read_config(&root)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let rows: Vec<ScopeInventory<'_>> = config.device.scopes().map(ScopeInventory::from).collect();

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Text => {
            println!("device={} scopes={}", config.device.name, rows.len());
            for row in &rows {
                let kind = match row.kind {
                    ScopeKind::Vsys => "vsys",
                    ScopeKind::DeviceGroup => "device-group",
                };
                println!(
                    "- {} ({kind}): zones={} addresses={} address_groups={} services={} service_groups={} application_groups={} schedules={} security_rules={} nat_rules={}",
                    row.name,
                    row.zones,
                    row.addresses,
                    row.address_groups,
                    row.services,
                    row.service_groups,
                    row.application_groups,
                    row.schedules,
                    row.security_rules,
                    row.nat_rules
                );
            }
        }
    }
    Ok(())
}
