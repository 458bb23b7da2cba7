use std::fs;

use anyhow::{bail, Context, Result};
use panos_convert::known::{load_apps_match, Catalog};
use panos_convert::pipeline::convert_xml;
use panos_convert::report::render_outcome;
use panos_convert::scope::ConvertOptions;
use panos_convert::stats::render as render_conversion_summary;
use tracing::debug;
use xml_tree::parse_file;

use crate::cli::{ConvertArgs, OutputFormat};
use crate::path_guard::ensure_output_not_same;

pub fn run_convert(args: ConvertArgs) -> Result<()> {
    if let Some(output) = &args.output {
        ensure_output_not_same(output, &args.input)?;
    }

    let root = parse_file(&args.input)
        .with_context(|| format!("failed to parse {}", args.input.display()))?;
    let catalog = resolve_catalog(&args)?;
    debug!(source = %catalog.source, apps = catalog.apps.len(), "conversion data loaded");

    let options = ConvertOptions {
        convert_nat: !args.no_nat,
        convert_users: args.users,
        ldap_account_unit: args.ldap_account_unit.clone(),
        skip_unused: args.skip_unused,
    };
    let outcome = convert_xml(&root, &catalog, &options)
        .with_context(|| format!("failed to convert {}", args.input.display()))?;

    if let Some(output) = &args.output {
        let json = serde_json::to_string_pretty(&outcome)?;
        fs::write(output, json)
            .with_context(|| format!("failed to write output {}", output.display()))?;
    }

    match args.format {
        OutputFormat::Text => println!("{}", render_outcome(&outcome)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
    }
    println!("{}", render_conversion_summary(outcome.summary));

    if args.strict && outcome.has_errors() {
        bail!("strict mode failed: conversion recorded errors");
    }
    Ok(())
}

/// Embedded tables, overridden from `--mappings-dir` and `--apps-file`.
///
/// An unreadable mappings directory falls back to the embedded tables; an
/// explicitly named applications file must load.
fn resolve_catalog(args: &ConvertArgs) -> Result<Catalog> {
    let catalog = match &args.mappings_dir {
        Some(dir) => match Catalog::load_dir(dir) {
            Ok(catalog) => catalog,
            Err(err) => {
                eprintln!(
                    "warning: failed to load mappings from {} ({err}); using embedded defaults",
                    dir.display()
                );
                Catalog::embedded()
            }
        },
        None => Catalog::embedded(),
    };

    match &args.apps_file {
        Some(path) => {
            let apps = load_apps_match(path)
                .with_context(|| format!("failed to load applications file {}", path.display()))?;
            Ok(catalog.with_apps(apps))
        }
        None => Ok(catalog),
    }
}
