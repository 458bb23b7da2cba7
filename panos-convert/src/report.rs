use colored::Colorize;

use crate::package::{Layer, NatMethod, NatRule, RuleAction, SecurityRule};
use crate::pipeline::{ConversionOutcome, ScopeResult};

/// Render a whole conversion for terminal output.
pub fn render_outcome(outcome: &ConversionOutcome) -> String {
    let mut out = Vec::new();
    if !outcome.shared.warnings.is_empty() || !outcome.shared.errors.is_empty() {
        out.push("shared".bold().to_string());
        push_messages(&mut out, &outcome.shared.warnings, &outcome.shared.errors);
        out.push(String::new());
    }
    for scope in &outcome.scopes {
        out.push(render_scope(scope));
    }
    out.join("\n")
}

/// Render one converted scope: layers, NAT rules and messages.
pub fn render_scope(scope: &ScopeResult) -> String {
    let mut out = Vec::new();
    let kind = match scope.kind {
        crate::source::ScopeKind::Vsys => "vsys",
        crate::source::ScopeKind::DeviceGroup => "device-group",
    };
    out.push(format!(
        "{} {} ({kind}) package={}",
        "scope".bold(),
        scope.name.bold(),
        scope.package.name
    ));

    push_layer(&mut out, &scope.package.parent_layer);
    for layer in &scope.package.sub_policies {
        push_layer(&mut out, layer);
    }

    if !scope.nat_rules.is_empty() {
        out.push(format!("  {}", "nat".cyan()));
        for (index, rule) in scope.nat_rules.iter().enumerate() {
            out.push(format!("    {:>3}. {}", index + 1, render_nat_rule(rule)));
        }
    }

    out.push(format!("  objects={}", scope.objects.len()));
    push_messages(&mut out, &scope.warnings, &scope.errors);
    out.push(String::new());
    out.join("\n")
}

fn push_layer(out: &mut Vec<String>, layer: &Layer) {
    let filtering = if layer.applications_and_url_filtering {
        " [applications]"
    } else {
        ""
    };
    out.push(format!("  {}{filtering}", format!("layer {}", layer.name).cyan()));
    for (index, rule) in layer.rules.iter().enumerate() {
        out.push(format!("    {:>3}. {}", index + 1, render_rule(rule)));
    }
}

fn render_rule(rule: &SecurityRule) -> String {
    let action = match rule.action {
        RuleAction::Accept => "accept".green().to_string(),
        RuleAction::Drop => "drop".red().to_string(),
        RuleAction::SubPolicy => format!(
            "sub-policy -> {}",
            rule.sub_policy_name.as_deref().unwrap_or_default()
        )
        .yellow()
        .to_string(),
    };
    let mut line = format!(
        "{} src={} dst={} svc={}",
        rule.name,
        cells(&rule.source, rule.source_negated),
        cells(&rule.destination, rule.destination_negated),
        cells(&rule.service, false),
    );
    if !rule.application.is_empty() {
        line.push_str(&format!(" app={}", rule.application.join(",")));
    }
    if !rule.time.is_empty() {
        line.push_str(&format!(" time={}", rule.time.join(",")));
    }
    line.push(' ');
    line.push_str(&action);
    if !rule.enabled {
        line.push_str(&" (disabled)".dimmed().to_string());
    }
    line
}

fn cells(values: &[String], negated: bool) -> String {
    let joined = values.join(",");
    if negated {
        format!("!{joined}")
    } else {
        joined
    }
}

fn render_nat_rule(rule: &NatRule) -> String {
    let original = "original";
    let method = match rule.method {
        NatMethod::Hide => "hide",
        NatMethod::Static => "static",
    };
    let mut line = format!(
        "{} src={} dst={} svc={} => src={} dst={} svc={} {method}",
        rule.name,
        rule.source,
        rule.destination,
        rule.service,
        rule.translated_source.as_deref().unwrap_or(original),
        rule.translated_destination.as_deref().unwrap_or(original),
        rule.translated_service.as_deref().unwrap_or(original),
    );
    if !rule.enabled {
        line.push_str(&" (disabled)".dimmed().to_string());
    }
    line
}

fn push_messages(out: &mut Vec<String>, warnings: &[String], errors: &[String]) {
    for warning in warnings {
        out.push(format!("  {} {warning}", "warning:".yellow()));
    }
    for error in errors {
        out.push(format!("  {} {error}", "error:".red()));
    }
}
