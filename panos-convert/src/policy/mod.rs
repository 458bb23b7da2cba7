//! Rule translation.
//!
//! - [`security`] builds the layered security package of a scope.
//! - [`nat`] converts NAT rules, splitting dual-protocol translations.
//! - [`users`] turns source users into access roles.

pub mod nat;
pub mod security;
pub mod users;

use crate::objects::ANY;
use crate::scope::ConversionScope;
use crate::translate::addresses::{is_convertible_literal, literal_address};

/// True for an empty member list or one holding only `any`.
pub(crate) fn is_any(members: &[String]) -> bool {
    members.is_empty() || members.iter().all(|member| member == ANY)
}

/// Target name of a named address or group, or of an inline IP literal.
///
/// The second value is set when a literal object was created for this call.
pub(crate) fn network_target(
    scope: &mut ConversionScope<'_>,
    member: &str,
) -> Option<(String, bool)> {
    if let Some(object) = scope.base.network_object(member) {
        return Some((object.name.clone(), false));
    }
    literal_address(scope, member).map(|(object, created)| (object.name, created))
}

/// Whether [`network_target`] would resolve `member`. Creates nothing, so
/// a rule can be checked before any of its objects exist.
pub(crate) fn is_network_target(scope: &ConversionScope<'_>, member: &str) -> bool {
    scope.base.network_object(member).is_some() || is_convertible_literal(member)
}

/// Record an error for every member of `members` that does not resolve.
pub(crate) fn check_members(
    scope: &ConversionScope<'_>,
    members: &[String],
    errors: &mut Vec<String>,
    message: impl Fn(&str) -> String,
) {
    if is_any(members) {
        return;
    }
    for member in members {
        if !is_network_target(scope, member) {
            errors.push(message(member));
        }
    }
}

/// Target names of members already checked with [`check_members`].
pub(crate) fn resolve_members(scope: &mut ConversionScope<'_>, members: &[String]) -> Vec<String> {
    if is_any(members) {
        return Vec::new();
    }
    members
        .iter()
        .filter_map(|member| network_target(scope, member))
        .map(|(target, _)| target)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::known::Catalog;
    use crate::scope::ConvertOptions;

    #[test]
    fn network_target_prefers_named_objects_then_literals() {
        let catalog = Catalog::embedded();
        let options = ConvertOptions::new();
        let mut scope = ConversionScope::new("vsys1", &catalog, &options);
        scope
            .base
            .insert(crate::objects::CpObject::host("srv1", "10.0.0.5"));
        scope
            .base
            .addresses
            .insert("srv1".to_string(), "srv1".to_string());

        assert_eq!(network_target(&mut scope, "srv1"), Some(("srv1".to_string(), false)));
        assert_eq!(
            network_target(&mut scope, "192.168.1.0/24"),
            Some(("Net_192.168.1.0".to_string(), true))
        );
        assert_eq!(
            network_target(&mut scope, "192.168.1.0/24"),
            Some(("Net_192.168.1.0".to_string(), false))
        );
        assert_eq!(network_target(&mut scope, "nowhere"), None);
        assert!(is_network_target(&scope, "10.9.9.9"));
        assert!(!is_network_target(&scope, "300.1.1.1"));
        assert!(scope.base.address("10.9.9.9").is_none());
        assert!(is_any(&["any".to_string()]));
        assert!(!is_any(&["srv1".to_string()]));
    }
}
