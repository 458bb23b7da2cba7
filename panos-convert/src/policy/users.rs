//! Source users to access roles.

use crate::objects::{AccessRoleUser, CpObject, ObjectKind};
use crate::scope::ConversionScope;

/// Parse one PAN-OS source-user string.
///
/// `cn=alice,ou=staff,dc=corp` keeps the whole string as base DN and
/// `alice` as name, `CORP\alice` becomes `alice`, anything else is taken
/// as is.
pub fn parse_user(raw: &str) -> AccessRoleUser {
    let raw = raw.trim();
    if raw.contains(',') {
        let first = raw.split(',').next().unwrap_or(raw);
        let name = first
            .split_once('=')
            .map(|(_, value)| value)
            .unwrap_or(first)
            .trim();
        return AccessRoleUser {
            name: name.to_string(),
            base_dn: Some(raw.to_string()),
        };
    }
    if let Some((_, user)) = raw.rsplit_once('\\') {
        return AccessRoleUser {
            name: user.to_string(),
            base_dn: None,
        };
    }
    AccessRoleUser {
        name: raw.to_string(),
        base_dn: None,
    }
}

/// Build and store the `AR_<rule>` access role. `networks` are target names
/// of the address objects the rule's source resolved to.
pub fn access_role(
    scope: &mut ConversionScope<'_>,
    rule: &str,
    users: &[String],
    networks: Vec<String>,
) -> CpObject {
    let name = scope.issue_name(&format!("AR_{rule}"), "access-role");
    let object = CpObject::new(
        name,
        ObjectKind::AccessRole {
            networks,
            users: users.iter().map(|user| parse_user(user)).collect(),
            account_unit: scope.options.ldap_account_unit.clone(),
        },
    );
    scope.base.insert(object.clone());
    object
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::known::Catalog;
    use crate::scope::ConvertOptions;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_the_three_user_shapes() {
        assert_eq!(
            parse_user("cn=alice,ou=staff,dc=corp,dc=local"),
            AccessRoleUser {
                name: "alice".to_string(),
                base_dn: Some("cn=alice,ou=staff,dc=corp,dc=local".to_string()),
            }
        );
        assert_eq!(parse_user(r"CORP\bob").name, "bob");
        assert_eq!(parse_user("carol").name, "carol");
        assert_eq!(parse_user("carol").base_dn, None);
    }

    #[test]
    fn access_role_carries_networks_and_account_unit() {
        let catalog = Catalog::embedded();
        let options = ConvertOptions {
            ldap_account_unit: Some("corp-ldap".to_string()),
            ..ConvertOptions::new()
        };
        let mut scope = ConversionScope::new("vsys1", &catalog, &options);

        let role = access_role(
            &mut scope,
            "staff web",
            &[r"CORP\bob".to_string()],
            vec!["lan".to_string()],
        );
        assert_eq!(role.name, "AR_staff_web");
        match &role.kind {
            ObjectKind::AccessRole {
                networks,
                users,
                account_unit,
            } => {
                assert_eq!(networks, &vec!["lan".to_string()]);
                assert_eq!(users[0].name, "bob");
                assert_eq!(account_unit.as_deref(), Some("corp-ldap"));
            }
            other => panic!("unexpected kind: {other:?}"),
        }
        assert!(scope.base.object("AR_staff_web").is_some());
    }
}
