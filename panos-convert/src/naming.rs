//! Object name sanitizing for the Check Point namespace.
//!
//! Check Point object names share one namespace per management domain, are
//! compared case-insensitively and may only contain `[A-Za-z0-9_.-]`. A
//! [`NameSanitizer`] belongs to exactly one conversion scope; it remembers every
//! name it has issued so later objects get a `_<n>` suffix instead of
//! colliding.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use regex::Regex;

/// Longest time object name Check Point accepts.
const MAX_TIME_NAME_LEN: usize = 11;
const TIME_NAME_PREFIX_LEN: usize = 5;

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_.\-]").expect("static regex"))
}

/// Replace every character Check Point rejects with `_`.
pub fn safe_name(name: &str) -> String {
    let replaced = unsafe_chars().replace_all(name.trim(), "_");
    if replaced.is_empty() {
        "_".to_string()
    } else {
        replaced.into_owned()
    }
}

/// Result of one sanitize call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitized {
    pub name: String,
    /// Set when the issued name differs from the requested one.
    pub renamed_from: Option<String>,
}

impl Sanitized {
    /// Warning text for a rename, if one happened.
    pub fn rename_warning(&self, label: &str) -> Option<String> {
        self.renamed_from
            .as_ref()
            .map(|original| format!("{original} {label} was renamed to {}", self.name))
    }
}

#[derive(Debug, Clone)]
pub struct NameSanitizer {
    reserved: Arc<HashSet<String>>,
    issued: HashSet<String>,
    postfix: usize,
    time_names: HashSet<String>,
    time_postfix: usize,
}

impl NameSanitizer {
    /// `reserved` must hold lower-cased words.
    pub fn new(reserved: Arc<HashSet<String>>) -> Self {
        Self {
            reserved,
            issued: HashSet::new(),
            postfix: 0,
            time_names: HashSet::new(),
            time_postfix: 0,
        }
    }

    /// Mark a name as taken without issuing it, e.g. for objects inherited
    /// from the shared configuration.
    pub fn reserve(&mut self, name: &str) {
        self.issued.insert(name.to_lowercase());
    }

    pub fn is_issued(&self, name: &str) -> bool {
        self.issued.contains(&name.to_lowercase())
    }

    /// Issue a valid, scope-unique name derived from `name`.
    pub fn sanitize(&mut self, name: &str) -> Sanitized {
        let mut candidate = safe_name(name);

        if self.reserved.contains(&candidate.to_lowercase()) {
            candidate = format!("_{candidate}");
        }

        if self.is_issued(&candidate) {
            let base = candidate.clone();
            loop {
                candidate = format!("{base}_{}", self.postfix);
                self.postfix += 1;
                if !self.is_issued(&candidate) {
                    break;
                }
            }
        }

        self.issued.insert(candidate.to_lowercase());
        let renamed_from = (candidate != name).then(|| name.to_string());
        Sanitized {
            name: candidate,
            renamed_from,
        }
    }

    /// Shorten and dedupe a time object name.
    ///
    /// Names over eleven characters, and names already taken, become the
    /// first five characters plus `_t<n>`.
    pub fn time_name(&mut self, name: &str) -> Sanitized {
        let safe = safe_name(name);
        let mut candidate = safe.clone();
        if candidate.chars().count() > MAX_TIME_NAME_LEN {
            candidate = self.truncated_time_name(&safe);
        }
        while self.time_names.contains(&candidate) || self.is_issued(&candidate) {
            candidate = self.truncated_time_name(&safe);
        }
        self.time_names.insert(candidate.clone());

        let renamed_from = (candidate != name).then(|| name.to_string());
        Sanitized {
            name: candidate,
            renamed_from,
        }
    }

    fn truncated_time_name(&mut self, name: &str) -> String {
        let prefix: String = name.chars().take(TIME_NAME_PREFIX_LEN).collect();
        let out = format!("{prefix}_t{}", self.time_postfix);
        self.time_postfix += 1;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sanitizer() -> NameSanitizer {
        let reserved = ["any", "drop", "monday", "red"]
            .into_iter()
            .map(str::to_string)
            .collect();
        NameSanitizer::new(Arc::new(reserved))
    }

    #[test]
    fn keeps_valid_unique_names() {
        let mut names = sanitizer();
        let out = names.sanitize("web-srv.1");
        assert_eq!(out.name, "web-srv.1");
        assert_eq!(out.renamed_from, None);
        assert_eq!(out.rename_warning("address host"), None);
    }

    #[test]
    fn replaces_unsafe_characters() {
        let mut names = sanitizer();
        let out = names.sanitize("web srv/01");
        assert_eq!(out.name, "web_srv_01");
        assert_eq!(
            out.rename_warning("address host").as_deref(),
            Some("web srv/01 address host was renamed to web_srv_01")
        );
    }

    #[test]
    fn prefixes_reserved_words_case_insensitively() {
        let mut names = sanitizer();
        assert_eq!(names.sanitize("Monday").name, "_Monday");
        assert_eq!(names.sanitize("RED").name, "_RED");
    }

    #[test]
    fn suffixes_case_insensitive_collisions() {
        let mut names = sanitizer();
        assert_eq!(names.sanitize("Web").name, "Web");
        let second = names.sanitize("web");
        assert_eq!(second.name, "web_0");
        assert_eq!(second.renamed_from.as_deref(), Some("web"));
        assert_eq!(names.sanitize("WEB").name, "WEB_1");
    }

    #[test]
    fn suffix_skips_names_already_taken() {
        let mut names = sanitizer();
        names.reserve("web_0");
        names.sanitize("web");
        assert_eq!(names.sanitize("web").name, "web_1");
    }

    #[test]
    fn every_issued_name_is_unique() {
        let mut names = sanitizer();
        let inputs = ["a b", "a_b", "A_B", "a?b", "any", "_any", "x"];
        let issued: Vec<String> = inputs.iter().map(|n| names.sanitize(n).name).collect();
        let unique: HashSet<String> = issued.iter().map(|n| n.to_lowercase()).collect();
        assert_eq!(unique.len(), issued.len());
    }

    #[test]
    fn time_names_are_truncated_and_deduped() {
        let mut names = sanitizer();
        assert_eq!(names.time_name("lunch").name, "lunch");
        assert_eq!(names.time_name("lunch").name, "lunch_t0");
        let long = names.time_name("business-hours");
        assert_eq!(long.name, "busin_t1");
        assert_eq!(
            long.rename_warning("time object").as_deref(),
            Some("business-hours time object was renamed to busin_t1")
        );
    }

    #[test]
    fn time_names_avoid_other_objects() {
        let mut names = sanitizer();
        names.sanitize("night");
        assert_eq!(names.time_name("night").name, "night_t0");
        assert_eq!(names.time_name("off hours").name, "off_hours");
    }
}
