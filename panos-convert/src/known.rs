//! Injected conversion data: reserved words, predefined services and the
//! application match table.
//!
//! Each table ships embedded in the binary and can be replaced from disk.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::objects::Protocol;

pub const RESERVED_WORDS_FILE: &str = "reserved_words.toml";
pub const KNOWN_SERVICES_FILE: &str = "known_services.toml";

/// Errors returned when loading data files.
#[derive(Debug, Error)]
pub enum MappingLoadError {
    #[error("failed to read mappings file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse mappings file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("malformed line {line} in applications file {path}: expected `app;cp-apps;cp-services`")]
    AppsLine { path: String, line: usize },
}

#[derive(Debug, Deserialize)]
struct ReservedWordsFile {
    words: Vec<String>,
}

/// One predefined Check Point service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KnownService {
    pub name: String,
    pub protocol: KnownProtocol,
    pub port: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KnownProtocol {
    Tcp,
    Udp,
}

impl From<KnownProtocol> for Protocol {
    fn from(value: KnownProtocol) -> Self {
        match value {
            KnownProtocol::Tcp => Protocol::Tcp,
            KnownProtocol::Udp => Protocol::Udp,
        }
    }
}

#[derive(Debug, Deserialize)]
struct KnownServicesFile {
    service: Vec<KnownService>,
}

/// One line of the applications match table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppMatch {
    pub app: String,
    pub cp_apps: Vec<String>,
    pub cp_services: Vec<String>,
}

/// Source application name to Check Point applications or services.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppsMatch {
    entries: Vec<AppMatch>,
}

impl AppsMatch {
    pub fn lookup(&self, app: &str) -> Option<&AppMatch> {
        self.entries.iter().find(|entry| entry.app == app)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// All injected data a conversion needs.
#[derive(Debug, Clone)]
pub struct Catalog {
    /// Lower-cased reserved words.
    pub reserved_words: Arc<HashSet<String>>,
    known_services: HashMap<(Protocol, String), String>,
    pub apps: AppsMatch,
    /// Where the tables came from, for `--verbose` output.
    pub source: String,
}

impl Catalog {
    /// Catalog built from the embedded tables.
    pub fn embedded() -> Self {
        Self::from_parts(
            default_reserved_words(),
            default_known_services(),
            default_apps_match(),
            "embedded".to_string(),
        )
    }

    pub fn from_parts(
        reserved_words: Vec<String>,
        known_services: Vec<KnownService>,
        apps: AppsMatch,
        source: String,
    ) -> Self {
        let reserved_words = reserved_words
            .into_iter()
            .map(|word| word.trim().to_lowercase())
            .filter(|word| !word.is_empty())
            .collect();
        let mut by_signature = HashMap::new();
        for service in known_services {
            by_signature
                .entry((service.protocol.into(), service.port.trim().to_string()))
                .or_insert(service.name);
        }
        Self {
            reserved_words: Arc::new(reserved_words),
            known_services: by_signature,
            apps,
            source,
        }
    }

    /// Load reserved words and known services from `dir`.
    pub fn load_dir(dir: &Path) -> Result<Self, MappingLoadError> {
        let reserved = load_reserved_words(&dir.join(RESERVED_WORDS_FILE))?;
        let services = load_known_services(&dir.join(KNOWN_SERVICES_FILE))?;
        Ok(Self::from_parts(
            reserved,
            services,
            default_apps_match(),
            format!("dir:{}", dir.display()),
        ))
    }

    pub fn with_apps(mut self, apps: AppsMatch) -> Self {
        self.apps = apps;
        self
    }

    /// Names of every predefined service and application the tables map to.
    pub fn predefined_names(&self) -> impl Iterator<Item = &str> {
        self.known_services
            .values()
            .chain(
                self.apps
                    .entries
                    .iter()
                    .flat_map(|entry| entry.cp_apps.iter().chain(&entry.cp_services)),
            )
            .map(String::as_str)
    }

    /// Name of the predefined service with this protocol and port, if any.
    pub fn known_service(&self, protocol: Protocol, port: &str) -> Option<&str> {
        self.known_services
            .get(&(protocol, port.trim().to_string()))
            .map(String::as_str)
    }
}

pub fn load_reserved_words(path: &Path) -> Result<Vec<String>, MappingLoadError> {
    let raw = read(path)?;
    parse_reserved_words(&raw, path.display().to_string())
}

pub fn load_known_services(path: &Path) -> Result<Vec<KnownService>, MappingLoadError> {
    let raw = read(path)?;
    parse_known_services(&raw, path.display().to_string())
}

pub fn load_apps_match(path: &Path) -> Result<AppsMatch, MappingLoadError> {
    let raw = read(path)?;
    parse_apps_match(&raw, path.display().to_string())
}

pub fn default_reserved_words() -> Vec<String> {
    let embedded = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/mappings/reserved_words.toml"
    ));
    match parse_reserved_words(embedded, "embedded reserved words".to_string()) {
        Ok(words) if !words.is_empty() => words,
        _ => ["all", "and", "any", "drop", "from", "host", "src", "dst", "to"]
            .into_iter()
            .map(str::to_string)
            .collect(),
    }
}

pub fn default_known_services() -> Vec<KnownService> {
    let embedded = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/mappings/known_services.toml"
    ));
    match parse_known_services(embedded, "embedded known services".to_string()) {
        Ok(services) if !services.is_empty() => services,
        _ => vec![
            KnownService {
                name: "http".to_string(),
                protocol: KnownProtocol::Tcp,
                port: "80".to_string(),
            },
            KnownService {
                name: "https".to_string(),
                protocol: KnownProtocol::Tcp,
                port: "443".to_string(),
            },
        ],
    }
}

pub fn default_apps_match() -> AppsMatch {
    let embedded = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/mappings/apps_match.csv"));
    parse_apps_match(embedded, "embedded applications".to_string()).unwrap_or_default()
}

fn read(path: &Path) -> Result<String, MappingLoadError> {
    fs::read_to_string(path).map_err(|source| MappingLoadError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn parse_reserved_words(raw: &str, path: String) -> Result<Vec<String>, MappingLoadError> {
    let parsed: ReservedWordsFile =
        toml::from_str(raw).map_err(|source| MappingLoadError::Parse { path, source })?;
    Ok(parsed.words)
}

fn parse_known_services(raw: &str, path: String) -> Result<Vec<KnownService>, MappingLoadError> {
    let parsed: KnownServicesFile =
        toml::from_str(raw).map_err(|source| MappingLoadError::Parse { path, source })?;
    Ok(parsed.service)
}

fn parse_apps_match(raw: &str, path: String) -> Result<AppsMatch, MappingLoadError> {
    let mut entries = Vec::new();
    for (index, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split(';');
        let app = fields.next().map(str::trim).unwrap_or_default();
        let Some(cp_apps) = fields.next() else {
            return Err(MappingLoadError::AppsLine {
                path,
                line: index + 1,
            });
        };
        if app.is_empty() {
            return Err(MappingLoadError::AppsLine {
                path,
                line: index + 1,
            });
        }
        entries.push(AppMatch {
            app: app.to_string(),
            cp_apps: split_names(cp_apps),
            cp_services: fields.next().map(split_names).unwrap_or_default(),
        });
    }
    Ok(AppsMatch { entries })
}

fn split_names(field: &str) -> Vec<String> {
    field
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn embedded_tables_parse() {
        let catalog = Catalog::embedded();
        assert!(catalog.reserved_words.contains("any"));
        assert!(catalog.reserved_words.contains("monday"));
        assert_eq!(catalog.known_service(Protocol::Tcp, "443"), Some("https"));
        assert_eq!(catalog.known_service(Protocol::Udp, "53"), Some("domain-udp"));
        assert_eq!(catalog.known_service(Protocol::Udp, "443"), None);
        assert!(!catalog.apps.is_empty());
    }

    #[test]
    fn apps_lines_split_into_apps_or_services() {
        let apps = parse_apps_match(
            "# header\nweb-browsing;HTTP Protocol;\ndns;;domain-udp, domain-tcp\nlegacy;\n",
            "test".to_string(),
        )
        .expect("parse");

        assert_eq!(apps.len(), 3);
        let web = apps.lookup("web-browsing").expect("web-browsing");
        assert_eq!(web.cp_apps, vec!["HTTP Protocol"]);
        assert!(web.cp_services.is_empty());
        let dns = apps.lookup("dns").expect("dns");
        assert!(dns.cp_apps.is_empty());
        assert_eq!(dns.cp_services, vec!["domain-udp", "domain-tcp"]);
        let legacy = apps.lookup("legacy").expect("legacy");
        assert!(legacy.cp_apps.is_empty() && legacy.cp_services.is_empty());
        assert!(apps.lookup("web").is_none());
    }

    #[test]
    fn apps_line_without_separator_is_rejected() {
        let err = parse_apps_match("ok;A;\nbroken\n", "apps.csv".to_string())
            .expect_err("should fail");
        match err {
            MappingLoadError::AppsLine { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error variant: {other}"),
        }
    }

    #[test]
    fn loads_override_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join(RESERVED_WORDS_FILE), "words = [\"Gold\"]\n").expect("write");
        fs::write(
            dir.path().join(KNOWN_SERVICES_FILE),
            "[[service]]\nname = \"web\"\nprotocol = \"tcp\"\nport = \"8081\"\n",
        )
        .expect("write");

        let catalog = Catalog::load_dir(dir.path()).expect("load");
        assert!(catalog.reserved_words.contains("gold"));
        assert!(!catalog.reserved_words.contains("any"));
        assert_eq!(catalog.known_service(Protocol::Tcp, "8081"), Some("web"));
        assert!(catalog.source.starts_with("dir:"));
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(RESERVED_WORDS_FILE);
        fs::write(&path, "words = [broken").expect("write");

        match load_reserved_words(&path).expect_err("should fail") {
            MappingLoadError::Parse { .. } => {}
            other => panic!("unexpected error variant: {other}"),
        }
    }
}
