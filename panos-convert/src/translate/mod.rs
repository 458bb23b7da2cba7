//! Object translators.
//!
//! Each translator converts one PAN-OS object category into [`CpObject`]s and
//! records them in the scope's [`ObjectBase`](crate::scope::ObjectBase):
//!
//! - **zones**: zone entries to Check Point zones
//! - **addresses**: ip-netmask, ip-range and fqdn entries, plus literal
//!   addresses found inline in rules
//! - **services**: TCP/UDP services, multi-port services become groups
//! - **schedules**: recurring and absolute schedules to time objects
//! - **applications**: application groups through the match table
//!
//! Translators never fail; problems are recorded on the scope.
//!
//! [`CpObject`]: crate::objects::CpObject

pub mod addresses;
pub mod applications;
pub mod schedules;
pub mod services;
pub mod zones;
