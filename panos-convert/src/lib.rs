//! Palo Alto Networks to Check Point policy conversion.
//!
//! Reads a PAN-OS firewall or Panorama export and converts every vsys and
//! device group into Check Point objects, a layered security package and NAT
//! rules. Problems that only affect one object or rule are collected as
//! warnings and errors instead of aborting the run.
//!
//! # Architecture
//!
//! ## Input
//!
//! - [`source`]: Typed view of the `<config>` tree
//! - [`known`]: Reserved words, predefined services and the application
//!   match table
//!
//! ## Object model
//!
//! - [`objects`]: Check Point object variants
//! - [`naming`]: Name sanitizing and collision suffixes
//! - [`scope`]: Per-pass dictionaries, diagnostics and the output registry
//!
//! ## Conversion
//!
//! - [`translate`]: Zones, addresses, services, schedules and applications
//! - [`resolve`]: Address and service group membership
//! - [`policy`]: Security and NAT rules
//! - [`package`]: Layers, rules and NAT rules produced by [`policy`]
//! - [`pipeline`]: Shared base plus one pass per scope
//!
//! ## Reporting
//!
//! - [`stats`]: `convert_summary` counters
//! - [`report`]: Colored terminal output

pub mod known;
pub mod naming;
pub mod objects;
pub mod package;
pub mod pipeline;
pub mod policy;
pub mod report;
pub mod resolve;
pub mod scope;
pub mod source;
pub mod stats;
pub mod translate;
