//! # bentech-domain
//!
//! Pure domain model for the bentech device fleet.
//!
//! ## Responsibilities
//! - Error taxonomy shared by every layer (link, stream, collaborators)
//! - Fixed **service profiles**: advertised names and attribute UUIDs
//! - Per-device **opcode** tables as tagged enums
//! - **Stream** framing: fragment-count header plus 20-byte fragments
//! - Hub **session** state and the JSON payloads of the companion protocol
//! - **Occupancy** edges and **usage** reports
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod occupancy;
pub mod opcode;
pub mod profile;
pub mod session;
pub mod stream;
pub mod usage;
