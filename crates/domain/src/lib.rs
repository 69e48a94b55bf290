//! # panelhub-domain
//!
//! Pure domain model for the panelhub control panel.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions
//! - Define **Parts** (local and remote actuators and sensors) and their categories
//! - Define **remote state** as held by the state cache (value, confirmation, revision)
//! - Map part names to messaging **topics** and back
//! - Encode and decode binary **payload tokens**
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;

pub mod part;
pub mod payload;
pub mod state;
pub mod topic;
