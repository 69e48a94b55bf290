//! Wiring for `panelhubd`, split out of the binary so the end-to-end tests
//! can build the same stack.

pub mod config;
pub mod wiring;
