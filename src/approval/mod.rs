//! Approval mediation: answer parsing, classification, the pending-question
//! registry, and the loopback callback bridge.

pub mod answer;
pub mod bridge;
pub mod classify;
pub mod registry;
