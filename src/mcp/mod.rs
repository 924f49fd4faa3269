//! Model Context Protocol adapter for the tool surface.
//!
//! The stdio serve loop itself lives in `main.rs`; this module supplies
//! the server handler and the per-tool handlers it routes to.

pub mod handler;
pub mod tools;
