//! Read-only access to agent-owned on-disk data.

pub mod index;
