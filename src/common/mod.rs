//! Utilities shared across the package engine and the format-specific roots.

pub mod xml;
