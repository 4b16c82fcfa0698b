//! Utility functions and data structures.
//!
//! This module provides shared utilities used throughout histix:
//!
//! - [`analyzer`] - Term normalization, shared by the index and query paths
//! - [`app_data`] - Index directory management (XDG-compliant)
//! - [`content`] - Text/binary content classification
//! - [`encoding`] - Variable-length integer encoding (varint)

pub mod analyzer;
pub mod app_data;
pub mod content;
pub mod encoding;

pub use analyzer::*;
pub use app_data::*;
pub use content::*;
pub use encoding::*;
