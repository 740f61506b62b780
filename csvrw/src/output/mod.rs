//! Writers for compiled routes.

pub mod json;
