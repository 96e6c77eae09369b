//! Virtual filesystem helpers that do not depend on a concrete backend.

pub mod path;
