//! HTTP middleware.

pub(crate) mod gate;
pub(crate) mod security;
