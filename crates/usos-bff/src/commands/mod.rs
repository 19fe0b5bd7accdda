//! CLI command implementations.

pub(crate) mod check_config;
pub(crate) mod serve;
pub(crate) mod set_role;

pub(crate) use check_config::CheckConfigArgs;
pub(crate) use serve::ServeArgs;
pub(crate) use set_role::SetRoleArgs;
