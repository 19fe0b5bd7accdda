//! `usos-bff set-role` command implementation.

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use usos_config::Config;
use usos_store::{Role, SqliteStore, UserStore};

use crate::error::CliError;
use crate::output::Output;

/// Role accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum RoleArg {
    Student,
    Admin,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Student => Self::Student,
            RoleArg::Admin => Self::Admin,
        }
    }
}

/// Arguments for the set-role command.
#[derive(Args)]
pub(crate) struct SetRoleArgs {
    /// USOS id of a user who has logged in at least once.
    usos_id: String,

    /// New role.
    #[arg(value_enum)]
    role: RoleArg,

    /// Path to configuration file (default: auto-discover usos.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl SetRoleArgs {
    /// Execute the set-role command.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the user does
    /// not exist.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let config = Config::load(self.config.as_deref(), None)?;
        let store =
            SqliteStore::connect(&config.database.url, config.database.max_connections).await?;

        let user = store.set_role(&self.usos_id, self.role.into()).await?;
        output.success(&format!(
            "{} {} ({}) is now {}",
            user.first_name, user.last_name, user.usos_id, user.role
        ));
        Ok(())
    }
}
