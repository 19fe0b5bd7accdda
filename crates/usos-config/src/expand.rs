//! Environment variable expansion for configuration strings.

use crate::ConfigError;

/// Expand `${VAR}` and `${VAR:-default}` references in `value`.
///
/// `field` is the dotted config path, used only for error reporting.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    shellexpand::env(value)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| ConfigError::EnvVar {
            field: field.to_owned(),
            message: format!("${{{}}} not set", e.var_name),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_passes_through() {
        assert_eq!(expand_env("plain", "f").unwrap(), "plain");
    }

    #[test]
    fn test_default_used_when_unset() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("USOS_EXPAND_UNSET_TEST");
        }
        assert_eq!(
            expand_env("${USOS_EXPAND_UNSET_TEST:-fallback}", "f").unwrap(),
            "fallback"
        );
    }

    #[test]
    fn test_unset_reports_variable_and_field() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("USOS_EXPAND_MISSING_TEST");
        }
        let err = expand_env("${USOS_EXPAND_MISSING_TEST}", "usos.consumer_key").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("USOS_EXPAND_MISSING_TEST"));
        assert!(msg.contains("usos.consumer_key"));
    }
}
