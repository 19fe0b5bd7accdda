//! Behaviors specific to the USOS API.
//!
//! - every OAuth leg and resource call carries a pipe-joined `scopes` param
//! - `fields` selectors are validated strictly; an unknown selector is a 400
//! - timetable endpoints cap the `days` window server-side

use usos_config::is_valid_scope;

/// Join scope names into the pipe-delimited wire form.
#[must_use]
pub fn join_scopes(scopes: &[String]) -> String {
    scopes.join("|")
}

/// Parse a scope list from a query value (`studies|email` or `studies,email`).
///
/// Entries that are not `[a-z_]+` are dropped, duplicates keep their first
/// position.
#[must_use]
pub fn parse_scopes(raw: &str) -> Vec<String> {
    let mut scopes: Vec<String> = Vec::new();
    for scope in raw.split(['|', ',']).map(str::trim) {
        if is_valid_scope(scope) && !scopes.iter().any(|s| s == scope) {
            scopes.push(scope.to_owned());
        }
    }
    scopes
}

/// Whether a 400 response means the `fields` selector was rejected.
#[must_use]
pub fn is_field_rejection(status: u16, body: &str) -> bool {
    status == 400 && (body.contains("Unrecognized character") || body.contains("invalid_fields"))
}

/// Ordered `fields` selectors for one endpoint.
///
/// The first profile is tried first; later ones are used only when the ERP
/// rejects the previous selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldProfiles {
    profiles: Vec<String>,
}

impl FieldProfiles {
    /// Build from selectors in fallback order.
    #[must_use]
    pub fn new<I, S>(profiles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            profiles: profiles.into_iter().map(Into::into).collect(),
        }
    }

    /// Selectors in the order they are tried.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.profiles.iter().map(String::as_str)
    }

    /// Profiles for `groups/user`, from course-only fields to the full
    /// selector with nested lecturer and participant fields.
    #[must_use]
    pub fn groups() -> Self {
        Self::new([
            "course_unit_id|group_number|class_type|class_type_id|course_id|course_name|group_url|term_id|relationship_type",
            "course_unit_id|course_id|course_name|term_id",
            "course_unit_id|group_number|class_type|class_type_id|course_id|course_name|group_url|term_id|lecturers|participants|relationship_type",
            "course_unit_id|group_number|class_type|class_type_id|course_id|course_name|group_url|term_id|lecturers[id|first_name|last_name|titles]|participants[id|first_name|last_name|titles]|relationship_type",
        ])
    }

    /// Profiles for `courses/user`.
    #[must_use]
    pub fn courses() -> Self {
        Self::new([
            "course_editions",
            "course_editions[course_id|course_name|term_id]",
        ])
    }
}

/// `fields` selector for `tt/user` activities.
pub const SCHEDULE_FIELDS: &str =
    "start_time|end_time|name|type|url|building_name|room_number|course_name|classtype_name";

/// Timetable endpoints whose `days` parameter is capped by the ERP.
const WINDOWED_ENDPOINTS: &[&str] = &[
    "tt/user",
    "tt/student",
    "tt/staff",
    "tt/classgroup",
    "tt/course_edition",
    "tt/room",
];

/// Date-window ceiling for windowed endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowPolicy {
    endpoints: Vec<String>,
    max_days: u32,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self::new(7)
    }
}

impl WindowPolicy {
    /// Policy for the known timetable endpoints with the given ceiling.
    #[must_use]
    pub fn new(max_days: u32) -> Self {
        Self {
            endpoints: WINDOWED_ENDPOINTS.iter().map(|&e| e.to_owned()).collect(),
            max_days: max_days.max(1),
        }
    }

    /// Upper bound for `days`.
    #[must_use]
    pub fn max_days(&self) -> u32 {
        self.max_days
    }

    /// Whether `path` (relative to `services/`) is windowed.
    #[must_use]
    pub fn applies_to(&self, path: &str) -> bool {
        let path = path.trim_matches('/');
        self.endpoints.iter().any(|e| e == path)
    }

    /// Clamp a single `days` value.
    ///
    /// Values above the ceiling, below 1 or non-numeric become the ceiling.
    #[must_use]
    pub fn clamp_days(&self, days: &str) -> u32 {
        match days.trim().parse::<u32>() {
            Ok(d) if (1..=self.max_days).contains(&d) => d,
            _ => self.max_days,
        }
    }

    /// Rewrite every `days` param of a windowed request in place.
    ///
    /// Returns `true` if anything changed.
    pub fn apply(&self, path: &str, params: &mut [(String, String)]) -> bool {
        if !self.applies_to(path) {
            return false;
        }
        let mut changed = false;
        for (_, value) in params.iter_mut().filter(|(k, _)| k == "days") {
            let clamped = self.clamp_days(value).to_string();
            if *value != clamped {
                *value = clamped;
                changed = true;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_join_scopes() {
        let scopes = vec!["studies".to_owned(), "email".to_owned()];
        assert_eq!(join_scopes(&scopes), "studies|email");
    }

    #[test]
    fn test_parse_scopes_drops_invalid() {
        assert_eq!(
            parse_scopes("studies|Email|grades|x y|studies,cards|"),
            vec!["studies", "grades", "cards"]
        );
    }

    #[test]
    fn test_parse_scopes_empty() {
        assert!(parse_scopes("").is_empty());
    }

    #[test]
    fn test_is_field_rejection() {
        assert!(is_field_rejection(
            400,
            r#"{"message":"Unrecognized character at position 6"}"#
        ));
        assert!(is_field_rejection(400, r#"{"error":"invalid_fields"}"#));
        assert!(!is_field_rejection(400, r#"{"error":"param_missing"}"#));
        assert!(!is_field_rejection(500, "invalid_fields"));
    }

    #[test]
    fn test_field_profiles_start_flat() {
        let profiles = FieldProfiles::groups();
        let first = profiles.iter().next().unwrap();
        assert!(!first.contains('['));
    }

    #[test]
    fn test_field_profiles_nested_only_last() {
        let groups = FieldProfiles::groups();
        let profiles: Vec<&str> = groups.iter().collect();
        let (last, earlier) = profiles.split_last().unwrap();
        assert!(last.contains('['));
        assert!(earlier.iter().all(|p| !p.contains('[')));
    }

    #[test]
    fn test_window_clamps_large_value() {
        let policy = WindowPolicy::default();
        let mut params = vec![
            ("start".to_owned(), "2024-01-01".to_owned()),
            ("days".to_owned(), "30".to_owned()),
        ];
        assert!(policy.apply("tt/user", &mut params));
        assert_eq!(params[1].1, "7");
        assert_eq!(params[0].1, "2024-01-01");
    }

    #[test]
    fn test_window_replaces_invalid_values() {
        let policy = WindowPolicy::new(7);
        assert_eq!(policy.clamp_days("0"), 7);
        assert_eq!(policy.clamp_days("-3"), 7);
        assert_eq!(policy.clamp_days("abc"), 7);
        assert_eq!(policy.clamp_days("3"), 3);
        assert_eq!(policy.clamp_days("7"), 7);
    }

    #[test]
    fn test_window_ignores_other_endpoints() {
        let policy = WindowPolicy::default();
        let mut params = vec![("days".to_owned(), "30".to_owned())];
        assert!(!policy.apply("users/user", &mut params));
        assert_eq!(params[0].1, "30");
    }

    #[test]
    fn test_window_matches_with_slashes() {
        let policy = WindowPolicy::default();
        assert!(policy.applies_to("/tt/student/"));
        assert!(!policy.applies_to("tt/user/extra"));
    }

    #[test]
    fn test_window_zero_ceiling_is_one() {
        assert_eq!(WindowPolicy::new(0).max_days(), 1);
    }
}
