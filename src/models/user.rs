use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A user of the call-intelligence platform (internal team member).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email_address: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl User {
    /// Display name, falling back to the email address when no name is set.
    pub fn full_name(&self) -> String {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        if name.is_empty() {
            self.email_address.clone()
        } else {
            name
        }
    }
}

/// Read-only user directory keyed by user id.
///
/// Fetched once per pass and owned by the engine for its run lifetime, so
/// tests can inject a fixed directory.
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    by_id: HashMap<String, User>,
}

impl UserDirectory {
    pub fn new(users: Vec<User>) -> Self {
        Self {
            by_id: users.into_iter().map(|u| (u.id.clone(), u)).collect(),
        }
    }

    pub fn get(&self, user_id: &str) -> Option<&User> {
        self.by_id.get(user_id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, email: &str, first: Option<&str>, last: Option<&str>) -> User {
        User {
            id: id.to_string(),
            email_address: email.to_string(),
            first_name: first.map(String::from),
            last_name: last.map(String::from),
            active: true,
        }
    }

    #[test]
    fn test_full_name() {
        let u = user("u1", "john.doe@company.com", Some("John"), Some("Doe"));
        assert_eq!(u.full_name(), "John Doe");

        let first_only = user("u2", "a@company.com", Some("Ada"), None);
        assert_eq!(first_only.full_name(), "Ada");

        let nameless = user("u3", "ops@company.com", None, None);
        assert_eq!(nameless.full_name(), "ops@company.com");
    }

    #[test]
    fn test_parse_user_defaults_active() {
        let json = r#"{"id": "u1", "emailAddress": "a@b.com", "firstName": "A"}"#;
        let u: User = serde_json::from_str(json).unwrap();
        assert!(u.active);
        assert_eq!(u.last_name, None);
    }

    #[test]
    fn test_directory_lookup() {
        let dir = UserDirectory::new(vec![
            user("u1", "john@company.com", Some("John"), Some("Doe")),
            user("u2", "mary@company.com", Some("Mary"), Some("Major")),
        ]);
        assert_eq!(dir.len(), 2);
        assert_eq!(dir.get("u2").unwrap().full_name(), "Mary Major");
        assert!(dir.get("u3").is_none());
    }
}
