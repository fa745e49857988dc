//! Contact form submissions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FieldError;

/// Stored contact form submission
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Incoming contact form payload
///
/// Missing fields deserialize to empty strings so that validation can
/// report every offending field in one response instead of rejecting the
/// body wholesale.
#[derive(Debug, Clone, Deserialize)]
pub struct NewContact {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
}

impl NewContact {
    /// Validate the payload: every field must be non-empty after trimming.
    ///
    /// Returns one [`FieldError`] per violation; an empty error list means
    /// the payload is acceptable.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push(FieldError::new("name", "Name is required"));
        }
        if self.email.trim().is_empty() {
            errors.push(FieldError::new("email", "Email is required"));
        }
        if self.subject.trim().is_empty() {
            errors.push(FieldError::new("subject", "Subject is required"));
        }
        if self.message.trim().is_empty() {
            errors.push(FieldError::new("message", "Message is required"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_form() -> NewContact {
        NewContact {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            subject: "Restoration".to_string(),
            message: "My grandmother's portrait needs repair.".to_string(),
        }
    }

    #[test]
    fn complete_form_passes() {
        assert!(full_form().validate().is_ok());
    }

    #[test]
    fn each_missing_field_is_reported() {
        let mut form = full_form();
        form.email = String::new();
        form.subject = "   ".to_string();

        let errors = form.validate().unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["email", "subject"]);
    }

    #[test]
    fn missing_json_fields_deserialize_empty() {
        let form: NewContact = serde_json::from_str(r#"{"name":"Ada"}"#).unwrap();
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
