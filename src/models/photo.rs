//! Photo job state machine
//!
//! A photo job progresses through 2 possible transitions:
//! processing → completed, or processing → failed. Both outcomes are
//! terminal; a record never returns to processing and there are no
//! automatic retries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Photo processing status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoStatus {
    /// Enhancement running in the background
    Processing,
    /// Enhanced output written and recorded
    Completed,
    /// Every enhancement strategy failed
    Failed,
}

impl PhotoStatus {
    /// Check if the status is terminal (finished)
    pub fn is_terminal(&self) -> bool {
        matches!(self, PhotoStatus::Completed | PhotoStatus::Failed)
    }
}

/// Photo job record (in-memory state)
///
/// `enhanced_url` and `status` move together: the store update that sets
/// `Completed` carries the output location, and a failure update touches
/// only `status`. At no observable point is one set without the other.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    /// Unique identifier, assigned by the store
    pub id: i64,

    /// Wire path of the uploaded source image
    pub original_url: String,

    /// Wire path of the enhanced output, present once completed
    pub enhanced_url: Option<String>,

    /// Current processing status
    pub status: PhotoStatus,

    /// Upload time
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when creating a photo record
#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub original_url: String,
    pub enhanced_url: Option<String>,
    /// Defaults to [`PhotoStatus::Processing`] when unset
    pub status: Option<PhotoStatus>,
}

/// Partial update merged onto an existing record; `None` leaves a field
/// unchanged
#[derive(Debug, Clone, Default)]
pub struct PhotoUpdate {
    pub enhanced_url: Option<String>,
    pub status: Option<PhotoStatus>,
}

impl PhotoUpdate {
    /// Terminal success: output location and status in one update
    pub fn completed(enhanced_url: String) -> Self {
        Self {
            enhanced_url: Some(enhanced_url),
            status: Some(PhotoStatus::Completed),
        }
    }

    /// Terminal failure: status only, no output location
    pub fn failed() -> Self {
        Self {
            enhanced_url: None,
            status: Some(PhotoStatus::Failed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&PhotoStatus::Processing).unwrap(),
            "\"processing\""
        );
        assert_eq!(
            serde_json::to_string(&PhotoStatus::Completed).unwrap(),
            "\"completed\""
        );
        assert_eq!(
            serde_json::to_string(&PhotoStatus::Failed).unwrap(),
            "\"failed\""
        );
    }

    #[test]
    fn terminal_states() {
        assert!(!PhotoStatus::Processing.is_terminal());
        assert!(PhotoStatus::Completed.is_terminal());
        assert!(PhotoStatus::Failed.is_terminal());
    }

    #[test]
    fn photo_wire_shape_is_camel_case() {
        let photo = Photo {
            id: 1,
            original_url: "/uploads/a.jpg".to_string(),
            enhanced_url: None,
            status: PhotoStatus::Processing,
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&photo).unwrap();
        assert_eq!(value["originalUrl"], "/uploads/a.jpg");
        assert!(value["enhancedUrl"].is_null());
        assert_eq!(value["status"], "processing");
        assert!(value.get("createdAt").is_some());
    }
}
