//! Saved-image metadata rows.

use atelier_core::types::Timestamp;
use serde::{Deserialize, Serialize};

/// Table holding one row per image a user saved to their gallery.
pub const SAVED_IMAGES_TABLE: &str = "saved_images";

/// Bucket holding the saved image files.
pub const IMAGES_BUCKET: &str = "images";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedImage {
    pub id: i64,
    pub user_id: String,
    pub prompt: String,
    pub image_url: String,
    pub created_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewSavedImage {
    pub user_id: String,
    pub prompt: String,
    pub image_url: String,
}

/// Object path for a saved image: `<user_id>/<millis>.<ext>`.
pub fn object_path(user_id: &str, now: Timestamp, extension: &str) -> String {
    format!("{}/{}.{}", user_id, now.timestamp_millis(), extension)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn object_path_is_scoped_by_user() {
        let now = chrono::Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(object_path("u1", now, "png"), "u1/1700000000123.png");
    }

    #[test]
    fn row_deserializes() {
        let row: SavedImage = serde_json::from_str(
            r#"{"id":7,"user_id":"u","prompt":"p","image_url":"https://x/1.png","created_at":"2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(row.id, 7);
        assert!(row.created_at.is_some());
    }
}
