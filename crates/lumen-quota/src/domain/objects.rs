//! Stored objects (uploaded photos and videos).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Mime category of an uploaded object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaCategory {
    /// A photo.
    Image,
    /// A video clip.
    Video,
}

/// An uploaded object as the storage account knows it. Immutable once
/// recorded; its locked state is derived by the quota policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    /// Object identifier.
    pub object_id: Uuid,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Mime category.
    pub category: MediaCategory,
    /// Upload time; defines quota ordering.
    pub uploaded_at: DateTime<Utc>,
}
