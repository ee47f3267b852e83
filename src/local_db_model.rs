//! Records persisted by the collection store.
//!
//! Every type here serializes with camelCase field names so that the stored
//! JSON matches what the web front-end reads and writes under the same keys.
//! Enum variants use the exact wire strings (`"4x4-tour"`, `"Moderate"`,
//! `"pending"`, ...).

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Geographic position in floating point degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Moderate,
    Hard,
}

/// A point of interest that can be added to the favorites collection.
///
/// `is_favorite` is only ever set to `Some(true)` by the store when the
/// landmark is inserted into favorites; landmarks coming from the in-memory
/// catalogue leave it unset.
///
/// ```rust
/// use asir_explorer_core::local_db_model::{Coordinates, Difficulty, Landmark};
///
/// let landmark = Landmark {
///     id: "abha-dam".to_string(),
///     name: "Abha Dam".to_string(),
///     landmark_type: "Nature".to_string(),
///     description: "Reservoir surrounded by walking trails".to_string(),
///     coordinates: Coordinates { lat: 18.2164, lng: 42.5053 },
///     difficulty: Difficulty::Easy,
///     distance: "3 km".to_string(),
///     estimated_time: "1 hour".to_string(),
///     features: vec!["Lake".to_string(), "Picnic".to_string()],
///     image: None,
///     is_favorite: None,
/// };
///
/// let json = serde_json::to_value(&landmark)?;
/// assert_eq!(json["type"], "Nature");
/// assert_eq!(json["estimatedTime"], "1 hour");
/// assert!(json.get("isFavorite").is_none());
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Landmark {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub landmark_type: String,
    pub description: String,
    pub coordinates: Coordinates,
    pub difficulty: Difficulty,
    pub distance: String,
    pub estimated_time: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_favorite: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingType {
    #[serde(rename = "4x4-tour")]
    FourByFourTour,
    #[serde(rename = "hiking")]
    Hiking,
    #[serde(rename = "cultural")]
    Cultural,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    /// The wire string, as stored in the `status` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub name: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A tour reservation.
///
/// Only `status` changes after creation; see
/// [`CollectionStore::update_booking_status`](crate::collection_store::CollectionStore::update_booking_status).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    #[serde(rename = "type")]
    pub booking_type: BookingType,
    pub title: String,
    pub date: String,
    pub time: String,
    pub participants: u32,
    pub contact_info: ContactInfo,
    pub status: BookingStatus,
    pub created_at: String,
}

/// Raw booking form input, before validation.
///
/// Text fields are taken as typed by the user; empty or whitespace-only
/// values count as missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookingRequest {
    #[serde(rename = "type")]
    pub booking_type: Option<BookingType>,
    pub title: String,
    pub date: String,
    pub time: String,
    pub participants: u32,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
}

impl BookingRequest {
    /// Names of the required fields that are missing, in form order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.booking_type.is_none() {
            missing.push("type");
        }
        if self.title.trim().is_empty() {
            missing.push("title");
        }
        if self.date.trim().is_empty() {
            missing.push("date");
        }
        if self.time.trim().is_empty() {
            missing.push("time");
        }
        if self.participants == 0 {
            missing.push("participants");
        }
        if self.name.trim().is_empty() {
            missing.push("name");
        }
        if self.phone.trim().is_empty() {
            missing.push("phone");
        }
        missing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Festival,
    Cultural,
    Adventure,
    Food,
}

/// A scheduled event from the catalogue. Events themselves are never
/// persisted; only the ids the user registered for are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub title: String,
    pub description: String,
    pub date: String,
    pub time: String,
    pub location: String,
    pub category: EventCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_registered: Option<bool>,
}

/// One entry of the camera recognition history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraRecognition {
    pub id: String,
    /// Inline `data:` URL or a `blob:` reference.
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_landmark: Option<Landmark>,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Coordinates>,
}

impl CameraRecognition {
    /// Builds a record stamped with the current time. The id is the capture
    /// time in epoch milliseconds.
    pub fn captured_now(
        image: impl Into<String>,
        detected_landmark: Option<Landmark>,
        location: Option<Coordinates>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: now.timestamp_millis().to_string(),
            image: image.into(),
            detected_landmark,
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            location,
        }
    }

    /// `blob:` references point into the page that created them and are gone
    /// after a reload; anything else is stored inline.
    pub fn has_durable_image(&self) -> bool {
        !self.image.starts_with("blob:")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ar,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    System,
}

/// The single per-substrate preferences record.
///
/// Fields absent from the stored JSON fall back to their defaults, so a
/// record written by an older front-end still reads as a full value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPreferences {
    pub language: Language,
    pub theme: Theme,
    pub notifications: bool,
    pub location: bool,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            language: Language::En,
            theme: Theme::Light,
            notifications: true,
            location: true,
        }
    }
}

impl UserPreferences {
    /// Shallow merge: every field present in `update` overwrites the current
    /// one, the rest are kept.
    pub fn merge(self, update: PreferencesUpdate) -> Self {
        Self {
            language: update.language.unwrap_or(self.language),
            theme: update.theme.unwrap_or(self.theme),
            notifications: update.notifications.unwrap_or(self.notifications),
            location: update.location.unwrap_or(self.location),
        }
    }
}

/// Partial preferences, as sent by a settings screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferencesUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notifications: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<bool>,
}
