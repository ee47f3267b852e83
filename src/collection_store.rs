//! The five persisted collections and their operations.
//!
//! Each collection is a single JSON value under a fixed key. Every operation
//! re-reads the whole value, changes it, and writes it back. Nothing here
//! returns an error to the caller: text that is not JSON reads as the
//! default and rejected writes are logged and dropped. Use
//! [`CollectionStore::try_write`] when a caller needs to know whether a
//! write landed.
//!
//! List elements that are valid JSON but do not match the record type (a
//! landmark with `"difficulty":"Challenging"`, say) are left out of what the
//! getters return, but they stay in storage: mutations carry them through as
//! [`StoredEntry::Raw`] and write them back unchanged.

use chrono::{SecondsFormat, Utc};
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::app_response::AppResponse;
use crate::local_db_model::{
    Booking, BookingRequest, BookingStatus, CameraRecognition, ContactInfo, Event, Landmark,
    PreferencesUpdate, UserPreferences,
};
use crate::local_storage::StorageBackend;
use crate::store_config::{StoreConfig, CAMERA_HISTORY_LIMIT};

pub const FAVORITES_KEY: &str = "asir-favorites";
pub const BOOKINGS_KEY: &str = "asir-bookings";
pub const REGISTERED_EVENTS_KEY: &str = "asir-registered-events";
pub const CAMERA_HISTORY_KEY: &str = "asir-camera-history";
pub const USER_PREFERENCES_KEY: &str = "asir-user-preferences";

/// One element of a stored list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredEntry<T> {
    Known(T),
    /// Valid JSON that does not decode as `T`; written back as it was read.
    Raw(Value),
}

/// Records that list collections look up by id.
pub trait Keyed {
    fn key(&self) -> &str;

    /// Id of an element that did not decode. Objects are matched on their
    /// `"id"` field.
    fn raw_key(value: &Value) -> Option<&str> {
        value.get("id").and_then(Value::as_str)
    }
}

impl Keyed for Landmark {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for Booking {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for CameraRecognition {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for String {
    fn key(&self) -> &str {
        self
    }

    // A registration list element that is not a string is no event id.
    fn raw_key(_value: &Value) -> Option<&str> {
        None
    }
}

impl<T: Keyed> StoredEntry<T> {
    pub fn key(&self) -> Option<&str> {
        match self {
            StoredEntry::Known(record) => Some(record.key()),
            StoredEntry::Raw(value) => T::raw_key(value),
        }
    }

    fn has_key(&self, key: &str) -> bool {
        self.key() == Some(key)
    }
}

impl<T> StoredEntry<T> {
    pub fn known(self) -> Option<T> {
        match self {
            StoredEntry::Known(record) => Some(record),
            StoredEntry::Raw(_) => None,
        }
    }
}

pub struct CollectionStore<S: StorageBackend> {
    storage: S,
    camera_history_limit: usize,
}

impl<S: StorageBackend> CollectionStore<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            camera_history_limit: CAMERA_HISTORY_LIMIT,
        }
    }

    pub fn with_config(storage: S, config: &StoreConfig) -> Self {
        Self {
            storage,
            camera_history_limit: config.camera_history_limit,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Reads `key`, falling back to `default` when the key is absent or
    /// empty, the backend fails, the stored text is not JSON, or the JSON
    /// does not have the shape of `T`.
    pub fn read<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let text = match self.storage.get_item(key) {
            Ok(Some(text)) if !text.is_empty() => text,
            Ok(_) => return default,
            Err(e) => {
                warn!("Error reading {key} from storage: {e}");
                return default;
            }
        };

        let value: Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) => {
                warn!("Error reading {key} from storage: {e}");
                return default;
            }
        };

        match serde_json::from_value(value) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("Unexpected shape for {key} in storage: {e}");
                default
            }
        }
    }

    /// Reads a list collection element by element. Elements that do not
    /// decode as `T` come back as [`StoredEntry::Raw`].
    pub fn read_entries<T: DeserializeOwned>(&self, key: &str) -> Vec<StoredEntry<T>> {
        let entries: Vec<StoredEntry<T>> = self.read(key, Vec::new());
        let raw = entries
            .iter()
            .filter(|entry| matches!(entry, StoredEntry::Raw(_)))
            .count();
        if raw > 0 {
            warn!("Skipping {raw} unreadable entries in {key}");
        }
        entries
    }

    fn read_list<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        self.read_entries(key)
            .into_iter()
            .filter_map(StoredEntry::known)
            .collect()
    }

    /// Best-effort write. Failures are logged and otherwise ignored.
    pub fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        if let Err(e) = self.try_write(key, value) {
            warn!("Error saving {key} to storage: {e}");
        }
    }

    pub fn try_write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), AppResponse> {
        let json = serde_json::to_string(value)?;
        self.storage.set_item(key, &json)
    }

    /// Wipes every key in the substrate. Each collection reads as its default
    /// afterwards.
    pub fn clear_all(&self) {
        match self.storage.clear() {
            Ok(()) => info!("All collections cleared"),
            Err(e) => warn!("Error clearing storage: {e}"),
        }
    }

    // Favorites

    pub fn get_favorites(&self) -> Vec<Landmark> {
        self.read_list(FAVORITES_KEY)
    }

    /// Adds `landmark` with `is_favorite` set, unless its id is already there.
    pub fn save_favorite(&self, landmark: &Landmark) {
        let mut favorites: Vec<StoredEntry<Landmark>> = self.read_entries(FAVORITES_KEY);
        if favorites.iter().any(|fav| fav.has_key(&landmark.id)) {
            debug!("Landmark {} already in favorites", landmark.id);
            return;
        }
        favorites.push(StoredEntry::Known(Landmark {
            is_favorite: Some(true),
            ..landmark.clone()
        }));
        self.write(FAVORITES_KEY, &favorites);
    }

    pub fn remove_favorite(&self, landmark_id: &str) {
        let mut favorites: Vec<StoredEntry<Landmark>> = self.read_entries(FAVORITES_KEY);
        favorites.retain(|fav| !fav.has_key(landmark_id));
        self.write(FAVORITES_KEY, &favorites);
    }

    pub fn is_favorite(&self, landmark_id: &str) -> bool {
        self.read_entries::<Landmark>(FAVORITES_KEY)
            .iter()
            .any(|fav| fav.has_key(landmark_id))
    }

    // Bookings

    pub fn get_bookings(&self) -> Vec<Booking> {
        self.read_list(BOOKINGS_KEY)
    }

    pub fn save_booking(&self, booking: &Booking) {
        let mut bookings: Vec<StoredEntry<Booking>> = self.read_entries(BOOKINGS_KEY);
        bookings.push(StoredEntry::Known(booking.clone()));
        self.write(BOOKINGS_KEY, &bookings);
    }

    /// Sets `status` on the booking with `booking_id`. Other bookings, and the
    /// other fields of the matching one, are left as they are. A matching
    /// entry that did not decode still gets its `status` field replaced.
    pub fn update_booking_status(&self, booking_id: &str, status: BookingStatus) {
        let mut bookings: Vec<StoredEntry<Booking>> = self.read_entries(BOOKINGS_KEY);
        for entry in bookings.iter_mut() {
            if !entry.has_key(booking_id) {
                continue;
            }
            match entry {
                StoredEntry::Known(booking) => booking.status = status,
                StoredEntry::Raw(Value::Object(fields)) => {
                    fields.insert("status".to_string(), Value::from(status.as_str()));
                }
                StoredEntry::Raw(_) => {}
            }
        }
        self.write(BOOKINGS_KEY, &bookings);
    }

    /// Validates a booking form, stores the resulting `pending` booking and
    /// returns it.
    ///
    /// The id is the creation time in epoch milliseconds, moved forward one
    /// millisecond at a time while it collides with a stored booking.
    pub fn submit_booking(&self, request: BookingRequest) -> Result<Booking, AppResponse> {
        let missing = request.missing_fields();
        let booking_type = match request.booking_type {
            Some(booking_type) if missing.is_empty() => booking_type,
            _ => {
                return Err(AppResponse::ValidationError(format!(
                    "Missing required fields: {}",
                    missing.join(", ")
                )))
            }
        };

        let mut bookings: Vec<StoredEntry<Booking>> = self.read_entries(BOOKINGS_KEY);
        let now = Utc::now();
        let mut id = now.timestamp_millis();
        while bookings.iter().any(|b| b.has_key(&id.to_string())) {
            id += 1;
        }

        let booking = Booking {
            id: id.to_string(),
            booking_type,
            title: request.title,
            date: request.date,
            time: request.time,
            participants: request.participants,
            contact_info: ContactInfo {
                name: request.name,
                phone: request.phone,
                email: request.email.filter(|email| !email.trim().is_empty()),
            },
            status: BookingStatus::Pending,
            created_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        };

        bookings.push(StoredEntry::Known(booking.clone()));
        self.write(BOOKINGS_KEY, &bookings);
        info!("Booking {} created for {}", booking.id, booking.title);
        Ok(booking)
    }

    // Event registrations

    pub fn get_registered_events(&self) -> Vec<String> {
        self.read_list(REGISTERED_EVENTS_KEY)
    }

    pub fn register_for_event(&self, event_id: &str) {
        let mut registered: Vec<StoredEntry<String>> = self.read_entries(REGISTERED_EVENTS_KEY);
        if !registered.iter().any(|id| id.has_key(event_id)) {
            registered.push(StoredEntry::Known(event_id.to_string()));
            self.write(REGISTERED_EVENTS_KEY, &registered);
        }
    }

    pub fn unregister_from_event(&self, event_id: &str) {
        let mut registered: Vec<StoredEntry<String>> = self.read_entries(REGISTERED_EVENTS_KEY);
        registered.retain(|id| !id.has_key(event_id));
        self.write(REGISTERED_EVENTS_KEY, &registered);
    }

    pub fn is_registered_for_event(&self, event_id: &str) -> bool {
        self.get_registered_events().iter().any(|id| id == event_id)
    }

    /// Flips the registration for `event_id` and returns the new state.
    pub fn toggle_event_registration(&self, event_id: &str) -> bool {
        if self.is_registered_for_event(event_id) {
            self.unregister_from_event(event_id);
            false
        } else {
            self.register_for_event(event_id);
            true
        }
    }

    /// Sets `is_registered` on each event from the stored registrations.
    pub fn mark_registered_events(&self, events: &mut [Event]) {
        let registered = self.get_registered_events();
        for event in events.iter_mut() {
            event.is_registered = Some(registered.contains(&event.id));
        }
    }

    // Camera history

    pub fn get_camera_history(&self) -> Vec<CameraRecognition> {
        self.read_list(CAMERA_HISTORY_KEY)
    }

    /// Puts `recognition` first and drops everything past the history limit.
    /// Entries that did not decode count toward the limit like any other.
    pub fn save_camera_recognition(&self, recognition: &CameraRecognition) {
        let mut history: Vec<StoredEntry<CameraRecognition>> =
            self.read_entries(CAMERA_HISTORY_KEY);
        history.insert(0, StoredEntry::Known(recognition.clone()));
        history.truncate(self.camera_history_limit);
        self.write(CAMERA_HISTORY_KEY, &history);
    }

    pub fn clear_camera_history(&self) {
        self.write(CAMERA_HISTORY_KEY, &Vec::<CameraRecognition>::new());
    }

    // User preferences

    pub fn get_user_preferences(&self) -> UserPreferences {
        self.read(USER_PREFERENCES_KEY, UserPreferences::default())
    }

    /// Merges `update` over the stored preferences and returns the result.
    pub fn save_user_preferences(&self, update: PreferencesUpdate) -> UserPreferences {
        let updated = self.get_user_preferences().merge(update);
        self.write(USER_PREFERENCES_KEY, &updated);
        updated
    }
}
