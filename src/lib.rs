//! # Asir Explorer Core
//!
//! Local persistence for the Asir Explorer tourism app: favorite landmarks,
//! tour bookings, event registrations, camera recognition history and user
//! preferences. Each of the five collections is stored as one JSON value
//! under a fixed key of a durable key-value substrate (LMDB on disk, or an
//! in-memory map for tests).
//!
//! ## Features
//!
//! - **Best-effort operations**: unreadable data reads as the collection's
//!   default, rejected writes are logged and dropped; nothing panics
//! - **Pluggable substrate**: [`local_storage::StorageBackend`] with LMDB and
//!   in-memory implementations
//! - **FFI surface**: every collection operation is exposed as an
//!   `extern "C"` function taking and returning JSON
//!
//! ## Quick Start
//!
//! ```no_run
//! use asir_explorer_core::collection_store::CollectionStore;
//! use asir_explorer_core::local_db_model::PreferencesUpdate;
//! use asir_explorer_core::local_db_model::Theme;
//! use asir_explorer_core::local_db_state::LmdbStorage;
//! use asir_explorer_core::store_config::StoreConfig;
//!
//! let config = StoreConfig::new("asir");
//! let store = CollectionStore::with_config(LmdbStorage::open(&config)?, &config);
//!
//! store.register_for_event("spring-festival");
//! let prefs = store.save_user_preferences(PreferencesUpdate {
//!     theme: Some(Theme::Dark),
//!     ..Default::default()
//! });
//! assert_eq!(prefs.theme, Theme::Dark);
//! # Ok::<(), asir_explorer_core::app_response::AppResponse>(())
//! ```
//!
//! ## FFI Functions
//!
//! Every function returns a heap-allocated C string holding a JSON
//! [`AppResponse`](app_response::AppResponse); release it with
//! [`free_response`].
//!
//! - [`create_store`], [`create_store_with_config`], [`close_store`]
//! - [`get_favorites`], [`save_favorite`], [`remove_favorite`], [`is_favorite`]
//! - [`get_bookings`], [`save_booking`], [`submit_booking`], [`update_booking_status`]
//! - [`get_registered_events`], [`register_for_event`], [`unregister_from_event`],
//!   [`is_registered_for_event`], [`toggle_event_registration`]
//! - [`get_camera_history`], [`save_camera_recognition`], [`clear_camera_history`]
//! - [`get_user_preferences`], [`save_user_preferences`]
//! - [`clear_all_records`]

pub mod app_response;
pub mod collection_store;
pub mod local_db_model;
pub mod local_db_state;
pub mod local_storage;
pub mod store_config;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::app_response::AppResponse;
use crate::collection_store::CollectionStore;
use crate::local_db_model::{
    Booking, BookingRequest, BookingStatus, CameraRecognition, Landmark, PreferencesUpdate,
};
use crate::local_db_state::LmdbStorage;
use crate::store_config::StoreConfig;

/// The store handed out across the FFI boundary.
pub type LocalStore = CollectionStore<LmdbStorage>;

/// Opens (or creates) the store named `name` with default settings.
///
/// The LMDB environment lives in the directory `<name>.lmdb`.
///
/// # Parameters
///
/// * `name` - A null-terminated C string containing the store name
///
/// # Returns
///
/// A pointer to the store, or null if `name` is null, not UTF-8, or the
/// environment cannot be opened. Release it with [`close_store`].
///
/// # Hot Restart
///
/// Opening a store whose environment is still open in this process (the
/// host lost the old pointer, or opened the same name twice) attaches to
/// the live environment instead of opening LMDB a second time. Both pointers
/// stay valid and see the same data; close each of them once.
///
/// # Safety
///
/// `name` must be null or point to a valid null-terminated string.
///
/// # Examples
///
/// ```no_run
/// use std::ffi::CString;
/// use asir_explorer_core::{create_store, close_store};
///
/// let name = CString::new("asir").unwrap();
/// let store = create_store(name.as_ptr());
/// assert!(!store.is_null());
/// close_store(store);
/// ```
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn create_store(name: *const c_char) -> *mut LocalStore {
    match ptr_to_string(name, "name") {
        Ok(name) => open_store(StoreConfig::new(name)),
        Err(e) => {
            warn!("create_store: {e}");
            std::ptr::null_mut()
        }
    }
}

/// Opens a store from a JSON [`StoreConfig`].
///
/// # Parameters
///
/// * `config_json` - Null-terminated JSON, e.g.
///   `{"name":"asir","map_size":1048576,"camera_history_limit":20}`.
///   Fields other than `name` are optional.
///
/// # Returns
///
/// A pointer to the store, or null when the pointer is null, the JSON is
/// malformed, the configuration is invalid, or the environment cannot be
/// opened. Reopening follows the same rules as [`create_store`].
///
/// # Safety
///
/// `config_json` must be null or point to a valid null-terminated string.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn create_store_with_config(config_json: *const c_char) -> *mut LocalStore {
    let json = match ptr_to_string(config_json, "config") {
        Ok(json) => json,
        Err(e) => {
            warn!("create_store_with_config: {e}");
            return std::ptr::null_mut();
        }
    };

    match StoreConfig::from_json(&json) {
        Ok(config) => open_store(config),
        Err(e) => {
            warn!("Invalid store configuration: {e}");
            std::ptr::null_mut()
        }
    }
}

fn open_store(config: StoreConfig) -> *mut LocalStore {
    info!("Attempting to open store at: {}", config.db_dir());

    match LmdbStorage::open(&config) {
        Ok(storage) => {
            info!("✅ Store opened successfully");
            Box::into_raw(Box::new(CollectionStore::with_config(storage, &config)))
        }
        Err(e) => {
            warn!("❌ Failed to open store: {e}");
            warn!("Attempted path: {}", config.db_dir());
            std::ptr::null_mut()
        }
    }
}

/// Flushes and frees the store.
///
/// The LMDB environment is closed once the last store attached to it is
/// closed.
///
/// # Parameters
///
/// * `state` - Pointer returned by [`create_store`] or [`create_store_with_config`]
///
/// # Returns
///
/// `Ok` on success, `BadRequest` for a null pointer.
///
/// # Safety
///
/// `state` must not be used after this call, and must not be closed twice.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn close_store(state: *mut LocalStore) -> *const c_char {
    if state.is_null() {
        let error = AppResponse::BadRequest("Null state pointer passed to close_store".to_string());
        return response_to_c_string(&error);
    }

    let store = unsafe { Box::from_raw(state) };
    if let Err(e) = store.storage().sync() {
        warn!("Failed to sync store before closing: {e}");
    }
    drop(store);

    response_to_c_string(&AppResponse::success("Store closed successfully"))
}

/// Releases a string returned by any function of this library.
///
/// # Safety
///
/// `ptr` must be null or a pointer returned by this library that has not
/// been freed yet.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn free_response(ptr: *const c_char) {
    if ptr.is_null() {
        return;
    }
    unsafe { drop(CString::from_raw(ptr as *mut c_char)) };
}

/// Lists the favorite landmarks.
///
/// # Parameters
///
/// * `state` - Pointer to the store
///
/// # Returns
///
/// `Ok` carrying a JSON array of landmarks (each with `"isFavorite":true`),
/// or `BadRequest` for a null pointer.
///
/// # Safety
///
/// `state` must be null or a live pointer from [`create_store`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_favorites(state: *mut LocalStore) -> *const c_char {
    with_store(state, "get_favorites", |store| json_response(&store.get_favorites()))
}

/// Adds a landmark to favorites unless its id is already present.
///
/// # Parameters
///
/// * `state` - Pointer to the store
/// * `json_ptr` - Null-terminated landmark JSON
///
/// # JSON Format
///
/// ```json
/// {
///   "id": "abha-dam", "name": "Abha Dam", "type": "Nature",
///   "description": "...", "coordinates": {"lat": 18.21, "lng": 42.5},
///   "difficulty": "Easy", "distance": "3 km", "estimatedTime": "1 hour",
///   "features": ["Lake"]
/// }
/// ```
///
/// # Returns
///
/// `Ok` (also when the landmark was already a favorite), `BadRequest` for
/// null pointers or invalid UTF-8, `SerializationError` for malformed JSON.
///
/// # Safety
///
/// Both pointers must be null or valid.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn save_favorite(state: *mut LocalStore, json_ptr: *const c_char) -> *const c_char {
    with_store(state, "save_favorite", |store| {
        let landmark: Landmark = match parse_payload(json_ptr, "landmark") {
            Ok(landmark) => landmark,
            Err(error) => return error,
        };
        store.save_favorite(&landmark);
        AppResponse::success(format!("Landmark {} saved to favorites", landmark.id))
    })
}

/// Removes the landmark with the given id from favorites.
///
/// # Parameters
///
/// * `state` - Pointer to the store
/// * `id` - Null-terminated landmark id
///
/// # Returns
///
/// `Ok` whether or not the id was present; `BadRequest` for null pointers or
/// invalid UTF-8.
///
/// # Safety
///
/// Both pointers must be null or valid.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn remove_favorite(state: *mut LocalStore, id: *const c_char) -> *const c_char {
    with_store(state, "remove_favorite", |store| {
        let id = match ptr_to_string(id, "id") {
            Ok(id) => id,
            Err(error) => return error,
        };
        store.remove_favorite(&id);
        AppResponse::success(format!("Landmark {id} removed from favorites"))
    })
}

/// Checks whether a landmark is a favorite.
///
/// # Parameters
///
/// * `state` - Pointer to the store
/// * `id` - Null-terminated landmark id
///
/// # Returns
///
/// `Ok("true")` or `Ok("false")`; `BadRequest` for null pointers or invalid
/// UTF-8.
///
/// # Safety
///
/// Both pointers must be null or valid.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn is_favorite(state: *mut LocalStore, id: *const c_char) -> *const c_char {
    with_store(state, "is_favorite", |store| {
        let id = match ptr_to_string(id, "id") {
            Ok(id) => id,
            Err(error) => return error,
        };
        json_response(&store.is_favorite(&id))
    })
}

/// Lists all bookings in creation order.
///
/// # Parameters
///
/// * `state` - Pointer to the store
///
/// # Returns
///
/// `Ok` carrying a JSON array of bookings, or `BadRequest` for a null
/// pointer.
///
/// # Safety
///
/// `state` must be null or a live pointer from [`create_store`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_bookings(state: *mut LocalStore) -> *const c_char {
    with_store(state, "get_bookings", |store| json_response(&store.get_bookings()))
}

/// Appends a complete booking record as-is.
///
/// Most hosts want [`submit_booking`] instead, which validates the form and
/// fills in id, status and creation time.
///
/// # Parameters
///
/// * `state` - Pointer to the store
/// * `json_ptr` - Null-terminated booking JSON (all fields, camelCase)
///
/// # Returns
///
/// `Ok`, `BadRequest` for null pointers or invalid UTF-8, or
/// `SerializationError` for malformed JSON.
///
/// # Safety
///
/// Both pointers must be null or valid.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn save_booking(state: *mut LocalStore, json_ptr: *const c_char) -> *const c_char {
    with_store(state, "save_booking", |store| {
        let booking: Booking = match parse_payload(json_ptr, "booking") {
            Ok(booking) => booking,
            Err(error) => return error,
        };
        store.save_booking(&booking);
        AppResponse::success(format!("Booking {} saved", booking.id))
    })
}

/// Validates a booking form and stores a new `pending` booking.
///
/// # Parameters
///
/// * `state` - Pointer to the store
/// * `json_ptr` - Null-terminated booking form JSON
///
/// # JSON Format
///
/// ```json
/// {
///   "type": "hiking", "title": "Jabal Sawda Summit Hike",
///   "date": "2024-03-10", "time": "06:30", "participants": 2,
///   "name": "Sara", "phone": "+966500000000", "email": "sara@example.com"
/// }
/// ```
///
/// # Returns
///
/// `Ok` with the created booking as JSON, or `ValidationError` listing the
/// missing fields.
///
/// # Safety
///
/// Both pointers must be null or valid.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn submit_booking(state: *mut LocalStore, json_ptr: *const c_char) -> *const c_char {
    with_store(state, "submit_booking", |store| {
        let request: BookingRequest = match parse_payload(json_ptr, "booking request") {
            Ok(request) => request,
            Err(error) => return error,
        };
        match store.submit_booking(request) {
            Ok(booking) => json_response(&booking),
            Err(error) => error,
        }
    })
}

/// Sets the status of the booking with the given id.
///
/// # Parameters
///
/// * `state` - Pointer to the store
/// * `id` - Null-terminated booking id
/// * `status` - `"pending"`, `"confirmed"` or `"cancelled"`
///
/// # Returns
///
/// `Ok` (also when no booking has that id), or `BadRequest` for null
/// pointers, invalid UTF-8 or an unknown status.
///
/// # Safety
///
/// All pointers must be null or valid.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn update_booking_status(
    state: *mut LocalStore,
    id: *const c_char,
    status: *const c_char,
) -> *const c_char {
    with_store(state, "update_booking_status", |store| {
        let id = match ptr_to_string(id, "id") {
            Ok(id) => id,
            Err(error) => return error,
        };
        let status_str = match ptr_to_string(status, "status") {
            Ok(status) => status,
            Err(error) => return error,
        };
        let status: BookingStatus =
            match serde_json::from_value(serde_json::Value::String(status_str.clone())) {
                Ok(status) => status,
                Err(_) => {
                    return AppResponse::BadRequest(format!("Unknown booking status: {status_str}"))
                }
            };
        store.update_booking_status(&id, status);
        AppResponse::success(format!("Booking {id} set to {}", status.as_str()))
    })
}

/// Lists the ids of the events the user registered for.
///
/// # Returns
///
/// `Ok` carrying a JSON array of strings, or `BadRequest` for a null
/// pointer.
///
/// # Safety
///
/// `state` must be null or a live pointer from [`create_store`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_registered_events(state: *mut LocalStore) -> *const c_char {
    with_store(state, "get_registered_events", |store| {
        json_response(&store.get_registered_events())
    })
}

/// Registers for an event. Registering twice is a no-op.
///
/// # Parameters
///
/// * `state` - Pointer to the store
/// * `id` - Null-terminated event id
///
/// # Safety
///
/// Both pointers must be null or valid.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn register_for_event(state: *mut LocalStore, id: *const c_char) -> *const c_char {
    with_store(state, "register_for_event", |store| {
        let id = match ptr_to_string(id, "event id") {
            Ok(id) => id,
            Err(error) => return error,
        };
        store.register_for_event(&id);
        AppResponse::success(format!("Registered for event {id}"))
    })
}

/// Removes the registration for an event, if any.
///
/// # Parameters
///
/// * `state` - Pointer to the store
/// * `id` - Null-terminated event id
///
/// # Safety
///
/// Both pointers must be null or valid.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn unregister_from_event(state: *mut LocalStore, id: *const c_char) -> *const c_char {
    with_store(state, "unregister_from_event", |store| {
        let id = match ptr_to_string(id, "event id") {
            Ok(id) => id,
            Err(error) => return error,
        };
        store.unregister_from_event(&id);
        AppResponse::success(format!("Unregistered from event {id}"))
    })
}

/// Checks whether the user is registered for an event.
///
/// # Parameters
///
/// * `state` - Pointer to the store
/// * `id` - Null-terminated event id
///
/// # Returns
///
/// `Ok("true")` or `Ok("false")`.
///
/// # Safety
///
/// Both pointers must be null or valid.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn is_registered_for_event(
    state: *mut LocalStore,
    id: *const c_char,
) -> *const c_char {
    with_store(state, "is_registered_for_event", |store| {
        let id = match ptr_to_string(id, "event id") {
            Ok(id) => id,
            Err(error) => return error,
        };
        json_response(&store.is_registered_for_event(&id))
    })
}

/// Registers or unregisters, whichever applies.
///
/// # Parameters
///
/// * `state` - Pointer to the store
/// * `id` - Null-terminated event id
///
/// # Returns
///
/// The new state: `Ok("true")` when now registered, `Ok("false")` otherwise.
///
/// # Safety
///
/// Both pointers must be null or valid.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn toggle_event_registration(
    state: *mut LocalStore,
    id: *const c_char,
) -> *const c_char {
    with_store(state, "toggle_event_registration", |store| {
        let id = match ptr_to_string(id, "event id") {
            Ok(id) => id,
            Err(error) => return error,
        };
        json_response(&store.toggle_event_registration(&id))
    })
}

/// Lists camera recognitions, most recent first.
///
/// # Returns
///
/// `Ok` carrying a JSON array of recognitions, or `BadRequest` for a null
/// pointer.
///
/// # Safety
///
/// `state` must be null or a live pointer from [`create_store`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_camera_history(state: *mut LocalStore) -> *const c_char {
    with_store(state, "get_camera_history", |store| {
        json_response(&store.get_camera_history())
    })
}

/// Prepends a recognition record to the history, dropping the oldest past
/// the configured limit.
///
/// # Parameters
///
/// * `state` - Pointer to the store
/// * `json_ptr` - Null-terminated recognition JSON (`id`, `image`,
///   `timestamp`, optional `detectedLandmark` and `location`)
///
/// # Returns
///
/// `Ok`, `BadRequest` for null pointers or invalid UTF-8, or
/// `SerializationError` for malformed JSON. A `blob:` image is stored but
/// logged, since it will not resolve after a reload.
///
/// # Safety
///
/// Both pointers must be null or valid.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn save_camera_recognition(
    state: *mut LocalStore,
    json_ptr: *const c_char,
) -> *const c_char {
    with_store(state, "save_camera_recognition", |store| {
        let recognition: CameraRecognition = match parse_payload(json_ptr, "recognition") {
            Ok(recognition) => recognition,
            Err(error) => return error,
        };
        if !recognition.has_durable_image() {
            warn!(
                "Recognition {} references a blob image that will not survive a reload",
                recognition.id
            );
        }
        store.save_camera_recognition(&recognition);
        AppResponse::success(format!("Recognition {} saved", recognition.id))
    })
}

/// Empties the camera history.
///
/// # Safety
///
/// `state` must be null or a live pointer from [`create_store`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn clear_camera_history(state: *mut LocalStore) -> *const c_char {
    with_store(state, "clear_camera_history", |store| {
        store.clear_camera_history();
        AppResponse::success("Camera history cleared")
    })
}

/// Reads the user preferences, defaults included.
///
/// # Returns
///
/// `Ok` carrying the preferences JSON, e.g.
/// `{"language":"en","theme":"light","notifications":true,"location":true}`.
///
/// # Safety
///
/// `state` must be null or a live pointer from [`create_store`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_user_preferences(state: *mut LocalStore) -> *const c_char {
    with_store(state, "get_user_preferences", |store| {
        json_response(&store.get_user_preferences())
    })
}

/// Merges partial preferences over the stored ones.
///
/// # Parameters
///
/// * `state` - Pointer to the store
/// * `json_ptr` - Null-terminated partial preferences, e.g. `{"theme":"dark"}`
///
/// # Returns
///
/// `Ok` with the merged record, or `SerializationError` for malformed JSON.
///
/// # Safety
///
/// Both pointers must be null or valid.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn save_user_preferences(
    state: *mut LocalStore,
    json_ptr: *const c_char,
) -> *const c_char {
    with_store(state, "save_user_preferences", |store| {
        let update: PreferencesUpdate = match parse_payload(json_ptr, "preferences") {
            Ok(update) => update,
            Err(error) => return error,
        };
        json_response(&store.save_user_preferences(update))
    })
}

/// Wipes every collection. The store stays open and usable.
///
/// # Safety
///
/// `state` must be null or a live pointer from [`create_store`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn clear_all_records(state: *mut LocalStore) -> *const c_char {
    with_store(state, "clear_all_records", |store| {
        store.clear_all();
        AppResponse::success("All records cleared successfully")
    })
}

/// Runs `op` against the store behind `state`, or answers `BadRequest` when
/// the pointer is null.
fn with_store<F>(state: *mut LocalStore, fn_name: &str, op: F) -> *const c_char
where
    F: FnOnce(&LocalStore) -> AppResponse,
{
    match unsafe { state.as_ref() } {
        Some(store) => response_to_c_string(&op(store)),
        None => {
            let error = AppResponse::BadRequest(format!("Null state pointer passed to {fn_name}"));
            response_to_c_string(&error)
        }
    }
}

/// Serializes `value` into an `Ok` response carrying the JSON text.
fn json_response<T: Serialize + ?Sized>(value: &T) -> AppResponse {
    match serde_json::to_string(value) {
        Ok(json) => AppResponse::Ok(json),
        Err(e) => AppResponse::SerializationError(format!("Error serializing result: {e}")),
    }
}

fn parse_payload<T: DeserializeOwned>(ptr: *const c_char, field_name: &str) -> Result<T, AppResponse> {
    let json = ptr_to_string(ptr, field_name)?;
    serde_json::from_str(&json)
        .map_err(|e| AppResponse::SerializationError(format!("Invalid {field_name} JSON: {e}")))
}

/// Converts a C string pointer to an owned `String`, describing null
/// pointers and invalid UTF-8 as `BadRequest`.
fn ptr_to_string(ptr: *const c_char, field_name: &str) -> Result<String, AppResponse> {
    if ptr.is_null() {
        return Err(AppResponse::BadRequest(format!("Null {field_name} pointer")));
    }

    match unsafe { CStr::from_ptr(ptr).to_str() } {
        Ok(s) => Ok(s.to_string()),
        Err(e) => Err(AppResponse::BadRequest(format!(
            "Invalid UTF-8 in {field_name}: {e}"
        ))),
    }
}

/// Converts an [`AppResponse`] to a C string owned by the caller.
///
/// Returns null if the response cannot be serialized or contains an
/// interior NUL byte.
fn response_to_c_string(response: &AppResponse) -> *const c_char {
    let json = match serde_json::to_string(response) {
        Ok(j) => j,
        Err(e) => {
            warn!("Error serializing response: {e}");
            return std::ptr::null();
        }
    };

    match CString::new(json) {
        Ok(c_str) => c_str.into_raw(),
        Err(e) => {
            warn!("Error creating CString: {e}");
            std::ptr::null()
        }
    }
}
