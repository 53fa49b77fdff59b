//! Map interaction logic: which dialog should be open, where the map should
//! be centred, and which markers to draw.
//!
//! [`MapController`] is a plain state machine. The embedding UI feeds it
//! pointer, geolocation and store events and renders whatever state results;
//! it never talks to the map widget or the store itself.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::{id::ApiId, voter::VoterRecord},
    common::{coords::Coords, party::Party},
};
use crate::store::VoterEvent;

pub mod geocode;

/// Where the map starts before any location is known.
pub const DEFAULT_CENTER: Coords = Coords::new(20.5937, 78.9629);
pub const DEFAULT_ZOOM: u8 = 5;
/// Zoom after the device location is found on load.
pub const LOCATED_ZOOM: u8 = 12;
/// Zoom when focusing on a single spot.
pub const FOCUS_ZOOM: u8 = 15;

/// Whether the map provider can be used at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum MapStatus {
    Ready {
        #[serde(rename = "apiKey")]
        api_key: String,
    },
    ConfigurationError {
        message: String,
    },
}

impl MapStatus {
    /// A blank key counts as missing.
    pub fn from_api_key(api_key: Option<&str>) -> Self {
        match api_key.map(str::trim) {
            Some(key) if !key.is_empty() => Self::Ready {
                api_key: key.to_string(),
            },
            _ => Self::ConfigurationError {
                message: "Google Maps API key is missing. \
                    Set `maps_api_key` in Rocket.toml or `ROCKET_MAPS_API_KEY` in the environment."
                    .to_string(),
            },
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapView {
    pub center: Coords,
    pub zoom: u8,
}

impl Default for MapView {
    fn default() -> Self {
        Self {
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
        }
    }
}

/// A voter pin on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: ApiId,
    pub position: Coords,
    pub party: Party,
    pub color: String,
}

impl From<&VoterRecord> for Marker {
    fn from(record: &VoterRecord) -> Self {
        Self {
            id: record.id,
            position: record.coords(),
            party: record.party,
            color: record.party.color().to_string(),
        }
    }
}

pub fn markers_for(records: &[VoterRecord]) -> Vec<Marker> {
    records.iter().map(Marker::from).collect()
}

/// What the next dialog interaction is for.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Add {
        coords: Coords,
        /// Reverse-geocoded address, once known.
        address: Option<String>,
    },
    View(VoterRecord),
    Edit(VoterRecord),
}

/// Why the device location could not be obtained.
/// Codes follow the browser's `GeolocationPositionError`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeolocationError {
    PermissionDenied,
    PositionUnavailable,
    Timeout,
}

impl GeolocationError {
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => Self::PermissionDenied,
            3 => Self::Timeout,
            _ => Self::PositionUnavailable,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Info,
    Success,
    Destructive,
}

/// A transient, user-visible message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub severity: Severity,
    pub title: String,
    pub description: String,
}

impl Notification {
    fn new(severity: Severity, title: &str, description: impl Into<String>) -> Self {
        Self {
            severity,
            title: title.to_string(),
            description: description.into(),
        }
    }
}

/// Whether a successful save created or edited a voter.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SaveMode {
    Add,
    Edit,
}

#[derive(Debug, Clone, Default)]
pub struct MapController {
    view: MapView,
    intent: Option<Intent>,
    voters: Vec<VoterRecord>,
    notifications: Vec<Notification>,
    write_pending: bool,
    needs_refresh: bool,
}

impl MapController {
    pub fn new(voters: Vec<VoterRecord>) -> Self {
        Self {
            voters,
            ..Default::default()
        }
    }

    pub fn view(&self) -> MapView {
        self.view
    }

    pub fn intent(&self) -> Option<&Intent> {
        self.intent.as_ref()
    }

    pub fn voters(&self) -> &[VoterRecord] {
        &self.voters
    }

    pub fn markers(&self) -> Vec<Marker> {
        markers_for(&self.voters)
    }

    pub fn write_pending(&self) -> bool {
        self.write_pending
    }

    /// True once the live feed reported missed events; cleared by [`Self::replace_voters`].
    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh
    }

    /// Drain the notifications raised since the last call.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    /// Replace the local voter set with a fresh listing from the store.
    pub fn replace_voters(&mut self, voters: Vec<VoterRecord>) {
        self.voters = voters;
        self.needs_refresh = false;
    }

    /// The device location requested when the map first loads.
    pub fn on_initial_location(&mut self, result: Result<Coords, GeolocationError>) {
        match result {
            Ok(coords) => self.focus(coords, LOCATED_ZOOM),
            Err(err) => {
                info!("Could not get user location ({err:?}), staying at default center");
                self.notify_location_error(err);
            }
        }
    }

    pub fn on_map_click(&mut self, coords: Coords) {
        self.open_add(coords);
    }

    /// The device location requested by the "add voter here" action.
    pub fn on_current_location(&mut self, result: Result<Coords, GeolocationError>) {
        match result {
            Ok(coords) => {
                self.focus(coords, FOCUS_ZOOM);
                self.open_add(coords);
            }
            Err(err) => self.notify_location_error(err),
        }
    }

    /// Open the detail view for a marker. Returns false if the voter is no
    /// longer known locally.
    pub fn on_marker_click(&mut self, id: ApiId) -> bool {
        match self.voters.iter().find(|v| v.id == id) {
            Some(voter) => {
                self.intent = Some(Intent::View(voter.clone()));
                true
            }
            None => {
                debug!("Marker {id} clicked but voter is not loaded");
                false
            }
        }
    }

    /// A place picked from the search box.
    pub fn on_place_selected(&mut self, coords: Coords) {
        self.focus(coords, FOCUS_ZOOM);
    }

    /// Attach a reverse-geocoded address to the open add dialog, provided it
    /// is still for the same spot.
    pub fn on_address_resolved(&mut self, coords: Coords, resolved: String) {
        if let Some(Intent::Add {
            coords: ref open,
            ref mut address,
        }) = self.intent
        {
            if *open == coords {
                *address = Some(resolved);
            }
        }
    }

    /// Switch from viewing a voter to editing it.
    pub fn edit(&mut self) -> bool {
        match self.intent.take() {
            Some(Intent::View(voter)) => {
                self.intent = Some(Intent::Edit(voter));
                true
            }
            other => {
                self.intent = other;
                false
            }
        }
    }

    /// The voter a delete would apply to: the one being viewed or edited.
    pub fn delete_target(&self) -> Option<ApiId> {
        match self.intent {
            Some(Intent::View(ref voter)) | Some(Intent::Edit(ref voter)) => Some(voter.id),
            _ => None,
        }
    }

    /// Close whatever dialog is open.
    pub fn close(&mut self) {
        self.intent = None;
    }

    /// Mark a write as in flight. Returns false, and changes nothing, if one
    /// already is.
    pub fn begin_write(&mut self) -> bool {
        if self.write_pending {
            return false;
        }
        self.write_pending = true;
        true
    }

    pub fn on_saved(&mut self, voter: VoterRecord, mode: SaveMode) {
        self.write_pending = false;
        self.intent = None;
        let coords = voter.coords();
        self.upsert(voter);
        let description = match mode {
            SaveMode::Add => {
                self.focus(coords, FOCUS_ZOOM);
                "Voter added successfully."
            }
            SaveMode::Edit => "Voter updated successfully.",
        };
        self.notifications
            .push(Notification::new(Severity::Success, "Success", description));
    }

    pub fn on_deleted(&mut self, id: ApiId) {
        self.write_pending = false;
        self.intent = None;
        self.voters.retain(|v| v.id != id);
        self.notifications.push(Notification::new(
            Severity::Success,
            "Success",
            "Voter data deleted.",
        ));
    }

    /// A write was rejected. Local state is left exactly as it was so the
    /// user can retry.
    pub fn on_write_failed(&mut self, message: impl Into<String>) {
        self.write_pending = false;
        self.notifications.push(Notification::new(
            Severity::Destructive,
            "An error occurred",
            message,
        ));
    }

    /// Fold a change from the live voter feed into local state.
    pub fn apply(&mut self, event: VoterEvent) {
        match event {
            VoterEvent::Created(voter) | VoterEvent::Updated(voter) => self.upsert(voter),
            VoterEvent::Deleted(id) => {
                self.voters.retain(|v| v.id != id);
                let showing_deleted = matches!(
                    self.intent,
                    Some(Intent::View(ref v)) | Some(Intent::Edit(ref v)) if v.id == id
                );
                if showing_deleted {
                    self.intent = None;
                }
            }
            VoterEvent::Resync => self.needs_refresh = true,
        }
    }

    fn open_add(&mut self, coords: Coords) {
        self.intent = Some(Intent::Add {
            coords,
            address: None,
        });
    }

    fn focus(&mut self, center: Coords, zoom: u8) {
        self.view = MapView { center, zoom };
    }

    fn upsert(&mut self, voter: VoterRecord) {
        match self.voters.iter_mut().find(|v| v.id == voter.id) {
            Some(existing) => *existing = voter,
            None => self.voters.push(voter),
        }
    }

    fn notify_location_error(&mut self, err: GeolocationError) {
        let description = match err {
            GeolocationError::PermissionDenied => {
                "Could not get your location. Please enable location services and grant permission."
            }
            GeolocationError::PositionUnavailable => {
                "Your location is currently unavailable. Showing the default map area."
            }
            GeolocationError::Timeout => {
                "Timed out while getting your location. Showing the default map area."
            }
        };
        self.notifications.push(Notification::new(
            Severity::Destructive,
            "Location Error",
            description,
        ));
    }
}
