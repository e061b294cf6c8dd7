use locator::{LatLng, MapSurface, MarkerId};
use std::collections::HashMap;

/// In-memory stand-in for the externally-owned map widget.
///
/// Keeps the viewport center and the attached markers and logs every action,
/// so a session in the terminal shows what a real widget would be told.
pub struct ConsoleMap {
    center: LatLng,
    zoom: u32,
    markers: HashMap<MarkerId, LatLng>,
    next: u64,
}

impl ConsoleMap {
    pub fn new(center: LatLng, zoom: u32) -> Self {
        Self {
            center,
            zoom,
            markers: HashMap::new(),
            next: 0,
        }
    }

    pub fn zoom(&self) -> u32 {
        self.zoom
    }

    /// A user pan: the widget moved on its own, not via `set_center`.
    pub fn pan_to(&mut self, center: LatLng) {
        log::info!("Map panned to {}.", center);
        self.center = center;
    }

    pub fn markers(&self) -> impl Iterator<Item = (&MarkerId, &LatLng)> {
        self.markers.iter()
    }
}

impl MapSurface for ConsoleMap {
    fn center(&self) -> LatLng {
        self.center
    }

    fn set_center(&mut self, center: LatLng) {
        log::info!("Map recentered on {}.", center);
        self.center = center;
    }

    fn attach_marker(&mut self, position: LatLng) -> MarkerId {
        let id = MarkerId(self.next);
        self.next += 1;
        self.markers.insert(id, position);
        log::info!("Attached {} at {}.", id, position);
        id
    }

    fn detach_marker(&mut self, marker: MarkerId) {
        if self.markers.remove(&marker).is_some() {
            log::info!("Detached {}.", marker);
        }
    }

    fn marker_position(&self, marker: MarkerId) -> Option<LatLng> {
        self.markers.get(&marker).copied()
    }
}
