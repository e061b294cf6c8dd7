use crate::geo::LatLng;
use crate::surface::MapSurface;

/// Handle to one marker pin living on the map widget.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct MarkerId(pub u64);

impl std::fmt::Display for MarkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "marker#{}", self.0)
    }
}

/// The panel's single marker, held as an owned slot.
///
/// `replace` detaches the previous marker before attaching the new one, so
/// the map never shows two panel markers at once.
pub struct MarkerSlot {
    current: MarkerId,
}

impl MarkerSlot {
    /// Attach the initial marker and take ownership of it.
    pub fn place<M: MapSurface>(map: &mut M, position: LatLng) -> Self {
        Self {
            current: map.attach_marker(position),
        }
    }

    /// Move the marker: detach the old pin, attach a new one at `position`.
    pub fn replace<M: MapSurface>(&mut self, map: &mut M, position: LatLng) -> MarkerId {
        map.detach_marker(self.current);
        self.current = map.attach_marker(position);
        self.current
    }

    pub fn current(&self) -> MarkerId {
        self.current
    }
}
