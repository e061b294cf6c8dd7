use crate::geo::LatLng;
use crate::marker::MarkerId;

/// The boundary to the externally-owned map widget.
///
/// The panel never owns the real map; it receives a handle implementing this
/// trait once the widget reports ready and holds it for its whole lifetime.
pub trait MapSurface {
    /// Current center of the visible viewport.
    fn center(&self) -> LatLng;

    /// Recenter the viewport. The widget may echo this back as a bounds
    /// change; the panel guards against that echo itself.
    fn set_center(&mut self, center: LatLng);

    /// Attach a marker pin at the given position and hand out its id.
    fn attach_marker(&mut self, position: LatLng) -> MarkerId;

    /// Detach a previously attached marker. Unknown ids are ignored.
    fn detach_marker(&mut self, marker: MarkerId);

    /// Position of an attached marker, `None` once it was detached.
    fn marker_position(&self, marker: MarkerId) -> Option<LatLng>;
}
