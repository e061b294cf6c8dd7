use crate::geo::{parse_coordinate, LatLng};
use crate::geocode::{GeocodeOutcome, GeocodeQuery, GeocodeReply, GeocodeRequest, Geocoder};
use crate::marker::MarkerSlot;
use crate::surface::MapSurface;
use crossbeam_channel::{unbounded, Receiver, Sender};

pub const MISSING_COORDINATES: &str = "Enter both coordinates first.";
pub const INVALID_COORDINATES: &str = "Coordinates must be decimal degrees.";
pub const ADDRESS_NOT_FOUND: &str = "No coordinates found for that address.";
pub const MARKER_ADDRESS_FAILED: &str = "No address found for the marker position.";

/// The user-visible position: coordinate text fields plus the address line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionInfo {
    pub lat: String,
    pub lng: String,
    pub address: String,
}

/// One of the panel's editable text fields.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Field {
    Lat,
    Lng,
    Address,
}

/// The dismissible error banner above the form.
#[derive(Debug, Clone, Default)]
pub struct ErrorBanner {
    pub message: String,
    pub visible: bool,
}

impl ErrorBanner {
    fn show(&mut self, message: &str) {
        self.message = message.to_string();
        self.visible = true;
    }

    fn dismiss(&mut self) {
        self.message.clear();
        self.visible = false;
    }
}

#[derive(Debug, Clone)]
pub struct PanelOptions {
    /// Whether a failed reverse geocode raises the banner. The original
    /// behavior is silent, so that is the default; flip it in config to
    /// surface pan lookups that come back empty-handed.
    pub banner_on_reverse_failure: bool,
}

impl Default for PanelOptions {
    fn default() -> Self {
        Self {
            banner_on_reverse_failure: false,
        }
    }
}

/// Everything handed over by the map widget when it reports ready.
struct MapBinding<M, G> {
    map: M,
    geocoder: G,
    marker: MarkerSlot,
}

/// The in-flight lookup. At most one; a newer lookup supersedes it and the
/// superseded reply is dropped on arrival.
enum PendingLookup {
    Reverse {
        seq: u64,
        lat_text: String,
        lng_text: String,
        position: LatLng,
    },
    Forward {
        seq: u64,
    },
}

impl PendingLookup {
    fn seq(&self) -> u64 {
        match self {
            PendingLookup::Reverse { seq, .. } => *seq,
            PendingLookup::Forward { seq } => *seq,
        }
    }
}

/// The location panel: position state, error banner, and the two sync
/// directions between the form fields and the externally-owned map.
///
/// All methods run on the single UI thread. Geocode replies arrive over an
/// internal channel and are folded into the state by `process_replies`,
/// which the embedding event loop pumps.
pub struct LocatorPanel<M, G> {
    position: PositionInfo,
    banner: ErrorBanner,
    options: PanelOptions,
    binding: Option<MapBinding<M, G>>,
    replies: (Sender<GeocodeReply>, Receiver<GeocodeReply>),
    next_seq: u64,
    pending: Option<PendingLookup>,
    last_recenter: Option<LatLng>,
}

impl<M: MapSurface, G: Geocoder> LocatorPanel<M, G> {
    pub fn new(options: PanelOptions) -> Self {
        Self {
            position: PositionInfo::default(),
            banner: ErrorBanner::default(),
            options,
            binding: None,
            replies: unbounded(),
            next_seq: 0,
            pending: None,
            last_recenter: None,
        }
    }

    /// Called exactly once by the map widget when it finishes initializing.
    ///
    /// Places the initial marker at the widget's current center and stores
    /// the handles. Until this ran, every map-touching operation is a no-op.
    pub fn on_ready(&mut self, mut map: M, geocoder: G) {
        if self.binding.is_some() {
            log::debug!("Map reported ready twice; keeping the first binding.");
            return;
        }
        let center = map.center();
        let marker = MarkerSlot::place(&mut map, center);
        self.binding = Some(MapBinding {
            map,
            geocoder,
            marker,
        });
    }

    pub fn is_ready(&self) -> bool {
        self.binding.is_some()
    }

    /// Move the marker to the typed coordinates and look up their address.
    ///
    /// The marker moves right away; the address arrives asynchronously. On a
    /// successful reply the map recenters on the marker and the position
    /// fields take the supplied strings verbatim.
    pub fn locate_by_coordinates(&mut self, lat_text: &str, lng_text: &str) {
        if self.binding.is_none() {
            return;
        }
        if lat_text.trim().is_empty() || lng_text.trim().is_empty() {
            self.banner.show(MISSING_COORDINATES);
            return;
        }
        let position = match (parse_coordinate(lat_text), parse_coordinate(lng_text)) {
            (Some(lat), Some(lng)) => LatLng::new(lat, lng),
            _ => {
                self.banner.show(INVALID_COORDINATES);
                return;
            }
        };

        let binding = self.binding.as_mut().unwrap();
        binding.marker.replace(&mut binding.map, position);

        let seq = self.issue(GeocodeQuery::Coordinates(position));
        self.pending = Some(PendingLookup::Reverse {
            seq,
            lat_text: lat_text.to_string(),
            lng_text: lng_text.to_string(),
            position,
        });
    }

    /// Resolve typed address text to coordinates and move the marker there.
    ///
    /// Nothing moves until the reply arrives; a failed lookup leaves marker
    /// and center untouched and raises the banner.
    pub fn locate_by_address(&mut self, address: &str) {
        if self.binding.is_none() {
            return;
        }
        let seq = self.issue(GeocodeQuery::Address(address.to_string()));
        self.pending = Some(PendingLookup::Forward { seq });
    }

    /// Bounds-change notification from the map widget.
    ///
    /// A pan counts as a coordinate lookup at the new center. The echo of
    /// the panel's own recentering is recognized and ignored, so a
    /// successful lookup settles in one step instead of looping.
    pub fn on_bounds_changed(&mut self) {
        let center = match &self.binding {
            Some(binding) => binding.map.center(),
            None => return,
        };
        if let Some(target) = self.last_recenter {
            if center.approx_eq(&target) {
                return;
            }
        }
        self.locate_by_coordinates(&center.lat.to_string(), &center.lng.to_string());
    }

    /// Write one field as the user types. No validation, no side effects.
    pub fn set_field(&mut self, field: Field, value: &str) {
        match field {
            Field::Lat => self.position.lat = value.to_string(),
            Field::Lng => self.position.lng = value.to_string(),
            Field::Address => self.position.address = value.to_string(),
        }
    }

    pub fn dismiss_banner(&mut self) {
        self.banner.dismiss();
    }

    /// Drain the reply channel and fold completed lookups into the state.
    ///
    /// Only the most recently issued lookup may change state; replies to
    /// superseded lookups are dropped.
    pub fn process_replies(&mut self) {
        let replies: Vec<_> = self.replies.1.try_iter().collect();
        for reply in replies {
            self.apply_reply(reply);
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn position(&self) -> &PositionInfo {
        &self.position
    }

    pub fn banner(&self) -> &ErrorBanner {
        &self.banner
    }

    pub fn map(&self) -> Option<&M> {
        self.binding.as_ref().map(|b| &b.map)
    }

    pub fn map_mut(&mut self) -> Option<&mut M> {
        self.binding.as_mut().map(|b| &mut b.map)
    }

    pub fn marker(&self) -> Option<&MarkerSlot> {
        self.binding.as_ref().map(|b| &b.marker)
    }

    fn issue(&mut self, query: GeocodeQuery) -> u64 {
        self.next_seq += 1;
        let seq = self.next_seq;
        let binding = self.binding.as_ref().unwrap();
        binding.geocoder.geocode(
            GeocodeRequest { seq, query },
            self.replies.0.clone(),
        );
        seq
    }

    fn apply_reply(&mut self, reply: GeocodeReply) {
        let pending_seq = match &self.pending {
            Some(pending) => pending.seq(),
            None => {
                log::debug!("Dropping geocode reply {} with no lookup pending.", reply.seq);
                return;
            }
        };
        if reply.seq != pending_seq {
            log::debug!(
                "Dropping stale geocode reply {} (lookup {} is in flight).",
                reply.seq,
                pending_seq
            );
            return;
        }

        match self.pending.take().unwrap() {
            PendingLookup::Reverse {
                lat_text,
                lng_text,
                position,
                ..
            } => self.finish_reverse(reply.outcome, lat_text, lng_text, position),
            PendingLookup::Forward { .. } => self.finish_forward(reply.outcome),
        }
    }

    fn finish_reverse(
        &mut self,
        outcome: GeocodeOutcome,
        lat_text: String,
        lng_text: String,
        position: LatLng,
    ) {
        match outcome {
            GeocodeOutcome::Matches(mut matches) if !matches.is_empty() => {
                let binding = self.binding.as_mut().unwrap();
                binding.map.set_center(position);
                self.last_recenter = Some(position);
                self.position = PositionInfo {
                    lat: lat_text,
                    lng: lng_text,
                    address: matches.remove(0).address,
                };
            }
            GeocodeOutcome::Matches(_)
            | GeocodeOutcome::NotFound
            | GeocodeOutcome::Failed(_) => {
                // The marker already moved when the lookup was issued and
                // stays where it is.
                if self.options.banner_on_reverse_failure {
                    self.banner.show(MARKER_ADDRESS_FAILED);
                } else {
                    log::debug!("Reverse geocode for {} found no address.", position);
                }
            }
        }
    }

    fn finish_forward(&mut self, outcome: GeocodeOutcome) {
        match outcome {
            GeocodeOutcome::Matches(matches) if !matches.is_empty() => {
                let position = matches[0].position;
                let binding = self.binding.as_mut().unwrap();
                binding.marker.replace(&mut binding.map, position);
                binding.map.set_center(position);
                self.last_recenter = Some(position);
                // The address field keeps whatever the user typed.
                self.position.lat = position.lat.to_string();
                self.position.lng = position.lng.to_string();
            }
            GeocodeOutcome::Matches(_)
            | GeocodeOutcome::NotFound
            | GeocodeOutcome::Failed(_) => {
                self.banner.show(ADDRESS_NOT_FOUND);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::GeocodeMatch;
    use std::cell::RefCell;
    use std::collections::{HashMap, VecDeque};
    use std::rc::Rc;

    struct RecordingMap {
        center: LatLng,
        markers: HashMap<crate::MarkerId, LatLng>,
        next: u64,
        attached: usize,
        detached: usize,
        recenters: usize,
    }

    impl RecordingMap {
        fn new(center: LatLng) -> Self {
            Self {
                center,
                markers: HashMap::new(),
                next: 0,
                attached: 0,
                detached: 0,
                recenters: 0,
            }
        }

        fn live_markers(&self) -> usize {
            self.markers.len()
        }

        fn sole_marker_position(&self) -> LatLng {
            assert_eq!(self.markers.len(), 1);
            *self.markers.values().next().unwrap()
        }
    }

    impl MapSurface for RecordingMap {
        fn center(&self) -> LatLng {
            self.center
        }

        fn set_center(&mut self, center: LatLng) {
            self.center = center;
            self.recenters += 1;
        }

        fn attach_marker(&mut self, position: LatLng) -> crate::MarkerId {
            let id = crate::MarkerId(self.next);
            self.next += 1;
            self.attached += 1;
            self.markers.insert(id, position);
            id
        }

        fn detach_marker(&mut self, marker: crate::MarkerId) {
            if self.markers.remove(&marker).is_some() {
                self.detached += 1;
            }
        }

        fn marker_position(&self, marker: crate::MarkerId) -> Option<LatLng> {
            self.markers.get(&marker).copied()
        }
    }

    /// Replies immediately with scripted outcomes; withholds the reply when
    /// the script runs dry, leaving the lookup in flight.
    #[derive(Clone)]
    struct ScriptedGeocoder {
        outcomes: Rc<RefCell<VecDeque<GeocodeOutcome>>>,
        queries: Rc<RefCell<Vec<GeocodeQuery>>>,
    }

    impl ScriptedGeocoder {
        fn new() -> Self {
            Self {
                outcomes: Rc::new(RefCell::new(VecDeque::new())),
                queries: Rc::new(RefCell::new(Vec::new())),
            }
        }

        fn script(&self, outcome: GeocodeOutcome) {
            self.outcomes.borrow_mut().push_back(outcome);
        }

        fn queries(&self) -> Vec<GeocodeQuery> {
            self.queries.borrow().clone()
        }
    }

    impl Geocoder for ScriptedGeocoder {
        fn geocode(&self, request: GeocodeRequest, reply: Sender<GeocodeReply>) {
            self.queries.borrow_mut().push(request.query);
            if let Some(outcome) = self.outcomes.borrow_mut().pop_front() {
                reply
                    .send(GeocodeReply {
                        seq: request.seq,
                        outcome,
                    })
                    .unwrap();
            }
        }
    }

    fn taipei() -> LatLng {
        LatLng::new(25.0338041, 121.5645561)
    }

    fn matches(address: &str, position: LatLng) -> GeocodeOutcome {
        GeocodeOutcome::Matches(vec![GeocodeMatch {
            address: address.to_string(),
            position,
        }])
    }

    fn ready_panel() -> (LocatorPanel<RecordingMap, ScriptedGeocoder>, ScriptedGeocoder) {
        let mut panel = LocatorPanel::new(PanelOptions::default());
        let geocoder = ScriptedGeocoder::new();
        panel.on_ready(RecordingMap::new(taipei()), geocoder.clone());
        (panel, geocoder)
    }

    #[test]
    fn ready_places_the_initial_marker_at_the_center() {
        let (panel, _) = ready_panel();
        let map = panel.map().unwrap();
        assert_eq!(map.live_markers(), 1);
        assert!(map.sole_marker_position().approx_eq(&taipei()));
    }

    #[test]
    fn coordinate_lookup_fills_position_and_recenters() {
        let (mut panel, geocoder) = ready_panel();
        geocoder.script(matches("Taipei 101", LatLng::new(25.03, 121.56)));

        panel.locate_by_coordinates("25.03", "121.56");
        panel.process_replies();

        assert_eq!(
            panel.position(),
            &PositionInfo {
                lat: "25.03".to_string(),
                lng: "121.56".to_string(),
                address: "Taipei 101".to_string(),
            }
        );
        let map = panel.map().unwrap();
        assert!(map.center().approx_eq(&LatLng::new(25.03, 121.56)));
        assert!(map.sole_marker_position().approx_eq(&LatLng::new(25.03, 121.56)));
        assert_eq!(geocoder.queries().len(), 1);
    }

    #[test]
    fn empty_coordinates_banner_without_a_request() {
        let (mut panel, geocoder) = ready_panel();

        panel.locate_by_coordinates("", "121.56");
        assert!(panel.banner().visible);
        assert_eq!(panel.banner().message, MISSING_COORDINATES);

        panel.dismiss_banner();
        panel.locate_by_coordinates("25.03", "  ");
        assert!(panel.banner().visible);

        assert!(geocoder.queries().is_empty());
        assert_eq!(panel.map().unwrap().live_markers(), 1);
    }

    #[test]
    fn non_numeric_coordinates_banner_without_a_request() {
        let (mut panel, geocoder) = ready_panel();
        panel.locate_by_coordinates("north", "121.56");
        assert!(panel.banner().visible);
        assert_eq!(panel.banner().message, INVALID_COORDINATES);
        assert!(geocoder.queries().is_empty());
    }

    #[test]
    fn address_lookup_updates_coordinates_but_not_the_address_field() {
        let (mut panel, geocoder) = ready_panel();
        panel.set_field(Field::Address, "tallest building in Taipei");
        geocoder.script(matches(
            "Taipei 101, Xinyi District",
            LatLng::new(25.0338041, 121.5645561),
        ));

        panel.locate_by_address("tallest building in Taipei");
        panel.process_replies();

        assert_eq!(panel.position().lat, "25.0338041");
        assert_eq!(panel.position().lng, "121.5645561");
        assert_eq!(panel.position().address, "tallest building in Taipei");
        assert!(panel.map().unwrap().center().approx_eq(&taipei()));
    }

    #[test]
    fn failed_address_lookup_banners_and_moves_nothing() {
        let (mut panel, geocoder) = ready_panel();
        geocoder.script(GeocodeOutcome::NotFound);
        let marker_before = panel.map().unwrap().sole_marker_position();
        let center_before = panel.map().unwrap().center();

        panel.locate_by_address("nonexistent place");
        panel.process_replies();

        assert!(panel.banner().visible);
        assert_eq!(panel.banner().message, ADDRESS_NOT_FOUND);
        let map = panel.map().unwrap();
        assert!(map.sole_marker_position().approx_eq(&marker_before));
        assert!(map.center().approx_eq(&center_before));
    }

    #[test]
    fn marker_moves_even_when_the_reverse_lookup_fails() {
        let (mut panel, geocoder) = ready_panel();
        geocoder.script(GeocodeOutcome::Failed("OVER_QUERY_LIMIT".to_string()));

        panel.locate_by_coordinates("25.03", "121.56");
        panel.process_replies();

        // Silent by default, marker placement persists.
        assert!(!panel.banner().visible);
        let map = panel.map().unwrap();
        assert!(map.sole_marker_position().approx_eq(&LatLng::new(25.03, 121.56)));
        assert_eq!(map.recenters, 0);
    }

    #[test]
    fn reverse_failure_banners_when_configured() {
        let mut panel = LocatorPanel::new(PanelOptions {
            banner_on_reverse_failure: true,
        });
        let geocoder = ScriptedGeocoder::new();
        panel.on_ready(RecordingMap::new(taipei()), geocoder.clone());
        geocoder.script(GeocodeOutcome::NotFound);

        panel.locate_by_coordinates("25.03", "121.56");
        panel.process_replies();

        assert!(panel.banner().visible);
        assert_eq!(panel.banner().message, MARKER_ADDRESS_FAILED);
    }

    #[test]
    fn unready_panel_ignores_every_lookup() {
        let mut panel: LocatorPanel<RecordingMap, ScriptedGeocoder> =
            LocatorPanel::new(PanelOptions::default());

        panel.locate_by_coordinates("25.03", "121.56");
        panel.locate_by_address("Taipei 101");
        panel.on_bounds_changed();

        assert!(!panel.banner().visible);
        assert!(!panel.has_pending());
        assert_eq!(panel.position(), &PositionInfo::default());
    }

    #[test]
    fn at_most_one_marker_across_mixed_lookups() {
        let (mut panel, geocoder) = ready_panel();
        geocoder.script(matches("a", LatLng::new(1.0, 1.0)));
        geocoder.script(matches("b", LatLng::new(2.0, 2.0)));
        geocoder.script(matches("c", LatLng::new(3.0, 3.0)));

        panel.locate_by_coordinates("1.0", "1.0");
        panel.process_replies();
        panel.locate_by_address("somewhere");
        panel.process_replies();
        panel.locate_by_coordinates("3.0", "3.0");
        panel.process_replies();

        let map = panel.map().unwrap();
        assert_eq!(map.live_markers(), 1);
        assert_eq!(map.attached, map.detached + 1);
    }

    #[test]
    fn stale_replies_lose_to_the_latest_lookup() {
        let (mut panel, geocoder) = ready_panel();
        geocoder.script(matches("old pan target", LatLng::new(1.0, 1.0)));
        geocoder.script(matches("new pan target", LatLng::new(2.0, 2.0)));

        // Two lookups in flight; both replies are queued, only the second
        // may change state.
        panel.locate_by_coordinates("1.0", "1.0");
        panel.locate_by_coordinates("2.0", "2.0");
        panel.process_replies();

        assert_eq!(panel.position().address, "new pan target");
        assert_eq!(panel.position().lat, "2.0");
        assert!(panel.map().unwrap().center().approx_eq(&LatLng::new(2.0, 2.0)));
    }

    #[test]
    fn pan_triggers_a_reverse_lookup_at_the_new_center() {
        let (mut panel, geocoder) = ready_panel();
        geocoder.script(matches("somewhere else", LatLng::new(24.5, 121.0)));

        panel.map_mut().unwrap().center = LatLng::new(24.5, 121.0);
        panel.on_bounds_changed();
        panel.process_replies();

        assert_eq!(panel.position().address, "somewhere else");
        assert_eq!(panel.position().lat, "24.5");
        assert_eq!(panel.position().lng, "121");
        assert!(panel
            .map()
            .unwrap()
            .sole_marker_position()
            .approx_eq(&LatLng::new(24.5, 121.0)));
    }

    #[test]
    fn recenter_echo_does_not_loop() {
        let (mut panel, geocoder) = ready_panel();
        geocoder.script(matches("pan target", LatLng::new(24.5, 121.0)));

        panel.map_mut().unwrap().center = LatLng::new(24.5, 121.0);
        panel.on_bounds_changed();
        panel.process_replies();
        assert_eq!(geocoder.queries().len(), 1);

        // The widget echoes the programmatic recenter as a bounds change.
        panel.on_bounds_changed();
        panel.process_replies();

        assert_eq!(geocoder.queries().len(), 1);
        assert!(!panel.has_pending());
    }

    #[test]
    fn field_edits_write_through_verbatim() {
        let (mut panel, _) = ready_panel();
        panel.set_field(Field::Lat, "25.0");
        panel.set_field(Field::Lng, "121.5");
        panel.set_field(Field::Address, "typing in progres");
        assert_eq!(
            panel.position(),
            &PositionInfo {
                lat: "25.0".to_string(),
                lng: "121.5".to_string(),
                address: "typing in progres".to_string(),
            }
        );
    }

    #[test]
    fn second_ready_keeps_the_first_binding() {
        let (mut panel, geocoder) = ready_panel();
        panel.on_ready(RecordingMap::new(LatLng::new(0.0, 0.0)), geocoder);
        assert!(panel.map().unwrap().center().approx_eq(&taipei()));
        assert_eq!(panel.map().unwrap().live_markers(), 1);
    }

    #[test]
    fn dismiss_hides_the_banner() {
        let (mut panel, _) = ready_panel();
        panel.locate_by_coordinates("", "");
        assert!(panel.banner().visible);
        panel.dismiss_banner();
        assert!(!panel.banner().visible);
        assert!(panel.banner().message.is_empty());
    }
}
