/// A position on the map in decimal degrees.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Equality up to the jitter a round trip through the map widget can introduce.
    pub fn approx_eq(&self, other: &LatLng) -> bool {
        const EPSILON: f64 = 1e-9;
        (self.lat - other.lat).abs() < EPSILON && (self.lng - other.lng).abs() < EPSILON
    }
}

impl std::fmt::Display for LatLng {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{},{}", self.lat, self.lng)
    }
}

/// Parse one coordinate text field into decimal degrees.
///
/// Returns `None` for anything that is not a finite number, so field contents
/// like `"NaN"` or `"12,5"` never reach the map.
pub fn parse_coordinate(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
