use crate::geo::LatLng;
use crossbeam_channel::Sender;
use serde_derive::Deserialize;
use std::thread::spawn;

/// What the user asked the geocoding service to resolve.
#[derive(Debug, Clone, PartialEq)]
pub enum GeocodeQuery {
    /// Reverse geocode: coordinates to a human-readable address.
    Coordinates(LatLng),
    /// Forward geocode: address text to coordinates.
    Address(String),
}

/// One entry of the service's result list.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeMatch {
    pub address: String,
    pub position: LatLng,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeocodeOutcome {
    /// Status OK with a non-empty result list.
    Matches(Vec<GeocodeMatch>),
    /// The service answered but knows no such place.
    NotFound,
    /// Transport or service failure, with the status text.
    Failed(String),
}

/// A single sequence-stamped lookup.
#[derive(Debug, Clone)]
pub struct GeocodeRequest {
    pub seq: u64,
    pub query: GeocodeQuery,
}

/// Completion of a lookup, delivered back over the panel's reply channel.
#[derive(Debug, Clone)]
pub struct GeocodeReply {
    pub seq: u64,
    pub outcome: GeocodeOutcome,
}

/// The asynchronous geocoding service boundary.
///
/// An implementation completes each request exactly once by sending one
/// `GeocodeReply` carrying the request's sequence stamp. The caller returns
/// immediately; replies arrive whenever the panel drains its channel.
pub trait Geocoder {
    fn geocode(&self, request: GeocodeRequest, reply: Sender<GeocodeReply>);
}

/// Geocoder backed by a Google-style geocoding HTTP endpoint.
///
/// Each request runs its blocking HTTP call on its own worker thread and
/// reports back over the reply channel.
pub struct HttpGeocoder {
    endpoint: String,
    api_key: String,
}

impl HttpGeocoder {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }
}

impl Geocoder for HttpGeocoder {
    fn geocode(&self, request: GeocodeRequest, reply: Sender<GeocodeReply>) {
        let endpoint = self.endpoint.clone();
        let api_key = self.api_key.clone();

        spawn(move || {
            let outcome = lookup(&endpoint, &api_key, &request.query);
            if reply
                .send(GeocodeReply {
                    seq: request.seq,
                    outcome,
                })
                .is_err()
            {
                log::debug!(
                    "Could not deliver geocode reply {}. The panel is most likely gone.",
                    request.seq
                );
            }
        });
    }
}

fn lookup(endpoint: &str, api_key: &str, query: &GeocodeQuery) -> GeocodeOutcome {
    let mut request = ureq::get(endpoint);
    match query {
        GeocodeQuery::Coordinates(position) => request.query("latlng", &position.to_string()),
        GeocodeQuery::Address(address) => request.query("address", address),
    };
    request.query("key", api_key);

    let response = request.call();
    if !response.ok() {
        log::warn!("Geocode http request failed with status {}.", response.status());
        return GeocodeOutcome::Failed(format!("http status {}", response.status()));
    }

    match response.into_json_deserialize::<GeocodeResponse>() {
        Ok(body) => outcome_from_response(body),
        Err(e) => {
            log::warn!("Could not parse geocode response. Reason:\r\n{}", e);
            GeocodeOutcome::Failed("unparseable response".into())
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    formatted_address: String,
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Location,
}

#[derive(Debug, Deserialize)]
struct Location {
    lat: f64,
    lng: f64,
}

pub(crate) fn outcome_from_response(response: GeocodeResponse) -> GeocodeOutcome {
    match &response.status[..] {
        "OK" => {
            let matches: Vec<_> = response
                .results
                .into_iter()
                .map(|r| GeocodeMatch {
                    address: r.formatted_address,
                    position: LatLng::new(r.geometry.location.lat, r.geometry.location.lng),
                })
                .collect();
            // OK with an empty list does not happen per the service contract,
            // but a defect there must not look like a successful lookup here.
            if matches.is_empty() {
                GeocodeOutcome::NotFound
            } else {
                GeocodeOutcome::Matches(matches)
            }
        }
        "ZERO_RESULTS" => GeocodeOutcome::NotFound,
        other => GeocodeOutcome::Failed(other.to_string()),
    }
}
