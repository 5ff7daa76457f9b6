use crate::config::{Coordinates, GeocodeSettings};
use crate::storage::JournalDb;
use log::{debug, warn};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(thiserror::Error, Debug)]
pub enum GeocodeError {
    #[error("geocoding request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("geocoder answered with status {0}")]
    Status(u16),
    #[error("unreadable geocoder response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("geocoder stopped without an answer")]
    Abandoned,
}

/// Human-readable place resolved from coordinates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceName {
    pub city: Option<String>,
    pub country: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub coords: Coordinates,
    pub place: PlaceName,
}

impl Location {
    pub fn new(coords: Coordinates) -> Self {
        Location {
            coords,
            place: PlaceName::default(),
        }
    }

    /// `City, Country`, or just the city when the country is unknown.
    pub fn label(&self) -> Option<String> {
        let city = self.place.city.as_deref()?;
        Some(match self.place.country.as_deref() {
            Some(country) => format!("{}, {}", city, country),
            None => city.to_string(),
        })
    }
}

pub trait Geocoder {
    fn reverse(&self, coords: Coordinates) -> Result<PlaceName, GeocodeError>;
}

pub struct NominatimGeocoder {
    client: Client,
    endpoint: String,
}

impl NominatimGeocoder {
    pub fn new(endpoint: &str) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .user_agent(concat!("daybook/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(NominatimGeocoder {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

impl Geocoder for NominatimGeocoder {
    fn reverse(&self, coords: Coordinates) -> Result<PlaceName, GeocodeError> {
        let lat = coords.lat.to_string();
        let lon = coords.lng.to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("format", "json"),
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("zoom", "10"),
            ])
            .send()?;
        if !response.status().is_success() {
            return Err(GeocodeError::Status(response.status().as_u16()));
        }
        let body = response.text()?;
        Ok(parse_nominatim(&body)?)
    }
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    address: Option<NominatimAddress>,
    display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    suburb: Option<String>,
    county: Option<String>,
    country: Option<String>,
}

impl NominatimResponse {
    fn into_place(self) -> PlaceName {
        let Some(address) = self.address else {
            return PlaceName::default();
        };
        let city = address
            .city
            .or(address.town)
            .or(address.village)
            .or(address.suburb)
            .or(address.county);
        PlaceName {
            city,
            country: address.country,
            display_name: self.display_name,
        }
    }
}

pub fn parse_nominatim(body: &str) -> Result<PlaceName, serde_json::Error> {
    let response: NominatimResponse = serde_json::from_str(body)?;
    Ok(response.into_place())
}

pub fn cache_key(coords: Coordinates) -> String {
    format!("geocode:{:.4},{:.4}", coords.lat, coords.lng)
}

/// Builds the geocoder named by the settings, if geocoding is enabled.
pub fn geocoder_from(settings: &GeocodeSettings) -> Option<NominatimGeocoder> {
    if !settings.enabled {
        return None;
    }
    match NominatimGeocoder::new(&settings.endpoint) {
        Ok(geocoder) => Some(geocoder),
        Err(err) => {
            warn!("event=geocoder_unavailable error={}", err);
            None
        }
    }
}

fn ttl_ms(settings: &GeocodeSettings) -> i64 {
    (settings.cache_ttl_secs as i64).saturating_mul(1000)
}

/// The cached place for `coords`, if a fresh one exists.
pub fn cached_place(db: &mut JournalDb, coords: Coordinates, now_ms: i64) -> Option<PlaceName> {
    let key = cache_key(coords);
    match db.get_cache(&key, now_ms) {
        Ok(Some(value)) => match serde_json::from_value::<PlaceName>(value) {
            Ok(place) => {
                debug!("event=geocode_cache_hit key={}", key);
                Some(place)
            }
            Err(err) => {
                warn!("event=geocode_cache_corrupt key={} error={}", key, err);
                None
            }
        },
        Ok(None) => None,
        Err(err) => {
            warn!("event=geocode_cache_read_failed key={} error={}", key, err);
            None
        }
    }
}

pub fn store_place(
    db: &mut JournalDb,
    coords: Coordinates,
    place: &PlaceName,
    ttl_ms: i64,
    now_ms: i64,
) {
    let key = cache_key(coords);
    match serde_json::to_value(place) {
        Ok(value) => {
            if let Err(err) = db.set_cache(&key, value, Some(ttl_ms), now_ms) {
                warn!("event=geocode_cache_write_failed key={} error={}", key, err);
            }
        }
        Err(err) => warn!("event=geocode_cache_encode_failed error={}", err),
    }
}

/// Location from the cache alone; the place stays empty on a miss.
pub fn cached_location(db: &mut JournalDb, coords: Coordinates, now_ms: i64) -> Location {
    match cached_place(db, coords, now_ms) {
        Some(place) => Location { coords, place },
        None => Location::new(coords),
    }
}

/// A reverse-geocoding request running on its own thread.
pub struct PlaceLookup {
    coords: Coordinates,
    ttl_ms: i64,
    rx: Receiver<Result<PlaceName, GeocodeError>>,
}

impl PlaceLookup {
    pub fn spawn<G>(geocoder: G, coords: Coordinates, ttl_ms: i64) -> PlaceLookup
    where
        G: Geocoder + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            // The receiver may be gone if the app quit first.
            let _ = tx.send(geocoder.reverse(coords));
        });
        PlaceLookup { coords, ttl_ms, rx }
    }

    pub fn coords(&self) -> Coordinates {
        self.coords
    }

    /// Caches the answer once it has arrived. Returns `None` while the request
    /// is in flight, otherwise the resolved location (bare on failure).
    pub fn settle(&self, db: &mut JournalDb, now_ms: i64) -> Option<Location> {
        let result = match self.rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(GeocodeError::Abandoned),
        };
        Some(self.finish(db, result, now_ms))
    }

    /// Waits at most `wait` for the answer; past that the coordinates go out bare.
    pub fn settle_within(&self, db: &mut JournalDb, wait: Duration, now_ms: i64) -> Location {
        let result = match self.rx.recv_timeout(wait) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                debug!("event=geocode_pending key={}", cache_key(self.coords));
                return Location::new(self.coords);
            }
            Err(RecvTimeoutError::Disconnected) => Err(GeocodeError::Abandoned),
        };
        self.finish(db, result, now_ms)
    }

    fn finish(
        &self,
        db: &mut JournalDb,
        result: Result<PlaceName, GeocodeError>,
        now_ms: i64,
    ) -> Location {
        match result {
            Ok(place) => {
                store_place(db, self.coords, &place, self.ttl_ms, now_ms);
                Location {
                    coords: self.coords,
                    place,
                }
            }
            Err(err) => {
                warn!(
                    "event=geocode_failed key={} error={}",
                    cache_key(self.coords),
                    err
                );
                Location::new(self.coords)
            }
        }
    }
}

/// Starts a background lookup unless the cache already knows `coords` or
/// geocoding is disabled.
pub fn start_lookup(
    db: &mut JournalDb,
    settings: &GeocodeSettings,
    coords: Coordinates,
    now_ms: i64,
) -> Option<PlaceLookup> {
    if cached_place(db, coords, now_ms).is_some() {
        return None;
    }
    let geocoder = geocoder_from(settings)?;
    debug!("event=geocode_started key={}", cache_key(coords));
    Some(PlaceLookup::spawn(geocoder, coords, ttl_ms(settings)))
}

/// Cached place, or a fresh lookup given at most `wait` to answer.
pub fn lookup_within(
    db: &mut JournalDb,
    settings: &GeocodeSettings,
    coords: Coordinates,
    wait: Duration,
    now_ms: i64,
) -> Location {
    match start_lookup(db, settings, coords, now_ms) {
        Some(pending) => pending.settle_within(db, wait, now_ms),
        None => cached_location(db, coords, now_ms),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn here() -> Coordinates {
        Coordinates {
            lat: 18.7883,
            lng: 98.9853,
        }
    }

    #[test]
    fn city_falls_back_through_address_fields() {
        let place = parse_nominatim(
            r#"{"display_name":"Pai, Mae Hong Son","address":{"village":"Pai","county":"Pai District","country":"Thailand"}}"#,
        )
        .unwrap();
        assert_eq!(place.city.as_deref(), Some("Pai"));
        assert_eq!(place.country.as_deref(), Some("Thailand"));
        let empty = parse_nominatim(r#"{"error":"Unable to geocode"}"#).unwrap();
        assert_eq!(empty, PlaceName::default());
    }

    #[test]
    fn cached_places_expire() {
        let mut db = JournalDb::in_memory();
        let place = PlaceName {
            city: Some("Chiang Mai".to_string()),
            country: Some("Thailand".to_string()),
            display_name: None,
        };
        store_place(&mut db, here(), &place, 1_000, 0);
        assert_eq!(
            cached_location(&mut db, here(), 500).label().as_deref(),
            Some("Chiang Mai, Thailand")
        );
        assert_eq!(cached_place(&mut db, here(), 5_000), None);
    }

    #[test]
    fn disabled_geocoding_returns_bare_coordinates() {
        let mut db = JournalDb::in_memory();
        let settings = GeocodeSettings {
            enabled: false,
            ..GeocodeSettings::default()
        };
        let location = lookup_within(&mut db, &settings, here(), Duration::from_millis(10), 0);
        assert_eq!(location, Location::new(here()));
    }

    /// Answers once the test opens the gate, from the lookup's own thread.
    struct GatedGeocoder {
        gate: Receiver<()>,
        fail: bool,
    }

    impl Geocoder for GatedGeocoder {
        fn reverse(&self, _coords: Coordinates) -> Result<PlaceName, GeocodeError> {
            let _ = self.gate.recv();
            if self.fail {
                return Err(GeocodeError::Status(503));
            }
            Ok(PlaceName {
                city: Some("Lampang".to_string()),
                country: Some("Thailand".to_string()),
                display_name: None,
            })
        }
    }

    fn wait_for(lookup: &PlaceLookup, db: &mut JournalDb) -> Location {
        for _ in 0..500 {
            if let Some(location) = lookup.settle(db, 0) {
                return location;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("lookup never settled");
    }

    #[test]
    fn background_lookup_fills_the_cache_without_blocking() {
        let mut db = JournalDb::in_memory();
        let (open, gate) = mpsc::channel();
        let lookup = PlaceLookup::spawn(GatedGeocoder { gate, fail: false }, here(), 60_000);

        assert!(lookup.settle(&mut db, 0).is_none());
        assert_eq!(cached_location(&mut db, here(), 0), Location::new(here()));

        open.send(()).unwrap();
        let location = wait_for(&lookup, &mut db);
        assert_eq!(location.label().as_deref(), Some("Lampang, Thailand"));
        assert_eq!(
            cached_location(&mut db, here(), 1).label().as_deref(),
            Some("Lampang, Thailand")
        );
        assert_eq!(lookup.coords(), here());
    }

    #[test]
    fn slow_lookup_gives_up_after_the_wait() {
        let mut db = JournalDb::in_memory();
        let (open, gate) = mpsc::channel();
        let lookup = PlaceLookup::spawn(GatedGeocoder { gate, fail: false }, here(), 60_000);
        let location = lookup.settle_within(&mut db, Duration::from_millis(20), 0);
        assert_eq!(location, Location::new(here()));
        open.send(()).unwrap();
        assert!(wait_for(&lookup, &mut db).label().is_some());
    }

    #[test]
    fn failed_background_lookup_caches_nothing() {
        let mut db = JournalDb::in_memory();
        let (open, gate) = mpsc::channel();
        let lookup = PlaceLookup::spawn(GatedGeocoder { gate, fail: true }, here(), 60_000);
        open.send(()).unwrap();
        assert_eq!(wait_for(&lookup, &mut db), Location::new(here()));
        assert_eq!(db.stats().cache, 0);
    }

    #[test]
    fn no_lookup_starts_when_cached_or_disabled() {
        let mut db = JournalDb::in_memory();
        let disabled = GeocodeSettings {
            enabled: false,
            ..GeocodeSettings::default()
        };
        assert!(start_lookup(&mut db, &disabled, here(), 0).is_none());

        let place = PlaceName {
            city: Some("Nan".to_string()),
            ..PlaceName::default()
        };
        store_place(&mut db, here(), &place, 60_000, 0);
        assert!(start_lookup(&mut db, &GeocodeSettings::default(), here(), 10).is_none());
    }

    #[test]
    fn cache_key_rounds_coordinates() {
        assert_eq!(cache_key(here()), "geocode:18.7883,98.9853");
    }
}
