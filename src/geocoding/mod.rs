//! # Geocoding
//!
//! Single address lookups against a remote geocoding service. Every failure
//! is folded into a [`GeocodeResult`]; a lookup never returns an error.
pub mod baidu;

pub use baidu::BaiduGeocoder;

/// Longitude/latitude pair, both finite.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Coordinates {
    longitude: f64,
    latitude: f64,
}

impl Coordinates {
    /// Returns `None` unless both values are finite.
    pub fn new(longitude: f64, latitude: f64) -> Option<Coordinates> {
        if longitude.is_finite() && latitude.is_finite() {
            Some(Coordinates { longitude, latitude })
        } else {
            None
        }
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GeocodeStatus {
    Success,
    Skipped,
    ApiError,
    TransportError,
    EmptyAddress,
}

/// Outcome of one row. Only [`GeocodeResult::Success`] carries coordinates.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum GeocodeResult {
    Success(Coordinates),
    /// Address masked for privacy, never sent to the service
    Skipped,
    /// The service answered with a non-success status
    ApiError,
    /// Connection failure, timeout or an unreadable response
    TransportError,
    EmptyAddress,
}

impl GeocodeResult {
    pub fn status(&self) -> GeocodeStatus {
        match self {
            GeocodeResult::Success(_) => GeocodeStatus::Success,
            GeocodeResult::Skipped => GeocodeStatus::Skipped,
            GeocodeResult::ApiError => GeocodeStatus::ApiError,
            GeocodeResult::TransportError => GeocodeStatus::TransportError,
            GeocodeResult::EmptyAddress => GeocodeStatus::EmptyAddress,
        }
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        match self {
            GeocodeResult::Success(coordinates) => Some(*coordinates),
            _ => None,
        }
    }

    pub fn longitude(&self) -> Option<f64> {
        self.coordinates().map(|it| it.longitude())
    }

    pub fn latitude(&self) -> Option<f64> {
        self.coordinates().map(|it| it.latitude())
    }
}

/// Resolves one address to coordinates.
///
/// `address` is already trimmed and non-empty. Implementations return
/// [`GeocodeResult::Success`], [`GeocodeResult::ApiError`] or
/// [`GeocodeResult::TransportError`].
pub trait GeocodeClient {
    fn lookup(&self, address: &str) -> GeocodeResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_must_be_finite() {
        assert!(Coordinates::new(116.404, 39.915).is_some());
        assert!(Coordinates::new(f64::NAN, 39.915).is_none());
        assert!(Coordinates::new(116.404, f64::INFINITY).is_none());
    }

    #[test]
    fn only_success_carries_coordinates() {
        let success = GeocodeResult::Success(Coordinates::new(-122.084, 37.422).unwrap());
        assert_eq!(success.status(), GeocodeStatus::Success);
        assert_eq!(success.longitude(), Some(-122.084));
        assert_eq!(success.latitude(), Some(37.422));

        for failure in [
            GeocodeResult::Skipped,
            GeocodeResult::ApiError,
            GeocodeResult::TransportError,
            GeocodeResult::EmptyAddress,
        ] {
            assert_eq!(failure.coordinates(), None);
            assert_eq!(failure.longitude(), None);
            assert_eq!(failure.latitude(), None);
        }
        assert_eq!(GeocodeResult::ApiError.status(), GeocodeStatus::ApiError);
    }
}
