use anyhow::Result;
use async_trait::async_trait;
use placefinder_core::Coordinates;

/// Resolves free-text locations into coordinates.
///
/// An empty list means the location could not be found. Errors are reserved
/// for failures of the geocoding service itself.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, location_text: &str) -> Result<Vec<Coordinates>>;

    /// Short description of the only input format this geocoder resolves,
    /// for geocoders that cannot handle free text.
    fn expected_input(&self) -> Option<&'static str> {
        None
    }
}

/// Accepts only a literal `"lat,lng"` pair.
///
/// Anything that does not parse as two in-range decimal degrees resolves to
/// no candidates.
#[derive(Debug, Default, Clone, Copy)]
pub struct CoordinateGeocoder;

impl CoordinateGeocoder {
    pub const EXPECTED_INPUT: &'static str = "\"lat,lng\" such as \"30.2672,-97.7431\"";

    fn parse(location_text: &str) -> Option<Coordinates> {
        let (lat, lng) = location_text.split_once(',')?;
        let latitude: f64 = lat.trim().parse().ok()?;
        let longitude: f64 = lng.trim().parse().ok()?;
        let in_range = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        in_range.then_some(Coordinates {
            latitude,
            longitude,
        })
    }
}

#[async_trait]
impl Geocoder for CoordinateGeocoder {
    async fn geocode(&self, location_text: &str) -> Result<Vec<Coordinates>> {
        Ok(Self::parse(location_text).into_iter().collect())
    }

    fn expected_input(&self) -> Option<&'static str> {
        Some(Self::EXPECTED_INPUT)
    }
}
