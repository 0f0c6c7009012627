//! Geographic coordinates and great-circle distance.

use chrono::Utc;

use crate::clock::TimeStamp;
use crate::error::SupplyError;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// A point on the site map. Latitude and longitude always travel together;
/// `last_updated` records when the fix was taken.
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct Coordinate {
    #[n(0)]
    pub latitude: f64,
    #[n(1)]
    pub longitude: f64,
    #[n(2)]
    pub last_updated: TimeStamp<Utc>,
}

impl Coordinate {
    pub fn new(
        latitude: f64,
        longitude: f64,
        last_updated: TimeStamp<Utc>,
    ) -> Result<Self, SupplyError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(SupplyError::Validation(format!(
                "latitude {latitude} outside [-90, 90]"
            )));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(SupplyError::Validation(format!(
                "longitude {longitude} outside [-180, 180]"
            )));
        }

        Ok(Self {
            latitude,
            longitude,
            last_updated,
        })
    }

    /// Haversine great-circle distance to `other`, in meters.
    pub fn distance_meters(&self, other: &Coordinate) -> f64 {
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin() * (d_lat / 2.0).sin()
            + self.latitude.to_radians().cos()
                * other.latitude.to_radians().cos()
                * (d_lon / 2.0).sin()
                * (d_lon / 2.0).sin();

        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_KM * c * 1000.0
    }
}
