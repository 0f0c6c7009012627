//! Vehicles and equipment used to move materials around the site.

use chrono::Utc;

use crate::clock::TimeStamp;
use crate::error::SupplyError;
use crate::geo::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum VehicleStatus {
    #[n(0)]
    Available,
    #[n(1)]
    InUse,
    #[n(2)]
    InMaintenance,
    #[n(3)]
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, minicbor::Encode, minicbor::Decode)]
pub enum VehicleKind {
    #[n(0)]
    Wheelbarrow,
    #[n(1)]
    Cart,
    #[n(2)]
    MiniTractor,
    #[n(3)]
    PickupTruck,
    #[n(4)]
    Truck,
    #[n(5)]
    Forklift,
    #[n(99)]
    Other,
}

/// A transport unit. Status is mutated only by the lifecycle service
/// (approval books it, delivery releases it) and by explicit status-change
/// operations such as sending it to maintenance.
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct Vehicle {
    #[n(0)]
    pub id: u64,
    #[n(1)]
    pub site_id: u64,
    #[n(2)]
    pub name: String,
    #[n(3)]
    pub kind: VehicleKind,
    #[n(4)]
    pub status: VehicleStatus,
    #[n(5)]
    pub capacity_weight_kg: f64,
    #[n(6)]
    pub capacity_volume_m3: Option<f64>,
    #[n(7)]
    pub position: Option<Coordinate>,
    #[n(8)]
    pub speed_kmh: Option<f64>,
    #[n(9)]
    pub operator_id: Option<u64>,
    #[n(10)]
    pub active: bool,
}

impl Vehicle {
    pub fn new(
        id: u64,
        site_id: u64,
        name: impl Into<String>,
        kind: VehicleKind,
        capacity_weight_kg: f64,
    ) -> Self {
        Self {
            id,
            site_id,
            name: name.into(),
            kind,
            status: VehicleStatus::Available,
            capacity_weight_kg,
            capacity_volume_m3: None,
            position: None,
            speed_kmh: None,
            operator_id: None,
            active: true,
        }
    }

    pub fn with_position(mut self, position: Coordinate) -> Self {
        self.position = Some(position);
        self
    }

    pub fn is_available(&self) -> bool {
        self.status == VehicleStatus::Available && self.active
    }

    pub fn can_carry(&self, weight_kg: f64) -> bool {
        weight_kg <= self.capacity_weight_kg
    }

    /// GPS fix from the cab tablet. Refreshes the position timestamp from the
    /// caller-supplied clock reading.
    pub fn update_position(
        &mut self,
        latitude: f64,
        longitude: f64,
        speed_kmh: Option<f64>,
        now: TimeStamp<Utc>,
    ) -> Result<(), SupplyError> {
        self.position = Some(Coordinate::new(latitude, longitude, now)?);
        self.speed_kmh = speed_kmh;
        Ok(())
    }

    /// Distance to `target` in meters, undefined while the vehicle has no fix.
    pub fn distance_to(&self, target: &Coordinate) -> Option<f64> {
        self.position.as_ref().map(|p| p.distance_meters(target))
    }
}
