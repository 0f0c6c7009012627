//! Depot and vehicle ranking. Pure functions over caller-supplied candidate
//! sets; filtering candidates (active, right site) happens upstream.

use crate::depot::Depot;
use crate::fleet::{Vehicle, VehicleKind};
use crate::geo::Coordinate;
use crate::request::RequestItem;

/// Assumed average travel speed for the arrival estimate. A deliberate
/// simplification, not a routing engine.
const AVERAGE_SPEED_KMH: f64 = 30.0;

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialAvailability {
    pub material_id: u64,
    pub quantity_requested: f64,
    pub quantity_available: f64,
    pub sufficient: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DepotRanking {
    pub depot_id: u64,
    pub depot_name: String,
    pub coordinate: Coordinate,
    pub distance_meters: f64,
    pub has_all_materials: bool,
    pub materials: Vec<MaterialAvailability>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VehicleRanking {
    pub vehicle_id: u64,
    pub vehicle_name: String,
    pub kind: VehicleKind,
    pub capacity_weight_kg: f64,
    pub distance_meters: f64,
    pub estimated_minutes: f64,
    pub operator_id: Option<u64>,
}

/// Ranks depots for a request raised at `origin`: depots holding every
/// requested material first, then nearest first, depot id as the final
/// tie-break so the ordering is deterministic.
pub fn rank_depots(
    candidates: &[Depot],
    origin: &Coordinate,
    items: &[RequestItem],
) -> Vec<DepotRanking> {
    let mut ranked: Vec<DepotRanking> = candidates
        .iter()
        .map(|depot| {
            let distance_meters = origin.distance_meters(&depot.coordinate);
            let mut has_all_materials = true;

            let materials = items
                .iter()
                .map(|item| {
                    let entry = depot.stock_entry(item.material_id);
                    let quantity_available = entry.map_or(0.0, |e| e.quantity_available);
                    let sufficient = entry.is_some_and(|e| e.sufficient_for(item.quantity));
                    if !sufficient {
                        has_all_materials = false;
                    }

                    MaterialAvailability {
                        material_id: item.material_id,
                        quantity_requested: item.quantity,
                        quantity_available,
                        sufficient,
                    }
                })
                .collect();

            DepotRanking {
                depot_id: depot.id,
                depot_name: depot.name.clone(),
                coordinate: depot.coordinate.clone(),
                distance_meters,
                has_all_materials,
                materials,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.has_all_materials
            .cmp(&a.has_all_materials)
            .then(a.distance_meters.total_cmp(&b.distance_meters))
            .then(a.depot_id.cmp(&b.depot_id))
    });

    ranked
}

/// Ranks vehicles able to haul `required_weight_kg` from `from`, nearest
/// first, vehicle id as tie-break. Vehicles that are not available, lack the
/// capacity, or have no position fix are excluded rather than erroring.
pub fn rank_vehicles(
    candidates: &[Vehicle],
    from: &Coordinate,
    required_weight_kg: f64,
) -> Vec<VehicleRanking> {
    let mut ranked: Vec<VehicleRanking> = candidates
        .iter()
        .filter(|v| v.is_available() && v.can_carry(required_weight_kg))
        .filter_map(|v| {
            let distance_meters = v.distance_to(from)?;
            let estimated_minutes = (distance_meters / 1000.0) / AVERAGE_SPEED_KMH * 60.0;

            Some(VehicleRanking {
                vehicle_id: v.id,
                vehicle_name: v.name.clone(),
                kind: v.kind,
                capacity_weight_kg: v.capacity_weight_kg,
                distance_meters,
                estimated_minutes,
                operator_id: v.operator_id,
            })
        })
        .collect();

    ranked.sort_by(|a, b| {
        a.distance_meters
            .total_cmp(&b.distance_meters)
            .then(a.vehicle_id.cmp(&b.vehicle_id))
    });

    ranked
}
