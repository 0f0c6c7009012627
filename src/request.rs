//! Material-supply requests: the aggregate the lifecycle engine revolves
//! around, its items, and the append-only history trail.

use std::collections::HashMap;

use chrono::Utc;

use crate::clock::TimeStamp;
use crate::geo::Coordinate;
use crate::material::Material;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, minicbor::Encode, minicbor::Decode)]
pub enum RequestStatus {
    /// Waiting for a reviewer to pick it up.
    #[n(0)]
    Pending,
    /// A reviewer is working on it.
    #[n(1)]
    InAnalysis,
    /// Depot and vehicle booked.
    #[n(2)]
    Approved,
    /// Vehicle on its way to the depot.
    #[n(3)]
    InTransit,
    /// Loading at the depot.
    #[n(4)]
    CollectingMaterial,
    /// On its way to the request location.
    #[n(5)]
    InDelivery,
    #[n(6)]
    Delivered,
    #[n(7)]
    Cancelled,
    #[n(8)]
    Rejected,
}

/// Fixed origin point a request is raised from.
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct RequestLocation {
    #[n(0)]
    pub id: u64,
    #[n(1)]
    pub site_id: u64,
    #[n(2)]
    pub label: String,
    #[n(3)]
    pub coordinate: Coordinate,
    #[n(4)]
    pub active: bool,
}

impl RequestLocation {
    pub fn new(
        id: u64,
        site_id: u64,
        label: impl Into<String>,
        coordinate: Coordinate,
    ) -> Self {
        Self {
            id,
            site_id,
            label: label.into(),
            coordinate,
            active: true,
        }
    }
}

/// One line of a request. Created once at request creation; the fulfillment
/// fields belong to delivery-completion operations, which no core operation
/// currently writes (stock consumption is out of scope).
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct RequestItem {
    #[n(0)]
    pub material_id: u64,
    #[n(1)]
    pub quantity: f64,
    #[n(2)]
    pub note: Option<String>,
    #[n(3)]
    pub fulfilled: bool,
    #[n(4)]
    pub quantity_delivered: Option<f64>,
}

impl RequestItem {
    pub fn new(material_id: u64, quantity: f64) -> Self {
        Self {
            material_id,
            quantity,
            note: None,
            fulfilled: false,
            quantity_delivered: None,
        }
    }
}

/// One audit record per status transition. Immutable once written;
/// `status_from` is `None` only for the creation entry.
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct HistoryEntry {
    #[n(0)]
    pub status_from: Option<RequestStatus>,
    #[n(1)]
    pub status_to: RequestStatus,
    #[n(2)]
    pub changed_at: TimeStamp<Utc>,
    #[n(3)]
    pub actor_id: Option<u64>,
    #[n(4)]
    pub actor_name: Option<String>,
    #[n(5)]
    pub note: Option<String>,
    #[n(6)]
    pub position: Option<Coordinate>,
}

#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct Request {
    #[n(0)]
    pub id: u64,
    /// `REQ-<year>-<4-digit-seq>`, assigned at creation, never changes.
    #[n(1)]
    pub human_number: String,
    #[n(2)]
    pub status: RequestStatus,
    /// 1 = urgent, 5 = low.
    #[n(3)]
    pub priority: u8,
    #[n(4)]
    pub site_id: u64,
    #[n(5)]
    pub location_id: u64,
    #[n(6)]
    pub requested_by: u64,
    #[n(7)]
    pub reviewed_by: Option<u64>,
    #[n(8)]
    pub depot_id: Option<u64>,
    #[n(9)]
    pub vehicle_id: Option<u64>,
    #[n(10)]
    pub needed_by: TimeStamp<Utc>,
    #[n(11)]
    pub justification: Option<String>,
    #[n(12)]
    pub review_note: Option<String>,
    #[n(13)]
    pub rejection_reason: Option<String>,
    #[n(14)]
    pub created_at: TimeStamp<Utc>,
    #[n(15)]
    pub approved_at: Option<TimeStamp<Utc>>,
    #[n(16)]
    pub completed_at: Option<TimeStamp<Utc>>,
    #[n(17)]
    pub items: Vec<RequestItem>,
    #[n(18)]
    pub history: Vec<HistoryEntry>,
}

impl Request {
    pub fn human_number_for(year: i32, seq: u64) -> String {
        format!("REQ-{year}-{seq:04}")
    }

    /// Estimated load weight: quantity times unit weight, summed over items.
    /// Materials without a known unit weight count as zero, as do materials
    /// missing from `materials`.
    pub fn total_weight_kg(&self, materials: &HashMap<u64, Material>) -> f64 {
        self.items
            .iter()
            .map(|item| {
                let unit = materials
                    .get(&item.material_id)
                    .and_then(|m| m.unit_weight_kg)
                    .unwrap_or(0.0);
                unit * item.quantity
            })
            .sum()
    }

    pub fn total_volume_m3(&self, materials: &HashMap<u64, Material>) -> f64 {
        self.items
            .iter()
            .map(|item| {
                let unit = materials
                    .get(&item.material_id)
                    .and_then(|m| m.unit_volume_m3)
                    .unwrap_or(0.0);
                unit * item.quantity
            })
            .sum()
    }

    /// Appends a history entry, clamping `changed_at` so the trail stays
    /// monotone per request even if the injected clock stepped backwards.
    /// Ties keep insertion order.
    pub fn push_history(&mut self, mut entry: HistoryEntry) {
        if let Some(last) = self.history.last()
            && entry.changed_at < last.changed_at
        {
            entry.changed_at = last.changed_at.clone();
        }
        self.history.push(entry);
    }

    /// The full trail ordered by `changed_at` ascending, insertion order on
    /// ties. With the append-side clamp this reconstructs the status path.
    pub fn history_sorted(&self) -> Vec<HistoryEntry> {
        let mut entries = self.history.clone();
        entries.sort_by(|a, b| a.changed_at.cmp(&b.changed_at));
        entries
    }
}
