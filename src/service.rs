//! Service layer: applies lifecycle transitions, binds depot and vehicle on
//! approval, and keeps the audit trail. All mutating operations run behind a
//! single writer lock so the read-modify-write of status, bookings, and
//! history is never interleaved (two concurrent approvals must not
//! double-book a vehicle). Ranking and history reads take no lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tracing::info;

use crate::clock::{Clock, TimeStamp};
use crate::depot::StockEntry;
use crate::error::SupplyError;
use crate::fleet::{Vehicle, VehicleKind, VehicleStatus};
use crate::geo::Coordinate;
use crate::lifecycle;
use crate::matching::{self, DepotRanking, VehicleRanking};
use crate::request::{HistoryEntry, Request, RequestItem, RequestStatus};
use crate::store::SupplyStore;
use crate::user::User;

/// Input for one request line.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub material_id: u64,
    pub quantity: f64,
    pub note: Option<String>,
}

/// Input for `create_request`.
#[derive(Debug, Clone)]
pub struct NewRequest {
    pub location_id: u64,
    pub requested_by: u64,
    pub needed_by: TimeStamp<Utc>,
    pub priority: u8,
    pub justification: Option<String>,
    pub items: Vec<NewItem>,
}

pub struct SupplyService {
    store: Arc<dyn SupplyStore>,
    clock: Arc<dyn Clock>,
    write_guard: Mutex<()>,
}

impl SupplyService {
    pub fn new(store: Arc<dyn SupplyStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            write_guard: Mutex::new(()),
        }
    }

    fn lock_writes(&self) -> std::sync::MutexGuard<'_, ()> {
        self.write_guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates a request in `Pending` with its creation history entry.
    /// The human number comes from the global sequence:
    /// `REQ-<year>-<4-digit-seq>`.
    pub fn create_request(&self, input: NewRequest) -> Result<Request, SupplyError> {
        if input.items.is_empty() {
            return Err(SupplyError::Validation("request has no items".into()));
        }
        if let Some(bad) = input.items.iter().find(|i| i.quantity <= 0.0) {
            return Err(SupplyError::Validation(format!(
                "quantity {} for material {} must be positive",
                bad.quantity, bad.material_id
            )));
        }
        if !(1..=5).contains(&input.priority) {
            return Err(SupplyError::Validation(format!(
                "priority {} outside 1..=5",
                input.priority
            )));
        }

        let _guard = self.lock_writes();

        let location = self
            .store
            .request_location(input.location_id)?
            .ok_or_else(|| SupplyError::not_found("request location", input.location_id))?;

        for item in &input.items {
            self.store
                .material(item.material_id)?
                .ok_or_else(|| SupplyError::not_found("material", item.material_id))?;
        }

        let requester = self.store.user(input.requested_by)?;
        let now = self.clock.now();
        let seq = self.store.next_request_seq()?;

        let mut request = Request {
            id: seq,
            human_number: Request::human_number_for(now.year(), seq),
            status: RequestStatus::Pending,
            priority: input.priority,
            site_id: location.site_id,
            location_id: location.id,
            requested_by: input.requested_by,
            reviewed_by: None,
            depot_id: None,
            vehicle_id: None,
            needed_by: input.needed_by,
            justification: input.justification,
            review_note: None,
            rejection_reason: None,
            created_at: now.clone(),
            approved_at: None,
            completed_at: None,
            items: input
                .items
                .into_iter()
                .map(|i| RequestItem {
                    material_id: i.material_id,
                    quantity: i.quantity,
                    note: i.note,
                    fulfilled: false,
                    quantity_delivered: None,
                })
                .collect(),
            history: Vec::new(),
        };

        request.push_history(HistoryEntry {
            status_from: None,
            status_to: RequestStatus::Pending,
            changed_at: now,
            actor_id: Some(input.requested_by),
            actor_name: requester.map(|u| u.name),
            note: Some("created".into()),
            position: None,
        });

        self.store.put_request(&request)?;

        info!(
            request_id = request.id,
            human_number = %request.human_number,
            "request created"
        );

        Ok(request)
    }

    /// Ranks candidate depots for a request: active depots on the request's
    /// site, ordered by stock sufficiency then distance from the request
    /// location.
    pub fn rank_depots_for(&self, request_id: u64) -> Result<Vec<DepotRanking>, SupplyError> {
        let request = self.load_request(request_id)?;
        let location = self
            .store
            .request_location(request.location_id)?
            .ok_or_else(|| SupplyError::not_found("request location", request.location_id))?;

        let mut depots = self.store.depots_for_site(request.site_id)?;
        depots.retain(|d| d.active);

        Ok(matching::rank_depots(
            &depots,
            &location.coordinate,
            &request.items,
        ))
    }

    /// Ranks candidate vehicles to haul the request's load from `depot_id`:
    /// active vehicles on the request's site, by proximity to the depot.
    pub fn rank_vehicles_for(
        &self,
        request_id: u64,
        depot_id: u64,
    ) -> Result<Vec<VehicleRanking>, SupplyError> {
        let request = self.load_request(request_id)?;
        let depot = self
            .store
            .depot(depot_id)?
            .ok_or_else(|| SupplyError::not_found("depot", depot_id))?;

        let required_kg = self.request_weight(&request)?;

        let mut vehicles = self.store.vehicles_for_site(request.site_id)?;
        vehicles.retain(|v| v.active);

        Ok(matching::rank_vehicles(
            &vehicles,
            &depot.coordinate,
            required_kg,
        ))
    }

    /// Approves a request: binds depot and vehicle, books the vehicle, and
    /// records the transition. Legal only from `Pending` or `InAnalysis`.
    /// Stock sufficiency is advisory here; ranking surfaces it but approval
    /// does not fail on a shortfall.
    pub fn approve_request(
        &self,
        request_id: u64,
        reviewer_id: u64,
        depot_id: u64,
        vehicle_id: u64,
        note: Option<String>,
    ) -> Result<(), SupplyError> {
        let _guard = self.lock_writes();

        let mut request = self.load_request(request_id)?;

        // Only Pending -> Approved and InAnalysis -> Approved are legal edges.
        lifecycle::check_transition(request.status, RequestStatus::Approved)?;

        let mut vehicle = match self.store.vehicle(vehicle_id)? {
            Some(v) if v.is_available() => v,
            _ => return Err(SupplyError::VehicleUnavailable(vehicle_id)),
        };

        let required_kg = self.request_weight(&request)?;
        if !vehicle.can_carry(required_kg) {
            return Err(SupplyError::CapacityExceeded {
                required_kg,
                capacity_kg: vehicle.capacity_weight_kg,
            });
        }

        let depot = self
            .store
            .depot(depot_id)?
            .ok_or_else(|| SupplyError::not_found("depot", depot_id))?;

        // All preconditions hold; apply and commit atomically.
        let now = self.clock.now();
        let previous = request.status;
        let reviewer = self.store.user(reviewer_id)?;

        request.status = RequestStatus::Approved;
        request.reviewed_by = Some(reviewer_id);
        request.depot_id = Some(depot_id);
        request.vehicle_id = Some(vehicle_id);
        request.approved_at = Some(now.clone());
        request.review_note = note.clone();

        vehicle.status = VehicleStatus::InUse;

        request.push_history(HistoryEntry {
            status_from: Some(previous),
            status_to: RequestStatus::Approved,
            changed_at: now,
            actor_id: Some(reviewer_id),
            actor_name: reviewer.map(|u| u.name),
            note: note.or_else(|| {
                Some(format!(
                    "vehicle {} assigned, picking up at {}",
                    vehicle.name, depot.name
                ))
            }),
            position: None,
        });

        self.store.put_request_and_vehicle(&request, &vehicle)?;

        info!(
            request_id,
            depot_id, vehicle_id, "request approved and vehicle booked"
        );

        Ok(())
    }

    /// Advances a request along the lifecycle. Delivery stamps
    /// `completed_at` and releases the booked vehicle. Exactly one history
    /// entry per successful call.
    pub fn transition_request(
        &self,
        request_id: u64,
        new_status: RequestStatus,
        actor_id: Option<u64>,
        note: Option<String>,
        position: Option<Coordinate>,
    ) -> Result<(), SupplyError> {
        let _guard = self.lock_writes();

        let mut request = self.load_request(request_id)?;
        lifecycle::check_transition(request.status, new_status)?;

        // The edge itself is legal, but entering Approved must also bind a
        // depot and a vehicle, which only approve_request does.
        if new_status == RequestStatus::Approved {
            return Err(SupplyError::Validation(
                "approval must go through approve_request to bind depot and vehicle".into(),
            ));
        }

        let now = self.clock.now();
        let previous = request.status;
        let actor = match actor_id {
            Some(id) => self.store.user(id)?,
            None => None,
        };

        request.status = new_status;
        if new_status == RequestStatus::Rejected {
            request.rejection_reason = note.clone();
        }

        request.push_history(HistoryEntry {
            status_from: Some(previous),
            status_to: new_status,
            changed_at: now.clone(),
            actor_id,
            actor_name: actor.map(|u| u.name),
            note,
            position,
        });

        if new_status == RequestStatus::Delivered {
            request.completed_at = Some(now);

            if let Some(vehicle_id) = request.vehicle_id
                && let Some(mut vehicle) = self.store.vehicle(vehicle_id)?
            {
                vehicle.status = VehicleStatus::Available;
                self.store.put_request_and_vehicle(&request, &vehicle)?;
                info!(request_id, vehicle_id, "request delivered, vehicle released");
                return Ok(());
            }
        }

        self.store.put_request(&request)?;

        info!(request_id, from = ?previous, to = ?new_status, "request transitioned");

        Ok(())
    }

    /// Audit trail for a request, oldest first.
    pub fn history(&self, request_id: u64) -> Result<Vec<HistoryEntry>, SupplyError> {
        Ok(self.load_request(request_id)?.history_sorted())
    }

    /// Pending requests for a site, most urgent first (priority ascending,
    /// then needed-by date).
    pub fn pending_requests(&self, site_id: u64) -> Result<Vec<Request>, SupplyError> {
        let mut requests = self.store.pending_requests_for_site(site_id)?;
        requests.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.needed_by.cmp(&b.needed_by))
        });
        Ok(requests)
    }

    /// GPS ping from a vehicle's tablet.
    pub fn update_vehicle_position(
        &self,
        vehicle_id: u64,
        latitude: f64,
        longitude: f64,
        speed_kmh: Option<f64>,
    ) -> Result<(), SupplyError> {
        let _guard = self.lock_writes();

        let mut vehicle = self.load_vehicle(vehicle_id)?;
        vehicle.update_position(latitude, longitude, speed_kmh, self.clock.now())?;
        self.store.put_vehicle(&vehicle)?;
        Ok(())
    }

    /// Explicit status change, e.g. sending a vehicle to maintenance.
    /// Lifecycle bookings go through approve/transition instead.
    pub fn set_vehicle_status(
        &self,
        vehicle_id: u64,
        status: VehicleStatus,
    ) -> Result<(), SupplyError> {
        let _guard = self.lock_writes();

        let mut vehicle = self.load_vehicle(vehicle_id)?;
        vehicle.status = status;
        self.store.put_vehicle(&vehicle)?;

        info!(vehicle_id, status = ?status, "vehicle status changed");

        Ok(())
    }

    /// Puts an operator behind the wheel. An operator drives at most one
    /// vehicle, so any previous assignment on the same site is cleared.
    pub fn assign_operator(&self, vehicle_id: u64, operator_id: u64) -> Result<(), SupplyError> {
        let _guard = self.lock_writes();

        let mut vehicle = self.load_vehicle(vehicle_id)?;
        let operator: User = self
            .store
            .user(operator_id)?
            .ok_or_else(|| SupplyError::not_found("user", operator_id))?;

        if !operator.is_operator() {
            return Err(SupplyError::Validation(format!(
                "user {operator_id} does not have the operator role"
            )));
        }

        for mut other in self.store.vehicles_for_site(vehicle.site_id)? {
            if other.id != vehicle.id && other.operator_id == Some(operator_id) {
                other.operator_id = None;
                self.store.put_vehicle(&other)?;
            }
        }

        vehicle.operator_id = Some(operator_id);
        self.store.put_vehicle(&vehicle)?;
        Ok(())
    }

    /// How many vehicles of each kind are free on a site right now.
    pub fn availability_by_kind(
        &self,
        site_id: u64,
    ) -> Result<HashMap<VehicleKind, usize>, SupplyError> {
        let mut counts = HashMap::new();
        for vehicle in self.store.vehicles_for_site(site_id)? {
            if vehicle.is_available() {
                *counts.entry(vehicle.kind).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    /// Ledger entries under their safety minimum at one depot.
    pub fn stock_below_minimum(
        &self,
        depot_id: u64,
    ) -> Result<Vec<StockEntry>, SupplyError> {
        let depot = self
            .store
            .depot(depot_id)?
            .ok_or_else(|| SupplyError::not_found("depot", depot_id))?;

        Ok(depot.below_minimum().into_iter().cloned().collect())
    }

    fn load_request(&self, id: u64) -> Result<Request, SupplyError> {
        self.store
            .request(id)?
            .ok_or_else(|| SupplyError::not_found("request", id))
    }

    fn load_vehicle(&self, id: u64) -> Result<Vehicle, SupplyError> {
        self.store
            .vehicle(id)?
            .ok_or_else(|| SupplyError::not_found("vehicle", id))
    }

    fn request_weight(&self, request: &Request) -> Result<f64, SupplyError> {
        let mut materials = HashMap::new();
        for item in &request.items {
            if let Some(material) = self.store.material(item.material_id)? {
                materials.insert(material.id, material);
            }
        }
        Ok(request.total_weight_kg(&materials))
    }
}
