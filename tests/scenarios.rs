//! End-to-end scenarios driving the supply service against a sled-backed
//! store with a manually advanced clock.

use std::sync::Arc;

use anyhow::Context;
use tempfile::tempdir;

use site_supply::clock::{Clock, ManualClock, TimeStamp};
use site_supply::depot::{Depot, StockEntry};
use site_supply::error::SupplyError;
use site_supply::fleet::{Vehicle, VehicleKind, VehicleStatus};
use site_supply::geo::Coordinate;
use site_supply::material::{Material, UnitOfMeasure};
use site_supply::request::{RequestLocation, RequestStatus};
use site_supply::service::{NewItem, NewRequest, SupplyService};
use site_supply::store::{SledStore, SupplyStore};
use site_supply::user::{Role, User};

const SITE: u64 = 1;

struct Harness {
    // Keeps the sled files alive for the duration of the test.
    _dir: tempfile::TempDir,
    store: Arc<SledStore>,
    clock: Arc<ManualClock>,
    service: SupplyService,
}

/// Fresh per-test database (sled holds a file lock, so tests never share
/// one), seeded with a small site: two depots, two vehicles, three
/// materials, one request location, and the people involved.
fn harness(name: &str) -> anyhow::Result<Harness> {
    let dir = tempdir()?;
    let db = sled::open(dir.path().join(name))?;
    let store = Arc::new(SledStore::new(Arc::new(db)));
    let clock = Arc::new(ManualClock::starting_at(TimeStamp::new_with(
        2026, 3, 10, 8, 0, 0,
    )));
    let service = SupplyService::new(store.clone(), clock.clone());

    let ts = || TimeStamp::new_with(2026, 3, 10, 7, 0, 0);
    let coord = |lat: f64, lon: f64| Coordinate::new(lat, lon, ts()).unwrap();

    store.put_material(&Material::new(10, "Cement", UnitOfMeasure::Bag).with_unit_weight(50.0))?;
    store.put_material(
        &Material::new(11, "Sand", UnitOfMeasure::CubicMeter).with_unit_weight(1500.0),
    )?;
    store.put_material(&Material::new(12, "Rope", UnitOfMeasure::Meter))?;

    // Depot 1 is fully stocked but ~2 km east; depot 2 is close but short
    // on cement.
    store.put_depot(
        &Depot::new(1, SITE, "Central depot", coord(0.0, 0.018))
            .with_stock(StockEntry::new(10, 400.0).with_min(50.0))
            .with_stock(StockEntry::new(11, 30.0)),
    )?;
    store.put_depot(
        &Depot::new(2, SITE, "North tent", coord(0.0, 0.004))
            .with_stock(StockEntry::new(10, 3.0).with_min(20.0)),
    )?;

    store.put_vehicle(
        &Vehicle::new(1, SITE, "Truck 01", VehicleKind::Truck, 9000.0)
            .with_position(coord(0.0, 0.020)),
    )?;
    store.put_vehicle(
        &Vehicle::new(2, SITE, "Wheelbarrow A", VehicleKind::Wheelbarrow, 80.0)
            .with_position(coord(0.0, 0.017)),
    )?;

    store.put_request_location(&RequestLocation::new(1, SITE, "Lot 14", coord(0.0, 0.0)))?;

    store.put_user(&User::new(
        100,
        SITE,
        "Ana",
        Role::Reviewer {
            badge: "B-17".into(),
        },
    ))?;
    store.put_user(&User::new(101, SITE, "Bruno", Role::Requester))?;
    store.put_user(&User::new(
        102,
        SITE,
        "Carla",
        Role::Operator {
            license: "D-4821".into(),
        },
    ))?;

    Ok(Harness {
        _dir: dir,
        store,
        clock,
        service,
    })
}

fn cement_request(bags: f64) -> NewRequest {
    NewRequest {
        location_id: 1,
        requested_by: 101,
        needed_by: TimeStamp::new_with(2026, 3, 12, 0, 0, 0),
        priority: 2,
        justification: Some("slab pour".into()),
        items: vec![NewItem {
            material_id: 10,
            quantity: bags,
            note: None,
        }],
    }
}

#[test]
fn request_travels_the_full_lifecycle() -> anyhow::Result<()> {
    let h = harness("full_lifecycle.db")?;

    let request = h
        .service
        .create_request(cement_request(40.0))
        .context("create failed")?;

    assert_eq!(request.status, RequestStatus::Pending);
    assert_eq!(request.human_number, "REQ-2026-0001");
    assert!(request.depot_id.is_none() && request.vehicle_id.is_none());

    // Central depot has the cement even though the tent is closer.
    let depots = h.service.rank_depots_for(request.id)?;
    assert_eq!(depots[0].depot_id, 1);
    assert!(depots[0].has_all_materials);
    assert!(!depots[1].has_all_materials);

    // 40 bags x 50 kg = 2000 kg: only the truck qualifies.
    let vehicles = h.service.rank_vehicles_for(request.id, 1)?;
    assert_eq!(vehicles.len(), 1);
    assert_eq!(vehicles[0].vehicle_id, 1);

    h.clock.advance(chrono::Duration::minutes(10));
    h.service
        .approve_request(request.id, 100, 1, 1, Some("go ahead".into()))?;

    let approved = h.store.request(request.id)?.unwrap();
    assert_eq!(approved.status, RequestStatus::Approved);
    assert_eq!(approved.depot_id, Some(1));
    assert_eq!(approved.vehicle_id, Some(1));
    assert!(approved.approved_at.is_some());
    assert_eq!(
        h.store.vehicle(1)?.unwrap().status,
        VehicleStatus::InUse
    );

    for status in [
        RequestStatus::InTransit,
        RequestStatus::CollectingMaterial,
        RequestStatus::InDelivery,
        RequestStatus::Delivered,
    ] {
        h.clock.advance(chrono::Duration::minutes(15));
        h.service
            .transition_request(request.id, status, Some(102), None, None)?;
    }

    let delivered = h.store.request(request.id)?.unwrap();
    assert_eq!(delivered.status, RequestStatus::Delivered);
    assert!(delivered.completed_at.is_some());
    assert_eq!(
        h.store.vehicle(1)?.unwrap().status,
        VehicleStatus::Available
    );

    // The trail reconstructs the full path, each entry chained to the last.
    let trail = h.service.history(request.id)?;
    let statuses: Vec<RequestStatus> = trail.iter().map(|e| e.status_to).collect();
    assert_eq!(
        statuses,
        vec![
            RequestStatus::Pending,
            RequestStatus::Approved,
            RequestStatus::InTransit,
            RequestStatus::CollectingMaterial,
            RequestStatus::InDelivery,
            RequestStatus::Delivered,
        ]
    );
    assert_eq!(trail[0].status_from, None);
    for pair in trail.windows(2) {
        assert_eq!(pair[1].status_from, Some(pair[0].status_to));
        assert!(pair[0].changed_at <= pair[1].changed_at);
    }
    assert_eq!(trail[1].actor_name.as_deref(), Some("Ana"));

    Ok(())
}

#[test]
fn delivery_straight_after_approval_releases_the_vehicle() -> anyhow::Result<()> {
    let h = harness("approve_then_deliver.db")?;
    let request = h.service.create_request(cement_request(10.0))?;

    h.service.approve_request(request.id, 100, 1, 1, None)?;

    // Small jobs skip the intermediate stages; delivery still stamps
    // completion and frees the truck.
    h.clock.advance(chrono::Duration::minutes(45));
    h.service
        .transition_request(request.id, RequestStatus::Delivered, Some(102), None, None)?;

    let delivered = h.store.request(request.id)?.unwrap();
    assert_eq!(delivered.status, RequestStatus::Delivered);
    assert!(delivered.completed_at.is_some());
    assert_eq!(
        h.store.vehicle(1)?.unwrap().status,
        VehicleStatus::Available
    );

    let trail = h.service.history(request.id)?;
    assert_eq!(trail.len(), 3);
    assert_eq!(trail[2].status_from, Some(RequestStatus::Approved));
    assert_eq!(trail[2].status_to, RequestStatus::Delivered);

    Ok(())
}

#[test]
fn approval_preconditions_each_fail_distinctly() -> anyhow::Result<()> {
    let h = harness("approval_preconditions.db")?;
    let request = h.service.create_request(cement_request(40.0))?;

    // Vehicle in maintenance.
    h.service.set_vehicle_status(1, VehicleStatus::InMaintenance)?;
    let err = h
        .service
        .approve_request(request.id, 100, 1, 1, None)
        .unwrap_err();
    assert!(matches!(err, SupplyError::VehicleUnavailable(1)), "{err}");
    h.service.set_vehicle_status(1, VehicleStatus::Available)?;

    // Unknown vehicle reads as unavailable too.
    let err = h
        .service
        .approve_request(request.id, 100, 1, 99, None)
        .unwrap_err();
    assert!(matches!(err, SupplyError::VehicleUnavailable(99)), "{err}");

    // 2000 kg on an 80 kg wheelbarrow.
    let err = h
        .service
        .approve_request(request.id, 100, 1, 2, None)
        .unwrap_err();
    assert!(matches!(err, SupplyError::CapacityExceeded { .. }), "{err}");

    // Unknown depot.
    let err = h
        .service
        .approve_request(request.id, 100, 42, 1, None)
        .unwrap_err();
    assert!(
        matches!(err, SupplyError::NotFound { entity: "depot", id: 42 }),
        "{err}"
    );

    // Nothing was mutated by the failed attempts.
    let unchanged = h.store.request(request.id)?.unwrap();
    assert_eq!(unchanged.status, RequestStatus::Pending);
    assert!(unchanged.depot_id.is_none());
    assert_eq!(unchanged.history.len(), 1);

    // Approval is not reachable through the generic transition.
    let err = h
        .service
        .transition_request(request.id, RequestStatus::Approved, None, None, None)
        .unwrap_err();
    assert!(matches!(err, SupplyError::Validation(_)), "{err}");

    Ok(())
}

#[test]
fn terminal_states_reject_further_transitions() -> anyhow::Result<()> {
    let h = harness("terminal_states.db")?;
    let request = h.service.create_request(cement_request(1.0))?;

    h.service.transition_request(
        request.id,
        RequestStatus::Cancelled,
        Some(101),
        Some("rain".into()),
        None,
    )?;

    for status in [
        RequestStatus::Pending,
        RequestStatus::InAnalysis,
        RequestStatus::Approved,
        RequestStatus::InTransit,
        RequestStatus::Delivered,
        RequestStatus::Cancelled,
        RequestStatus::Rejected,
    ] {
        let err = h
            .service
            .transition_request(request.id, status, None, None, None)
            .unwrap_err();
        assert!(matches!(err, SupplyError::InvalidTransition { .. }), "{err}");
    }

    let err = h
        .service
        .approve_request(request.id, 100, 1, 1, None)
        .unwrap_err();
    assert!(matches!(err, SupplyError::InvalidTransition { .. }), "{err}");

    Ok(())
}

#[test]
fn rejection_records_the_reason() -> anyhow::Result<()> {
    let h = harness("rejection_reason.db")?;
    let request = h.service.create_request(cement_request(1.0))?;

    h.service.transition_request(
        request.id,
        RequestStatus::Rejected,
        Some(100),
        Some("duplicate of REQ-2026-0007".into()),
        None,
    )?;

    let rejected = h.store.request(request.id)?.unwrap();
    assert_eq!(rejected.status, RequestStatus::Rejected);
    assert_eq!(
        rejected.rejection_reason.as_deref(),
        Some("duplicate of REQ-2026-0007")
    );

    Ok(())
}

#[test]
fn human_numbers_follow_the_serialized_sequence() -> anyhow::Result<()> {
    let h = harness("sequence.db")?;

    let first = h.service.create_request(cement_request(1.0))?;
    let second = h.service.create_request(cement_request(2.0))?;
    let third = h.service.create_request(cement_request(3.0))?;

    assert_eq!(first.human_number, "REQ-2026-0001");
    assert_eq!(second.human_number, "REQ-2026-0002");
    assert_eq!(third.human_number, "REQ-2026-0003");

    Ok(())
}

#[test]
fn create_request_validates_its_input() -> anyhow::Result<()> {
    let h = harness("create_validation.db")?;

    let base = cement_request(5.0);

    let mut empty = base.clone();
    empty.items.clear();
    assert!(matches!(
        h.service.create_request(empty).unwrap_err(),
        SupplyError::Validation(_)
    ));

    let mut zero_qty = base.clone();
    zero_qty.items[0].quantity = 0.0;
    assert!(matches!(
        h.service.create_request(zero_qty).unwrap_err(),
        SupplyError::Validation(_)
    ));

    let mut bad_priority = base.clone();
    bad_priority.priority = 6;
    assert!(matches!(
        h.service.create_request(bad_priority).unwrap_err(),
        SupplyError::Validation(_)
    ));

    let mut bad_location = base.clone();
    bad_location.location_id = 77;
    assert!(matches!(
        h.service.create_request(bad_location).unwrap_err(),
        SupplyError::NotFound {
            entity: "request location",
            id: 77
        }
    ));

    let mut bad_material = base;
    bad_material.items[0].material_id = 999;
    assert!(matches!(
        h.service.create_request(bad_material).unwrap_err(),
        SupplyError::NotFound {
            entity: "material",
            id: 999
        }
    ));

    // Nothing consumed the sequence or persisted a request.
    assert!(h.store.request(1)?.is_none());

    Ok(())
}

#[test]
fn pending_requests_order_by_urgency_then_need_date() -> anyhow::Result<()> {
    let h = harness("pending_order.db")?;

    let mut low = cement_request(1.0);
    low.priority = 4;
    let mut urgent_late = cement_request(1.0);
    urgent_late.priority = 1;
    urgent_late.needed_by = TimeStamp::new_with(2026, 3, 20, 0, 0, 0);
    let mut urgent_soon = cement_request(1.0);
    urgent_soon.priority = 1;
    urgent_soon.needed_by = TimeStamp::new_with(2026, 3, 11, 0, 0, 0);

    let low = h.service.create_request(low)?;
    let urgent_late = h.service.create_request(urgent_late)?;
    let urgent_soon = h.service.create_request(urgent_soon)?;

    let pending = h.service.pending_requests(SITE)?;
    let ids: Vec<u64> = pending.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![urgent_soon.id, urgent_late.id, low.id]);

    Ok(())
}

#[test]
fn fleet_operations_update_position_status_and_operator() -> anyhow::Result<()> {
    let h = harness("fleet_ops.db")?;

    h.clock.advance(chrono::Duration::hours(1));
    h.service
        .update_vehicle_position(1, 0.001, 0.019, Some(18.0))?;

    let truck = h.store.vehicle(1)?.unwrap();
    let fix = truck.position.as_ref().unwrap();
    assert_eq!(fix.latitude, 0.001);
    assert_eq!(fix.last_updated, h.clock.now());
    assert_eq!(truck.speed_kmh, Some(18.0));

    // Carla takes the wheelbarrow, then switches to the truck.
    h.service.assign_operator(2, 102)?;
    h.service.assign_operator(1, 102)?;
    assert_eq!(h.store.vehicle(1)?.unwrap().operator_id, Some(102));
    assert_eq!(h.store.vehicle(2)?.unwrap().operator_id, None);

    // A requester cannot be put behind the wheel.
    let err = h.service.assign_operator(1, 101).unwrap_err();
    assert!(matches!(err, SupplyError::Validation(_)), "{err}");

    // With the truck in maintenance only the wheelbarrow counts as free.
    h.service
        .set_vehicle_status(1, VehicleStatus::InMaintenance)?;
    let counts = h.service.availability_by_kind(SITE)?;
    assert_eq!(counts.get(&VehicleKind::Wheelbarrow), Some(&1));
    assert_eq!(counts.get(&VehicleKind::Truck), None);

    // The tent sits under its cement minimum (3 < 20).
    let low = h.service.stock_below_minimum(2)?;
    assert_eq!(low.len(), 1);
    assert_eq!(low[0].material_id, 10);
    assert!(h.service.stock_below_minimum(1)?.is_empty());

    Ok(())
}
