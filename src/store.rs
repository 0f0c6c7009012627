//! Data-access collaborator: the `SupplyStore` trait the engine works
//! against, plus a sled-backed reference implementation with minicbor-encoded
//! records.

use std::sync::Arc;

use sled::{Batch, Db};

use crate::depot::Depot;
use crate::fleet::Vehicle;
use crate::material::Material;
use crate::request::{Request, RequestLocation, RequestStatus};
use crate::user::User;

/// Lookup and save operations the lifecycle service depends on. No implicit
/// lazy loading: everything is fetched on demand by id or site.
pub trait SupplyStore: Send + Sync {
    fn material(&self, id: u64) -> anyhow::Result<Option<Material>>;
    fn put_material(&self, material: &Material) -> anyhow::Result<()>;

    fn depot(&self, id: u64) -> anyhow::Result<Option<Depot>>;
    fn put_depot(&self, depot: &Depot) -> anyhow::Result<()>;
    fn depots_for_site(&self, site_id: u64) -> anyhow::Result<Vec<Depot>>;

    fn vehicle(&self, id: u64) -> anyhow::Result<Option<Vehicle>>;
    fn put_vehicle(&self, vehicle: &Vehicle) -> anyhow::Result<()>;
    fn vehicles_for_site(&self, site_id: u64) -> anyhow::Result<Vec<Vehicle>>;

    fn request_location(&self, id: u64) -> anyhow::Result<Option<RequestLocation>>;
    fn put_request_location(&self, location: &RequestLocation) -> anyhow::Result<()>;

    fn user(&self, id: u64) -> anyhow::Result<Option<User>>;
    fn put_user(&self, user: &User) -> anyhow::Result<()>;

    fn request(&self, id: u64) -> anyhow::Result<Option<Request>>;
    fn put_request(&self, request: &Request) -> anyhow::Result<()>;
    fn pending_requests_for_site(&self, site_id: u64) -> anyhow::Result<Vec<Request>>;

    /// Commits a request and a vehicle in one atomic write. Approval and
    /// delivery must not be observable half-applied.
    fn put_request_and_vehicle(&self, request: &Request, vehicle: &Vehicle)
    -> anyhow::Result<()>;

    /// Next value of the global request sequence. Serialized: interleaved
    /// callers still observe 1, 2, 3, ...
    fn next_request_seq(&self) -> anyhow::Result<u64>;
}

const SEQ_REQUEST_KEY: &[u8] = b"seq/request";

fn key(prefix: &str, id: u64) -> String {
    // Zero-padded so prefix scans iterate in id order.
    format!("{prefix}/{id:016}")
}

fn decode<T>(bytes: &[u8]) -> anyhow::Result<T>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    Ok(minicbor::decode(bytes)?)
}

/// Sled-backed store, records encoded with minicbor under per-entity key
/// prefixes.
pub struct SledStore {
    db: Arc<Db>,
}

impl SledStore {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    fn get<T>(&self, prefix: &str, id: u64) -> anyhow::Result<Option<T>>
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        match self.db.get(key(prefix, id).as_bytes())? {
            Some(ivec) => Ok(Some(decode(&ivec)?)),
            None => Ok(None),
        }
    }

    fn put<T: minicbor::Encode<()>>(&self, prefix: &str, id: u64, value: &T) -> anyhow::Result<()> {
        self.db
            .insert(key(prefix, id).as_bytes(), minicbor::to_vec(value)?)?;
        Ok(())
    }

    fn scan<T>(&self, prefix: &str) -> anyhow::Result<Vec<T>>
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        let mut out = Vec::new();
        for entry in self.db.scan_prefix(format!("{prefix}/").as_bytes()) {
            let (_, ivec) = entry?;
            out.push(decode(&ivec)?);
        }
        Ok(out)
    }
}

impl SupplyStore for SledStore {
    fn material(&self, id: u64) -> anyhow::Result<Option<Material>> {
        self.get("material", id)
    }

    fn put_material(&self, material: &Material) -> anyhow::Result<()> {
        self.put("material", material.id, material)
    }

    fn depot(&self, id: u64) -> anyhow::Result<Option<Depot>> {
        self.get("depot", id)
    }

    fn put_depot(&self, depot: &Depot) -> anyhow::Result<()> {
        self.put("depot", depot.id, depot)
    }

    fn depots_for_site(&self, site_id: u64) -> anyhow::Result<Vec<Depot>> {
        let mut depots: Vec<Depot> = self.scan("depot")?;
        depots.retain(|d| d.site_id == site_id);
        Ok(depots)
    }

    fn vehicle(&self, id: u64) -> anyhow::Result<Option<Vehicle>> {
        self.get("vehicle", id)
    }

    fn put_vehicle(&self, vehicle: &Vehicle) -> anyhow::Result<()> {
        self.put("vehicle", vehicle.id, vehicle)
    }

    fn vehicles_for_site(&self, site_id: u64) -> anyhow::Result<Vec<Vehicle>> {
        let mut vehicles: Vec<Vehicle> = self.scan("vehicle")?;
        vehicles.retain(|v| v.site_id == site_id);
        Ok(vehicles)
    }

    fn request_location(&self, id: u64) -> anyhow::Result<Option<RequestLocation>> {
        self.get("location", id)
    }

    fn put_request_location(&self, location: &RequestLocation) -> anyhow::Result<()> {
        self.put("location", location.id, location)
    }

    fn user(&self, id: u64) -> anyhow::Result<Option<User>> {
        self.get("user", id)
    }

    fn put_user(&self, user: &User) -> anyhow::Result<()> {
        self.put("user", user.id, user)
    }

    fn request(&self, id: u64) -> anyhow::Result<Option<Request>> {
        self.get("request", id)
    }

    fn put_request(&self, request: &Request) -> anyhow::Result<()> {
        self.put("request", request.id, request)
    }

    fn pending_requests_for_site(&self, site_id: u64) -> anyhow::Result<Vec<Request>> {
        let mut requests: Vec<Request> = self.scan("request")?;
        requests.retain(|r| r.site_id == site_id && r.status == RequestStatus::Pending);
        Ok(requests)
    }

    fn put_request_and_vehicle(
        &self,
        request: &Request,
        vehicle: &Vehicle,
    ) -> anyhow::Result<()> {
        let mut batch = Batch::default();
        batch.insert(
            key("request", request.id).as_bytes(),
            minicbor::to_vec(request)?,
        );
        batch.insert(
            key("vehicle", vehicle.id).as_bytes(),
            minicbor::to_vec(vehicle)?,
        );
        self.db.apply_batch(batch)?;
        Ok(())
    }

    fn next_request_seq(&self) -> anyhow::Result<u64> {
        let ivec = self.db.update_and_fetch(SEQ_REQUEST_KEY, |old| {
            let next = match old {
                Some(bytes) => match <[u8; 8]>::try_from(bytes) {
                    Ok(arr) => u64::from_be_bytes(arr) + 1,
                    // A malformed counter is left untouched; restarting it
                    // would hand out duplicate request numbers. The read
                    // below reports the error.
                    Err(_) => return Some(bytes.to_vec()),
                },
                None => 1,
            };
            Some(next.to_be_bytes().to_vec())
        })?;

        match ivec {
            Some(bytes) => {
                let arr: [u8; 8] = bytes.as_ref().try_into().map_err(|_| {
                    anyhow::anyhow!(
                        "request sequence counter is {} bytes, expected 8",
                        bytes.len()
                    )
                })?;
                Ok(u64::from_be_bytes(arr))
            }
            None => Ok(1),
        }
    }
}
