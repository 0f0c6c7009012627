use crate::request::RequestStatus;

#[derive(thiserror::Error, Debug)]
pub enum SupplyError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },

    #[error("vehicle {0} is not available for assignment")]
    VehicleUnavailable(u64),

    #[error("load of {required_kg} kg exceeds vehicle capacity of {capacity_kg} kg")]
    CapacityExceeded { required_kg: f64, capacity_kg: f64 },

    #[error("illegal status transition {from:?} -> {to:?}")]
    InvalidTransition {
        from: RequestStatus,
        to: RequestStatus,
    },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl SupplyError {
    pub fn not_found(entity: &'static str, id: u64) -> Self {
        Self::NotFound { entity, id }
    }
}
