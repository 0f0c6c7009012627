//! Site personnel. Roles are a tagged union rather than a subtype hierarchy;
//! each variant carries only its own fields.

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum Role {
    /// Reviews requests and books depot + vehicle.
    #[n(0)]
    Reviewer {
        #[n(0)]
        badge: String,
    },
    /// Raises material requests from a work location.
    #[n(1)]
    Requester,
    /// Drives a vehicle; at most one vehicle at a time.
    #[n(2)]
    Operator {
        #[n(0)]
        license: String,
    },
    #[n(3)]
    Admin,
}

#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct User {
    #[n(0)]
    pub id: u64,
    #[n(1)]
    pub site_id: u64,
    #[n(2)]
    pub name: String,
    #[n(3)]
    pub phone: Option<String>,
    #[n(4)]
    pub role: Role,
    #[n(5)]
    pub active: bool,
}

impl User {
    pub fn new(id: u64, site_id: u64, name: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            site_id,
            name: name.into(),
            phone: None,
            role,
            active: true,
        }
    }

    pub fn is_operator(&self) -> bool {
        matches!(self.role, Role::Operator { .. })
    }
}
