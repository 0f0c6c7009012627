//! Material reference data.

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum UnitOfMeasure {
    #[n(0)]
    Unit,
    #[n(1)]
    Meter,
    #[n(2)]
    SquareMeter,
    #[n(3)]
    CubicMeter,
    #[n(4)]
    Liter,
    #[n(5)]
    Kilogram,
    #[n(6)]
    Ton,
    #[n(7)]
    Bag,
    #[n(8)]
    Box,
    #[n(9)]
    Pallet,
}

/// A material type used on site, e.g. cement, bricks, sand. Immutable once
/// referenced by stock or requests; retire via `active = false` instead of
/// deleting.
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct Material {
    #[n(0)]
    pub id: u64,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub code: Option<String>,
    #[n(3)]
    pub unit: UnitOfMeasure,
    #[n(4)]
    pub unit_weight_kg: Option<f64>,
    #[n(5)]
    pub unit_volume_m3: Option<f64>,
    #[n(6)]
    pub active: bool,
}

impl Material {
    pub fn new(id: u64, name: impl Into<String>, unit: UnitOfMeasure) -> Self {
        Self {
            id,
            name: name.into(),
            code: None,
            unit,
            unit_weight_kg: None,
            unit_volume_m3: None,
            active: true,
        }
    }

    pub fn with_unit_weight(mut self, kg: f64) -> Self {
        self.unit_weight_kg = Some(kg);
        self
    }

    pub fn with_unit_volume(mut self, m3: f64) -> Self {
        self.unit_volume_m3 = Some(m3);
        self
    }
}
