//! Depots and their per-material stock ledger.

use std::collections::HashMap;

use crate::geo::Coordinate;

/// On-hand quantity of one material at one depot. Unique per
/// (depot, material); owned by the depot record, so removing the depot
/// removes its ledger with it.
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct StockEntry {
    #[n(0)]
    pub material_id: u64,
    #[n(1)]
    pub quantity_available: f64,
    #[n(2)]
    pub quantity_min: Option<f64>,
    #[n(3)]
    pub quantity_max: Option<f64>,
}

impl StockEntry {
    pub fn new(material_id: u64, quantity_available: f64) -> Self {
        Self {
            material_id,
            quantity_available,
            quantity_min: None,
            quantity_max: None,
        }
    }

    pub fn with_min(mut self, min: f64) -> Self {
        self.quantity_min = Some(min);
        self
    }

    pub fn with_max(mut self, max: f64) -> Self {
        self.quantity_max = Some(max);
        self
    }

    pub fn sufficient_for(&self, quantity: f64) -> bool {
        self.quantity_available >= quantity
    }

    pub fn below_minimum(&self) -> bool {
        matches!(self.quantity_min, Some(min) if self.quantity_available < min)
    }
}

#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct Depot {
    #[n(0)]
    pub id: u64,
    #[n(1)]
    pub site_id: u64,
    #[n(2)]
    pub name: String,
    #[n(3)]
    pub coordinate: Coordinate,
    #[n(4)]
    pub stock: Vec<StockEntry>,
    #[n(5)]
    pub active: bool,
}

impl Depot {
    pub fn new(id: u64, site_id: u64, name: impl Into<String>, coordinate: Coordinate) -> Self {
        Self {
            id,
            site_id,
            name: name.into(),
            coordinate,
            stock: Vec::new(),
            active: true,
        }
    }

    pub fn with_stock(mut self, entry: StockEntry) -> Self {
        self.stock.push(entry);
        self
    }

    pub fn stock_entry(&self, material_id: u64) -> Option<&StockEntry> {
        self.stock.iter().find(|e| e.material_id == material_id)
    }

    /// True iff a ledger entry exists for the material and holds at least
    /// `quantity`. A missing entry is simply insufficient, not an error.
    pub fn sufficient_for(&self, material_id: u64, quantity: f64) -> bool {
        self.stock_entry(material_id)
            .is_some_and(|e| e.sufficient_for(quantity))
    }

    /// Available quantity per requested material, 0 for materials this depot
    /// has no ledger entry for.
    pub fn quantities_for(&self, material_ids: &[u64]) -> HashMap<u64, f64> {
        material_ids
            .iter()
            .map(|&id| {
                let available = self
                    .stock_entry(id)
                    .map_or(0.0, |e| e.quantity_available);
                (id, available)
            })
            .collect()
    }

    /// Ledger entries that have fallen under their safety minimum.
    pub fn below_minimum(&self) -> Vec<&StockEntry> {
        self.stock.iter().filter(|e| e.below_minimum()).collect()
    }
}
