use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// A catalog entry as persisted in the document.
///
/// The effect and predicate are kept as source text and recompiled whenever
/// the document is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Stable key, also the backpack key.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Shop blurb, possibly empty.
    #[serde(default)]
    pub description: String,
    /// Stock after a restock.
    pub total: u32,
    /// Units left to sell.
    pub in_stock: u32,
    /// Locked items are hidden from the shop and cannot be bought.
    #[serde(default)]
    pub unlocked: bool,
    /// Uses granted on purchase. Zero marks a special item that is kept but
    /// never used.
    #[serde(default = "default_uses")]
    pub uses: u32,
    /// Effect source.
    pub effect: String,
    /// Predicate source; `None` means always eligible.
    #[serde(default)]
    pub predicate: Option<String>,
}

fn default_uses() -> u32 {
    1
}

impl Item {
    /// Create a fully stocked, locked, single-use item.
    pub fn new(id: impl Into<String>, name: impl Into<String>, total: u32, effect: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            total,
            in_stock: total,
            unlocked: false,
            uses: default_uses(),
            effect: effect.into(),
            predicate: None,
        }
    }

    /// Builder: set the shop blurb.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Builder: set the uses granted per purchase.
    pub fn with_uses(mut self, uses: u32) -> Self {
        self.uses = uses;
        self
    }

    /// Builder: attach eligibility predicate source.
    pub fn with_predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }

    /// Builder: lock or unlock.
    pub fn unlocked(mut self, unlocked: bool) -> Self {
        self.unlocked = unlocked;
        self
    }

    /// Special items grant no uses.
    pub fn is_special(&self) -> bool {
        self.uses == 0
    }

    /// Take one unit out of stock. Returns `false` when sold out.
    pub fn take_one(&mut self) -> bool {
        if self.in_stock == 0 {
            return false;
        }
        self.in_stock -= 1;
        true
    }

    /// Refill to `total`.
    pub fn restock(&mut self) {
        self.in_stock = self.total;
    }

    /// Check the record's own invariants.
    pub fn validate(&self) -> CoreResult<()> {
        if self.id.is_empty() || self.id.chars().any(char::is_whitespace) {
            return Err(CoreError::InvalidItemId(self.id.clone()));
        }
        if self.in_stock > self.total {
            return Err(CoreError::StockOverflow {
                id: self.id.clone(),
                in_stock: self.in_stock,
                total: self.total,
            });
        }
        Ok(())
    }
}
