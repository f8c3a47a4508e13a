use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{CreditError, Result};
use crate::types::{ItemId, PackagingId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: ItemId,
    pub name: String,
    pub price_per_unit: Money,
    pub is_credit_eligible: bool,
    pub stock_quantity: u32,
}

/// sellable unit of an item with its own price and eligibility
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packaging {
    pub id: PackagingId,
    pub item_id: ItemId,
    pub name: String,
    pub price_per_unit: Money,
    pub is_credit_eligible: bool,
}

/// agrovet catalog consulted for prices and stock, never part of a credit transaction
pub trait InventoryCatalog: Send + Sync {
    fn get_item(&self, item_id: &ItemId) -> Result<Option<InventoryItem>>;

    fn get_packaging(&self, item_id: &ItemId) -> Result<Vec<Packaging>>;

    fn decrement_stock(&self, item_id: &ItemId, quantity: u32) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    items: RwLock<HashMap<ItemId, InventoryItem>>,
    packaging: RwLock<HashMap<ItemId, Vec<Packaging>>>,
    fail_decrements: AtomicBool,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_item(
        &self,
        name: &str,
        price_per_unit: Money,
        is_credit_eligible: bool,
        stock_quantity: u32,
    ) -> Result<ItemId> {
        let item = InventoryItem {
            id: Uuid::new_v4(),
            name: name.to_string(),
            price_per_unit,
            is_credit_eligible,
            stock_quantity,
        };
        let id = item.id;
        self.items
            .write()
            .map_err(|_| CreditError::persistence("catalog lock poisoned"))?
            .insert(id, item);
        Ok(id)
    }

    pub fn add_packaging(
        &self,
        item_id: ItemId,
        name: &str,
        price_per_unit: Money,
        is_credit_eligible: bool,
    ) -> Result<PackagingId> {
        let packaging = Packaging {
            id: Uuid::new_v4(),
            item_id,
            name: name.to_string(),
            price_per_unit,
            is_credit_eligible,
        };
        let id = packaging.id;
        self.packaging
            .write()
            .map_err(|_| CreditError::persistence("catalog lock poisoned"))?
            .entry(item_id)
            .or_default()
            .push(packaging);
        Ok(id)
    }

    pub fn stock(&self, item_id: &ItemId) -> Result<Option<u32>> {
        Ok(self.get_item(item_id)?.map(|item| item.stock_quantity))
    }

    /// make every stock decrement fail, simulating an unavailable catalog
    pub fn fail_decrements(&self, fail: bool) {
        self.fail_decrements.store(fail, Ordering::SeqCst);
    }
}

impl InventoryCatalog for InMemoryCatalog {
    fn get_item(&self, item_id: &ItemId) -> Result<Option<InventoryItem>> {
        Ok(self
            .items
            .read()
            .map_err(|_| CreditError::persistence("catalog lock poisoned"))?
            .get(item_id)
            .cloned())
    }

    fn get_packaging(&self, item_id: &ItemId) -> Result<Vec<Packaging>> {
        Ok(self
            .packaging
            .read()
            .map_err(|_| CreditError::persistence("catalog lock poisoned"))?
            .get(item_id)
            .cloned()
            .unwrap_or_default())
    }

    fn decrement_stock(&self, item_id: &ItemId, quantity: u32) -> Result<()> {
        if self.fail_decrements.load(Ordering::SeqCst) {
            return Err(CreditError::persistence("inventory service unavailable"));
        }

        let mut items = self
            .items
            .write()
            .map_err(|_| CreditError::persistence("catalog lock poisoned"))?;
        let item = items
            .get_mut(item_id)
            .ok_or_else(|| CreditError::not_found("item", item_id))?;

        let remaining = item.stock_quantity.checked_sub(quantity).ok_or_else(|| {
            CreditError::validation(format!(
                "stock for {} is {}, cannot remove {}",
                item.name, item.stock_quantity, quantity
            ))
        })?;
        item.stock_quantity = remaining;
        Ok(())
    }
}
