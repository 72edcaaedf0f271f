use crate::catalog::{Catalog, ItemId};
use crate::error::StoreError;
use crate::order::{OrderLine, OrderSummary};

/// Requested quantities per item, in the order items were first added.
///
/// Stored quantities are always positive; setting a non-positive quantity
/// removes the entry instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    entries: Vec<(ItemId, u32)>,
}

/// Clamp caller input into a stored quantity
fn to_quantity(qty: i64) -> u32 {
    u32::try_from(qty).unwrap_or(u32::MAX)
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn quantity(&self, id: &ItemId) -> Option<u32> {
        self.entries.iter().find(|(i, _)| i == id).map(|(_, q)| *q)
    }

    /// Add `qty` of an item, treating `qty <= 0` as 1.
    ///
    /// Returns the quantity actually added, which is less than requested
    /// once the stored quantity saturates.
    pub fn add(&mut self, id: &ItemId, qty: i64) -> u32 {
        let requested = if qty <= 0 { 1 } else { to_quantity(qty) };

        match self.entries.iter_mut().find(|(i, _)| i == id) {
            Some((_, current)) => {
                let updated = current.saturating_add(requested);
                let added = updated - *current;
                *current = updated;
                added
            }
            None => {
                self.entries.push((id.clone(), requested));
                requested
            }
        }
    }

    /// Overwrite the quantity of an item; `qty <= 0` removes it
    pub fn set_quantity(&mut self, id: &ItemId, qty: i64) {
        if qty <= 0 {
            self.entries.retain(|(i, _)| i != id);
            return;
        }

        let qty = to_quantity(qty);
        match self.entries.iter_mut().find(|(i, _)| i == id) {
            Some((_, current)) => *current = qty,
            None => self.entries.push((id.clone(), qty)),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Sum of price x quantity over every entry
    pub fn total(&self, catalog: &Catalog) -> Result<u64, StoreError> {
        self.entries.iter().try_fold(0u64, |acc, (id, qty)| -> Result<u64, StoreError> {
            let price = catalog.price(id)?;
            Ok(acc.saturating_add(price.saturating_mul(u64::from(*qty))))
        })
    }

    /// Price every line against the catalog
    pub fn summary(&self, catalog: &Catalog) -> Result<OrderSummary, StoreError> {
        let lines = self
            .entries
            .iter()
            .map(|(id, qty)| -> Result<OrderLine, StoreError> {
                Ok(OrderLine::new(id.to_string(), *qty, catalog.price(id)?))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(OrderSummary::from_lines(lines))
    }

    /// Summarize, then empty the cart whether or not pricing succeeded
    pub fn checkout(&mut self, catalog: &Catalog) -> Result<OrderSummary, StoreError> {
        let summary = self.summary(catalog);
        self.clear();
        summary
    }
}
