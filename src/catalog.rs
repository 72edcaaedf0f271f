use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

const DEFAULT_CURRENCY: &str = "₹";
const DEFAULT_STORE_NAME: &str = "Homely Harvest";
const DEFAULT_TAGLINE: &str = "Warm, homemade snacks & essentials — small-batch, made with love.";

/// A purchasable item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub price: u64,
    /// Image file name, relative to the images directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl CatalogEntry {
    pub fn new(name: impl Into<String>, price: u64, image: Option<&str>) -> Self {
        Self {
            name: name.into(),
            price,
            image: image.map(str::to_string),
        }
    }
}

/// Identifier of an item known to be in the catalog.
///
/// Only [`Catalog::resolve`] hands these out, so cart code never has to
/// re-check that a name exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(String);

impl ItemId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// On-disk shape of `catalog.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default = "default_store_name")]
    pub store_name: String,
    #[serde(default = "default_tagline")]
    pub tagline: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub items: Vec<CatalogEntry>,
}

fn default_store_name() -> String {
    DEFAULT_STORE_NAME.to_string()
}

fn default_tagline() -> String {
    DEFAULT_TAGLINE.to_string()
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

/// Read-only product list, in display order
#[derive(Debug, Clone)]
pub struct Catalog {
    store_name: String,
    tagline: String,
    currency: String,
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Build a catalog under the default store name, rejecting empty or duplicate names
    pub fn new(currency: impl Into<String>, entries: Vec<CatalogEntry>) -> Result<Self, StoreError> {
        let mut seen = HashSet::new();
        for entry in &entries {
            if entry.name.trim().is_empty() {
                return Err(StoreError::InvalidCatalog("item with empty name".to_string()));
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(StoreError::InvalidCatalog(format!(
                    "duplicate item name '{}'",
                    entry.name
                )));
            }
        }

        Ok(Self {
            store_name: default_store_name(),
            tagline: default_tagline(),
            currency: currency.into(),
            entries,
        })
    }

    /// The built-in Homely Harvest menu
    pub fn default_menu() -> Self {
        Self {
            store_name: default_store_name(),
            tagline: default_tagline(),
            currency: default_currency(),
            entries: vec![
                CatalogEntry::new("Dry Coconut (Sukha Khobra)", 80, Some("dry_coconut.jpg")),
                CatalogEntry::new("Grated Coconut", 60, Some("grated_coconut.jpg")),
                CatalogEntry::new("Poha (Beaten Rice)", 50, Some("poha.jpg")),
                CatalogEntry::new("Roasted Peanuts", 70, Some("peanuts.jpg")),
                CatalogEntry::new("Groundnut Chikki", 40, Some("chikki.jpg")),
                CatalogEntry::new("Coconut Oil (Homemade)", 120, Some("coconut_oil.jpg")),
                CatalogEntry::new("Besan Ladoo", 90, Some("besan_ladoo.jpg")),
            ],
        }
    }

    pub fn from_file(file: CatalogFile) -> Result<Self, StoreError> {
        let catalog = Self::new(file.currency, file.items)?;
        Ok(Self {
            store_name: file.store_name,
            tagline: file.tagline,
            ..catalog
        })
    }

    /// Inverse of [`Catalog::from_file`]
    pub fn to_file(&self) -> CatalogFile {
        CatalogFile {
            store_name: self.store_name.clone(),
            tagline: self.tagline.clone(),
            currency: self.currency.clone(),
            items: self.entries.clone(),
        }
    }

    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    pub fn tagline(&self) -> &str {
        &self.tagline
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Validate a caller-supplied name
    pub fn resolve(&self, name: &str) -> Result<ItemId, StoreError> {
        self.get(name)
            .map(|e| ItemId(e.name.clone()))
            .ok_or_else(|| StoreError::UnknownItem(name.to_string()))
    }

    /// Unit price of a resolved item
    pub fn price(&self, id: &ItemId) -> Result<u64, StoreError> {
        self.get(id.as_str())
            .map(|e| e.price)
            .ok_or_else(|| StoreError::UnknownItem(id.to_string()))
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::default_menu()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_menu() {
        let catalog = Catalog::default_menu();
        assert_eq!(catalog.len(), 7);
        assert_eq!(catalog.currency(), "₹");
        assert_eq!(catalog.get("Coconut Oil (Homemade)").unwrap().price, 120);
    }

    #[test]
    fn test_resolve_known_and_unknown() {
        let catalog = Catalog::default_menu();

        let id = catalog.resolve("Besan Ladoo").unwrap();
        assert_eq!(id.as_str(), "Besan Ladoo");
        assert_eq!(catalog.price(&id).unwrap(), 90);

        let err = catalog.resolve("Mango Pickle").unwrap_err();
        assert!(matches!(err, StoreError::UnknownItem(name) if name == "Mango Pickle"));
    }

    #[test]
    fn test_rejects_duplicates_and_empty_names() {
        let dup = vec![CatalogEntry::new("A", 1, None), CatalogEntry::new("A", 2, None)];
        assert!(matches!(
            Catalog::new("", dup),
            Err(StoreError::InvalidCatalog(reason)) if reason.contains("'A'")
        ));

        let empty = vec![CatalogEntry::new("  ", 1, None)];
        assert!(matches!(
            Catalog::new("", empty),
            Err(StoreError::InvalidCatalog(_))
        ));
    }

    #[test]
    fn test_catalog_file_defaults_currency() {
        let file: CatalogFile =
            serde_json::from_str(r#"{"items": [{"name": "A", "price": 80}]}"#).unwrap();
        let catalog = Catalog::from_file(file).unwrap();

        assert_eq!(catalog.currency(), "₹");
        assert_eq!(catalog.store_name(), "Homely Harvest");
        assert_eq!(catalog.get("A").unwrap().image, None);
    }

    #[test]
    fn test_catalog_file_store_details() {
        let file: CatalogFile = serde_json::from_str(
            r#"{"store_name": "Corner Pantry", "tagline": "Fresh daily", "currency": "$",
                "items": [{"name": "Jam", "price": 7}]}"#,
        )
        .unwrap();
        let catalog = Catalog::from_file(file).unwrap();

        assert_eq!(catalog.store_name(), "Corner Pantry");
        assert_eq!(catalog.tagline(), "Fresh daily");
        assert_eq!(catalog.to_file().items, catalog.entries());
    }
}
