use std::fs;
use std::path::{Path, PathBuf};

use crate::catalog::{Catalog, CatalogFile};
use crate::error::StoreError;

const DATA_DIR_NAME: &str = ".homely-harvest";
const IMAGES_DIR_NAME: &str = "images";
const CATALOG_FILE_NAME: &str = "catalog.json";

/// Locations of the storefront's static data
#[derive(Debug, Clone)]
pub struct Config {
    base_dir: PathBuf,
}

impl Config {
    /// Create config with a specific base directory
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Create config using the current working directory
    pub fn from_current_dir() -> Result<Self, StoreError> {
        let cwd = std::env::current_dir()?;
        Ok(Self::new(cwd.join(DATA_DIR_NAME)))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Directory holding product pictures
    pub fn images_dir(&self) -> PathBuf {
        self.base_dir.join(IMAGES_DIR_NAME)
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.base_dir.join(CATALOG_FILE_NAME)
    }

    /// Create all necessary directories if they don't exist
    pub fn ensure_directories(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.base_dir)?;
        fs::create_dir_all(self.images_dir())?;
        Ok(())
    }

    /// Load the catalog file, or the built-in menu if there is none
    pub fn load_catalog(&self) -> Result<Catalog, StoreError> {
        let path = self.catalog_path();
        if !path.exists() {
            tracing::info!(path = %path.display(), "no catalog file, using built-in menu");
            return Ok(Catalog::default_menu());
        }

        let content = fs::read_to_string(&path)?;
        let file: CatalogFile = serde_json::from_str(&content)?;
        Catalog::from_file(file)
    }

    /// Write a catalog file, e.g. to seed a fresh data directory
    pub fn save_catalog(&self, catalog: &Catalog) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(&catalog.to_file())?;
        fs::write(self.catalog_path(), content)?;
        Ok(())
    }
}
