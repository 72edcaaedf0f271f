pub mod assets;
pub mod cart;
pub mod catalog;
pub mod config;
pub mod error;
pub mod order;
pub mod session;

use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::config::Config;
use crate::session::SessionStore;

// Re-export key types for convenience
pub use crate::assets::{AssetResolver, ImageData, ImageSource};
pub use crate::cart::Cart;
pub use crate::catalog::{Catalog, CatalogEntry};
pub use crate::config::Config as StoreConfig;
pub use crate::error::StoreError;
pub use crate::order::{OrderSummary, Receipt};
pub use crate::session::SessionId;

/// Storefront shared between request handlers
pub type SharedStorefront = Arc<RwLock<Storefront>>;

/// Catalog, per-session carts and checkout
pub struct Storefront {
    catalog: Catalog,
    sessions: SessionStore,
    assets: AssetResolver,
}

impl Storefront {
    pub fn new(catalog: Catalog, assets: AssetResolver) -> Self {
        Self {
            catalog,
            sessions: SessionStore::new(),
            assets,
        }
    }

    /// Open the storefront described by the data directory in the current directory
    pub fn open() -> Result<Self, StoreError> {
        Self::open_with(&Config::from_current_dir()?)
    }

    /// Open using an explicit data-directory layout
    pub fn open_with(config: &Config) -> Result<Self, StoreError> {
        config.ensure_directories()?;
        let catalog = config.load_catalog()?;
        tracing::info!(items = catalog.len(), "catalog loaded");
        Ok(Self::new(catalog, AssetResolver::new(config.images_dir())))
    }

    /// Wrap in Arc<RwLock<>> for shared access
    pub fn into_shared(self) -> SharedStorefront {
        Arc::new(RwLock::new(self))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn currency(&self) -> &str {
        self.catalog.currency()
    }

    pub fn create_session(&mut self) -> SessionId {
        let id = self.sessions.create();
        tracing::info!(session = %id, "session started");
        id
    }

    /// Drop a session and whatever is left in its cart
    pub fn end_session(&mut self, session: &SessionId) -> Result<(), StoreError> {
        let ended = self.sessions.end(session)?;
        tracing::info!(session = %session, abandoned_items = ended.cart.len(), "session ended");
        Ok(())
    }

    /// Reclaim sessions idle for longer than `ttl`
    pub fn expire_idle_sessions(&mut self, ttl: Duration) -> usize {
        let expired = self.sessions.expire_idle(ttl);
        if expired > 0 {
            tracing::info!(expired, remaining = self.sessions.len(), "idle sessions expired");
        }
        expired
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Add to a session's cart; returns the quantity actually added
    pub fn add_to_cart(
        &mut self,
        session: &SessionId,
        item: &str,
        qty: i64,
    ) -> Result<u32, StoreError> {
        let id = self.catalog.resolve(item)?;
        let cart = &mut self.sessions.get_mut(session)?.cart;
        let added = cart.add(&id, qty);
        tracing::debug!(session = %session, item = %id, requested = qty, added, "added to cart");
        Ok(added)
    }

    /// Overwrite a quantity; non-positive removes the item
    pub fn set_quantity(
        &mut self,
        session: &SessionId,
        item: &str,
        qty: i64,
    ) -> Result<(), StoreError> {
        let id = self.catalog.resolve(item)?;
        self.sessions.get_mut(session)?.cart.set_quantity(&id, qty);
        tracing::debug!(session = %session, item = %id, qty, "quantity set");
        Ok(())
    }

    pub fn clear_cart(&mut self, session: &SessionId) -> Result<(), StoreError> {
        self.sessions.get_mut(session)?.cart.clear();
        tracing::debug!(session = %session, "cart cleared");
        Ok(())
    }

    /// Current cart contents with prices
    pub fn cart(&self, session: &SessionId) -> Result<OrderSummary, StoreError> {
        self.sessions.get(session)?.cart.summary(&self.catalog)
    }

    pub fn cart_total(&self, session: &SessionId) -> Result<u64, StoreError> {
        self.sessions.get(session)?.cart.total(&self.catalog)
    }

    /// Summarize the cart and empty it in one step
    pub fn place_order(&mut self, session: &SessionId) -> Result<Receipt, StoreError> {
        let summary = self.sessions.get_mut(session)?.cart.checkout(&self.catalog)?;
        tracing::info!(
            session = %session,
            lines = summary.lines.len(),
            total = summary.total,
            "order placed"
        );
        Ok(Receipt::new(summary, self.catalog.currency()))
    }

    fn entry(&self, item: &str) -> Result<&CatalogEntry, StoreError> {
        self.catalog
            .get(item)
            .ok_or_else(|| StoreError::UnknownItem(item.to_string()))
    }

    /// Where the picture for `item` comes from
    pub fn resolve_image(&self, item: &str) -> Result<ImageSource, StoreError> {
        Ok(self.assets.resolve(self.entry(item)?))
    }

    pub fn load_image(&self, item: &str) -> Result<ImageData, StoreError> {
        Ok(self.assets.load(self.entry(item)?))
    }
}
