//! Read-only lookups of products, locations, customers and suppliers.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use rmaledger_core::{CustomerId, LocationId, ProductId, SupplierId};

use crate::store::postgres::map_sqlx_error;
use crate::store::{StoreError, StoreResult};

#[async_trait::async_trait]
pub trait MasterData: Send + Sync {
    async fn product_name(&self, id: ProductId) -> StoreResult<Option<String>>;
    async fn location_name(&self, id: LocationId) -> StoreResult<Option<String>>;
    async fn customer_name(&self, id: CustomerId) -> StoreResult<Option<String>>;
    async fn supplier_name(&self, id: SupplierId) -> StoreResult<Option<String>>;
}

#[derive(Debug, Default)]
struct Names {
    products: HashMap<ProductId, String>,
    locations: HashMap<LocationId, String>,
    customers: HashMap<CustomerId, String>,
    suppliers: HashMap<SupplierId, String>,
}

/// In-memory master data for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryMasterData {
    names: RwLock<Names>,
}

impl InMemoryMasterData {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Names) -> R) -> StoreResult<R> {
        let mut names = self
            .names
            .write()
            .map_err(|_| StoreError::Storage("lock poisoned".to_string()))?;
        Ok(f(&mut names))
    }

    pub fn add_product(&self, id: ProductId, name: impl Into<String>) {
        let name = name.into();
        let _ = self.with(|n| n.products.insert(id, name));
    }

    pub fn add_location(&self, id: LocationId, name: impl Into<String>) {
        let name = name.into();
        let _ = self.with(|n| n.locations.insert(id, name));
    }

    pub fn add_customer(&self, id: CustomerId, name: impl Into<String>) {
        let name = name.into();
        let _ = self.with(|n| n.customers.insert(id, name));
    }

    pub fn add_supplier(&self, id: SupplierId, name: impl Into<String>) {
        let name = name.into();
        let _ = self.with(|n| n.suppliers.insert(id, name));
    }
}

#[async_trait::async_trait]
impl MasterData for InMemoryMasterData {
    async fn product_name(&self, id: ProductId) -> StoreResult<Option<String>> {
        self.with(|n| n.products.get(&id).cloned())
    }

    async fn location_name(&self, id: LocationId) -> StoreResult<Option<String>> {
        self.with(|n| n.locations.get(&id).cloned())
    }

    async fn customer_name(&self, id: CustomerId) -> StoreResult<Option<String>> {
        self.with(|n| n.customers.get(&id).cloned())
    }

    async fn supplier_name(&self, id: SupplierId) -> StoreResult<Option<String>> {
        self.with(|n| n.suppliers.get(&id).cloned())
    }
}

/// Master data read from the `produtos`, `lojas`, `clientes` and `fornecedores` tables.
#[derive(Debug, Clone)]
pub struct PostgresMasterData {
    pool: Arc<PgPool>,
}

impl PostgresMasterData {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    async fn name(&self, table: &'static str, id: Uuid) -> StoreResult<Option<String>> {
        sqlx::query_scalar(&format!("SELECT nome FROM {table} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(table, e))
    }
}

#[async_trait::async_trait]
impl MasterData for PostgresMasterData {
    #[instrument(skip(self), err)]
    async fn product_name(&self, id: ProductId) -> StoreResult<Option<String>> {
        self.name("produtos", id.into()).await
    }

    #[instrument(skip(self), err)]
    async fn location_name(&self, id: LocationId) -> StoreResult<Option<String>> {
        self.name("lojas", id.into()).await
    }

    #[instrument(skip(self), err)]
    async fn customer_name(&self, id: CustomerId) -> StoreResult<Option<String>> {
        self.name("clientes", id.into()).await
    }

    #[instrument(skip(self), err)]
    async fn supplier_name(&self, id: SupplierId) -> StoreResult<Option<String>> {
        self.name("fornecedores", id.into()).await
    }
}
