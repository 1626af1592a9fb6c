//! Service wiring: picks the storage back-ends from configuration.

use std::sync::Arc;

use anyhow::Context;

use rmaledger_core::{Clock, SystemClock};
use rmaledger_infra::{
    BlobStore, FsBlobStore, InMemoryBlobStore, InMemoryMasterData, InMemoryStore, MasterData,
    PostgresMasterData, PostgresStore, RmaService, Store,
};

use crate::config::AppConfig;

/// The RMA service over type-erased back-ends, so one router serves both the
/// in-memory and the Postgres wiring.
pub type DynRmaService = RmaService<dyn Store, dyn BlobStore>;

#[derive(Clone)]
pub struct AppServices {
    pub rmas: DynRmaService,
    pub storage: &'static str,
}

impl AppServices {
    /// Everything in memory, on the wall clock.
    pub fn in_memory(blob_base_url: impl Into<String>) -> Self {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let blobs: Arc<dyn BlobStore> = Arc::new(InMemoryBlobStore::new(blob_base_url));
        let master_data: Arc<dyn MasterData> = Arc::new(InMemoryMasterData::new());
        Self::assemble(store, blobs, master_data, "memory")
    }

    fn assemble(
        store: Arc<dyn Store>,
        blobs: Arc<dyn BlobStore>,
        master_data: Arc<dyn MasterData>,
        storage: &'static str,
    ) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            rmas: RmaService::new(store, blobs, master_data, clock),
            storage,
        }
    }
}

pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let blobs: Arc<dyn BlobStore> = match &config.blob_dir {
        Some(dir) => Arc::new(
            FsBlobStore::open(dir.clone(), config.blob_public_base_url.clone())
                .await
                .with_context(|| format!("failed to open blob directory {}", dir.display()))?,
        ),
        None => {
            tracing::warn!("BLOB_DIR not set; photo bytes are kept in memory");
            Arc::new(InMemoryBlobStore::new(config.blob_public_base_url.clone()))
        }
    };

    let Some(database_url) = &config.database_url else {
        tracing::warn!("DATABASE_URL not set; using in-memory stores (data is lost on restart)");
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let master_data: Arc<dyn MasterData> = Arc::new(InMemoryMasterData::new());
        return Ok(AppServices::assemble(store, blobs, master_data, "memory"));
    };

    let postgres = PostgresStore::connect(database_url, config.db_max_connections)
        .await
        .context("failed to connect to Postgres")?;
    postgres.migrate().await.context("failed to apply schema")?;
    tracing::info!(max_connections = config.db_max_connections, "connected to Postgres");

    let master_data: Arc<dyn MasterData> = Arc::new(PostgresMasterData::new(postgres.pool().clone()));
    let store: Arc<dyn Store> = Arc::new(postgres);
    Ok(AppServices::assemble(store, blobs, master_data, "postgres"))
}
