//! Infrastructure layer: storage adapters, blob storage, and the RMA service.

pub mod audit;
pub mod blob;
pub mod ledger;
pub mod master_data;
pub mod numbering;
pub mod photos;
pub mod service;
pub mod store;

#[cfg(test)]
mod integration_tests;

pub use audit::AuditTrail;
pub use blob::{BlobError, BlobStore, FsBlobStore, InMemoryBlobStore};
pub use ledger::{InventoryLedger, Reconciliation};
pub use master_data::{InMemoryMasterData, MasterData, PostgresMasterData};
pub use numbering::NumberingAuthority;
pub use photos::PhotoAttachmentManager;
pub use service::{RmaDetails, RmaService, ServiceError, ServiceResult};
pub use store::{FailurePoint, InMemoryStore, PostgresStore, Store, StoreError, StoreResult, UnitOfWork};
