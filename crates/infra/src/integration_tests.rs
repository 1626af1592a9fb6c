//! End-to-end scenarios for the RMA service over the in-memory adapters.
//!
//! Service → Store (unit of work) → Ledger → Audit trail → Blob store
//!
//! Verifies:
//! - Lifecycle events move stock exactly as the rule tables say
//! - Failed operations leave no partial writes (stock, rows, blobs)
//! - Audit failures never fail the primary operation

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};

use rmaledger_core::{ActorId, CustomerId, FixedClock, LocationId, ProductId, RmaId, SupplierId};
use rmaledger_inventory::{Direction, MovementRequest, StockKey};
use rmaledger_returns::{
    HistoryAction, NewRma, PhotoUpload, RmaCategory, RmaFilter, RmaOrigin, RmaPatch, RmaStatus,
};

use crate::blob::InMemoryBlobStore;
use crate::master_data::InMemoryMasterData;
use crate::service::{RmaService, ServiceError};
use crate::store::{FailurePoint, InMemoryStore, PhotoRepository};

struct Fixture {
    service: RmaService<InMemoryStore, InMemoryBlobStore>,
    store: Arc<InMemoryStore>,
    blobs: Arc<InMemoryBlobStore>,
    clock: Arc<FixedClock>,
    master_data: Arc<InMemoryMasterData>,
    key: StockKey,
    customer: CustomerId,
    supplier: SupplierId,
}

fn actor() -> ActorId {
    ActorId::parse("operador-1").unwrap()
}

fn setup() -> Fixture {
    let store = Arc::new(InMemoryStore::new());
    let blobs = Arc::new(InMemoryBlobStore::default());
    let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()));
    let master_data = Arc::new(InMemoryMasterData::new());
    let service = RmaService::new(store.clone(), blobs.clone(), master_data.clone(), clock.clone());
    Fixture {
        service,
        store,
        blobs,
        clock,
        master_data,
        key: StockKey::new(ProductId::new(), LocationId::new()),
        customer: CustomerId::new(),
        supplier: SupplierId::new(),
    }
}

impl Fixture {
    async fn seed_stock(&self, quantity: i64) {
        self.service
            .move_stock(MovementRequest::new(
                self.key,
                quantity,
                Direction::Entrada,
                actor(),
                "estoque inicial",
            ))
            .await
            .unwrap();
    }

    async fn stock(&self) -> i64 {
        self.service
            .stock(self.key.product_id, self.key.location_id)
            .await
            .unwrap()
            .quantity
    }

    fn customer_rma(&self, quantity: i64) -> NewRma {
        NewRma {
            origin: RmaOrigin::Cliente,
            category: RmaCategory::Defeito,
            product_id: self.key.product_id,
            location_id: self.key.location_id,
            customer_id: Some(self.customer),
            supplier_id: None,
            quantity,
            reason: "Tela trincada".to_string(),
            assistance_notes: None,
        }
    }

    fn supplier_rma(&self, quantity: i64) -> NewRma {
        NewRma {
            origin: RmaOrigin::InternoFornecedor,
            category: RmaCategory::Garantia,
            product_id: self.key.product_id,
            location_id: self.key.location_id,
            customer_id: None,
            supplier_id: Some(self.supplier),
            quantity,
            reason: "Lote com defeito de fábrica".to_string(),
            assistance_notes: Some("Enviar para assistência".to_string()),
        }
    }
}

fn png(name: &str) -> PhotoUpload {
    PhotoUpload::new(name, "image/png", vec![0x89, b'P', b'N', b'G', 1, 2, 3])
}

#[tokio::test]
async fn customer_return_deducts_on_creation_and_restores_on_cancel() {
    let f = setup();
    f.seed_stock(10).await;

    let rma = f.service.create_rma(f.customer_rma(3), actor(), Vec::new()).await.unwrap();
    assert_eq!(rma.status, RmaStatus::Pendente);
    assert_eq!(rma.number.to_string(), "RMA2024000001");
    assert_eq!(f.stock().await, 7);
    let opened = f.service.get_history(rma.id).await.unwrap().len();

    let cancelled = f.service.cancel(rma.id, actor()).await.unwrap();
    assert_eq!(cancelled.status, RmaStatus::Cancelado);
    assert_eq!(f.stock().await, 10);

    let history = f.service.get_history(rma.id).await.unwrap();
    assert_eq!(history.len(), opened + 2);
    assert_eq!(
        history[..2].iter().map(|entry| entry.action).collect::<Vec<_>>(),
        vec![HistoryAction::MudancaStatus, HistoryAction::MovimentacaoEstoque]
    );

    let movements = f
        .service
        .movements(f.key.product_id, f.key.location_id)
        .await
        .unwrap();
    assert_eq!(movements.len(), 3);
    assert_eq!(movements[0].direction, Direction::Entrada);
    assert_eq!(movements[0].reason, "Cancelamento do RMA RMA2024000001");
    assert_eq!(movements[0].reference.as_deref(), Some("RMA2024000001"));
    assert_eq!(movements[1].direction, Direction::Saida);
    assert_eq!(movements[1].reason, "Abertura do RMA RMA2024000001");
    assert_eq!(movements[1].quantity_before, 10);
    assert_eq!(movements[1].quantity_after, 7);
    assert_eq!(movements[0].quantity_before, 7);
    assert_eq!(movements[0].quantity_after, 10);
}

#[tokio::test]
async fn supplier_return_adds_stock_only_when_received() {
    let f = setup();
    let rma = f.service.create_rma(f.supplier_rma(5), actor(), Vec::new()).await.unwrap();
    assert_eq!(f.stock().await, 0);

    f.service
        .update_status(rma.id, RmaStatus::EmTransito, actor(), false)
        .await
        .unwrap();
    assert_eq!(f.stock().await, 0);

    f.service
        .update_status(rma.id, RmaStatus::Recebido, actor(), false)
        .await
        .unwrap();
    assert_eq!(f.stock().await, 5);
}

#[tokio::test]
async fn customer_return_cannot_overdraw_stock() {
    let f = setup();
    f.seed_stock(4).await;

    let err = f
        .service
        .create_rma(f.customer_rma(10), actor(), Vec::new())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ServiceError::InsufficientStock {
            available: 4,
            requested: 10
        }
    );
    assert_eq!(f.stock().await, 4);
    assert!(f.service.list_rmas(RmaFilter::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn numbers_are_sequential_and_restart_each_year() {
    let f = setup();
    for expected in ["RMA2024000001", "RMA2024000002", "RMA2024000003"] {
        let rma = f.service.create_rma(f.supplier_rma(1), actor(), Vec::new()).await.unwrap();
        assert_eq!(rma.number.to_string(), expected);
        f.clock.advance(Duration::seconds(1));
    }

    f.clock.set(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 1).unwrap());
    let rma = f.service.create_rma(f.supplier_rma(1), actor(), Vec::new()).await.unwrap();
    assert_eq!(rma.number.to_string(), "RMA2025000001");

    let listed = f.service.list_rmas(RmaFilter::default()).await.unwrap();
    assert_eq!(listed.len(), 4);
    assert_eq!(listed[0].id, rma.id);
}

#[tokio::test]
async fn failed_creation_does_not_consume_a_number() {
    let f = setup();
    f.seed_stock(1).await;
    let _ = f
        .service
        .create_rma(f.customer_rma(2), actor(), Vec::new())
        .await
        .unwrap_err();

    let rma = f.service.create_rma(f.supplier_rma(1), actor(), Vec::new()).await.unwrap();
    assert_eq!(rma.number.to_string(), "RMA2024000001");
}

#[tokio::test]
async fn deleted_case_keeps_its_number_retired() {
    let f = setup();
    let first = f.service.create_rma(f.supplier_rma(1), actor(), Vec::new()).await.unwrap();
    let second = f.service.create_rma(f.supplier_rma(1), actor(), Vec::new()).await.unwrap();
    f.service.cancel(second.id, actor()).await.unwrap();
    f.service.delete(second.id, actor()).await.unwrap();

    let third = f.service.create_rma(f.supplier_rma(1), actor(), Vec::new()).await.unwrap();
    assert_eq!(first.number.to_string(), "RMA2024000001");
    assert_eq!(second.number.to_string(), "RMA2024000002");
    assert_eq!(third.number.to_string(), "RMA2024000003");

    // the cancel restock of the deleted case still references its own number
    let references: Vec<Option<String>> = f
        .service
        .movements(f.key.product_id, f.key.location_id)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.reference)
        .collect();
    assert_eq!(references, vec![Some("RMA2024000002".to_string())]);
}

#[tokio::test]
async fn only_cancelled_cases_can_be_deleted() {
    let f = setup();
    f.seed_stock(10).await;
    let rma = f
        .service
        .create_rma(f.customer_rma(2), actor(), vec![png("frente.png")])
        .await
        .unwrap();
    assert_eq!(f.blobs.len(), 1);

    let err = f.service.delete(rma.id, actor()).await.unwrap_err();
    assert_eq!(
        err,
        ServiceError::InvalidDeleteState {
            status: "pendente".to_string()
        }
    );

    f.service.cancel(rma.id, actor()).await.unwrap();
    f.service.delete(rma.id, actor()).await.unwrap();

    assert!(matches!(
        f.service.get_rma(rma.id).await.unwrap_err(),
        ServiceError::NotFound(_)
    ));
    assert!(f.store.photos(rma.id).await.unwrap().is_empty());
    assert!(f.blobs.is_empty());
    // the ledger is append-only and survives the deletion
    assert_eq!(f.stock().await, 10);
    let movements = f
        .service
        .movements(f.key.product_id, f.key.location_id)
        .await
        .unwrap();
    assert_eq!(movements.len(), 3);
}

#[tokio::test]
async fn statuses_without_a_rule_move_nothing() {
    let f = setup();
    f.seed_stock(10).await;
    let rma = f.service.create_rma(f.customer_rma(3), actor(), Vec::new()).await.unwrap();

    f.service
        .update_status(rma.id, RmaStatus::Recebido, actor(), false)
        .await
        .unwrap();
    assert_eq!(f.stock().await, 7);

    f.service
        .update_status(rma.id, RmaStatus::Concluido, actor(), false)
        .await
        .unwrap();
    assert_eq!(f.stock().await, 7);
}

#[tokio::test]
async fn concluding_with_return_to_stock_restocks() {
    let f = setup();
    f.seed_stock(10).await;
    let rma = f.service.create_rma(f.customer_rma(3), actor(), Vec::new()).await.unwrap();

    f.service
        .update_status(rma.id, RmaStatus::Concluido, actor(), true)
        .await
        .unwrap();
    assert_eq!(f.stock().await, 10);
}

#[tokio::test]
async fn same_status_is_a_no_op() {
    let f = setup();
    let rma = f.service.create_rma(f.supplier_rma(2), actor(), Vec::new()).await.unwrap();
    f.service
        .update_status(rma.id, RmaStatus::Recebido, actor(), false)
        .await
        .unwrap();
    let history_before = f.service.get_history(rma.id).await.unwrap().len();

    let again = f
        .service
        .update_status(rma.id, RmaStatus::Recebido, actor(), false)
        .await
        .unwrap();
    assert_eq!(again.status, RmaStatus::Recebido);
    assert_eq!(f.stock().await, 2);
    assert_eq!(f.service.get_history(rma.id).await.unwrap().len(), history_before);
}

#[tokio::test]
async fn cancelled_case_is_frozen() {
    let f = setup();
    f.seed_stock(10).await;
    let rma = f.service.create_rma(f.customer_rma(3), actor(), Vec::new()).await.unwrap();
    f.service.cancel(rma.id, actor()).await.unwrap();

    assert_eq!(
        f.service.cancel(rma.id, actor()).await.unwrap_err(),
        ServiceError::AlreadyCancelled
    );
    assert_eq!(
        f.service
            .update_status(rma.id, RmaStatus::Aprovado, actor(), false)
            .await
            .unwrap_err(),
        ServiceError::AlreadyCancelled
    );
    assert_eq!(
        f.service.return_to_stock(rma.id, actor(), None).await.unwrap_err(),
        ServiceError::AlreadyCancelled
    );
    assert_eq!(f.stock().await, 10);
}

#[tokio::test]
async fn return_to_stock_adds_the_case_quantity() {
    let f = setup();
    f.seed_stock(10).await;
    let rma = f.service.create_rma(f.customer_rma(3), actor(), Vec::new()).await.unwrap();

    let result = f.service.return_to_stock(rma.id, actor(), None).await.unwrap();
    assert_eq!(result.movement.quantity_before, 7);
    assert_eq!(result.movement.quantity_after, 10);
    assert_eq!(result.movement.reason, "Devolução ao estoque");
    assert_eq!(result.movement.rma_id, Some(rma.id));

    let custom = f
        .service
        .return_to_stock(rma.id, actor(), Some("Reparo concluído".to_string()))
        .await
        .unwrap();
    assert_eq!(custom.record.quantity, 13);
    assert_eq!(custom.movement.reason, "Reparo concluído");
}

#[tokio::test]
async fn update_fields_records_before_and_after() {
    let f = setup();
    let rma = f.service.create_rma(f.supplier_rma(1), actor(), Vec::new()).await.unwrap();

    let patch = RmaPatch {
        category: Some(RmaCategory::Avaria),
        assistance_notes: Some(String::new()),
        ..RmaPatch::default()
    };
    let updated = f.service.update_fields(rma.id, patch, actor()).await.unwrap();
    assert_eq!(updated.category, RmaCategory::Avaria);
    assert_eq!(updated.assistance_notes, None);
    assert_eq!(updated.quantity, rma.quantity);

    let history = f.service.get_history(rma.id).await.unwrap();
    let entry = &history[0];
    assert_eq!(entry.action, HistoryAction::Atualizacao);
    assert_eq!(entry.before.as_ref().unwrap()["category"], "garantia");
    assert_eq!(entry.after.as_ref().unwrap()["category"], "avaria");

    let swapped = RmaPatch {
        customer_id: Some(f.customer),
        ..RmaPatch::default()
    };
    assert!(matches!(
        f.service.update_fields(rma.id, swapped, actor()).await.unwrap_err(),
        ServiceError::Validation(_)
    ));
}

#[tokio::test]
async fn history_is_newest_first_and_includes_ledger_rows() {
    let f = setup();
    f.seed_stock(10).await;
    let rma = f.service.create_rma(f.customer_rma(3), actor(), Vec::new()).await.unwrap();
    f.clock.advance(Duration::minutes(1));
    f.service
        .update_status(rma.id, RmaStatus::EmAnalise, actor(), false)
        .await
        .unwrap();

    let actions: Vec<HistoryAction> = f
        .service
        .get_history(rma.id)
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.action)
        .collect();
    assert_eq!(
        actions,
        vec![
            HistoryAction::MudancaStatus,
            HistoryAction::MovimentacaoEstoque,
            HistoryAction::Criacao,
        ]
    );
}

#[tokio::test]
async fn audit_failures_do_not_fail_the_operation() {
    let f = setup();
    f.store.fail_on(FailurePoint::HistoryAppend);

    let rma = f.service.create_rma(f.supplier_rma(2), actor(), Vec::new()).await.unwrap();
    f.service
        .update_status(rma.id, RmaStatus::Recebido, actor(), false)
        .await
        .unwrap();
    assert_eq!(f.stock().await, 2);

    // only the rows written inside the commits are present
    let history = f.service.get_history(rma.id).await.unwrap();
    assert_eq!(
        history.iter().map(|entry| entry.action).collect::<Vec<_>>(),
        vec![HistoryAction::MovimentacaoEstoque, HistoryAction::Criacao]
    );
}

#[tokio::test]
async fn invalid_photo_rejects_the_whole_batch_before_upload() {
    let f = setup();
    f.seed_stock(10).await;
    let files = vec![
        png("ok.png"),
        PhotoUpload::new("nota.pdf", "application/pdf", vec![1, 2, 3]),
    ];

    let err = f
        .service
        .create_rma(f.customer_rma(1), actor(), files)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
    assert!(f.blobs.is_empty());
    assert_eq!(f.stock().await, 10);
    assert!(f.service.list_rmas(RmaFilter::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_upload_discards_the_partial_batch() {
    let f = setup();
    let rma = f.service.create_rma(f.supplier_rma(1), actor(), Vec::new()).await.unwrap();
    f.blobs.fail_uploads_after(1);

    let err = f
        .service
        .attach_photos(rma.id, vec![png("a.png"), png("b.png")], actor())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Storage(_)));
    assert!(f.blobs.is_empty());
    assert!(f.service.get_photos(rma.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_photo_rows_roll_back_creation_and_blobs() {
    let f = setup();
    f.seed_stock(10).await;
    f.store.fail_on(FailurePoint::PhotoInsert);

    let err = f
        .service
        .create_rma(f.customer_rma(2), actor(), vec![png("a.png"), png("b.png")])
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Storage(_)));
    assert!(f.blobs.is_empty());
    assert_eq!(f.stock().await, 10);
    assert!(f.service.list_rmas(RmaFilter::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn photos_can_be_attached_listed_and_removed() {
    let f = setup();
    let rma = f.service.create_rma(f.supplier_rma(1), actor(), Vec::new()).await.unwrap();

    let photos = f
        .service
        .attach_photos(rma.id, vec![png("a.png"), png("b.png")], actor())
        .await
        .unwrap();
    assert_eq!(photos.len(), 2);
    assert!(photos.iter().all(|p| p.url.starts_with("/files/")));
    assert!(photos.iter().all(|p| p.storage_key.ends_with(".png")));
    assert_eq!(f.service.get_photos(rma.id).await.unwrap().len(), 2);

    let history = f.service.get_history(rma.id).await.unwrap();
    assert_eq!(history[0].action, HistoryAction::AdicaoFoto);
    assert_eq!(history[0].description, "2 fotos adicionadas");

    f.service.remove_photo(photos[0].id, actor()).await.unwrap();
    assert!(!f.blobs.contains(&photos[0].storage_key));
    assert!(f.blobs.contains(&photos[1].storage_key));
    assert_eq!(f.service.get_photos(rma.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn missing_cases_report_not_found() {
    let f = setup();
    let missing = RmaId::new();
    assert!(matches!(
        f.service.get_history(missing).await.unwrap_err(),
        ServiceError::NotFound(_)
    ));
    assert!(matches!(
        f.service.get_photos(missing).await.unwrap_err(),
        ServiceError::NotFound(_)
    ));
    assert!(matches!(
        f.service
            .attach_photos(missing, vec![png("a.png")], actor())
            .await
            .unwrap_err(),
        ServiceError::NotFound(_)
    ));
    assert!(f.blobs.is_empty());
}

#[tokio::test]
async fn details_resolve_display_names() {
    let f = setup();
    f.master_data.add_product(f.key.product_id, "Smartphone X");
    f.master_data.add_location(f.key.location_id, "Loja Centro");
    f.master_data.add_supplier(f.supplier, "Distribuidora Sul");
    let rma = f.service.create_rma(f.supplier_rma(1), actor(), Vec::new()).await.unwrap();

    let details = f.service.get_rma_details(rma.id).await.unwrap();
    assert_eq!(details.product_name.as_deref(), Some("Smartphone X"));
    assert_eq!(details.location_name.as_deref(), Some("Loja Centro"));
    assert_eq!(details.supplier_name.as_deref(), Some("Distribuidora Sul"));
    assert_eq!(details.customer_name, None);
}

#[tokio::test]
async fn ledger_reconciles_after_a_full_lifecycle() {
    let f = setup();
    f.seed_stock(10).await;
    let first = f.service.create_rma(f.customer_rma(3), actor(), Vec::new()).await.unwrap();
    let second = f.service.create_rma(f.customer_rma(4), actor(), Vec::new()).await.unwrap();
    f.service.cancel(first.id, actor()).await.unwrap();
    f.service
        .update_status(second.id, RmaStatus::Concluido, actor(), true)
        .await
        .unwrap();
    let _ = f.service.create_rma(f.customer_rma(50), actor(), Vec::new()).await;

    let check = f
        .service
        .reconcile(f.key.product_id, f.key.location_id)
        .await
        .unwrap();
    assert!(check.is_consistent());
    assert_eq!(check.recorded, 10);
}
