//! Postgres-backed store.
//!
//! Every [`UnitOfWork`] runs in one transaction. Inventory rows are locked
//! with `SELECT ... FOR UPDATE` before the floor check, and RMA updates carry
//! the status they were read with, so two concurrent cancels cannot both
//! restock.
//!
//! ## Error Mapping
//!
//! | PostgreSQL Error Code | StoreError | Scenario |
//! |----------------------|------------|----------|
//! | `23505` on `rmas_numero_rma_key` | `DuplicateNumber` | Two creations raced for the same number |
//! | `23505` (other) | `Conflict` | Duplicate primary key |
//! | `23503` | `NotFound` | History/photo row for a missing RMA |
//! | `23514` | `Conflict` | Check constraint (stock floor, counterpart) |
//! | Any other | `Storage` | Network errors, pool closed, etc. |

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgExecutor, PgPool, Postgres, Row, Transaction};
use tracing::{Span, instrument};
use uuid::Uuid;

use rmaledger_core::{
    ActorId, CustomerId, HistoryEntryId, LocationId, MovementId, PhotoId, ProductId, RmaId,
    SupplierId,
};
use rmaledger_inventory::{
    Direction, InventoryRecord, Movement, MovementRequest, MovementResult, StockKey,
};
use rmaledger_returns::{
    HistoryAction, HistoryEntry, NewHistoryEntry, Photo, Rma, RmaCategory, RmaFilter, RmaNumber,
    RmaOrigin, RmaStatus,
};

use super::r#trait::{
    CommitOutcome, HistoryRepository, LedgerRepository, PhotoRepository, RmaRepository, RmaWrite,
    Store, StoreError, StoreResult, UnitOfWork,
};

const SCHEMA: &str = include_str!("../../migrations/0001_rma_ledger.sql");

const RMA_COLUMNS: &str = r#"
    id, numero_rma, tipo_origem, tipo_rma, status, produto_id, loja_id,
    cliente_id, fornecedor_id, quantidade, motivo, observacoes_assistencia,
    criado_por, criado_em, atualizado_por, atualizado_em
"#;

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the bundled schema. Idempotent.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// Transaction steps

async fn insert_rma(tx: &mut Transaction<'_, Postgres>, rma: &Rma) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO rmas (
            id, numero_rma, tipo_origem, tipo_rma, status, produto_id, loja_id,
            cliente_id, fornecedor_id, quantidade, motivo, observacoes_assistencia,
            criado_por, criado_em, atualizado_por, atualizado_em
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        "#,
    )
    .bind(rma.id.as_uuid())
    .bind(rma.number.to_string())
    .bind(rma.origin.as_str())
    .bind(rma.category.as_str())
    .bind(rma.status.as_str())
    .bind(rma.product_id.as_uuid())
    .bind(rma.location_id.as_uuid())
    .bind(rma.customer_id.map(Uuid::from))
    .bind(rma.supplier_id.map(Uuid::from))
    .bind(rma.quantity)
    .bind(&rma.reason)
    .bind(rma.assistance_notes.as_deref())
    .bind(rma.created_by.as_str())
    .bind(rma.created_at)
    .bind(rma.updated_by.as_str())
    .bind(rma.updated_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e, Some("rmas_numero_rma_key")) {
            StoreError::DuplicateNumber(rma.number.to_string())
        } else {
            map_sqlx_error("insert_rma", e)
        }
    })?;

    sqlx::query(
        r#"
        INSERT INTO rma_numeracao (ano, ultimo)
        VALUES ($1, $2)
        ON CONFLICT (ano) DO UPDATE SET ultimo = GREATEST(rma_numeracao.ultimo, EXCLUDED.ultimo)
        "#,
    )
    .bind(rma.number.year())
    .bind(rma.number.sequence() as i32)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("bump_rma_numeracao", e))?;
    Ok(())
}

async fn update_rma(
    tx: &mut Transaction<'_, Postgres>,
    rma: &Rma,
    expected_status: RmaStatus,
) -> StoreResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE rmas SET
            tipo_rma = $3,
            status = $4,
            cliente_id = $5,
            fornecedor_id = $6,
            motivo = $7,
            observacoes_assistencia = $8,
            atualizado_por = $9,
            atualizado_em = $10
        WHERE id = $1 AND status = $2
        "#,
    )
    .bind(rma.id.as_uuid())
    .bind(expected_status.as_str())
    .bind(rma.category.as_str())
    .bind(rma.status.as_str())
    .bind(rma.customer_id.map(Uuid::from))
    .bind(rma.supplier_id.map(Uuid::from))
    .bind(&rma.reason)
    .bind(rma.assistance_notes.as_deref())
    .bind(rma.updated_by.as_str())
    .bind(rma.updated_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("update_rma", e))?;

    if result.rows_affected() == 1 {
        return Ok(());
    }

    let current: Option<String> = sqlx::query_scalar("SELECT status FROM rmas WHERE id = $1")
        .bind(rma.id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("update_rma_status_check", e))?;

    match current {
        None => Err(StoreError::NotFound(format!("rma {}", rma.id))),
        Some(status) => Err(StoreError::Conflict(format!(
            "rma {} is '{status}', expected '{expected_status}'",
            rma.id
        ))),
    }
}

async fn apply_movement(
    tx: &mut Transaction<'_, Postgres>,
    request: &MovementRequest,
    at: DateTime<Utc>,
) -> StoreResult<MovementResult> {
    request.validate()?;

    sqlx::query(
        r#"
        INSERT INTO estoque (produto_id, loja_id, quantidade)
        VALUES ($1, $2, 0)
        ON CONFLICT (produto_id, loja_id) DO NOTHING
        "#,
    )
    .bind(request.product_id.as_uuid())
    .bind(request.location_id.as_uuid())
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("ensure_inventory_row", e))?;

    let row = sqlx::query(
        r#"
        SELECT produto_id, loja_id, quantidade, atualizado_por, atualizado_em
        FROM estoque
        WHERE produto_id = $1 AND loja_id = $2
        FOR UPDATE
        "#,
    )
    .bind(request.product_id.as_uuid())
    .bind(request.location_id.as_uuid())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("lock_inventory_row", e))?;

    let current = decode::<InventoryRow>(&row, "estoque")?.into_record()?;
    let (record, movement) = request.apply_to(&current, MovementId::new(), at)?;

    sqlx::query(
        r#"
        UPDATE estoque
        SET quantidade = $3, atualizado_por = $4, atualizado_em = $5
        WHERE produto_id = $1 AND loja_id = $2
        "#,
    )
    .bind(record.product_id.as_uuid())
    .bind(record.location_id.as_uuid())
    .bind(record.quantity)
    .bind(record.updated_by.as_ref().map(ActorId::as_str))
    .bind(record.updated_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("update_inventory", e))?;

    sqlx::query(
        r#"
        INSERT INTO movimentacoes_estoque (
            id, produto_id, loja_id, usuario_id, quantidade, tipo,
            quantidade_anterior, quantidade_nova, motivo, referencia, rma_id, criado_em
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(movement.id.as_uuid())
    .bind(movement.product_id.as_uuid())
    .bind(movement.location_id.as_uuid())
    .bind(movement.actor.as_str())
    .bind(movement.quantity)
    .bind(movement.direction.as_str())
    .bind(movement.quantity_before)
    .bind(movement.quantity_after)
    .bind(&movement.reason)
    .bind(movement.reference.as_deref())
    .bind(movement.rma_id.map(Uuid::from))
    .bind(movement.created_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_movement", e))?;

    if let Some(entry) = NewHistoryEntry::stock_movement(&movement) {
        insert_history(&mut **tx, &entry.into_entry(HistoryEntryId::new(), at)).await?;
    }

    Ok(MovementResult { record, movement })
}

async fn insert_history<'e>(executor: impl PgExecutor<'e>, entry: &HistoryEntry) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO rma_historico (
            id, rma_id, acao, descricao, dados_anteriores, dados_novos, usuario_id, criado_em
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(entry.id.as_uuid())
    .bind(entry.rma_id.as_uuid())
    .bind(entry.action.as_str())
    .bind(&entry.description)
    .bind(&entry.before)
    .bind(&entry.after)
    .bind(entry.actor.as_str())
    .bind(entry.created_at)
    .execute(executor)
    .await
    .map_err(|e| map_sqlx_error("insert_history", e))?;
    Ok(())
}

async fn insert_photo(tx: &mut Transaction<'_, Postgres>, photo: &Photo) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO rma_fotos (
            id, rma_id, storage_key, url, nome_arquivo, tamanho_bytes, enviado_por, criado_em
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(photo.id.as_uuid())
    .bind(photo.rma_id.as_uuid())
    .bind(&photo.storage_key)
    .bind(&photo.url)
    .bind(&photo.file_name)
    .bind(photo.size_bytes)
    .bind(photo.uploaded_by.as_str())
    .bind(photo.created_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_photo", e))?;
    Ok(())
}

/// `%term%` for ILIKE, with LIKE metacharacters escaped.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[async_trait::async_trait]
impl RmaRepository for PostgresStore {
    #[instrument(skip(self), fields(rma_id = %id), err)]
    async fn get_rma(&self, id: RmaId) -> StoreResult<Option<Rma>> {
        let row = sqlx::query(&format!("SELECT {RMA_COLUMNS} FROM rmas WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_rma", e))?;

        row.map(|row| decode::<RmaRow>(&row, "rmas")?.into_rma())
            .transpose()
    }

    #[instrument(skip(self, filter), fields(row_count = tracing::field::Empty), err)]
    async fn list_rmas(&self, filter: &RmaFilter) -> StoreResult<Vec<Rma>> {
        let search: Option<String> = filter.search_term().map(like_pattern);
        let date_from: Option<NaiveDate> = filter.date_from;
        let date_to: Option<NaiveDate> = filter.date_to;

        let rows = sqlx::query(&format!(
            r#"
            SELECT {RMA_COLUMNS}
            FROM rmas
            WHERE ($1::text IS NULL OR tipo_origem = $1)
                AND ($2::text IS NULL OR status = $2)
                AND ($3::uuid IS NULL OR loja_id = $3)
                AND ($4::uuid IS NULL OR cliente_id = $4)
                AND ($5::uuid IS NULL OR fornecedor_id = $5)
                AND ($6::date IS NULL OR (criado_em AT TIME ZONE 'UTC')::date >= $6)
                AND ($7::date IS NULL OR (criado_em AT TIME ZONE 'UTC')::date <= $7)
                AND ($8::text IS NULL
                    OR numero_rma ILIKE $8
                    OR motivo ILIKE $8
                    OR observacoes_assistencia ILIKE $8)
            ORDER BY criado_em DESC, numero_rma DESC
            "#
        ))
        .bind(filter.origin.map(|o| o.as_str()))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.location_id.map(Uuid::from))
        .bind(filter.customer_id.map(Uuid::from))
        .bind(filter.supplier_id.map(Uuid::from))
        .bind(date_from)
        .bind(date_to)
        .bind(search)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_rmas", e))?;

        Span::current().record("row_count", rows.len());
        rows.iter()
            .map(|row| decode::<RmaRow>(row, "rmas")?.into_rma())
            .collect()
    }

    #[instrument(skip(self), err)]
    async fn latest_number(&self, year: i32) -> StoreResult<Option<RmaNumber>> {
        let latest: Option<i32> =
            sqlx::query_scalar("SELECT ultimo FROM rma_numeracao WHERE ano = $1")
                .bind(year)
                .fetch_optional(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("latest_number", e))?;

        latest
            .map(|ultimo| -> StoreResult<RmaNumber> {
                let sequence = u32::try_from(ultimo).map_err(|_| {
                    StoreError::Storage(format!("corrupt rma_numeracao for {year}: {ultimo}"))
                })?;
                Ok(RmaNumber::new(year, sequence)?)
            })
            .transpose()
    }

    #[instrument(skip(self), fields(rma_id = %id), err)]
    async fn delete_rma(&self, id: RmaId) -> StoreResult<Vec<Photo>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let rows = sqlx::query(
            r#"
            SELECT id, rma_id, storage_key, url, nome_arquivo, tamanho_bytes, enviado_por, criado_em
            FROM rma_fotos
            WHERE rma_id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("delete_rma_photos", e))?;
        let photos = rows
            .iter()
            .map(|row| decode::<PhotoRow>(row, "rma_fotos")?.into_photo())
            .collect::<StoreResult<Vec<_>>>()?;

        let deleted = sqlx::query("DELETE FROM rmas WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_rma", e))?;
        if deleted.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("rma {id}")));
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(photos)
    }
}

#[async_trait::async_trait]
impl LedgerRepository for PostgresStore {
    #[instrument(skip(self), fields(product_id = %key.product_id, location_id = %key.location_id), err)]
    async fn inventory(&self, key: StockKey) -> StoreResult<InventoryRecord> {
        let row = sqlx::query(
            r#"
            SELECT produto_id, loja_id, quantidade, atualizado_por, atualizado_em
            FROM estoque
            WHERE produto_id = $1 AND loja_id = $2
            "#,
        )
        .bind(key.product_id.as_uuid())
        .bind(key.location_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("inventory", e))?;

        match row {
            Some(row) => decode::<InventoryRow>(&row, "estoque")?.into_record(),
            None => Ok(InventoryRecord::empty(key)),
        }
    }

    #[instrument(skip(self), fields(product_id = %key.product_id, location_id = %key.location_id), err)]
    async fn movements(&self, key: StockKey) -> StoreResult<Vec<Movement>> {
        let rows = sqlx::query(
            r#"
            SELECT
                id, produto_id, loja_id, usuario_id, quantidade, tipo,
                quantidade_anterior, quantidade_nova, motivo, referencia, rma_id, criado_em
            FROM movimentacoes_estoque
            WHERE produto_id = $1 AND loja_id = $2
            ORDER BY criado_em DESC, id DESC
            "#,
        )
        .bind(key.product_id.as_uuid())
        .bind(key.location_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("movements", e))?;

        rows.iter()
            .map(|row| decode::<MovementRow>(row, "movimentacoes_estoque")?.into_movement())
            .collect()
    }
}

#[async_trait::async_trait]
impl HistoryRepository for PostgresStore {
    #[instrument(skip(self, entry), fields(rma_id = %entry.rma_id, action = entry.action.as_str()), err)]
    async fn append_history(&self, entry: HistoryEntry) -> StoreResult<()> {
        insert_history(&*self.pool, &entry).await
    }

    #[instrument(skip(self), fields(rma_id = %rma_id), err)]
    async fn history(&self, rma_id: RmaId) -> StoreResult<Vec<HistoryEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, rma_id, acao, descricao, dados_anteriores, dados_novos, usuario_id, criado_em
            FROM rma_historico
            WHERE rma_id = $1
            ORDER BY criado_em DESC, id DESC
            "#,
        )
        .bind(rma_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("history", e))?;

        rows.iter()
            .map(|row| decode::<HistoryRow>(row, "rma_historico")?.into_entry())
            .collect()
    }
}

#[async_trait::async_trait]
impl PhotoRepository for PostgresStore {
    #[instrument(skip(self), fields(rma_id = %rma_id), err)]
    async fn photos(&self, rma_id: RmaId) -> StoreResult<Vec<Photo>> {
        let rows = sqlx::query(
            r#"
            SELECT id, rma_id, storage_key, url, nome_arquivo, tamanho_bytes, enviado_por, criado_em
            FROM rma_fotos
            WHERE rma_id = $1
            ORDER BY criado_em DESC, id DESC
            "#,
        )
        .bind(rma_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("photos", e))?;

        rows.iter()
            .map(|row| decode::<PhotoRow>(row, "rma_fotos")?.into_photo())
            .collect()
    }

    #[instrument(skip(self), fields(photo_id = %id), err)]
    async fn photo(&self, id: PhotoId) -> StoreResult<Option<Photo>> {
        let row = sqlx::query(
            r#"
            SELECT id, rma_id, storage_key, url, nome_arquivo, tamanho_bytes, enviado_por, criado_em
            FROM rma_fotos
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("photo", e))?;

        row.map(|row| decode::<PhotoRow>(&row, "rma_fotos")?.into_photo())
            .transpose()
    }

    #[instrument(skip(self), fields(photo_id = %id), err)]
    async fn delete_photo(&self, id: PhotoId) -> StoreResult<()> {
        let deleted = sqlx::query("DELETE FROM rma_fotos WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_photo", e))?;
        if deleted.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("photo {id}")));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Store for PostgresStore {
    #[instrument(
        skip(self, work),
        fields(
            rma_write = work.rma.is_some(),
            movement_count = work.movements.len(),
            photo_count = work.photos.len()
        ),
        err
    )]
    async fn commit(&self, work: UnitOfWork) -> StoreResult<CommitOutcome> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        match &work.rma {
            Some(RmaWrite::Insert(rma)) => insert_rma(&mut tx, rma).await?,
            Some(RmaWrite::Update { rma, expected_status }) => {
                update_rma(&mut tx, rma, *expected_status).await?
            }
            None => {}
        }

        for entry in &work.history {
            let row = entry.clone().into_entry(HistoryEntryId::new(), work.at);
            insert_history(&mut *tx, &row).await?;
        }

        let mut outcome = CommitOutcome::default();
        for request in &work.movements {
            outcome
                .movements
                .push(apply_movement(&mut tx, request, work.at).await?);
        }

        for photo in &work.photos {
            insert_photo(&mut tx, photo).await?;
        }

        // Dropping `tx` on any early return above rolls the whole unit back.
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(outcome)
    }
}

/// Map SQLx errors to StoreError.
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some("23503") => StoreError::NotFound(msg),
                Some("23514") => StoreError::Conflict(msg),
                _ => StoreError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Storage(format!("connection pool closed in {operation}"))
        }
        sqlx::Error::RowNotFound => {
            StoreError::NotFound(format!("unexpected row not found in {operation}"))
        }
        _ => StoreError::Storage(format!("sqlx error in {operation}: {err}")),
    }
}

/// Check if an error is a unique constraint violation (optionally on a given constraint).
fn is_unique_violation(err: &sqlx::Error, constraint: Option<&str>) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if db_err.code().as_deref() == Some("23505") {
            return constraint.is_none() || db_err.constraint() == constraint;
        }
    }
    false
}

fn decode<'r, T>(row: &'r PgRow, table: &str) -> StoreResult<T>
where
    T: FromRow<'r, PgRow>,
{
    T::from_row(row).map_err(|e| StoreError::Storage(format!("failed to deserialize {table} row: {e}")))
}

fn corrupt(table: &str, err: impl core::fmt::Display) -> StoreError {
    StoreError::Storage(format!("corrupt {table} row: {err}"))
}

// SQLx row types

#[derive(Debug)]
struct RmaRow {
    id: Uuid,
    numero_rma: String,
    tipo_origem: String,
    tipo_rma: String,
    status: String,
    produto_id: Uuid,
    loja_id: Uuid,
    cliente_id: Option<Uuid>,
    fornecedor_id: Option<Uuid>,
    quantidade: i64,
    motivo: String,
    observacoes_assistencia: Option<String>,
    criado_por: String,
    criado_em: DateTime<Utc>,
    atualizado_por: String,
    atualizado_em: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for RmaRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(RmaRow {
            id: row.try_get("id")?,
            numero_rma: row.try_get("numero_rma")?,
            tipo_origem: row.try_get("tipo_origem")?,
            tipo_rma: row.try_get("tipo_rma")?,
            status: row.try_get("status")?,
            produto_id: row.try_get("produto_id")?,
            loja_id: row.try_get("loja_id")?,
            cliente_id: row.try_get("cliente_id")?,
            fornecedor_id: row.try_get("fornecedor_id")?,
            quantidade: row.try_get("quantidade")?,
            motivo: row.try_get("motivo")?,
            observacoes_assistencia: row.try_get("observacoes_assistencia")?,
            criado_por: row.try_get("criado_por")?,
            criado_em: row.try_get("criado_em")?,
            atualizado_por: row.try_get("atualizado_por")?,
            atualizado_em: row.try_get("atualizado_em")?,
        })
    }
}

impl RmaRow {
    fn into_rma(self) -> StoreResult<Rma> {
        let bad = |e| corrupt("rmas", e);
        Ok(Rma {
            id: RmaId::from_uuid(self.id),
            number: self.numero_rma.parse().map_err(bad)?,
            origin: RmaOrigin::parse(&self.tipo_origem).map_err(bad)?,
            category: RmaCategory::parse(&self.tipo_rma).map_err(bad)?,
            status: RmaStatus::parse(&self.status).map_err(bad)?,
            product_id: ProductId::from_uuid(self.produto_id),
            location_id: LocationId::from_uuid(self.loja_id),
            customer_id: self.cliente_id.map(CustomerId::from_uuid),
            supplier_id: self.fornecedor_id.map(SupplierId::from_uuid),
            quantity: self.quantidade,
            reason: self.motivo,
            assistance_notes: self.observacoes_assistencia,
            created_by: ActorId::parse(&self.criado_por).map_err(bad)?,
            created_at: self.criado_em,
            updated_by: ActorId::parse(&self.atualizado_por).map_err(bad)?,
            updated_at: self.atualizado_em,
        })
    }
}

#[derive(Debug)]
struct InventoryRow {
    produto_id: Uuid,
    loja_id: Uuid,
    quantidade: i64,
    atualizado_por: Option<String>,
    atualizado_em: Option<DateTime<Utc>>,
}

impl<'r> FromRow<'r, PgRow> for InventoryRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(InventoryRow {
            produto_id: row.try_get("produto_id")?,
            loja_id: row.try_get("loja_id")?,
            quantidade: row.try_get("quantidade")?,
            atualizado_por: row.try_get("atualizado_por")?,
            atualizado_em: row.try_get("atualizado_em")?,
        })
    }
}

impl InventoryRow {
    fn into_record(self) -> StoreResult<InventoryRecord> {
        Ok(InventoryRecord {
            product_id: ProductId::from_uuid(self.produto_id),
            location_id: LocationId::from_uuid(self.loja_id),
            quantity: self.quantidade,
            updated_by: self
                .atualizado_por
                .map(ActorId::parse)
                .transpose()
                .map_err(|e| corrupt("estoque", e))?,
            updated_at: self.atualizado_em,
        })
    }
}

#[derive(Debug)]
struct MovementRow {
    id: Uuid,
    produto_id: Uuid,
    loja_id: Uuid,
    usuario_id: String,
    quantidade: i64,
    tipo: String,
    quantidade_anterior: i64,
    quantidade_nova: i64,
    motivo: String,
    referencia: Option<String>,
    rma_id: Option<Uuid>,
    criado_em: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for MovementRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(MovementRow {
            id: row.try_get("id")?,
            produto_id: row.try_get("produto_id")?,
            loja_id: row.try_get("loja_id")?,
            usuario_id: row.try_get("usuario_id")?,
            quantidade: row.try_get("quantidade")?,
            tipo: row.try_get("tipo")?,
            quantidade_anterior: row.try_get("quantidade_anterior")?,
            quantidade_nova: row.try_get("quantidade_nova")?,
            motivo: row.try_get("motivo")?,
            referencia: row.try_get("referencia")?,
            rma_id: row.try_get("rma_id")?,
            criado_em: row.try_get("criado_em")?,
        })
    }
}

impl MovementRow {
    fn into_movement(self) -> StoreResult<Movement> {
        let bad = |e| corrupt("movimentacoes_estoque", e);
        Ok(Movement {
            id: MovementId::from_uuid(self.id),
            product_id: ProductId::from_uuid(self.produto_id),
            location_id: LocationId::from_uuid(self.loja_id),
            actor: ActorId::parse(&self.usuario_id).map_err(bad)?,
            quantity: self.quantidade,
            direction: Direction::parse(&self.tipo).map_err(bad)?,
            quantity_before: self.quantidade_anterior,
            quantity_after: self.quantidade_nova,
            reason: self.motivo,
            reference: self.referencia,
            rma_id: self.rma_id.map(RmaId::from_uuid),
            created_at: self.criado_em,
        })
    }
}

#[derive(Debug)]
struct HistoryRow {
    id: Uuid,
    rma_id: Uuid,
    acao: String,
    descricao: String,
    dados_anteriores: Option<serde_json::Value>,
    dados_novos: Option<serde_json::Value>,
    usuario_id: String,
    criado_em: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for HistoryRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(HistoryRow {
            id: row.try_get("id")?,
            rma_id: row.try_get("rma_id")?,
            acao: row.try_get("acao")?,
            descricao: row.try_get("descricao")?,
            dados_anteriores: row.try_get("dados_anteriores")?,
            dados_novos: row.try_get("dados_novos")?,
            usuario_id: row.try_get("usuario_id")?,
            criado_em: row.try_get("criado_em")?,
        })
    }
}

impl HistoryRow {
    fn into_entry(self) -> StoreResult<HistoryEntry> {
        let bad = |e| corrupt("rma_historico", e);
        Ok(HistoryEntry {
            id: HistoryEntryId::from_uuid(self.id),
            rma_id: RmaId::from_uuid(self.rma_id),
            action: HistoryAction::parse(&self.acao).map_err(bad)?,
            description: self.descricao,
            before: self.dados_anteriores,
            after: self.dados_novos,
            actor: ActorId::parse(&self.usuario_id).map_err(bad)?,
            created_at: self.criado_em,
        })
    }
}

#[derive(Debug)]
struct PhotoRow {
    id: Uuid,
    rma_id: Uuid,
    storage_key: String,
    url: String,
    nome_arquivo: String,
    tamanho_bytes: i64,
    enviado_por: String,
    criado_em: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for PhotoRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(PhotoRow {
            id: row.try_get("id")?,
            rma_id: row.try_get("rma_id")?,
            storage_key: row.try_get("storage_key")?,
            url: row.try_get("url")?,
            nome_arquivo: row.try_get("nome_arquivo")?,
            tamanho_bytes: row.try_get("tamanho_bytes")?,
            enviado_por: row.try_get("enviado_por")?,
            criado_em: row.try_get("criado_em")?,
        })
    }
}

impl PhotoRow {
    fn into_photo(self) -> StoreResult<Photo> {
        Ok(Photo {
            id: PhotoId::from_uuid(self.id),
            rma_id: RmaId::from_uuid(self.rma_id),
            storage_key: self.storage_key,
            url: self.url,
            file_name: self.nome_arquivo,
            size_bytes: self.tamanho_bytes,
            uploaded_by: ActorId::parse(&self.enviado_por).map_err(|e| corrupt("rma_fotos", e))?,
            created_at: self.criado_em,
        })
    }
}
