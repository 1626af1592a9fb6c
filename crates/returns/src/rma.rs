use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rmaledger_core::{
    ActorId, CustomerId, DomainError, DomainResult, LocationId, ProductId, RmaId, SupplierId,
};
use rmaledger_inventory::StockKey;

use crate::number::RmaNumber;

/// Who the goods are moving to/from (`tipo_origem`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RmaOrigin {
    Cliente,
    InternoFornecedor,
}

impl RmaOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            RmaOrigin::Cliente => "cliente",
            RmaOrigin::InternoFornecedor => "interno_fornecedor",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s.trim() {
            "cliente" => Ok(RmaOrigin::Cliente),
            "interno_fornecedor" => Ok(RmaOrigin::InternoFornecedor),
            other => Err(DomainError::validation(format!("unknown rma origin '{other}'"))),
        }
    }
}

/// Return category (`tipo_rma`). Opaque to the ledger.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RmaCategory {
    Defeito,
    Garantia,
    Troca,
    Arrependimento,
    Avaria,
    Outro,
}

impl RmaCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RmaCategory::Defeito => "defeito",
            RmaCategory::Garantia => "garantia",
            RmaCategory::Troca => "troca",
            RmaCategory::Arrependimento => "arrependimento",
            RmaCategory::Avaria => "avaria",
            RmaCategory::Outro => "outro",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s.trim() {
            "defeito" => Ok(RmaCategory::Defeito),
            "garantia" => Ok(RmaCategory::Garantia),
            "troca" => Ok(RmaCategory::Troca),
            "arrependimento" => Ok(RmaCategory::Arrependimento),
            "avaria" => Ok(RmaCategory::Avaria),
            "outro" => Ok(RmaCategory::Outro),
            other => Err(DomainError::validation(format!("unknown rma category '{other}'"))),
        }
    }
}

/// Lifecycle status of a return case.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RmaStatus {
    Pendente,
    EmAnalise,
    Aprovado,
    Reprovado,
    EmTransito,
    Recebido,
    Concluido,
    Cancelado,
}

impl RmaStatus {
    pub const ALL: [RmaStatus; 8] = [
        RmaStatus::Pendente,
        RmaStatus::EmAnalise,
        RmaStatus::Aprovado,
        RmaStatus::Reprovado,
        RmaStatus::EmTransito,
        RmaStatus::Recebido,
        RmaStatus::Concluido,
        RmaStatus::Cancelado,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RmaStatus::Pendente => "pendente",
            RmaStatus::EmAnalise => "em_analise",
            RmaStatus::Aprovado => "aprovado",
            RmaStatus::Reprovado => "reprovado",
            RmaStatus::EmTransito => "em_transito",
            RmaStatus::Recebido => "recebido",
            RmaStatus::Concluido => "concluido",
            RmaStatus::Cancelado => "cancelado",
        }
    }

    /// Label used in history descriptions.
    pub fn label(&self) -> &'static str {
        match self {
            RmaStatus::Pendente => "Pendente",
            RmaStatus::EmAnalise => "Em análise",
            RmaStatus::Aprovado => "Aprovado",
            RmaStatus::Reprovado => "Reprovado",
            RmaStatus::EmTransito => "Em trânsito",
            RmaStatus::Recebido => "Recebido",
            RmaStatus::Concluido => "Concluído",
            RmaStatus::Cancelado => "Cancelado",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        let s = s.trim();
        RmaStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown rma status '{s}'")))
    }
}

impl core::fmt::Display for RmaStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for opening a return case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRma {
    pub origin: RmaOrigin,
    pub category: RmaCategory,
    pub product_id: ProductId,
    pub location_id: LocationId,
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    #[serde(default)]
    pub supplier_id: Option<SupplierId>,
    pub quantity: i64,
    pub reason: String,
    #[serde(default)]
    pub assistance_notes: Option<String>,
}

impl NewRma {
    pub fn validate(&self) -> DomainResult<()> {
        if self.quantity <= 0 {
            return Err(DomainError::validation("quantity must be a positive integer"));
        }
        if self.reason.trim().is_empty() {
            return Err(DomainError::validation("reason cannot be empty"));
        }
        check_counterparty(self.origin, self.customer_id, self.supplier_id)
    }
}

/// Exactly one of customer/supplier is set, matching the origin.
fn check_counterparty(
    origin: RmaOrigin,
    customer_id: Option<CustomerId>,
    supplier_id: Option<SupplierId>,
) -> DomainResult<()> {
    match (origin, customer_id, supplier_id) {
        (RmaOrigin::Cliente, Some(_), None) => Ok(()),
        (RmaOrigin::InternoFornecedor, None, Some(_)) => Ok(()),
        (RmaOrigin::Cliente, _, _) => Err(DomainError::validation(
            "customer-origin rma requires a customer and no supplier",
        )),
        (RmaOrigin::InternoFornecedor, _, _) => Err(DomainError::validation(
            "supplier-origin rma requires a supplier and no customer",
        )),
    }
}

fn normalize_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}

/// Partial update of the editable fields. Quantity and status are not editable here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RmaPatch {
    #[serde(default)]
    pub category: Option<RmaCategory>,
    #[serde(default)]
    pub reason: Option<String>,
    /// An empty string clears the notes.
    #[serde(default)]
    pub assistance_notes: Option<String>,
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    #[serde(default)]
    pub supplier_id: Option<SupplierId>,
}

impl RmaPatch {
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.reason.is_none()
            && self.assistance_notes.is_none()
            && self.customer_id.is_none()
            && self.supplier_id.is_none()
    }
}

/// A return case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rma {
    pub id: RmaId,
    pub number: RmaNumber,
    pub origin: RmaOrigin,
    pub category: RmaCategory,
    pub status: RmaStatus,
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub customer_id: Option<CustomerId>,
    pub supplier_id: Option<SupplierId>,
    pub quantity: i64,
    pub reason: String,
    pub assistance_notes: Option<String>,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
    pub updated_by: ActorId,
    pub updated_at: DateTime<Utc>,
}

impl Rma {
    /// Open a new case in `pendente`.
    pub fn open(
        id: RmaId,
        number: RmaNumber,
        input: NewRma,
        actor: ActorId,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        input.validate()?;
        Ok(Self {
            id,
            number,
            origin: input.origin,
            category: input.category,
            status: RmaStatus::Pendente,
            product_id: input.product_id,
            location_id: input.location_id,
            customer_id: input.customer_id,
            supplier_id: input.supplier_id,
            quantity: input.quantity,
            reason: input.reason.trim().to_string(),
            assistance_notes: normalize_notes(input.assistance_notes),
            created_by: actor.clone(),
            created_at: now,
            updated_by: actor,
            updated_at: now,
        })
    }

    pub fn stock_key(&self) -> StockKey {
        StockKey::new(self.product_id, self.location_id)
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == RmaStatus::Cancelado
    }

    pub fn ensure_not_cancelled(&self) -> DomainResult<()> {
        if self.is_cancelled() {
            return Err(DomainError::AlreadyCancelled);
        }
        Ok(())
    }

    /// Only cancelled cases (already reconciled back to stock) can be deleted.
    pub fn ensure_deletable(&self) -> DomainResult<()> {
        if !self.is_cancelled() {
            return Err(DomainError::InvalidDeleteState {
                status: self.status.as_str().to_string(),
            });
        }
        Ok(())
    }

    pub fn with_status(&self, status: RmaStatus, actor: ActorId, now: DateTime<Utc>) -> Self {
        let mut next = self.touched(actor, now);
        next.status = status;
        next
    }

    pub fn touched(&self, actor: ActorId, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.updated_by = actor;
        next.updated_at = now;
        next
    }

    /// Apply a field patch, re-checking the counterparty invariant.
    pub fn apply_patch(&self, patch: &RmaPatch, actor: ActorId, now: DateTime<Utc>) -> DomainResult<Self> {
        if patch.is_empty() {
            return Err(DomainError::validation("no fields to update"));
        }

        let mut next = self.touched(actor, now);
        if let Some(category) = patch.category {
            next.category = category;
        }
        if let Some(reason) = &patch.reason {
            if reason.trim().is_empty() {
                return Err(DomainError::validation("reason cannot be empty"));
            }
            next.reason = reason.trim().to_string();
        }
        if let Some(notes) = &patch.assistance_notes {
            next.assistance_notes = normalize_notes(Some(notes.clone()));
        }
        if patch.customer_id.is_some() {
            next.customer_id = patch.customer_id;
        }
        if patch.supplier_id.is_some() {
            next.supplier_id = patch.supplier_id;
        }

        check_counterparty(next.origin, next.customer_id, next.supplier_id)?;
        Ok(next)
    }

    /// Editable fields as JSON, used for before/after history payloads.
    pub fn editable_snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "category": self.category.as_str(),
            "reason": self.reason,
            "assistance_notes": self.assistance_notes,
            "customer_id": self.customer_id.map(|c| c.to_string()),
            "supplier_id": self.supplier_id.map(|s| s.to_string()),
        })
    }
}
