//! Append-only audit entries attached to a return case.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use rmaledger_core::{ActorId, DomainError, DomainResult, HistoryEntryId, RmaId};
use rmaledger_inventory::{Direction, Movement};

use crate::rma::{Rma, RmaStatus};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Criacao,
    MudancaStatus,
    Atualizacao,
    AdicaoFoto,
    MovimentacaoEstoque,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Criacao => "criacao",
            HistoryAction::MudancaStatus => "mudanca_status",
            HistoryAction::Atualizacao => "atualizacao",
            HistoryAction::AdicaoFoto => "adicao_foto",
            HistoryAction::MovimentacaoEstoque => "movimentacao_estoque",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "criacao" => Ok(HistoryAction::Criacao),
            "mudanca_status" => Ok(HistoryAction::MudancaStatus),
            "atualizacao" => Ok(HistoryAction::Atualizacao),
            "adicao_foto" => Ok(HistoryAction::AdicaoFoto),
            "movimentacao_estoque" => Ok(HistoryAction::MovimentacaoEstoque),
            other => Err(DomainError::validation(format!("unknown history action '{other}'"))),
        }
    }
}

/// A persisted history row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: HistoryEntryId,
    pub rma_id: RmaId,
    pub action: HistoryAction,
    pub description: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub actor: ActorId,
    pub created_at: DateTime<Utc>,
}

/// History entry before an id and timestamp are assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHistoryEntry {
    pub rma_id: RmaId,
    pub action: HistoryAction,
    pub description: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub actor: ActorId,
}

impl NewHistoryEntry {
    pub fn new(rma_id: RmaId, action: HistoryAction, description: impl Into<String>, actor: ActorId) -> Self {
        Self {
            rma_id,
            action,
            description: description.into(),
            before: None,
            after: None,
            actor,
        }
    }

    pub fn with_before(mut self, before: Value) -> Self {
        self.before = Some(before);
        self
    }

    pub fn with_after(mut self, after: Value) -> Self {
        self.after = Some(after);
        self
    }

    pub fn creation(rma: &Rma) -> Self {
        Self::new(
            rma.id,
            HistoryAction::Criacao,
            format!("RMA {} criado", rma.number),
            rma.created_by.clone(),
        )
        .with_after(json!({
            "status": rma.status.as_str(),
            "origin": rma.origin.as_str(),
            "quantity": rma.quantity,
        }))
    }

    pub fn status_change(rma_id: RmaId, from: RmaStatus, to: RmaStatus, actor: ActorId) -> Self {
        Self::new(
            rma_id,
            HistoryAction::MudancaStatus,
            format!("Status alterado de {} para {}", from.label(), to.label()),
            actor,
        )
        .with_before(json!({ "status": from.as_str() }))
        .with_after(json!({ "status": to.as_str() }))
    }

    pub fn update(before: &Rma, after: &Rma) -> Self {
        Self::new(
            after.id,
            HistoryAction::Atualizacao,
            "Dados do RMA atualizados",
            after.updated_by.clone(),
        )
        .with_before(before.editable_snapshot())
        .with_after(after.editable_snapshot())
    }

    pub fn photos_added(rma_id: RmaId, count: usize, actor: ActorId) -> Self {
        let description = if count == 1 {
            "1 foto adicionada".to_string()
        } else {
            format!("{count} fotos adicionadas")
        };
        Self::new(rma_id, HistoryAction::AdicaoFoto, description, actor).with_after(json!({ "count": count }))
    }

    /// Ledger entry for a movement tied to an RMA; `None` for free-standing movements.
    pub fn stock_movement(movement: &Movement) -> Option<Self> {
        let rma_id = movement.rma_id?;
        let description = format!(
            "{} de {} unidade(s): {}",
            match movement.direction {
                Direction::Entrada => "Entrada",
                Direction::Saida => "Saída",
            },
            movement.quantity,
            movement.reason
        );
        Some(
            Self::new(rma_id, HistoryAction::MovimentacaoEstoque, description, movement.actor.clone())
                .with_before(json!({ "quantity": movement.quantity_before }))
                .with_after(json!({
                    "quantity": movement.quantity_after,
                    "direction": movement.direction.as_str(),
                    "moved": movement.quantity,
                    "movement_id": movement.id.to_string(),
                })),
        )
    }

    pub fn into_entry(self, id: HistoryEntryId, now: DateTime<Utc>) -> HistoryEntry {
        HistoryEntry {
            id,
            rma_id: self.rma_id,
            action: self.action,
            description: self.description,
            before: self.before,
            after: self.after,
            actor: self.actor,
            created_at: now,
        }
    }
}
