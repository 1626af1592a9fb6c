//! Stock side effects of RMA lifecycle events.
//!
//! Status changes are not constrained by a transition graph; instead each
//! *target* status, combined with the case origin, maps to a stock effect.
//! The mapping lives in [`STATUS_STOCK_RULES`] so that new statuses or
//! origins only add rows.

use rmaledger_core::{ActorId, DomainError, DomainResult};
use rmaledger_inventory::{Direction, MovementRequest};

use crate::rma::{Rma, RmaOrigin, RmaStatus};

/// What a lifecycle event does to the location's stock.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StockEffect {
    None,
    /// Goods come back into sellable stock.
    Entrada,
    /// Entrada only when the caller asks for the goods to be restocked.
    EntradaIfReturnToStock,
    /// Goods leave sellable stock.
    Saida,
}

impl StockEffect {
    /// Resolve the effect against the caller's restock flag.
    pub fn resolve(self, return_to_stock: bool) -> Option<Direction> {
        match self {
            StockEffect::None => None,
            StockEffect::Entrada => Some(Direction::Entrada),
            StockEffect::EntradaIfReturnToStock => return_to_stock.then_some(Direction::Entrada),
            StockEffect::Saida => Some(Direction::Saida),
        }
    }
}

#[derive(Debug, Copy, Clone)]
pub struct StatusStockRule {
    pub target: RmaStatus,
    /// `None` matches every origin.
    pub origin: Option<RmaOrigin>,
    pub effect: StockEffect,
}

/// Stock effects keyed on (target status, origin). First match wins, so
/// origin-specific rows come before wildcard rows for the same status.
pub const STATUS_STOCK_RULES: &[StatusStockRule] = &[
    StatusStockRule {
        target: RmaStatus::Recebido,
        origin: Some(RmaOrigin::InternoFornecedor),
        effect: StockEffect::Entrada,
    },
    StatusStockRule {
        target: RmaStatus::Concluido,
        origin: None,
        effect: StockEffect::EntradaIfReturnToStock,
    },
    StatusStockRule {
        target: RmaStatus::Cancelado,
        origin: None,
        effect: StockEffect::Entrada,
    },
];

/// Stock effect of opening a case, keyed on origin.
pub const CREATION_STOCK_RULES: &[(RmaOrigin, StockEffect)] = &[
    (RmaOrigin::Cliente, StockEffect::Saida),
    (RmaOrigin::InternoFornecedor, StockEffect::None),
];

pub fn status_effect(target: RmaStatus, origin: RmaOrigin) -> StockEffect {
    STATUS_STOCK_RULES
        .iter()
        .find(|rule| rule.target == target && rule.origin.is_none_or(|o| o == origin))
        .map(|rule| rule.effect)
        .unwrap_or(StockEffect::None)
}

pub fn creation_effect(origin: RmaOrigin) -> StockEffect {
    CREATION_STOCK_RULES
        .iter()
        .find(|(o, _)| *o == origin)
        .map(|(_, effect)| *effect)
        .unwrap_or(StockEffect::None)
}

/// Decision for a requested status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionPlan {
    /// Target equals the current status: nothing to do. No stock moves and
    /// no `mudanca_status` entry is written.
    Unchanged,
    Apply {
        from: RmaStatus,
        to: RmaStatus,
        stock: Option<Direction>,
    },
}

/// Decide what a status change to `target` does.
///
/// A cancelled case has already been reconciled back to stock, so it cannot
/// move to any other status (that would allow a second restock).
pub fn plan_transition(rma: &Rma, target: RmaStatus, return_to_stock: bool) -> DomainResult<TransitionPlan> {
    if rma.is_cancelled() {
        return Err(DomainError::AlreadyCancelled);
    }
    if rma.status == target {
        return Ok(TransitionPlan::Unchanged);
    }

    Ok(TransitionPlan::Apply {
        from: rma.status,
        to: target,
        stock: status_effect(target, rma.origin).resolve(return_to_stock),
    })
}

/// Ledger reason recorded for a movement triggered by reaching `target`.
pub fn transition_reason(rma: &Rma, target: RmaStatus) -> String {
    match target {
        RmaStatus::Cancelado => format!("Cancelamento do RMA {}", rma.number),
        RmaStatus::Recebido => format!("Recebimento do RMA {}", rma.number),
        RmaStatus::Concluido => format!("Conclusão do RMA {} com retorno ao estoque", rma.number),
        other => format!("RMA {} - {}", rma.number, other.label()),
    }
}

pub fn creation_reason(rma: &Rma) -> String {
    format!("Abertura do RMA {}", rma.number)
}

/// Movement of the case's full quantity, referencing the case.
pub fn rma_movement(rma: &Rma, direction: Direction, actor: ActorId, reason: impl Into<String>) -> MovementRequest {
    MovementRequest::new(rma.stock_key(), rma.quantity, direction, actor, reason)
        .with_reference(rma.number.to_string())
        .for_rma(rma.id)
}
