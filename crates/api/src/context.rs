use rmaledger_core::ActorId;

/// Caller identity for a request, taken from the `X-Actor-Id` header.
///
/// Authentication happens upstream; this only carries the already-verified id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorContext {
    actor_id: ActorId,
}

impl ActorContext {
    pub fn new(actor_id: ActorId) -> Self {
        Self { actor_id }
    }

    pub fn actor_id(&self) -> &ActorId {
        &self.actor_id
    }

    pub fn into_actor_id(self) -> ActorId {
        self.actor_id
    }
}
