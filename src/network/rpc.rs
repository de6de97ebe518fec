//! Impact RPC
//!
//! Fire-and-forget remote call from a slamming character to the authority
//! of each nearby character. Requests queue in the target's inbox and are
//! applied at the start of the target's next tick.
//!
//! Delivery is not deduplicated: a request delivered twice is applied twice.

use std::collections::BTreeMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::game::state::EntityId;

/// Explosion impulse to apply to `target`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImpactRequest {
    /// Entity whose slam produced the impact.
    pub source: EntityId,
    /// Entity that must apply it.
    pub target: EntityId,
    /// Explosion impulse magnitude.
    pub magnitude: f32,
    /// Explosion center (the slammer's position at landing).
    pub center: Vec3,
    /// Falloff radius.
    pub radius: f32,
    /// Upward modifier.
    pub upward_bias: f32,
}

/// Impact delivery errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RpcError {
    /// No inbox is registered for the target.
    #[error("no impact inbox for entity {0:?}")]
    UnknownTarget(EntityId),

    /// The target's inbox was dropped.
    #[error("impact inbox for entity {0:?} is closed")]
    Closed(EntityId),
}

/// Anything that can deliver an impact request.
pub trait ImpactSender {
    /// Queue `request` for its target.
    fn send_impact(&self, request: ImpactRequest) -> Result<(), RpcError>;
}

/// Receiving end owned by one entity's simulator.
#[derive(Debug)]
pub struct ImpactInbox {
    rx: UnboundedReceiver<ImpactRequest>,
}

impl ImpactInbox {
    /// Take every request queued so far.
    pub fn drain(&mut self) -> Vec<ImpactRequest> {
        let mut requests = Vec::new();
        while let Ok(request) = self.rx.try_recv() {
            requests.push(request);
        }
        requests
    }
}

/// Routes impact requests to registered inboxes.
#[derive(Debug, Default)]
pub struct ImpactBus {
    routes: BTreeMap<EntityId, UnboundedSender<ImpactRequest>>,
}

impl ImpactBus {
    /// Empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the inbox for `entity`, replacing any previous one.
    pub fn register(&mut self, entity: EntityId) -> ImpactInbox {
        let (tx, rx) = mpsc::unbounded_channel();
        self.routes.insert(entity, tx);
        ImpactInbox { rx }
    }

    /// Stop routing to `entity`.
    pub fn unregister(&mut self, entity: EntityId) {
        self.routes.remove(&entity);
    }
}

impl ImpactSender for ImpactBus {
    fn send_impact(&self, request: ImpactRequest) -> Result<(), RpcError> {
        let route = self
            .routes
            .get(&request.target)
            .ok_or(RpcError::UnknownTarget(request.target))?;
        route
            .send(request)
            .map_err(|_| RpcError::Closed(request.target))?;
        debug!(
            source = request.source.0,
            target = request.target.0,
            magnitude = request.magnitude,
            "impact queued"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(target: u32) -> ImpactRequest {
        ImpactRequest {
            source: EntityId(1),
            target: EntityId(target),
            magnitude: 20.0,
            center: Vec3::ZERO,
            radius: 5.0,
            upward_bias: 1.0,
        }
    }

    #[test]
    fn test_delivery_to_inbox() {
        let mut bus = ImpactBus::new();
        let mut inbox = bus.register(EntityId(2));
        bus.send_impact(request(2)).unwrap();

        let received = inbox.drain();
        assert_eq!(received, vec![request(2)]);
        assert!(inbox.drain().is_empty());
    }

    #[test]
    fn test_duplicates_are_kept() {
        let mut bus = ImpactBus::new();
        let mut inbox = bus.register(EntityId(2));
        bus.send_impact(request(2)).unwrap();
        bus.send_impact(request(2)).unwrap();
        assert_eq!(inbox.drain().len(), 2);
    }

    #[test]
    fn test_unknown_and_closed_targets() {
        let mut bus = ImpactBus::new();
        assert_eq!(
            bus.send_impact(request(9)),
            Err(RpcError::UnknownTarget(EntityId(9)))
        );

        let inbox = bus.register(EntityId(3));
        drop(inbox);
        assert_eq!(bus.send_impact(request(3)), Err(RpcError::Closed(EntityId(3))));
    }
}
