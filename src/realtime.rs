//! Realtime fan-out of review-room events.
//!
//! Transport lives outside this crate; a subscriber is anything that can
//! accept an ordered stream of [`RoomEvent`]s. The registry groups
//! subscribers per claim and delivers sequentially in registration order, so
//! every subscriber of a claim observes the same event sequence the engine
//! produced. A failed delivery drops that event for that subscriber only.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use tracing::warn;
use uuid::Uuid;

use crate::consensus::{ConsensusSnapshot, Vote};
use crate::error::VerityError;

/// Event frames delivered to review-room subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RoomEvent {
    NewVote { vote: Vote },
    Finalized { data: ConsensusSnapshot },
}

/// A connected review-room participant.
#[async_trait]
pub trait Subscriber: Send + Sync {
    fn id(&self) -> Uuid;
    async fn send(&self, event: &RoomEvent) -> Result<()>;
}

/// In-process subscriber backed by an unbounded channel. The receiving half
/// is handed to whoever consumes the event stream.
pub struct ChannelSubscriber {
    id: Uuid,
    sender: mpsc::UnboundedSender<RoomEvent>,
}

impl ChannelSubscriber {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<RoomEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                id: Uuid::new_v4(),
                sender,
            }),
            receiver,
        )
    }
}

#[async_trait]
impl Subscriber for ChannelSubscriber {
    fn id(&self) -> Uuid {
        self.id
    }

    async fn send(&self, event: &RoomEvent) -> Result<()> {
        self.sender
            .send(event.clone())
            .map_err(|_| VerityError::ConnectionLost(self.id).into())
    }
}

/// Active subscribers per claim.
#[derive(Default)]
pub struct SubscriberRegistry {
    rooms: RwLock<HashMap<String, Vec<Arc<dyn Subscriber>>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn connect(&self, claim_id: &str, subscriber: Arc<dyn Subscriber>) {
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(claim_id.to_string())
            .or_default()
            .push(subscriber);
    }

    /// Remove one subscriber. The claim's entry is dropped entirely when its
    /// last subscriber leaves, so idle claims hold no state here.
    pub async fn disconnect(&self, claim_id: &str, id: Uuid) {
        let mut rooms = self.rooms.write().await;
        if let Some(subscribers) = rooms.get_mut(claim_id) {
            subscribers.retain(|s| s.id() != id);
            if subscribers.is_empty() {
                rooms.remove(claim_id);
            }
        }
    }

    /// Deliver an event to every subscriber of a claim, in registration
    /// order. Lost connections are logged and skipped. Returns how many
    /// deliveries succeeded.
    pub async fn broadcast(&self, claim_id: &str, event: &RoomEvent) -> usize {
        let targets = {
            let rooms = self.rooms.read().await;
            match rooms.get(claim_id) {
                Some(subscribers) => subscribers.clone(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        for subscriber in targets {
            match subscriber.send(event).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!("{e:#}"),
            }
        }
        delivered
    }

    pub async fn subscriber_count(&self, claim_id: &str) -> usize {
        self.rooms
            .read()
            .await
            .get(claim_id)
            .map_or(0, |subscribers| subscribers.len())
    }
}
