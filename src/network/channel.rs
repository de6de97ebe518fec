//! Input Channel
//!
//! Carries owner input frames to the authoritative simulator.
//!
//! ## Flow
//!
//! ```text
//! InputCapture ──take_frame──▶ InputSender ──bincode──▶ mpsc ──▶ InputRelay::latest
//! ```
//!
//! The relay drains each owner's queue once per tick. Several packets
//! arriving between ticks coalesce into one frame, except that a press
//! following a pending release of the same action waits for the next tick.
//! A tick with no packet repeats the last frame with its edges cleared, so
//! every edge is consumed at most once.

use std::collections::{BTreeMap, VecDeque};

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tracing::{debug, trace, warn};

use crate::game::input::{InputFrame, InputPacket};
use crate::game::state::ParticipantId;

/// Input transport errors.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Packet could not be encoded.
    #[error("failed to encode input packet: {0}")]
    Encode(#[from] bincode::Error),

    /// Receiving side is gone.
    #[error("input channel closed")]
    Closed,
}

/// Source of per-tick input frames.
pub trait InputChannel {
    /// Frame to use for `owner` this tick. Never fails: missing input is the
    /// default frame.
    fn latest(&mut self, owner: ParticipantId) -> InputFrame;
}

/// Owner-side end of an input channel.
#[derive(Clone, Debug)]
pub struct InputSender {
    tx: UnboundedSender<Vec<u8>>,
}

impl InputSender {
    /// Encode and send a packet.
    pub fn send(&self, packet: &InputPacket) -> Result<(), ChannelError> {
        let bytes = packet.encode()?;
        self.send_raw(bytes)
    }

    /// Send already-encoded bytes.
    pub fn send_raw(&self, bytes: Vec<u8>) -> Result<(), ChannelError> {
        self.tx.send(bytes).map_err(|_| ChannelError::Closed)
    }
}

#[derive(Debug)]
struct OwnerSlot {
    rx: UnboundedReceiver<Vec<u8>>,
    backlog: VecDeque<InputFrame>,
    last: InputFrame,
    last_tick: Option<u64>,
    connected: bool,
}

/// Authoritative-side receiver for every owner.
#[derive(Debug, Default)]
pub struct InputRelay {
    slots: BTreeMap<ParticipantId, OwnerSlot>,
}

impl InputRelay {
    /// Empty relay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a channel for `owner`, replacing any previous one.
    pub fn connect(&mut self, owner: ParticipantId) -> InputSender {
        let (tx, rx) = mpsc::unbounded_channel();
        self.slots.insert(
            owner,
            OwnerSlot {
                rx,
                backlog: VecDeque::new(),
                last: InputFrame::default(),
                last_tick: None,
                connected: true,
            },
        );
        debug!(owner = %owner.short(), "input channel opened");
        InputSender { tx }
    }

    /// Drop the channel for `owner`.
    pub fn disconnect(&mut self, owner: ParticipantId) {
        if self.slots.remove(&owner).is_some() {
            debug!(owner = %owner.short(), "input channel removed");
        }
    }

    /// Is `owner`'s sender still alive (as of the last drain)?
    pub fn is_connected(&self, owner: ParticipantId) -> bool {
        self.slots.get(&owner).map_or(false, |slot| slot.connected)
    }
}

impl InputChannel for InputRelay {
    fn latest(&mut self, owner: ParticipantId) -> InputFrame {
        let Some(slot) = self.slots.get_mut(&owner) else {
            return InputFrame::default();
        };

        loop {
            match slot.rx.try_recv() {
                Ok(bytes) => {
                    let packet = match InputPacket::decode(&bytes) {
                        Ok(packet) => packet,
                        Err(e) => {
                            warn!(owner = %owner.short(), "dropping undecodable input packet: {}", e);
                            continue;
                        }
                    };
                    if slot.last_tick.map_or(false, |last| packet.tick <= last) {
                        trace!(owner = %owner.short(), tick = packet.tick, "stale input packet");
                        continue;
                    }
                    slot.last_tick = Some(packet.tick);
                    slot.backlog.push_back(packet.frame);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if slot.connected {
                        debug!(owner = %owner.short(), "input sender disconnected");
                    }
                    slot.connected = false;
                    break;
                }
            }
        }

        let mut fresh = slot.backlog.pop_front();
        if let Some(frame) = fresh.as_mut() {
            while let Some(next) = slot.backlog.front() {
                if frame.conflicts_with(next) {
                    trace!(owner = %owner.short(), held = slot.backlog.len(), "press held for next tick");
                    break;
                }
                frame.absorb(next);
                slot.backlog.pop_front();
            }
        }

        match fresh {
            Some(frame) => {
                slot.last = frame;
                frame
            }
            None if !slot.connected => {
                slot.last = InputFrame::default();
                slot.last
            }
            None => {
                slot.last = slot.last.without_edges();
                slot.last
            }
        }
    }
}
