//! # Relay Hub (Broadcast Dispatcher)
//!
//! A single actix actor owning the [`Registry`]. The actor mailbox is the
//! serialized control loop: registrations, unregistrations, and broadcasts
//! arrive as messages and are applied one at a time in arrival order, so no
//! connection ever receives two concurrent writes and no broadcast observes
//! a half-updated subscriber set.
//!
//! ## Interaction rules:
//! - Producers submit broadcasts with `do_send` — fire-and-forget, never
//!   blocking on registry internals. Delivery failures are handled inside
//!   the fan-out (evict and continue) and are not surfaced to the producer.
//! - The hub is constructed in `main` and handed to whoever needs it via
//!   `AppState`; there is no global instance. It starts before the HTTP
//!   server binds and is drained after the server stops.
//!
//! Within one session and partition, subscribers see broadcasts in mailbox
//! arrival order. A registration racing an in-flight broadcast may or may
//! not catch it — accepted, sessions only need relative ordering.

use actix::prelude::*;
use tracing::{debug, info};

use crate::relay::messages::{
    AudioConnectedSince, BroadcastAudio, BroadcastAudioStats, BroadcastTranscript, Drain, Register,
    Snapshot, Unregister,
};
use crate::relay::registry::{Frame, Registry, StreamKind};

/// The dispatcher actor. All registry access goes through its mailbox.
pub struct RelayHub {
    registry: Registry,
}

impl RelayHub {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
        }
    }
}

impl Default for RelayHub {
    fn default() -> Self {
        Self::new()
    }
}

impl Actor for RelayHub {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        info!("Relay hub started");
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        info!("Relay hub stopped");
    }
}

impl Handler<Register> for RelayHub {
    type Result = ();

    fn handle(&mut self, msg: Register, _ctx: &mut Self::Context) {
        self.registry.register(msg.kind, msg.subscriber);
    }
}

impl Handler<Unregister> for RelayHub {
    type Result = ();

    fn handle(&mut self, msg: Unregister, _ctx: &mut Self::Context) {
        self.registry
            .unregister(msg.kind, &msg.session_id, msg.connection_id);
    }
}

impl Handler<BroadcastTranscript> for RelayHub {
    type Result = ();

    fn handle(&mut self, msg: BroadcastTranscript, _ctx: &mut Self::Context) {
        // Serialize once, fan the same payload out to every subscriber.
        let payload = match serde_json::to_string(&msg.segments) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!(session_id = %msg.session_id, error = %err, "Failed to encode segment batch");
                return;
            }
        };

        let outcome = self.registry.broadcast(
            StreamKind::Transcript,
            &msg.session_id,
            &Frame::Text(payload),
        );
        debug!(
            session_id = %msg.session_id,
            segments = msg.segments.len(),
            delivered = outcome.delivered,
            evicted = outcome.evicted,
            "Transcript broadcast"
        );
    }
}

impl Handler<BroadcastAudio> for RelayHub {
    type Result = ();

    fn handle(&mut self, msg: BroadcastAudio, _ctx: &mut Self::Context) {
        let byte_count = msg.bytes.len();
        let outcome =
            self.registry
                .broadcast(StreamKind::Audio, &msg.session_id, &Frame::Binary(msg.bytes));
        debug!(
            session_id = %msg.session_id,
            bytes = byte_count,
            delivered = outcome.delivered,
            evicted = outcome.evicted,
            "Audio broadcast"
        );
    }
}

impl Handler<BroadcastAudioStats> for RelayHub {
    type Result = ();

    fn handle(&mut self, msg: BroadcastAudioStats, _ctx: &mut Self::Context) {
        let payload = match serde_json::to_string(&msg.stats) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!(session_id = %msg.session_id, error = %err, "Failed to encode audio stats");
                return;
            }
        };

        self.registry
            .broadcast(StreamKind::Audio, &msg.session_id, &Frame::Text(payload));
    }
}

impl Handler<AudioConnectedSince> for RelayHub {
    type Result = MessageResult<AudioConnectedSince>;

    fn handle(&mut self, msg: AudioConnectedSince, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.registry.audio_connected_since(&msg.session_id))
    }
}

impl Handler<Snapshot> for RelayHub {
    type Result = MessageResult<Snapshot>;

    fn handle(&mut self, _msg: Snapshot, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.registry.counts())
    }
}

impl Handler<Drain> for RelayHub {
    type Result = MessageResult<Drain>;

    fn handle(&mut self, _msg: Drain, _ctx: &mut Self::Context) -> Self::Result {
        let closed = self.registry.drain();
        info!(closed, "Relay hub drained");
        MessageResult(closed)
    }
}
