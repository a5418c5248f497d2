//! # Connection Registry
//!
//! The live-subscriber bookkeeping behind the relay hub: two partitions
//! (transcript, audio), each mapping a session identifier to the set of
//! connections registered under it. Sessions never interact; a broadcast
//! only ever reaches subscribers of its own session and partition.
//!
//! The registry itself is a plain single-threaded structure. All mutation
//! is serialized by the owning [`RelayHub`](crate::relay::hub::RelayHub)
//! actor, so iteration-and-evict during a broadcast needs no locking here.
//!
//! Delivery goes through the [`Outbound`] trait rather than a concrete
//! WebSocket type: the production implementation wraps a socket actor's
//! mailbox, tests substitute an in-memory recorder.

use actix_web::web::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;

/// The two subscriber partitions. A connection belongs to exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Transcript,
    Audio,
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamKind::Transcript => write!(f, "transcript"),
            StreamKind::Audio => write!(f, "audio"),
        }
    }
}

/// A payload on its way out to subscribers. Segment batches and stats
/// travel as serialized JSON text, raw audio as an untyped binary frame.
#[derive(Debug, Clone)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
}

/// Reported by an [`Outbound`] sink when a frame cannot be handed to the
/// connection. The registry treats any failure as a dead connection.
#[derive(Debug)]
pub struct DeliveryError;

/// Where broadcast payloads are written.
///
/// Implemented by the WebSocket session actors; sends must not block (the
/// production implementation enqueues onto the socket actor's mailbox).
pub trait Outbound: Send {
    fn send_text(&self, payload: String) -> Result<(), DeliveryError>;
    fn send_binary(&self, payload: Bytes) -> Result<(), DeliveryError>;
    /// Ask the connection to close. Best effort; the subscriber is already
    /// gone from the registry when this is called.
    fn close(&self);
}

/// A live connection registered under one session and one stream kind.
pub struct Subscriber {
    pub id: Uuid,
    pub session_id: String,
    pub joined_at: DateTime<Utc>,
    pub outbound: Box<dyn Outbound>,
}

/// Per-partition subscriber counts, reported by the health endpoint.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RegistryCounts {
    pub transcript_sessions: usize,
    pub transcript_subscribers: usize,
    pub audio_sessions: usize,
    pub audio_subscribers: usize,
}

/// How one broadcast went: subscribers reached, subscribers evicted.
#[derive(Debug, Clone, Copy, Default)]
pub struct BroadcastOutcome {
    pub delivered: usize,
    pub evicted: usize,
}

type Partition = HashMap<String, HashMap<Uuid, Subscriber>>;

/// Session-partitioned sets of live subscribers.
#[derive(Default)]
pub struct Registry {
    transcript: Partition,
    audio: Partition,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn partition_mut(&mut self, kind: StreamKind) -> &mut Partition {
        match kind {
            StreamKind::Transcript => &mut self.transcript,
            StreamKind::Audio => &mut self.audio,
        }
    }

    /// Insert a subscriber, creating the session's set if absent. Always
    /// succeeds.
    pub fn register(&mut self, kind: StreamKind, subscriber: Subscriber) {
        debug!(
            kind = %kind,
            session_id = %subscriber.session_id,
            connection_id = %subscriber.id,
            "Subscriber registered"
        );
        self.partition_mut(kind)
            .entry(subscriber.session_id.clone())
            .or_default()
            .insert(subscriber.id, subscriber);
    }

    /// Remove a subscriber and close its connection. Removing an absent
    /// subscriber is a no-op; the session's set entry is deleted once empty.
    /// Returns whether anything was removed.
    pub fn unregister(&mut self, kind: StreamKind, session_id: &str, connection_id: Uuid) -> bool {
        let partition = self.partition_mut(kind);
        let Some(subscribers) = partition.get_mut(session_id) else {
            return false;
        };
        let Some(subscriber) = subscribers.remove(&connection_id) else {
            return false;
        };

        subscriber.outbound.close();
        if subscribers.is_empty() {
            partition.remove(session_id);
        }
        debug!(kind = %kind, session_id, connection_id = %connection_id, "Subscriber unregistered");
        true
    }

    /// Fan one frame out to every subscriber of `session_id` in the given
    /// partition. A subscriber whose send fails is closed and evicted, and
    /// delivery continues to the rest; one failure never aborts the batch.
    /// Broadcasting to a session with no subscribers is a silent no-op.
    pub fn broadcast(&mut self, kind: StreamKind, session_id: &str, frame: &Frame) -> BroadcastOutcome {
        let partition = self.partition_mut(kind);
        let Some(subscribers) = partition.get_mut(session_id) else {
            return BroadcastOutcome::default();
        };

        let mut outcome = BroadcastOutcome::default();
        let mut failed = Vec::new();

        for (id, subscriber) in subscribers.iter() {
            let result = match frame {
                Frame::Text(payload) => subscriber.outbound.send_text(payload.clone()),
                Frame::Binary(payload) => subscriber.outbound.send_binary(payload.clone()),
            };
            match result {
                Ok(()) => outcome.delivered += 1,
                Err(DeliveryError) => failed.push(*id),
            }
        }

        for id in failed {
            if let Some(subscriber) = subscribers.remove(&id) {
                warn!(kind = %kind, session_id, connection_id = %id, "Write failed, evicting subscriber");
                subscriber.outbound.close();
                outcome.evicted += 1;
            }
        }
        if subscribers.is_empty() {
            partition.remove(session_id);
        }

        outcome
    }

    /// Join instant of the earliest still-connected audio subscriber for a
    /// session, if any. Feeds the `connection_time`/`connected_since` stats
    /// fields.
    pub fn audio_connected_since(&self, session_id: &str) -> Option<DateTime<Utc>> {
        self.audio
            .get(session_id)
            .and_then(|subscribers| subscribers.values().map(|s| s.joined_at).min())
    }

    pub fn counts(&self) -> RegistryCounts {
        RegistryCounts {
            transcript_sessions: self.transcript.len(),
            transcript_subscribers: self.transcript.values().map(HashMap::len).sum(),
            audio_sessions: self.audio.len(),
            audio_subscribers: self.audio.values().map(HashMap::len).sum(),
        }
    }

    /// Close every connection and empty both partitions. Returns the number
    /// of connections closed.
    pub fn drain(&mut self) -> usize {
        let mut closed = 0;
        for partition in [&mut self.transcript, &mut self.audio] {
            for (_, subscribers) in partition.drain() {
                for (_, subscriber) in subscribers {
                    subscriber.outbound.close();
                    closed += 1;
                }
            }
        }
        closed
    }

    pub fn is_empty(&self) -> bool {
        self.transcript.is_empty() && self.audio.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Records every frame it receives; optionally fails all sends.
    #[derive(Default)]
    struct Recorder {
        frames: Arc<Mutex<Vec<Frame>>>,
        closed: Arc<AtomicUsize>,
        fail_sends: bool,
    }

    struct RecorderOutbound {
        frames: Arc<Mutex<Vec<Frame>>>,
        closed: Arc<AtomicUsize>,
        fail_sends: bool,
    }

    impl Recorder {
        fn failing() -> Self {
            Self {
                fail_sends: true,
                ..Self::default()
            }
        }

        fn outbound(&self) -> Box<dyn Outbound> {
            Box::new(RecorderOutbound {
                frames: self.frames.clone(),
                closed: self.closed.clone(),
                fail_sends: self.fail_sends,
            })
        }

        fn texts(&self) -> Vec<String> {
            self.frames
                .lock()
                .unwrap()
                .iter()
                .filter_map(|frame| match frame {
                    Frame::Text(payload) => Some(payload.clone()),
                    Frame::Binary(_) => None,
                })
                .collect()
        }

        fn frame_count(&self) -> usize {
            self.frames.lock().unwrap().len()
        }

        fn close_count(&self) -> usize {
            self.closed.load(Ordering::SeqCst)
        }
    }

    impl Outbound for RecorderOutbound {
        fn send_text(&self, payload: String) -> Result<(), DeliveryError> {
            if self.fail_sends {
                return Err(DeliveryError);
            }
            self.frames.lock().unwrap().push(Frame::Text(payload));
            Ok(())
        }

        fn send_binary(&self, payload: Bytes) -> Result<(), DeliveryError> {
            if self.fail_sends {
                return Err(DeliveryError);
            }
            self.frames.lock().unwrap().push(Frame::Binary(payload));
            Ok(())
        }

        fn close(&self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn subscriber(session_id: &str, recorder: &Recorder) -> Subscriber {
        Subscriber {
            id: Uuid::new_v4(),
            session_id: session_id.to_string(),
            joined_at: Utc::now(),
            outbound: recorder.outbound(),
        }
    }

    #[test]
    fn test_broadcast_reaches_only_matching_session() {
        let mut registry = Registry::new();
        let in_session = Recorder::default();
        let other_session = Recorder::default();

        registry.register(StreamKind::Transcript, subscriber("a", &in_session));
        registry.register(StreamKind::Transcript, subscriber("b", &other_session));

        let outcome = registry.broadcast(
            StreamKind::Transcript,
            "a",
            &Frame::Text("[]".to_string()),
        );

        assert_eq!(outcome.delivered, 1);
        assert_eq!(in_session.texts(), vec!["[]".to_string()]);
        assert_eq!(other_session.frame_count(), 0);
    }

    #[test]
    fn test_partitions_never_cross_deliver() {
        let mut registry = Registry::new();
        let transcript_side = Recorder::default();
        let audio_side = Recorder::default();

        registry.register(StreamKind::Transcript, subscriber("a", &transcript_side));
        registry.register(StreamKind::Audio, subscriber("a", &audio_side));

        registry.broadcast(StreamKind::Transcript, "a", &Frame::Text("[]".to_string()));

        // same session id, different stream kind: the audio subscriber must
        // not see transcript traffic
        assert_eq!(transcript_side.frame_count(), 1);
        assert_eq!(audio_side.frame_count(), 0);
    }

    #[test]
    fn test_register_unregister_round_trip_is_pristine() {
        let mut registry = Registry::new();
        let recorder = Recorder::default();
        let subscriber = subscriber("a", &recorder);
        let id = subscriber.id;

        registry.register(StreamKind::Audio, subscriber);
        assert!(registry.unregister(StreamKind::Audio, "a", id));

        assert!(registry.is_empty());
        assert_eq!(registry.counts().audio_sessions, 0);
        assert_eq!(recorder.close_count(), 1);
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let mut registry = Registry::new();
        let recorder = Recorder::default();
        let subscriber = subscriber("a", &recorder);
        let id = subscriber.id;

        registry.register(StreamKind::Transcript, subscriber);
        assert!(registry.unregister(StreamKind::Transcript, "a", id));
        assert!(!registry.unregister(StreamKind::Transcript, "a", id));
        assert!(!registry.unregister(StreamKind::Transcript, "missing", id));
    }

    #[test]
    fn test_broadcast_to_empty_session_is_noop() {
        let mut registry = Registry::new();
        let outcome = registry.broadcast(StreamKind::Audio, "nobody", &Frame::Binary(Bytes::new()));

        assert_eq!(outcome.delivered, 0);
        assert_eq!(outcome.evicted, 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_failed_subscriber_evicted_after_one_attempt() {
        let mut registry = Registry::new();
        let healthy = Recorder::default();
        let broken = Recorder::failing();

        registry.register(StreamKind::Transcript, subscriber("a", &healthy));
        registry.register(StreamKind::Transcript, subscriber("a", &broken));

        let first = registry.broadcast(StreamKind::Transcript, "a", &Frame::Text("1".to_string()));
        assert_eq!(first.delivered, 1);
        assert_eq!(first.evicted, 1);
        assert_eq!(broken.close_count(), 1);

        // the evicted subscriber is gone; later broadcasts reach only the
        // healthy one and evict nobody
        let second = registry.broadcast(StreamKind::Transcript, "a", &Frame::Text("2".to_string()));
        assert_eq!(second.delivered, 1);
        assert_eq!(second.evicted, 0);
        assert_eq!(healthy.texts(), vec!["1".to_string(), "2".to_string()]);
        assert_eq!(broken.close_count(), 1);
    }

    #[test]
    fn test_session_entry_removed_when_all_subscribers_fail() {
        let mut registry = Registry::new();
        let broken = Recorder::failing();

        registry.register(StreamKind::Audio, subscriber("a", &broken));
        registry.broadcast(StreamKind::Audio, "a", &Frame::Binary(Bytes::from_static(b"x")));

        assert!(registry.is_empty());
    }

    #[test]
    fn test_audio_connected_since_returns_earliest_join() {
        let mut registry = Registry::new();
        let recorder = Recorder::default();

        let mut early = subscriber("a", &recorder);
        early.joined_at = Utc::now() - chrono::Duration::seconds(90);
        let early_join = early.joined_at;

        registry.register(StreamKind::Audio, early);
        registry.register(StreamKind::Audio, subscriber("a", &recorder));

        assert_eq!(registry.audio_connected_since("a"), Some(early_join));
        assert_eq!(registry.audio_connected_since("other"), None);
    }

    #[test]
    fn test_drain_closes_everything() {
        let mut registry = Registry::new();
        let recorder = Recorder::default();

        registry.register(StreamKind::Transcript, subscriber("a", &recorder));
        registry.register(StreamKind::Audio, subscriber("a", &recorder));
        registry.register(StreamKind::Audio, subscriber("b", &recorder));

        assert_eq!(registry.drain(), 3);
        assert_eq!(recorder.close_count(), 3);
        assert!(registry.is_empty());
    }
}
