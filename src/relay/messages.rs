//! # Relay Wire & Mailbox Types
//!
//! The data that moves through the system: transcript segments and audio
//! statistics as they appear on the wire, plus the actix message types the
//! relay hub accepts. Wire shapes are field-exact contracts with existing
//! clients; changing a serialized name here breaks them.

use crate::relay::registry::{RegistryCounts, StreamKind, Subscriber};
use actix::prelude::*;
use actix_web::web::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One transcribed utterance.
///
/// Immutable once created; a batch of segments (a "transcript update") is
/// delivered atomically to all subscribers of one session. The `timestamp`
/// is assigned by the server at ingestion time, not by the producer, and is
/// omitted from the wire until assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    pub speaker: String,
    pub speaker_id: i32,
    pub is_user: bool,
    /// Stable person identifier when speaker identification resolved one;
    /// serialized as `null` otherwise.
    pub person_id: Option<String>,
    #[serde(rename = "start")]
    pub start_time: f64,
    #[serde(rename = "end")]
    pub end_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Statistics about one ingested audio chunk, broadcast to the session's
/// audio subscribers alongside the raw bytes.
///
/// The session identifier travels as `uid` on the wire. Optional fields are
/// present-or-absent: `connection_time`/`connected_since` only when a live
/// audio subscriber was found for the session, `total_buffer_size` only
/// when server-side buffer retention is enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioStats {
    pub sample_rate: u32,
    pub channels: u16,
    pub peak_value: i16,
    pub rms_value: f64,
    pub byte_count: usize,
    #[serde(rename = "uid")]
    pub session_id: String,
    /// Epoch milliseconds at computation time.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_buffer_size: Option<usize>,
    /// RFC 3339 instant the earliest audio subscriber joined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected_since: Option<String>,
}

// ---------------------------------------------------------------------------
// Hub mailbox messages
// ---------------------------------------------------------------------------

/// Insert a subscriber into one partition of the registry.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Register {
    pub kind: StreamKind,
    pub subscriber: Subscriber,
}

/// Remove a subscriber and close its connection. Idempotent: unregistering
/// a connection the registry no longer holds is a no-op.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Unregister {
    pub kind: StreamKind,
    pub session_id: String,
    pub connection_id: Uuid,
}

/// Deliver a segment batch to every transcript subscriber of one session.
#[derive(Message)]
#[rtype(result = "()")]
pub struct BroadcastTranscript {
    pub session_id: String,
    pub segments: Vec<Segment>,
}

/// Deliver raw audio bytes as a binary frame to every audio subscriber of
/// one session.
#[derive(Message)]
#[rtype(result = "()")]
pub struct BroadcastAudio {
    pub session_id: String,
    pub bytes: Bytes,
}

/// Deliver chunk statistics to every audio subscriber of one session.
#[derive(Message)]
#[rtype(result = "()")]
pub struct BroadcastAudioStats {
    pub session_id: String,
    pub stats: AudioStats,
}

/// When did the earliest still-connected audio subscriber of this session
/// join? `None` when the session has no audio subscribers.
#[derive(Message)]
#[rtype(result = "Option<chrono::DateTime<chrono::Utc>>")]
pub struct AudioConnectedSince {
    pub session_id: String,
}

/// Aggregate registry counts for health reporting.
#[derive(Message)]
#[rtype(result = "RegistryCounts")]
pub struct Snapshot;

/// Close every connection and empty both partitions. Sent once during
/// shutdown after the HTTP server has stopped accepting requests. Returns
/// the number of connections closed.
#[derive(Message)]
#[rtype(result = "usize")]
pub struct Drain;

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_segment() -> Segment {
        Segment {
            text: "hello there".to_string(),
            speaker: "SPEAKER_00".to_string(),
            speaker_id: 0,
            is_user: true,
            person_id: None,
            start_time: 1.25,
            end_time: 2.5,
            timestamp: None,
        }
    }

    #[test]
    fn test_segment_wire_field_names() {
        let mut segment = sample_segment();
        segment.timestamp = Some(Utc::now());

        let value = serde_json::to_value(&segment).unwrap();
        let object = value.as_object().unwrap();

        for field in ["text", "speaker", "speaker_id", "is_user", "person_id", "start", "end", "timestamp"] {
            assert!(object.contains_key(field), "missing wire field {field}");
        }
        assert_eq!(value["start"], 1.25);
        assert_eq!(value["end"], 2.5);
        // absent person id is an explicit null, not an omitted key
        assert!(value["person_id"].is_null());
    }

    #[test]
    fn test_segment_timestamp_omitted_until_assigned() {
        let value = serde_json::to_value(sample_segment()).unwrap();
        assert!(value.as_object().unwrap().get("timestamp").is_none());
    }

    #[test]
    fn test_segment_batch_serializes_as_array() {
        let batch = vec![sample_segment(), sample_segment()];
        let json = serde_json::to_string(&batch).unwrap();
        assert!(json.starts_with('['));

        let parsed: Vec<Segment> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].text, "hello there");
    }

    #[test]
    fn test_audio_stats_optional_fields_skipped() {
        let stats = AudioStats {
            sample_rate: 8000,
            channels: 1,
            peak_value: 200,
            rms_value: 132.29,
            byte_count: 6,
            session_id: "abc".to_string(),
            timestamp: 1_700_000_000_000,
            buffer_duration: Some(0.000375),
            total_buffer_size: None,
            connection_time: None,
            connected_since: None,
        };

        let value = serde_json::to_value(&stats).unwrap();
        let object = value.as_object().unwrap();

        assert_eq!(value["uid"], "abc");
        assert_eq!(value["peak_value"], 200);
        assert!(object.contains_key("buffer_duration"));
        assert!(!object.contains_key("total_buffer_size"));
        assert!(!object.contains_key("connection_time"));
        assert!(!object.contains_key("connected_since"));
        assert!(!object.contains_key("session_id"));
    }
}
