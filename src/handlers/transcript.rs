//! # Transcript Ingest
//!
//! `POST /transcript/process?uid=<session>` accepts a batch of transcribed
//! segments and relays it to every transcript subscriber of that session.
//! The producer gets its response as soon as the batch is submitted to the
//! hub; delivery is fire-and-forget and a slow subscriber never delays the
//! request.

use crate::error::AppError;
use crate::relay::messages::{BroadcastTranscript, Segment};
use crate::state::AppState;

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Incoming transcript update. The authoritative session identifier is the
/// `uid` query parameter; `session_id` in the body is the producer's own
/// recording-session label and is only logged.
#[derive(Debug, Deserialize)]
pub struct TranscriptRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    pub segments: Vec<Segment>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptResponse {
    pub success: bool,
    pub message: String,
}

pub async fn process_transcript(
    req: HttpRequest,
    body: web::Json<TranscriptRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let uid = super::required_uid(&req)?;
    let mut request = body.into_inner();

    if request.segments.is_empty() {
        return Err(AppError::BadRequest("No segments provided".to_string()));
    }

    // Receipt timestamps are assigned here, at ingestion, not at origin.
    let now = Utc::now();
    for segment in &mut request.segments {
        segment.timestamp = Some(now);
    }

    let count = request.segments.len();
    info!(
        uid = %uid,
        session_id = ?request.session_id,
        segments = count,
        "Received transcript update"
    );
    for (index, segment) in request.segments.iter().enumerate() {
        debug!(
            "Segment {}: {} ({:.2} - {:.2})",
            index + 1,
            segment.text,
            segment.start_time,
            segment.end_time
        );
    }

    state.record_segments(count as u64);
    state.hub().do_send(BroadcastTranscript {
        session_id: uid,
        segments: request.segments,
    });

    Ok(HttpResponse::Ok().json(TranscriptResponse {
        success: true,
        message: format!("Successfully processed {} segments", count),
    }))
}
