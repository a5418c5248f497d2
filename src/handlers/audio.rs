//! # Audio Ingest & Buffer Retrieval
//!
//! `POST /audio/process` takes a chunk of raw 16-bit PCM, accumulates it in
//! the session's server-side buffer (when retention is enabled), computes
//! peak/RMS inline, and relays both the bytes and the statistics to the
//! session's audio subscribers. The buffer endpoints serve accumulated (or
//! caller-supplied) PCM back, optionally wrapped in a WAV header.

use crate::audio::stats::{analyze_chunk, buffer_duration_secs};
use crate::audio::wav::{wav_header, WAV_HEADER_LEN};
use crate::error::AppError;
use crate::relay::messages::{AudioConnectedSince, AudioStats, BroadcastAudio, BroadcastAudioStats};
use crate::state::AppState;

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use tracing::debug;

const PROCESSED_BODY: &str = "Audio data processed successfully";

/// Humanized elapsed time for the `connected_since` stats field.
fn connected_since_label(elapsed: chrono::Duration) -> String {
    format!("{:.1}s", elapsed.num_milliseconds() as f64 / 1000.0)
}

/// `POST /audio/process?uid=<session>[&sample_rate=8000][&channels=1]`
///
/// Body is raw little-endian PCM16. Chunks shorter than one sample are
/// acknowledged but produce no broadcast; there is nothing to analyze.
pub async fn process_audio(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let uid = super::required_uid(&req)?;
    let config = state.get_config();
    let format = super::audio_format_from_query(&req, &config);

    debug!(uid = %uid, bytes = body.len(), "Received audio chunk");
    state.record_audio_bytes(body.len() as u64);

    // Retention is a deployment choice: either the server accumulates a
    // capped rolling buffer per session, or clients keep their own copy and
    // stats describe the chunk alone.
    let total_buffered = if config.relay.retain_audio_buffer {
        state.buffers().append(&uid, &body)
    } else {
        body.len()
    };

    if body.len() < 2 {
        return Ok(HttpResponse::Ok()
            .content_type("text/plain")
            .body(PROCESSED_BODY));
    }

    let pcm = analyze_chunk(&body);

    // Connection lookup goes through the hub mailbox; a lapsed hub just
    // means the optional fields stay absent.
    let connected_at = state
        .hub()
        .send(AudioConnectedSince {
            session_id: uid.clone(),
        })
        .await
        .ok()
        .flatten();

    let now = Utc::now();
    let stats = AudioStats {
        sample_rate: format.sample_rate,
        channels: format.channels,
        peak_value: pcm.peak,
        rms_value: pcm.rms,
        byte_count: body.len(),
        session_id: uid.clone(),
        timestamp: now.timestamp_millis(),
        buffer_duration: Some(buffer_duration_secs(
            total_buffered,
            format.sample_rate,
            format.channels,
        )),
        total_buffer_size: config.relay.retain_audio_buffer.then_some(total_buffered),
        connection_time: connected_at.map(|t| t.to_rfc3339()),
        connected_since: connected_at.map(|t| connected_since_label(now - t)),
    };

    // Bytes first, stats second; the hub mailbox preserves this order for
    // every subscriber.
    state.hub().do_send(BroadcastAudio {
        session_id: uid.clone(),
        bytes: body,
    });
    state.hub().do_send(BroadcastAudioStats {
        session_id: uid,
        stats,
    });

    Ok(HttpResponse::Ok()
        .content_type("text/plain")
        .body(PROCESSED_BODY))
}

fn wav_response(pcm: &[u8], format: super::AudioFormat) -> HttpResponse {
    let mut file = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());
    file.extend_from_slice(&wav_header(pcm.len(), format.sample_rate, format.channels));
    file.extend_from_slice(pcm);

    HttpResponse::Ok()
        .content_type("audio/wav")
        .insert_header((
            "Content-Disposition",
            "attachment; filename=audio_buffer.wav",
        ))
        .body(file)
}

/// `POST /audio/buffer[?sample_rate=][&channels=]`
///
/// Converts caller-supplied PCM into a downloadable WAV file without
/// touching any server-side state.
pub async fn convert_audio_buffer(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let format = super::audio_format_from_query(&req, &state.get_config());
    Ok(wav_response(&body, format))
}

/// `GET /audio/buffer?uid=<session>[&format=wav|raw]...`
///
/// Serves the session's accumulated server-side buffer: raw PCM by
/// default, WAV-wrapped on request. A session that has never produced
/// audio yields 204, not an error.
pub async fn read_audio_buffer(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let uid = super::required_uid(&req)?;
    let format = super::audio_format_from_query(&req, &state.get_config());

    let Some(pcm) = state.buffers().read(&uid) else {
        return Ok(HttpResponse::NoContent().finish());
    };

    let as_wav = super::query_map(&req)
        .get("format")
        .is_some_and(|format| format == "wav");
    if as_wav {
        Ok(wav_response(&pcm, format))
    } else {
        Ok(HttpResponse::Ok()
            .content_type("application/octet-stream")
            .body(pcm))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::buffer::SessionBufferStore;
    use crate::config::AppConfig;
    use crate::relay::hub::RelayHub;
    use crate::relay::messages::{Register, Snapshot};
    use crate::relay::registry::{DeliveryError, Outbound, StreamKind, Subscriber};
    use actix::Actor;
    use actix_web::web::Bytes;
    use actix_web::{test, App};
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    #[derive(Clone, Default)]
    struct Recorder {
        texts: Arc<Mutex<Vec<String>>>,
        binaries: Arc<Mutex<Vec<Bytes>>>,
    }

    impl Outbound for Recorder {
        fn send_text(&self, payload: String) -> Result<(), DeliveryError> {
            self.texts.lock().unwrap().push(payload);
            Ok(())
        }

        fn send_binary(&self, payload: Bytes) -> Result<(), DeliveryError> {
            self.binaries.lock().unwrap().push(payload);
            Ok(())
        }

        fn close(&self) {}
    }

    fn pcm(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    fn test_state() -> AppState {
        AppState::new(
            AppConfig::default(),
            RelayHub::new().start(),
            Arc::new(SessionBufferStore::default()),
        )
    }

    #[actix_web::test]
    async fn test_chunk_buffered_and_relayed_with_stats() {
        let state = test_state();
        let hub = state.hub().clone();
        let recorder = Recorder::default();

        hub.send(Register {
            kind: StreamKind::Audio,
            subscriber: Subscriber {
                id: Uuid::new_v4(),
                session_id: "abc".to_string(),
                joined_at: Utc::now(),
                outbound: Box::new(recorder.clone()),
            },
        })
        .await
        .unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .route("/audio/process", web::post().to(process_audio)),
        )
        .await;

        let chunk = pcm(&[100, -200, 50]);
        let req = test::TestRequest::post()
            .uri("/audio/process?uid=abc&sample_rate=8000&channels=1")
            .set_payload(chunk.clone())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);

        // retention defaults to on: the chunk landed in the session buffer
        assert_eq!(state.buffers().read("abc").unwrap(), chunk);

        hub.send(Snapshot).await.unwrap();

        let binaries = recorder.binaries.lock().unwrap();
        assert_eq!(binaries.as_slice(), &[Bytes::from(chunk)]);

        let texts = recorder.texts.lock().unwrap();
        assert_eq!(texts.len(), 1);
        let stats: AudioStats = serde_json::from_str(&texts[0]).unwrap();
        assert_eq!(stats.session_id, "abc");
        assert_eq!(stats.peak_value, 200);
        assert_eq!(stats.byte_count, 6);
        assert_eq!(stats.total_buffer_size, Some(6));
        // a live audio subscriber was found, so the connection fields are set
        assert!(stats.connection_time.is_some());
        assert!(stats.connected_since.is_some());
    }

    #[actix_web::test]
    async fn test_sub_sample_chunk_acked_without_broadcast() {
        let state = test_state();
        let hub = state.hub().clone();
        let recorder = Recorder::default();

        hub.send(Register {
            kind: StreamKind::Audio,
            subscriber: Subscriber {
                id: Uuid::new_v4(),
                session_id: "abc".to_string(),
                joined_at: Utc::now(),
                outbound: Box::new(recorder.clone()),
            },
        })
        .await
        .unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/audio/process", web::post().to(process_audio)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/audio/process?uid=abc")
            .set_payload(vec![0x7f])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);

        hub.send(Snapshot).await.unwrap();
        assert!(recorder.binaries.lock().unwrap().is_empty());
        assert!(recorder.texts.lock().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_read_buffer_raw_and_wav() {
        let state = test_state();
        state.buffers().append("abc", &pcm(&[1, 2, 3]));

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/audio/buffer", web::get().to(read_audio_buffer)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/audio/buffer?uid=abc")
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, Bytes::from(pcm(&[1, 2, 3])));

        let req = test::TestRequest::get()
            .uri("/audio/buffer?uid=abc&format=wav&sample_rate=8000&channels=1")
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body.len(), WAV_HEADER_LEN + 6);
        assert_eq!(&body[0..4], b"RIFF");

        let req = test::TestRequest::get()
            .uri("/audio/buffer?uid=silent")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 204);
    }

    #[actix_web::test]
    async fn test_convert_buffer_wraps_body() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state()))
                .route("/audio/buffer", web::post().to(convert_audio_buffer)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/audio/buffer?sample_rate=16000&channels=2")
            .set_payload(pcm(&[5, -5]))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            "audio/wav"
        );

        let body = test::read_body(resp).await;
        assert_eq!(body.len(), WAV_HEADER_LEN + 4);
        assert_eq!(&body[8..12], b"WAVE");
    }
}
