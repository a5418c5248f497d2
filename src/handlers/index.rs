use actix_web::HttpResponse;

const INDEX_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Transcript Relay</title></head>
<body>
  <h1>Transcript Relay</h1>
  <p>Live transcript and audio relay, partitioned by session identifier.</p>
  <ul>
    <li><code>POST /transcript/process?uid=...</code> &mdash; ingest transcript segments</li>
    <li><code>POST /audio/process?uid=...</code> &mdash; ingest raw PCM audio</li>
    <li><code>GET /audio/buffer?uid=...&amp;format=wav</code> &mdash; download accumulated audio</li>
    <li><code>GET /ws?uid=...</code> &mdash; subscribe to transcripts (WebSocket)</li>
    <li><code>GET /ws/audio?uid=...</code> &mdash; subscribe to audio (WebSocket)</li>
    <li><code>GET /health</code> &mdash; service health</li>
  </ul>
</body>
</html>
"#;

/// `GET /` — a minimal landing page listing the endpoints.
pub async fn index() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(INDEX_PAGE)
}
