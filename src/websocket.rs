//! # WebSocket Subscriber Endpoints
//!
//! Subscribers attach over persistent WebSocket connections and receive
//! whatever producers push for their session:
//!
//! - `GET /ws?uid=<session>` — transcript subscriber, receives segment
//!   batches as JSON text frames
//! - `GET /ws/audio?uid=<session>[&sample_rate=][&channels=]` — audio
//!   subscriber, receives raw PCM binary frames plus JSON stats frames
//!
//! ## Actor Model:
//! Each connection is an independent actix actor. It registers itself with
//! the relay hub when started and unregisters when stopped; in between, the
//! hub pushes outbound frames into the actor's mailbox. Inbound frames are
//! read only to detect disconnection — the subscriber protocol has no
//! client-to-server messages. Idle connections are never timed out; a
//! subscriber holds its slot until the transport errors or closes.

use crate::handlers::{audio_format_from_query, required_uid, AudioFormat};
use crate::relay::hub::RelayHub;
use crate::relay::messages::{Register, Unregister};
use crate::relay::registry::{DeliveryError, Outbound, StreamKind, Subscriber};
use crate::state::AppState;

use actix::prelude::*;
use actix_web::web::Bytes;
use actix_web::{web, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Segment batches and stats on their way to the peer.
#[derive(Message)]
#[rtype(result = "()")]
pub struct OutboundText(pub String);

/// Raw PCM on its way to the peer.
#[derive(Message)]
#[rtype(result = "()")]
pub struct OutboundBinary(pub Bytes);

/// Hub-initiated close: eviction after a failed write, or shutdown drain.
#[derive(Message)]
#[rtype(result = "()")]
pub struct CloseConnection;

/// The hub-facing side of a socket actor: frames are enqueued onto the
/// actor's mailbox without blocking. A full or closed mailbox reads as a
/// delivery failure, which the registry answers with eviction.
struct WsOutbound {
    text: Recipient<OutboundText>,
    binary: Recipient<OutboundBinary>,
    control: Recipient<CloseConnection>,
}

impl Outbound for WsOutbound {
    fn send_text(&self, payload: String) -> Result<(), DeliveryError> {
        self.text
            .try_send(OutboundText(payload))
            .map_err(|_| DeliveryError)
    }

    fn send_binary(&self, payload: Bytes) -> Result<(), DeliveryError> {
        self.binary
            .try_send(OutboundBinary(payload))
            .map_err(|_| DeliveryError)
    }

    fn close(&self) {
        let _ = self.control.try_send(CloseConnection);
    }
}

/// First frame on an audio connection, confirming the negotiated format.
#[derive(Debug, Serialize)]
struct AudioGreeting<'a> {
    sample_rate: u32,
    channels: u16,
    message: &'a str,
    uid: &'a str,
    connection_time: String,
    connected_since: &'a str,
}

/// One subscriber connection, transcript or audio.
pub struct RelaySocket {
    kind: StreamKind,
    session_id: String,
    connection_id: Uuid,
    joined_at: DateTime<Utc>,
    hub: Addr<RelayHub>,
    /// Present on audio sockets only; echoed back in the greeting.
    audio_format: Option<AudioFormat>,
}

impl RelaySocket {
    pub fn transcript(session_id: String, hub: Addr<RelayHub>) -> Self {
        Self::new(StreamKind::Transcript, session_id, hub, None)
    }

    pub fn audio(session_id: String, hub: Addr<RelayHub>, format: AudioFormat) -> Self {
        Self::new(StreamKind::Audio, session_id, hub, Some(format))
    }

    fn new(
        kind: StreamKind,
        session_id: String,
        hub: Addr<RelayHub>,
        audio_format: Option<AudioFormat>,
    ) -> Self {
        Self {
            kind,
            session_id,
            connection_id: Uuid::new_v4(),
            joined_at: Utc::now(),
            hub,
            audio_format,
        }
    }

    fn send_greeting(&self, ctx: &mut ws::WebsocketContext<Self>) {
        let Some(format) = &self.audio_format else {
            return;
        };
        let greeting = AudioGreeting {
            sample_rate: format.sample_rate,
            channels: format.channels,
            message: "Connected to audio stream",
            uid: &self.session_id,
            connection_time: self.joined_at.to_rfc3339(),
            connected_since: "0s",
        };
        match serde_json::to_string(&greeting) {
            Ok(json) => ctx.text(json),
            Err(err) => warn!(error = %err, "Failed to encode audio greeting"),
        }
    }
}

impl Actor for RelaySocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!(
            kind = %self.kind,
            session_id = %self.session_id,
            connection_id = %self.connection_id,
            "Subscriber connected"
        );

        self.send_greeting(ctx);

        let addr = ctx.address();
        self.hub.do_send(Register {
            kind: self.kind,
            subscriber: Subscriber {
                id: self.connection_id,
                session_id: self.session_id.clone(),
                joined_at: self.joined_at,
                outbound: Box::new(WsOutbound {
                    text: addr.clone().recipient(),
                    binary: addr.clone().recipient(),
                    control: addr.recipient(),
                }),
            },
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        info!(
            kind = %self.kind,
            session_id = %self.session_id,
            connection_id = %self.connection_id,
            "Subscriber disconnected"
        );
        // Idempotent: harmless if the hub already evicted this connection.
        self.hub.do_send(Unregister {
            kind: self.kind,
            session_id: self.session_id.clone(),
            connection_id: self.connection_id,
        });
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for RelaySocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(payload)) => ctx.pong(&payload),
            Ok(ws::Message::Close(reason)) => {
                debug!(session_id = %self.session_id, ?reason, "Subscriber closed connection");
                ctx.close(reason);
                ctx.stop();
            }
            // Inbound text/binary/pong is not part of the subscriber
            // protocol; reading it only keeps disconnection detection alive.
            Ok(_) => {}
            Err(err) => {
                debug!(session_id = %self.session_id, error = %err, "WebSocket protocol error");
                ctx.stop();
            }
        }
    }
}

impl Handler<OutboundText> for RelaySocket {
    type Result = ();

    fn handle(&mut self, msg: OutboundText, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl Handler<OutboundBinary> for RelaySocket {
    type Result = ();

    fn handle(&mut self, msg: OutboundBinary, ctx: &mut Self::Context) {
        ctx.binary(msg.0);
    }
}

impl Handler<CloseConnection> for RelaySocket {
    type Result = ();

    fn handle(&mut self, _msg: CloseConnection, ctx: &mut Self::Context) {
        ctx.close(None);
        ctx.stop();
    }
}

/// `GET /ws` — upgrade to a transcript subscriber.
pub async fn transcript_websocket(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let uid = required_uid(&req)?;
    ws::start(
        RelaySocket::transcript(uid, state.hub().clone()),
        &req,
        stream,
    )
}

/// `GET /ws/audio` — upgrade to an audio subscriber.
pub async fn audio_websocket(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let uid = required_uid(&req)?;
    let format = audio_format_from_query(&req, &state.get_config());
    ws::start(
        RelaySocket::audio(uid, state.hub().clone(), format),
        &req,
        stream,
    )
}
