use crate::domain::{CommandOutcome, CommandRequest};
use crate::interface_adapters::net::{ConnId, ConnectionRegistry};
use crate::interface_adapters::protocol::{
    ClientMessage, DecodeError, ServerMessage, decode_client_message,
};
use crate::interface_adapters::state::AppState;
use crate::use_cases::{CommandResolver, SimulationSlot};

use axum::{
    extract::{
        ConnectInfo, State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{Sink, SinkExt, StreamExt};
use std::{
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{Instrument, debug, error, info, info_span, warn};

#[derive(Debug, Error)]
enum NetError {
    // Categorizes connection lifecycle failures so callers can decide policy.
    #[error("websocket error: {0}")]
    Ws(#[from] axum::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("write timed out")]
    WriteTimeout,
}

const LOG_THROTTLE: Duration = Duration::from_secs(2);
const MAX_INVALID_JSON: u32 = 10;
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(2);

const INVALID_FORMAT: &str = "Invalid message format";

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> Response {
    // Rejected before the upgrade so no frame is ever sent.
    if !state.allow_list.allows(remote.ip()) {
        warn!(%remote, "connection rejected by allow-list");
        return StatusCode::FORBIDDEN.into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, remote, state))
}

struct ConnCtx {
    conn_id: ConnId,
    msgs_in: u64,
    bytes_in: u64,
    commands: u64,
    invalid_json: u32,
    last_invalid_log: Instant,
    close_frame: Option<CloseFrame>,
}

enum LoopControl {
    Continue,
    Disconnect,
}

async fn handle_socket(socket: WebSocket, remote: SocketAddr, state: Arc<AppState>) {
    let (sink, mut stream) = socket.split();
    let (conn_id, outbound_tx, outbound_rx) = admit(&state.registry, &state.welcome, remote).await;
    let span = info_span!("conn", conn_id, %remote);

    async move {
        let mut writer =
            tokio::spawn(write_outbound(sink, outbound_rx, WRITE_TIMEOUT).in_current_span());
        let mut writer_done = false;

        let clients = state.registry.count().await;
        info!(clients, "client connected");

        let mut ctx = ConnCtx {
            conn_id,
            msgs_in: 0,
            bytes_in: 0,
            commands: 0,
            invalid_json: 0,
            last_invalid_log: Instant::now() - LOG_THROTTLE,
            close_frame: None,
        };
        let mut shutdown_rx = state.shutdown_rx.clone();

        loop {
            let control = tokio::select! {
                incoming = stream.next() => handle_incoming(&state, &mut ctx, incoming).await,

                finished = &mut writer => {
                    writer_done = true;
                    match finished {
                        Ok(Ok(())) => debug!("writer finished"),
                        Ok(Err(e)) => warn!(error = %e, "writer failed; closing connection"),
                        Err(e) => error!(error = %e, "writer task aborted"),
                    }
                    LoopControl::Disconnect
                }

                _ = shutdown_rx.changed() => {
                    ctx.close_frame = Some(CloseFrame {
                        code: close_code::AWAY,
                        reason: "server stopping".into(),
                    });
                    LoopControl::Disconnect
                }
            };

            if let LoopControl::Disconnect = control {
                break;
            }
        }

        // Unregister first so no new broadcast targets this connection.
        state.registry.unregister(conn_id).await;

        if !writer_done {
            if let Some(frame) = ctx.close_frame.take() {
                let _ = timeout(WRITE_TIMEOUT, outbound_tx.send(Message::Close(Some(frame)))).await;
            }
            drop(outbound_tx);
            if timeout(WRITE_TIMEOUT, &mut writer).await.is_err() {
                writer.abort();
            }
        }

        debug!(
            msgs_in = ctx.msgs_in,
            bytes_in = ctx.bytes_in,
            commands = ctx.commands,
            invalid_json = ctx.invalid_json,
            "connection stats"
        );
        let clients = state.registry.count().await;
        info!(clients, "client disconnected");
    }
    .instrument(span)
    .await
}

/// Creates the outbound queue with the welcome frame already in it, then
/// registers the queue. Broadcasts can only reach it after the welcome.
async fn admit(
    registry: &ConnectionRegistry,
    welcome: &str,
    remote: SocketAddr,
) -> (ConnId, mpsc::Sender<Message>, mpsc::Receiver<Message>) {
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
    match encode(&ServerMessage::welcome(welcome)) {
        // Fresh queue, so this cannot be full.
        Ok(frame) => {
            let _ = outbound_tx.try_send(Message::Text(frame));
        }
        Err(e) => error!(%remote, error = %e, "failed to serialize welcome frame"),
    }
    let conn_id = registry.register(remote, outbound_tx.clone()).await;
    (conn_id, outbound_tx, outbound_rx)
}

/// Single writer for the socket: drains the outbound queue until every sender
/// is gone or a close frame has been written. A write that does not finish
/// within `write_timeout` ends the connection.
async fn write_outbound<S>(
    mut sink: S,
    mut outbound_rx: mpsc::Receiver<Message>,
    write_timeout: Duration,
) -> Result<(), NetError>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    while let Some(message) = outbound_rx.recv().await {
        let closing = matches!(message, Message::Close(_));
        match timeout(write_timeout, sink.send(message)).await {
            Ok(result) => result?,
            Err(_) => return Err(NetError::WriteTimeout),
        }
        if closing {
            break;
        }
    }
    if let Err(e) = sink.close().await {
        debug!(error = %e, "socket close error");
    }
    Ok(())
}

fn encode(msg: &ServerMessage) -> Result<Utf8Bytes, NetError> {
    let txt = serde_json::to_string(msg)?;
    Ok(Utf8Bytes::from(txt))
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

async fn handle_incoming(
    state: &AppState,
    ctx: &mut ConnCtx,
    incoming: Option<Result<Message, axum::Error>>,
) -> LoopControl {
    match incoming {
        Some(Ok(msg)) => match msg {
            Message::Text(text) => {
                ctx.msgs_in += 1;
                ctx.bytes_in += text.len() as u64;

                match decode_client_message(&text) {
                    Ok(ClientMessage::ExecuteCommand(request)) => {
                        ctx.commands += 1;
                        let outcome = run_command(&state.simulation, request).await;
                        reply(state, ctx, &outcome.into()).await;
                        LoopControl::Continue
                    }
                    Ok(ClientMessage::GetPlayerData) => {
                        // Clone out of the watch so no borrow is held across the send.
                        let known = state.known_rx.borrow().clone();
                        reply(state, ctx, &ServerMessage::player_data(&known)).await;
                        LoopControl::Continue
                    }
                    Err(e) => {
                        ctx.invalid_json += 1;
                        if should_log(&mut ctx.last_invalid_log) {
                            warn!(bytes = text.len(), error = %e, "rejected client message");
                        }

                        let message = match e {
                            DecodeError::Malformed(_) => INVALID_FORMAT.to_string(),
                            DecodeError::UnknownType(kind) => format!("Unknown message type: {kind}"),
                        };
                        reply(state, ctx, &ServerMessage::error(message)).await;

                        if ctx.invalid_json > MAX_INVALID_JSON {
                            ctx.close_frame = Some(CloseFrame {
                                code: close_code::POLICY,
                                reason: "too many invalid messages".into(),
                            });
                            return LoopControl::Disconnect;
                        }
                        LoopControl::Continue
                    }
                }
            }
            Message::Binary(_) => {
                ctx.close_frame = Some(CloseFrame {
                    code: close_code::UNSUPPORTED,
                    reason: "binary messages not supported".into(),
                });
                LoopControl::Disconnect
            }
            Message::Ping(_) | Message::Pong(_) => LoopControl::Continue,
            Message::Close(_) => LoopControl::Disconnect,
        },
        Some(Err(e)) => {
            warn!(error = %e, "websocket recv error");
            LoopControl::Disconnect
        }
        None => {
            info!("websocket closed");
            LoopControl::Disconnect
        }
    }
}

/// Unicast to the connection that sent the request. A full queue drops the
/// reply; the registry already logged it.
async fn reply(state: &AppState, ctx: &ConnCtx, msg: &ServerMessage) {
    match encode(msg) {
        Ok(frame) => {
            let _ = state.registry.send_to(ctx.conn_id, frame).await;
        }
        Err(e) => error!(error = %e, "failed to serialize reply"),
    }
}

/// Runs the resolver on the blocking pool so a slow or panicking host never
/// stalls the runtime.
async fn run_command(simulation: &SimulationSlot, request: CommandRequest) -> CommandOutcome {
    let attached = simulation.current();
    let task = tokio::task::spawn_blocking(move || {
        CommandResolver::new(attached.as_deref()).execute(&request)
    });
    match task.await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(error = %e, "command task failed");
            CommandOutcome::failed(format!("Command execution failed: {e}"))
        }
    }
}
