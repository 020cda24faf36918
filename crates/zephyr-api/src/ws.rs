//! WebSocket handling for real-time job updates.
//!
//! Rewired from a single global broadcast channel with client-side
//! channel filtering to `zephyr_scheduler::ObserverBus`'s per-job
//! subscriber map: a client names the job it wants by id, and only
//! that job's events cross the wire.

use std::collections::HashMap;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use zephyr_core::id::JobId;

use crate::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    info!("WebSocket connection established");

    let (mut sender, mut receiver) = socket.split();
    let (forward_tx, mut forward_rx) = tokio::sync::mpsc::channel(128);
    let mut subscriptions: HashMap<JobId, JoinHandle<()>> = HashMap::new();

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(cmd) = serde_json::from_str::<WsCommand>(&text) {
                            match cmd {
                                WsCommand::Subscribe { job_id } => {
                                    let job_id = JobId::from(job_id);
                                    info!(job_id = %job_id, "client subscribed");
                                    let mut rx = state.observer.subscribe(job_id.clone(), 64);
                                    let forward = forward_tx.clone();
                                    let task = tokio::spawn(async move {
                                        while let Some(event) = rx.recv().await {
                                            if forward.send(event).await.is_err() {
                                                break;
                                            }
                                        }
                                    });
                                    if let Some(previous) = subscriptions.insert(job_id.clone(), task) {
                                        previous.abort();
                                    }
                                    let response = WsResponse::Subscribed { job_id: job_id.to_string() };
                                    if let Ok(json) = serde_json::to_string(&response) {
                                        let _ = sender.send(Message::Text(json.into())).await;
                                    }
                                }
                                WsCommand::Unsubscribe { job_id } => {
                                    let job_id = JobId::from(job_id);
                                    info!(job_id = %job_id, "client unsubscribed");
                                    if let Some(task) = subscriptions.remove(&job_id) {
                                        task.abort();
                                    }
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("WebSocket connection closed");
                        break;
                    }
                    Some(Err(err)) => {
                        warn!(error = %err, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }

            event = forward_rx.recv() => {
                match event {
                    Some(event) => {
                        if let Ok(json) = serde_json::to_string(&event) {
                            if sender.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    None => break,
                }
            }
        }
    }

    for (_, task) in subscriptions {
        task.abort();
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsCommand {
    Subscribe { job_id: String },
    Unsubscribe { job_id: String },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsResponse {
    Subscribed { job_id: String },
}
