// src/bridge.rs
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use url::Url;
use warp::Filter;
use warp::ws::{Message, WebSocket};

use crate::config::BridgeConfig;
use crate::controller::WorkflowController;
use crate::event::{EventForwarder, WorkflowEvent};
use crate::types::{AccessRight, Simulator};

/// Requests of a WebSocket frontend.
///
/// Mirrors the remote command set, with the run flags falling back to the
/// bridge configuration when left out.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "cmd", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BridgeRequest {
    RunAuth {
        #[serde(rename = "tcTokenURL")]
        tc_token_url: String,
        #[serde(rename = "developerMode")]
        developer_mode: Option<bool>,
        status: Option<bool>,
    },
    RunChangePin {
        status: Option<bool>,
    },
    SetAccessRights {
        chat: Vec<String>,
    },
    GetAccessRights,
    GetCertificate,
    SetPin {
        value: Option<String>,
    },
    SetNewPin {
        value: Option<String>,
    },
    SetPuk {
        value: Option<String>,
    },
    SetCan {
        value: Option<String>,
    },
    SetCard {
        name: String,
        simulator: Option<Simulator>,
    },
    Accept,
    Cancel,
    #[serde(rename = "CONTINUE")]
    ContinueWorkflow,
    GetStatus,
    GetInfo,
    GetReader {
        name: String,
    },
    GetReaderList,
}

/// Run `request` on `controller`.
pub fn apply(controller: &WorkflowController, request: BridgeRequest, config: &BridgeConfig) {
    match request {
        BridgeRequest::RunAuth {
            tc_token_url,
            developer_mode,
            status,
        } => match Url::parse(&tc_token_url) {
            Ok(url) => controller.start_authentication(
                &url,
                developer_mode.unwrap_or(config.developer_mode),
                status.unwrap_or(config.status_updates),
            ),
            Err(e) => warn!("Invalid tcTokenURL {:?}: {}", tc_token_url, e),
        },
        BridgeRequest::RunChangePin { status } => {
            controller.start_change_pin(status.unwrap_or(config.status_updates))
        }
        BridgeRequest::SetAccessRights { chat } => {
            let rights: Vec<AccessRight> = chat
                .iter()
                .filter_map(|name| {
                    let right = AccessRight::from_raw_name(name);
                    if right.is_none() {
                        debug!("Skipping unknown access right {}", name);
                    }
                    right
                })
                .collect();
            controller.set_access_rights(&rights);
        }
        BridgeRequest::GetAccessRights => controller.get_access_rights(),
        BridgeRequest::GetCertificate => controller.get_certificate(),
        BridgeRequest::SetPin { value } => controller.set_pin(value.as_deref()),
        BridgeRequest::SetNewPin { value } => controller.set_new_pin(value.as_deref()),
        BridgeRequest::SetPuk { value } => controller.set_puk(value.as_deref()),
        BridgeRequest::SetCan { value } => controller.set_can(value.as_deref()),
        BridgeRequest::SetCard { name, simulator } => controller.set_card(&name, simulator),
        BridgeRequest::Accept => controller.accept(),
        BridgeRequest::Cancel => controller.cancel(),
        BridgeRequest::ContinueWorkflow => controller.continue_workflow(),
        BridgeRequest::GetStatus => controller.get_status(),
        BridgeRequest::GetInfo => controller.get_info(),
        BridgeRequest::GetReader { name } => controller.get_reader(&name),
        BridgeRequest::GetReaderList => controller.get_reader_list(),
    }
}

/// Serve frontends on `config.listen` until the server fails.
///
/// Every workflow event of `controller` goes to every connected client as a
/// JSON text frame; text frames from clients are parsed as [`BridgeRequest`].
pub async fn start_server(controller: WorkflowController, config: BridgeConfig) {
    let (events_tx, _) = broadcast::channel::<WorkflowEvent>(config.event_buffer);
    controller.register_callbacks(Arc::new(EventForwarder::new(events_tx.clone())));
    let events_tx = Arc::new(events_tx);

    let listen = config.listen;
    let config = Arc::new(config);
    let ws_route = warp::path::end()
        .and(warp::ws())
        .map(move |ws: warp::ws::Ws| {
            let controller = controller.clone();
            let events_tx = events_tx.clone();
            let config = config.clone();
            ws.on_upgrade(move |socket| handle_connection(socket, controller, events_tx, config))
        });

    let routes = ws_route.with(warp::cors().allow_any_origin());

    info!("WebSocket server running on ws://{}", listen);
    warp::serve(routes).run(listen).await;
}

async fn handle_connection(
    ws: WebSocket,
    controller: WorkflowController,
    events_tx: Arc<broadcast::Sender<WorkflowEvent>>,
    config: Arc<BridgeConfig>,
) {
    let (mut client_ws_tx, mut client_ws_rx) = ws.split();
    let mut rx_events = events_tx.subscribe();
    debug!("Frontend connected");

    // Events -> Client
    let forward = tokio::spawn(async move {
        loop {
            let event = match rx_events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Frontend lagging, {} events dropped", skipped);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    error!("Could not encode event: {}", e);
                    continue;
                }
            };
            if client_ws_tx.send(Message::text(json)).await.is_err() {
                break;
            }
        }
    });

    // Client -> Controller
    while let Some(result) = client_ws_rx.next().await {
        let msg = match result {
            Ok(msg) => msg,
            Err(e) => {
                debug!("Frontend connection failed: {}", e);
                break;
            }
        };
        let Ok(text) = msg.to_str() else {
            continue;
        };
        match serde_json::from_str::<BridgeRequest>(text) {
            Ok(request) => apply(&controller, request, &config),
            Err(e) => warn!("Invalid request {}: {}", text, e),
        }
    }

    forward.abort();
    debug!("Frontend disconnected");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crossbeam_channel::Receiver;
    use serde_json::{Value, json};
    use tokio::runtime::Handle;

    use super::*;
    use crate::transport::{RemoteEndpoint, RemoteRequest, channel_transport};

    fn parse(json: &str) -> BridgeRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn requests_parse_like_commands() {
        assert_eq!(
            parse(r#"{"cmd":"RUN_AUTH","tcTokenURL":"https://test.governikus-eid.de/AusweisAuskunft/WebServiceRequesterServlet"}"#),
            BridgeRequest::RunAuth {
                tc_token_url: "https://test.governikus-eid.de/AusweisAuskunft/WebServiceRequesterServlet".into(),
                developer_mode: None,
                status: None,
            }
        );
        assert_eq!(parse(r#"{"cmd":"CONTINUE"}"#), BridgeRequest::ContinueWorkflow);
        assert_eq!(
            parse(r#"{"cmd":"SET_PIN","value":"123456"}"#),
            BridgeRequest::SetPin {
                value: Some("123456".into())
            }
        );
        assert_eq!(parse(r#"{"cmd":"SET_PIN"}"#), BridgeRequest::SetPin { value: None });
        assert!(serde_json::from_str::<BridgeRequest>(r#"{"cmd":"INTERRUPT"}"#).is_err());
    }

    async fn next_json(requests: &Receiver<RemoteRequest>) -> Value {
        let requests = requests.clone();
        let request = tokio::task::spawn_blocking(move || {
            loop {
                match requests.recv_timeout(Duration::from_secs(2)).unwrap() {
                    RemoteRequest::Send { json, .. } => return json,
                    _ => continue,
                }
            }
        })
        .await
        .unwrap();
        serde_json::from_str(&request).unwrap()
    }

    fn started_controller() -> (WorkflowController, RemoteEndpoint) {
        let (transport, remote) = channel_transport();
        let controller = WorkflowController::new(Arc::new(transport), &Handle::current());
        controller.start();
        assert_eq!(remote.requests().try_recv().unwrap(), RemoteRequest::Bind);
        remote.session_established("bridge");
        (controller, remote)
    }

    #[test_log::test(tokio::test(flavor = "multi_thread"))]
    async fn run_flags_fall_back_to_config() {
        let (controller, remote) = started_controller();
        let config = BridgeConfig {
            developer_mode: true,
            status_updates: false,
            ..BridgeConfig::default()
        };

        apply(
            &controller,
            parse(r#"{"cmd":"RUN_AUTH","tcTokenURL":"https://example.org/tcToken","status":true}"#),
            &config,
        );
        assert_eq!(
            next_json(remote.requests()).await,
            json!({
                "cmd": "RUN_AUTH",
                "tcTokenURL": "https://example.org/tcToken",
                "developerMode": true,
                "status": true
            })
        );

        apply(&controller, parse(r#"{"cmd":"RUN_CHANGE_PIN"}"#), &config);
        assert_eq!(
            next_json(remote.requests()).await,
            json!({"cmd": "RUN_CHANGE_PIN", "status": false})
        );
    }

    #[test_log::test(tokio::test(flavor = "multi_thread"))]
    async fn invalid_input_is_not_sent() {
        let (controller, remote) = started_controller();
        let config = BridgeConfig::default();

        apply(
            &controller,
            parse(r#"{"cmd":"RUN_AUTH","tcTokenURL":"not a url"}"#),
            &config,
        );
        apply(
            &controller,
            parse(r#"{"cmd":"SET_ACCESS_RIGHTS","chat":["Address","Nonsense","CommunityID"]}"#),
            &config,
        );
        apply(&controller, parse(r#"{"cmd":"GET_READER","name":"NFC"}"#), &config);

        assert_eq!(
            next_json(remote.requests()).await,
            json!({"cmd": "SET_ACCESS_RIGHTS", "chat": ["Address", "CommunityID"]})
        );
        assert_eq!(
            next_json(remote.requests()).await,
            json!({"cmd": "GET_READER", "name": "NFC"})
        );
    }
}
