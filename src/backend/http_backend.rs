//! `reqwest` implementation of [`Backend`].
//!
//! Plain endpoints share one client with a request timeout. The live stream uses a
//! second client without one, since the connection is expected to stay open. A backend
//! on a loopback address is always reached directly, bypassing any system proxy.

use std::net::IpAddr;

use futures::StreamExt;
use log::{debug, info, warn};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::{Client, ClientBuilder, Response, Url};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::configuration::types::BackendConfig;
use crate::error_handling::types::{ConfigError, ControlError, TransportError};

use super::backend_trait::{Backend, LiveFeed};
use super::sse::SseDecoder;
use super::types::{BackendErrorBody, ControlAction, ControlOptions, StatusReport};

const LIVE_FEED_CAPACITY: usize = 100;

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    stream_client: Client,
    history_url: Url,
    status_url: Url,
    stream_url: Url,
    start_url: Url,
    stop_url: Url,
    restart_url: Url,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, ConfigError> {
        let base = config.base_url.trim_end_matches('/');
        let base_url = Url::parse(base)
            .map_err(|e| ConfigError::BadUrl(format!("{}: {}", config.base_url, e)))?;
        let direct = is_loopback(&base_url);

        let client = client_builder(direct)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ConfigError::BadUrl(format!("cannot build HTTP client: {}", e)))?;
        let stream_client = client_builder(direct)
            .build()
            .map_err(|e| ConfigError::BadUrl(format!("cannot build HTTP client: {}", e)))?;

        let join = |path: &str| -> Result<Url, ConfigError> {
            let full = format!("{}{}", base, path);
            Url::parse(&full).map_err(|e| ConfigError::BadUrl(format!("{}: {}", full, e)))
        };

        Ok(Self {
            client,
            stream_client,
            history_url: join(&config.history_path)?,
            status_url: join(&config.status_path)?,
            stream_url: join(&config.stream_path)?,
            start_url: join(&config.start_path)?,
            stop_url: join(&config.stop_path)?,
            restart_url: join(&config.restart_path)?,
        })
    }

    fn control_url(&self, action: ControlAction) -> &Url {
        match action {
            ControlAction::Start => &self.start_url,
            ControlAction::Stop => &self.stop_url,
            ControlAction::Restart => &self.restart_url,
        }
    }

    async fn ensure_success(response: Response) -> Result<Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        Err(TransportError::Status {
            status: status.as_u16(),
            message: error_message(&text),
        })
    }
}

fn client_builder(direct: bool) -> ClientBuilder {
    let builder = Client::builder();
    if direct {
        builder.no_proxy()
    } else {
        builder
    }
}

fn is_loopback(url: &Url) -> bool {
    let host = url
        .host_str()
        .unwrap_or_default()
        .trim_start_matches('[')
        .trim_end_matches(']');
    host.eq_ignore_ascii_case("localhost")
        || host.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback())
}

/// Message of a backend error body: its `error` field, then `message`, then the raw text.
pub(crate) fn error_message(text: &str) -> String {
    match serde_json::from_str::<BackendErrorBody>(text) {
        Ok(body) => body
            .error
            .or(body.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| text.trim().to_string()),
        Err(_) => text.trim().to_string(),
    }
}

impl Backend for HttpBackend {
    async fn fetch_history(&self) -> Result<Vec<Value>, TransportError> {
        debug!("GET {}", self.history_url);
        let response = self.client.get(self.history_url.clone()).send().await?;
        let response = Self::ensure_success(response).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;
        match body {
            Value::Array(items) => Ok(items),
            Value::Null => Ok(Vec::new()),
            other => Err(TransportError::Decode(format!(
                "history is not a list: {}",
                other
            ))),
        }
    }

    async fn fetch_status(&self) -> Result<StatusReport, TransportError> {
        let response = self.client.get(self.status_url.clone()).send().await?;
        let response = Self::ensure_success(response).await?;
        response
            .json::<StatusReport>()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }

    async fn control(
        &self,
        action: ControlAction,
        options: &ControlOptions,
    ) -> Result<(), ControlError> {
        let url = self.control_url(action).clone();
        info!("POST {} ({})", url, action);
        let mut request = self.client.post(url);
        if action != ControlAction::Stop && !options.is_empty() {
            request = request.json(options);
        }
        let response = request.send().await.map_err(TransportError::from)?;
        match Self::ensure_success(response).await {
            Ok(_) => Ok(()),
            Err(TransportError::Status { status, message }) => Err(ControlError::Rejected {
                action,
                status,
                message,
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn subscribe(&self) -> Result<LiveFeed, TransportError> {
        let response = self
            .stream_client
            .get(self.stream_url.clone())
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;

        let (tx, rx) = mpsc::channel(LIVE_FEED_CAPACITY);
        tokio::spawn(async move {
            let mut stream = Box::pin(response.bytes_stream());
            let mut decoder = SseDecoder::new();
            loop {
                // Heartbeats yield no frame, so a dropped feed is noticed here rather
                // than on the next send.
                let chunk = tokio::select! {
                    _ = tx.closed() => {
                        debug!("Live feed dropped, closing the stream");
                        return;
                    }
                    chunk = stream.next() => chunk,
                };
                let chunk = match chunk {
                    Some(Ok(chunk)) => chunk,
                    Some(Err(e)) => {
                        warn!("Live stream read failed: {}", e);
                        let _ = tx.send(Err(TransportError::Request(e))).await;
                        return;
                    }
                    None => {
                        debug!("Live stream ended by the backend");
                        return;
                    }
                };
                for frame in decoder.push_bytes(&chunk) {
                    if !frame.is_message() {
                        debug!("Ignoring `{:?}` frame", frame.event);
                        continue;
                    }
                    if tx.send(Ok(frame.data)).await.is_err() {
                        return;
                    }
                }
            }
        });

        Ok(LiveFeed::from_channel(rx))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::oneshot;
    use tokio::time::timeout;
    use warp::http::{header::CONTENT_TYPE, StatusCode};
    use warp::{reply, Filter};

    #[derive(Debug, Clone, PartialEq)]
    struct ControlCall {
        action: String,
        content_type: Option<String>,
        body: String,
    }

    // Capture backend double: canned answers, recorded control requests
    struct FakeCapture {
        history: Mutex<String>,
        stream_body: Mutex<String>,
        control_answer: Mutex<(u16, String)>,
        control_calls: Mutex<Vec<ControlCall>>,
    }

    impl FakeCapture {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                history: Mutex::new("[]".to_string()),
                stream_body: Mutex::new(String::new()),
                control_answer: Mutex::new((200, r#"{"ok": true}"#.to_string())),
                control_calls: Mutex::new(Vec::new()),
            })
        }

        fn answer_control(&self, status: u16, body: &str) {
            *self.control_answer.lock().unwrap() = (status, body.to_string());
        }

        fn calls(&self) -> Vec<ControlCall> {
            self.control_calls.lock().unwrap().clone()
        }
    }

    fn free_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    // Serves the fake on a free loopback port and returns its base URL
    async fn serve(fake: Arc<FakeCapture>) -> String {
        let history = {
            let fake = fake.clone();
            warp::path!("api" / "last").and(warp::get()).map(move || {
                let body = fake.history.lock().unwrap().clone();
                reply::with_header(body, CONTENT_TYPE, "application/json")
            })
        };
        let status = warp::path!("api" / "status").and(warp::get()).map(|| {
            reply::json(&json!({
                "running": true,
                "payload": "abc.oast.pro",
                "started_at": 1700000000.5,
                "log_tail": ["client started"]
            }))
        });
        let stream = {
            let fake = fake.clone();
            warp::path!("stream").and(warp::get()).map(move || {
                let body = fake.stream_body.lock().unwrap().clone();
                reply::with_header(body, CONTENT_TYPE, "text/event-stream")
            })
        };
        let control = {
            let fake = fake.clone();
            warp::path!("api" / String)
                .and(warp::post())
                .and(warp::header::optional::<String>("content-type"))
                .and(warp::body::bytes())
                .map(
                    move |action: String, content_type: Option<String>, body: bytes::Bytes| {
                        fake.control_calls.lock().unwrap().push(ControlCall {
                            action,
                            content_type,
                            body: String::from_utf8_lossy(&body).into_owned(),
                        });
                        let (status, answer) = fake.control_answer.lock().unwrap().clone();
                        reply::with_status(
                            reply::with_header(answer, CONTENT_TYPE, "application/json"),
                            StatusCode::from_u16(status).unwrap(),
                        )
                    },
                )
        };

        let port = free_port();
        let routes = history.or(status).or(stream).or(control);
        tokio::spawn(warp::serve(routes).run(([127, 0, 0, 1], port)));

        let base = format!("http://127.0.0.1:{}", port);
        for _ in 0..100 {
            if TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        base
    }

    fn backend_for(base: &str, control: ControlOptions) -> HttpBackend {
        let config = BackendConfig {
            base_url: base.to_string(),
            request_timeout_secs: 2,
            control,
            ..Default::default()
        };
        HttpBackend::new(&config).unwrap()
    }

    #[test]
    fn endpoint_urls_are_joined_to_the_base() {
        let config = BackendConfig {
            base_url: "http://10.1.2.3:5000/".to_string(),
            ..Default::default()
        };
        let backend = HttpBackend::new(&config).unwrap();
        assert_eq!(backend.history_url.as_str(), "http://10.1.2.3:5000/api/last");
        assert_eq!(backend.stream_url.as_str(), "http://10.1.2.3:5000/stream");
        assert_eq!(
            backend.control_url(ControlAction::Restart).as_str(),
            "http://10.1.2.3:5000/api/restart"
        );
    }

    #[test]
    fn bad_base_url_is_a_config_error() {
        let config = BackendConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            HttpBackend::new(&config),
            Err(ConfigError::BadUrl(_))
        ));
    }

    #[test]
    fn loopback_hosts_are_recognized() {
        for url in ["http://127.0.0.1:5000", "http://localhost", "http://[::1]:80"] {
            assert!(is_loopback(&Url::parse(url).unwrap()), "{}", url);
        }
        for url in ["http://10.0.0.5:5000", "https://capture.example.com"] {
            assert!(!is_loopback(&Url::parse(url).unwrap()), "{}", url);
        }
    }

    #[test]
    fn error_message_prefers_structured_fields() {
        assert_eq!(error_message(r#"{"error": "already running"}"#), "already running");
        assert_eq!(error_message(r#"{"message": "no docker"}"#), "no docker");
        assert_eq!(error_message("  Internal Server Error\n"), "Internal Server Error");
        assert_eq!(error_message(r#"{"other": 1}"#), r#"{"other": 1}"#);
    }

    #[tokio::test]
    async fn unreachable_backend_is_an_error() {
        let backend = backend_for(&format!("http://127.0.0.1:{}", free_port()), ControlOptions::default());
        assert!(backend.fetch_status().await.is_err());
    }

    #[tokio::test]
    async fn history_accepts_lists_and_null_only() {
        let fake = FakeCapture::new();
        let backend = backend_for(&serve(fake.clone()).await, ControlOptions::default());

        *fake.history.lock().unwrap() =
            r#"[{"protocol": "HTTP", "host": "a.com"}, {"protocol": "DNS"}]"#.to_string();
        let items = backend.fetch_history().await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["host"], "a.com");

        *fake.history.lock().unwrap() = "null".to_string();
        assert!(backend.fetch_history().await.unwrap().is_empty());

        *fake.history.lock().unwrap() = r#"{"events": []}"#.to_string();
        assert!(matches!(
            backend.fetch_history().await,
            Err(TransportError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn status_report_is_decoded() {
        let backend = backend_for(&serve(FakeCapture::new()).await, ControlOptions::default());
        let report = backend.fetch_status().await.unwrap();
        assert!(report.running);
        assert_eq!(report.payload.as_deref(), Some("abc.oast.pro"));
        assert_eq!(report.started_at, Some(1700000000.5));
        assert_eq!(report.log_tail, vec!["client started".to_string()]);
    }

    #[tokio::test]
    async fn refused_control_carries_the_backend_message() {
        let fake = FakeCapture::new();
        let backend = backend_for(&serve(fake.clone()).await, ControlOptions::default());

        fake.answer_control(409, r#"{"error": "already running"}"#);
        match backend.control(ControlAction::Start, &ControlOptions::default()).await {
            Err(ControlError::Rejected {
                action,
                status,
                message,
            }) => {
                assert_eq!(action, ControlAction::Start);
                assert_eq!(status, 409);
                assert_eq!(message, "already running");
            }
            other => panic!("unexpected answer: {:?}", other),
        }

        fake.answer_control(500, r#"{"message": "no docker"}"#);
        let err = backend
            .control(ControlAction::Stop, &ControlOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Backend refused stop (500): no docker");

        fake.answer_control(200, r#"{"ok": true}"#);
        assert!(backend
            .control(ControlAction::Restart, &ControlOptions::default())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn control_body_is_sent_for_start_and_restart_only_when_set() {
        let fake = FakeCapture::new();
        let backend = backend_for(&serve(fake.clone()).await, ControlOptions::default());
        let options = ControlOptions {
            server: Some("https://oast.pro".to_string()),
            truncate: Some(false),
            force: None,
        };

        backend
            .control(ControlAction::Start, &ControlOptions::default())
            .await
            .unwrap();
        backend.control(ControlAction::Start, &options).await.unwrap();
        backend.control(ControlAction::Restart, &options).await.unwrap();
        backend.control(ControlAction::Stop, &options).await.unwrap();

        let calls = fake.calls();
        let actions: Vec<_> = calls.iter().map(|c| c.action.as_str()).collect();
        assert_eq!(actions, vec!["start", "start", "restart", "stop"]);

        assert_eq!(calls[0].body, "");
        for call in &calls[1..3] {
            assert_eq!(call.content_type.as_deref(), Some("application/json"));
            let body: Value = serde_json::from_str(&call.body).unwrap();
            assert_eq!(body, json!({"server": "https://oast.pro", "truncate": false}));
        }
        assert_eq!(calls[3].body, "");
        assert_eq!(calls[3].content_type, None);
    }

    #[tokio::test]
    async fn subscribe_yields_message_frames_and_skips_heartbeats() {
        let fake = FakeCapture::new();
        *fake.stream_body.lock().unwrap() = concat!(
            ": ping\n\n",
            "data: {\"protocol\":\"HTTP\",\"host\":\"a.com\"}\n\n",
            "event: status\ndata: running\n\n",
            ": ping\r\n\r\n",
            "data: {\"protocol\":\"DNS\"}\r\n\r\n",
        )
        .to_string();
        let backend = backend_for(&serve(fake).await, ControlOptions::default());

        let mut feed = backend.subscribe().await.unwrap();
        let mut messages = Vec::new();
        while let Some(item) = timeout(Duration::from_secs(2), feed.next()).await.unwrap() {
            messages.push(item.unwrap());
        }
        assert_eq!(
            messages,
            vec![
                r#"{"protocol":"HTTP","host":"a.com"}"#.to_string(),
                r#"{"protocol":"DNS"}"#.to_string(),
            ]
        );
    }

    async fn read_request_head(socket: &mut TcpStream) {
        let mut head = Vec::new();
        let mut byte = [0u8; 1];
        while !head.ends_with(b"\r\n\r\n") {
            match socket.read(&mut byte).await {
                Ok(0) | Err(_) => return,
                Ok(_) => head.push(byte[0]),
            }
        }
    }

    #[tokio::test]
    async fn dropping_the_feed_closes_a_heartbeat_only_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (closed_tx, closed_rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request_head(&mut socket).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\n\r\n")
                .await
                .unwrap();
            let mut buf = [0u8; 64];
            loop {
                tokio::select! {
                    read = socket.read(&mut buf) => {
                        if matches!(read, Ok(0) | Err(_)) {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(Duration::from_millis(20)) => {
                        if socket.write_all(b": ping\n\n").await.is_err() {
                            break;
                        }
                    }
                }
            }
            let _ = closed_tx.send(());
        });

        let backend = backend_for(&format!("http://127.0.0.1:{}", port), ControlOptions::default());
        let mut feed = backend.subscribe().await.unwrap();
        assert!(timeout(Duration::from_millis(150), feed.next()).await.is_err());

        drop(feed);
        timeout(Duration::from_secs(2), closed_rx)
            .await
            .expect("stream connection still open after the feed was dropped")
            .unwrap();
    }
}
