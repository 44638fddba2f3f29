use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;

use crate::config::SyncConfig;
use crate::error::{GateError, Result};
use crate::model::{ApiEnvelope, DirectorySnapshot, UploadPayload, UploadSummary};

/// HTTP client for the club server's download and upload endpoints.
///
/// Every request carries the static API-key header. No timeout and no
/// retry: a failure goes straight back to the caller, who decides whether
/// to try again.
pub struct SyncClient {
    http: reqwest::Client,
    download_url: String,
    upload_url: String,
    api_key_header: String,
    api_key: Option<String>,
}

impl SyncClient {
    pub fn new(config: &SyncConfig) -> Result<Self> {
        let base = config.base_url.trim_end_matches('/');
        if base.is_empty() {
            return Err(GateError::Config("sync.base_url is not set".into()));
        }
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            download_url: join_url(base, &config.download_path),
            upload_url: join_url(base, &config.upload_path),
            api_key_header: config.api_key_header.clone(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
        })
    }

    pub fn download_url(&self) -> &str {
        &self.download_url
    }

    pub fn upload_url(&self) -> &str {
        &self.upload_url
    }

    /// `GET download`: the current member roster.
    pub async fn download(&self) -> Result<DirectorySnapshot> {
        let req = self
            .http
            .get(&self.download_url)
            .header(CONTENT_TYPE, "application/json");
        self.send("download", req).await
    }

    /// `POST upload`: the day's check-ins and alerts. `json()` sets the
    /// content type.
    pub async fn upload(&self, payload: &UploadPayload) -> Result<UploadSummary> {
        let req = self.http.post(&self.upload_url).json(payload);
        self.send("upload", req).await
    }

    async fn send<R: DeserializeOwned>(&self, endpoint: &str, req: RequestBuilder) -> Result<R> {
        let mut req = req.header(ACCEPT, "application/json");
        if let Some(ref key) = self.api_key {
            req = req.header(self.api_key_header.as_str(), key.as_str());
        }

        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        tracing::debug!(endpoint, %status, bytes = body.len(), "sync response");

        if !status.is_success() {
            let message = serde_json::from_str::<ApiEnvelope<serde_json::Value>>(&body)
                .map(|env| env.message)
                .unwrap_or_else(|_| preview(&body).to_string());
            return Err(GateError::Remote {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: ApiEnvelope<R> =
            serde_json::from_str(&body).map_err(|e| GateError::malformed(endpoint, e))?;
        if envelope.status != 200 {
            return Err(GateError::Remote {
                status: envelope.status,
                message: envelope.message,
            });
        }
        envelope.data.ok_or_else(|| GateError::Remote {
            status: envelope.status,
            message: format!("{endpoint} response has no data"),
        })
    }
}

fn join_url(base: &str, path: &str) -> String {
    let path = path.trim();
    if path.is_empty() {
        return base.to_string();
    }
    format!("{base}/{}", path.trim_start_matches('/'))
}

fn preview(body: &str) -> &str {
    match body.char_indices().nth(300) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CheckIn, Member};
    use crate::season::Season;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use chrono::{NaiveDate, NaiveTime};
    use serde_json::{json, Value};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/api")
    }

    fn config(base_url: &str) -> SyncConfig {
        SyncConfig {
            base_url: base_url.to_string(),
            api_key: Some("test-key".into()),
            ..Default::default()
        }
    }

    async fn download_handler(headers: HeaderMap) -> (StatusCode, Json<Value>) {
        if headers.get("x-api-key").and_then(|v| v.to_str().ok()) != Some("test-key") {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"status": 401, "message": "invalid api key"})),
            );
        }
        (
            StatusCode::OK,
            Json(json!({
                "status": 200,
                "message": "ok",
                "data": {
                    "metadata": {"member_count": 1},
                    "members": [{"profile_id": 3, "name": "Rowan Vale"}]
                },
                "api_version": "2",
                "timestamp": "2025-07-04T06:00:00Z"
            })),
        )
    }

    async fn upload_handler(Json(body): Json<Value>) -> Json<Value> {
        let checkins = body["checkins"].as_array().map(Vec::len).unwrap_or(0);
        let alerts = body["alerts"].as_array().map(Vec::len).unwrap_or(0);
        Json(json!({
            "status": 200,
            "message": format!("received from {}", body["device_id"].as_str().unwrap_or("")),
            "data": {"total": checkins + alerts, "successful": checkins + alerts, "failed": 0, "duplicates": 0}
        }))
    }

    fn router() -> Router {
        Router::new()
            .route("/api/download", get(download_handler))
            .route("/api/upload", post(upload_handler))
    }

    #[test]
    fn urls_are_joined() {
        let client = SyncClient::new(&config("https://club.example.com/api/")).unwrap();
        assert_eq!(client.download_url(), "https://club.example.com/api/download");
        assert_eq!(client.upload_url(), "https://club.example.com/api/upload");
    }

    #[test]
    fn empty_base_url_is_config_error() {
        assert!(matches!(
            SyncClient::new(&config("  ")),
            Err(GateError::Config(_))
        ));
    }

    #[tokio::test]
    async fn download_parses_roster() {
        let base = serve(router()).await;
        let client = SyncClient::new(&config(&base)).unwrap();
        let snapshot = client.download().await.unwrap();
        assert_eq!(snapshot.members, vec![Member::new(3, "Rowan Vale")]);
    }

    #[tokio::test]
    async fn download_with_bad_key_is_remote_error() {
        let base = serve(router()).await;
        let mut cfg = config(&base);
        cfg.api_key = Some("wrong".into());
        let client = SyncClient::new(&cfg).unwrap();
        match client.download().await.unwrap_err() {
            GateError::Remote { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "invalid api key");
            }
            other => panic!("expected Remote, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn envelope_error_status_is_remote_error() {
        let app = Router::new().route(
            "/api/download",
            get(|| async { Json(json!({"status": 503, "message": "maintenance"})) }),
        );
        let base = serve(app).await;
        let client = SyncClient::new(&config(&base)).unwrap();
        let err = client.download().await.unwrap_err();
        assert!(matches!(err, GateError::Remote { status: 503, .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn upload_returns_summary() {
        let base = serve(router()).await;
        let client = SyncClient::new(&config(&base)).unwrap();
        let payload = UploadPayload {
            checkins: vec![CheckIn::new(
                3,
                NaiveDate::from_ymd_opt(2025, 7, 4).unwrap(),
                NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            )],
            alerts: vec![],
            device_id: "north-gate".into(),
            season: Season::summer(2025),
        };
        let summary = client.upload(&payload).await.unwrap();
        assert_eq!(summary.total, 1);
        assert_eq!(summary.successful, 1);
        assert_eq!(summary.duplicates, 0);
    }

    /// Serve one request on a raw socket and hand back its head.
    async fn capture_request_head(listener: tokio::net::TcpListener) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let head_end = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before the request head");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
        let body_len: usize = head
            .lines()
            .find_map(|l| {
                let (name, value) = l.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse().ok())
                    .flatten()
            })
            .unwrap_or(0);
        while buf.len() < head_end + body_len {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }

        let body = r#"{"status":200,"message":"ok","data":{"total":0,"successful":0,"failed":0,"duplicates":0}}"#;
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        head
    }

    fn content_type_count(head: &str) -> usize {
        head.lines()
            .filter(|l| l.to_ascii_lowercase().starts_with("content-type:"))
            .count()
    }

    #[tokio::test]
    async fn upload_sends_a_single_content_type() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(capture_request_head(listener));

        let client = SyncClient::new(&config(&format!("http://{addr}/api"))).unwrap();
        let payload = UploadPayload {
            checkins: vec![],
            alerts: vec![],
            device_id: "north-gate".into(),
            season: Season::summer(2025),
        };
        client.upload(&payload).await.unwrap();

        let head = server.await.unwrap();
        assert!(head.starts_with("POST /api/upload"));
        assert_eq!(content_type_count(&head), 1, "request head:\n{head}");
        assert!(head.to_ascii_lowercase().contains("x-api-key: test-key"));
    }

    #[tokio::test]
    async fn download_sends_a_single_content_type() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(capture_request_head(listener));

        let client = SyncClient::new(&config(&format!("http://{addr}/api"))).unwrap();
        // the canned reply is an upload summary, so decoding the roster fails
        let _ = client.download().await;

        let head = server.await.unwrap();
        assert!(head.starts_with("GET /api/download"));
        assert_eq!(content_type_count(&head), 1, "request head:\n{head}");
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = SyncClient::new(&config(&format!("http://{addr}"))).unwrap();
        let err = client.download().await.unwrap_err();
        assert!(matches!(err, GateError::Http(_)));
        assert!(err.is_transient());
    }
}
