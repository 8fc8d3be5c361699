//! Test helpers for integration tests
//!
//! Spawns a gateway on an ephemeral port backed by in-memory storage and
//! drives it through real WebSocket and HTTP clients.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures_util::{SinkExt, StreamExt};
use huddle_common::{
    AppConfig, AppSettings, BootstrapConfig, EmbedConfig, Environment, GatewayConfig,
    ServerConfig, SnowflakeConfig, StorageBackend, StorageConfig,
};
use huddle_gateway::{create_gateway_state, serve, GatewayState};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

pub const ADMIN_USERNAME: &str = "root";
pub const ADMIN_PASSWORD: &str = "root password";

/// How long to wait for a frame that should arrive
const RECEIVE_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to listen before concluding that a frame is not coming
const QUIET_PERIOD: Duration = Duration::from_millis(300);

/// Gateway running in the background for the lifetime of the value
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: GatewayState,
    pub http: reqwest::Client,
    shutdown: CancellationToken,
    _media: tempfile::TempDir,
}

impl TestServer {
    pub async fn start() -> Result<Self> {
        let media = tempfile::tempdir()?;
        let config = test_config(media.path().to_path_buf());
        let shutdown = CancellationToken::new();

        let state = create_gateway_state(&config, shutdown.clone()).await?;
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let served = state.clone();
        tokio::spawn(async move {
            if let Err(e) = serve(listener, served).await {
                eprintln!("test server stopped: {e}");
            }
        });

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            addr,
            state,
            http,
            shutdown,
            _media: media,
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Open a socket, optionally presenting a token
    pub async fn connect(&self, token: Option<&str>) -> Result<GatewayClient> {
        let mut request = format!("ws://{}/gateway", self.addr).into_client_request()?;
        if let Some(token) = token {
            request
                .headers_mut()
                .insert("Sec-WebSocket-Protocol", HeaderValue::from_str(token)?);
        }
        let (socket, _) = connect_async(request).await?;
        Ok(GatewayClient { socket, next_seq: 0 })
    }

    /// Register over a fresh socket and reconnect with the issued token.
    /// The returned client has consumed its settings and overview frames.
    pub async fn register(&self, username: &str) -> Result<(GatewayClient, Value)> {
        let mut anonymous = self.connect(None).await?;
        anonymous.expect(1).await?;
        let seq = anonymous
            .send(34, json!({"username": username, "password": "password123"}))
            .await?;
        let token = anonymous.expect(32).await?;
        if token["seq"] != seq.as_str() {
            bail!("token response did not echo the request seq");
        }
        let token = token["data"]["token"]
            .as_str()
            .context("token missing")?
            .to_string();
        anonymous.close().await;

        self.login_with_token(&token).await
    }

    pub async fn login_admin(&self) -> Result<(GatewayClient, Value)> {
        let mut anonymous = self.connect(None).await?;
        anonymous.expect(1).await?;
        anonymous
            .send(31, json!({"username": ADMIN_USERNAME, "password": ADMIN_PASSWORD}))
            .await?;
        let token = anonymous.expect(32).await?["data"]["token"]
            .as_str()
            .context("token missing")?
            .to_string();
        anonymous.close().await;

        self.login_with_token(&token).await
    }

    async fn login_with_token(&self, token: &str) -> Result<(GatewayClient, Value)> {
        let mut client = self.connect(Some(token)).await?;
        let settings = client.expect(1).await?;
        if settings["data"]["authenticated"] != true {
            bail!("token was not accepted");
        }
        let overview = client.expect(2).await?;
        Ok((client, overview["data"].clone()))
    }

    /// POST a multipart body to an upload slot
    pub async fn upload(
        &self,
        slot: &str,
        form: reqwest::multipart::Form,
    ) -> Result<reqwest::Response> {
        let url = format!("{}/upload/{slot}", self.base_url());
        Ok(self.http.post(url).multipart(form).send().await?)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

pub fn test_config(media_dir: PathBuf) -> AppConfig {
    AppConfig {
        app: AppSettings {
            name: "Integration".to_string(),
            env: Environment::Development,
        },
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        storage: StorageConfig {
            backend: StorageBackend::Memory,
            media_dir,
            max_upload_mb: 4,
        },
        database: None,
        gateway: GatewayConfig {
            queue_capacity: 64,
            close_timeout: Duration::from_millis(200),
            upload_slot_ttl: Duration::from_secs(60),
        },
        embeds: EmbedConfig {
            enabled: false,
            ..EmbedConfig::default()
        },
        snowflake: SnowflakeConfig { worker_id: 1 },
        bootstrap: BootstrapConfig {
            admin_username: Some(ADMIN_USERNAME.to_string()),
            admin_password: Some(ADMIN_PASSWORD.to_string()),
        },
    }
}

/// Client side of a gateway socket
pub struct GatewayClient {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    next_seq: u64,
}

impl GatewayClient {
    /// Send a request and return the seq it was tagged with
    pub async fn send(&mut self, kind: u16, data: Value) -> Result<String> {
        self.next_seq += 1;
        let seq = self.next_seq.to_string();
        let frame = json!({"type": kind, "seq": seq, "data": data});
        self.socket.send(Message::Text(frame.to_string())).await?;
        Ok(seq)
    }

    /// Next text frame, failing after the receive timeout
    pub async fn next_frame(&mut self) -> Result<Value> {
        loop {
            let message = tokio::time::timeout(RECEIVE_TIMEOUT, self.socket.next())
                .await
                .context("timed out waiting for a frame")?
                .context("socket closed")??;
            match message {
                Message::Text(text) => return Ok(serde_json::from_str(&text)?),
                Message::Close(_) => bail!("socket closed by server"),
                _ => {}
            }
        }
    }

    /// Next frame of type `kind`, skipping everything else
    pub async fn expect(&mut self, kind: u16) -> Result<Value> {
        loop {
            let frame = self.next_frame().await?;
            if frame["type"] == kind {
                return Ok(frame);
            }
        }
    }

    /// Whether a frame of type `kind` arrives within the quiet period
    pub async fn receives(&mut self, kind: u16) -> bool {
        tokio::time::timeout(QUIET_PERIOD, self.expect(kind))
            .await
            .is_ok_and(|frame| frame.is_ok())
    }

    pub async fn close(mut self) {
        let _ = self.socket.close(None).await;
    }
}

/// Id of the seeded default channel
pub fn default_channel(overview: &Value) -> Result<String> {
    overview["channels"]
        .as_array()
        .and_then(|channels| channels.iter().find(|c| c["name"] == "general"))
        .and_then(|c| c["id"].as_str())
        .map(str::to_owned)
        .context("general channel missing from overview")
}

/// Id of the overview's own user
pub fn own_id(overview: &Value) -> Result<String> {
    overview["you"]["id"]
        .as_str()
        .map(str::to_owned)
        .context("overview has no user")
}
