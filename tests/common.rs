#![allow(dead_code)]

use courier_server::adapters::database::{DbPool, init_pool};
use courier_server::adapters::memory::MemoryStore;
use courier_server::adapters::storage::{ImageStore, MemoryImageStore};
use courier_server::api::{MgmtState, app_router, mgmt_router};
use courier_server::config::Config;
use courier_server::domain::auth::Claims;
use courier_server::domain::user::User;
use courier_server::AppBuilder;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use uuid::Uuid;

static INIT: Once = Once::new();

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("courier_server=debug".parse().unwrap())
            .add_directive("tower=warn".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap())
            .add_directive("tungstenite=warn".parse().unwrap());

        tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().init();
    });
}

/// Connects to the Postgres named by `DATABASE_URL` and applies migrations.
/// Returns `None` when the variable is unset so store suites can be skipped on machines without a database.
pub async fn get_test_pool() -> Option<DbPool> {
    setup_tracing();
    let Ok(url) = std::env::var("DATABASE_URL") else {
        tracing::warn!("DATABASE_URL not set, skipping Postgres-backed test");
        return None;
    };

    let mut config = Config::default().database;
    config.url = url;
    config.min_connections = 0;

    let pool = init_pool(&config).await.expect("Failed to connect to DB. Is Postgres running?");
    courier_server::run_migrations(&pool).await.expect("Failed to run migrations");
    Some(pool)
}

pub fn get_test_config() -> Config {
    let mut config = Config::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.auth.jwt_secret = "test_secret".to_string();
    config.websocket.outbound_buffer_size = 32;
    config
}

pub struct TestUser {
    pub user_id: Uuid,
    pub token: String,
}

pub struct TestApp {
    pub api_url: String,
    pub ws_url: String,
    pub mgmt_url: String,
    pub client: reqwest::Client,
    pub config: Config,
    pub store: Arc<MemoryStore>,
    pub shutdown_tx: watch::Sender<bool>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_config(get_test_config()).await
    }

    pub async fn spawn_with_config(config: Config) -> Self {
        Self::spawn_with(config, Arc::new(MemoryImageStore::new())).await
    }

    pub async fn spawn_with(config: Config, images: Arc<dyn ImageStore>) -> Self {
        setup_tracing();

        let store = Arc::new(MemoryStore::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let app = AppBuilder::new(config.clone())
            .with_stores(store.clone(), store.clone())
            .with_image_store(images)
            .build()
            .unwrap();

        let router = app_router(config.clone(), app.services, shutdown_rx.clone());
        let mgmt = mgmt_router(MgmtState { health_service: app.health_service });

        let api_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let api_addr = api_listener.local_addr().unwrap();
        let mgmt_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mgmt_addr = mgmt_listener.local_addr().unwrap();

        let mut api_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            axum::serve(api_listener, router)
                .with_graceful_shutdown(async move {
                    let _ = api_rx.wait_for(|&s| s).await;
                })
                .await
                .unwrap();
        });
        let mut mgmt_rx = shutdown_rx;
        tokio::spawn(async move {
            axum::serve(mgmt_listener, mgmt)
                .with_graceful_shutdown(async move {
                    let _ = mgmt_rx.wait_for(|&s| s).await;
                })
                .await
                .unwrap();
        });

        Self {
            api_url: format!("http://{api_addr}/v1"),
            ws_url: format!("ws://{api_addr}/v1/gateway"),
            mgmt_url: format!("http://{mgmt_addr}"),
            client: reqwest::Client::new(),
            config,
            store,
            shutdown_tx,
        }
    }

    /// Seeds an account the way the identity service would and mints a token for it.
    pub async fn create_user(&self, username: &str) -> TestUser {
        let user = User::new(username, username);
        let user_id = user.id;
        self.store.insert_user(user).await;
        let token = Claims::new(user_id, 3600).encode(&self.config.auth.jwt_secret).unwrap();
        TestUser { user_id, token }
    }

    pub async fn send_text(&self, from: &TestUser, to: Uuid, text: &str) -> Value {
        let resp = self
            .client
            .post(format!("{}/messages/send/{}", self.api_url, to))
            .bearer_auth(&from.token)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::CREATED);
        resp.json().await.unwrap()
    }

    pub async fn conversation(&self, user: &TestUser, other: Uuid) -> Vec<Value> {
        let resp = self
            .client
            .get(format!("{}/messages/{}", self.api_url, other))
            .bearer_auth(&user.token)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        resp.json().await.unwrap()
    }

    pub async fn unread_counts(&self, user: &TestUser) -> Value {
        let resp = self
            .client
            .get(format!("{}/messages/unread-count", self.api_url))
            .bearer_auth(&user.token)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        resp.json().await.unwrap()
    }

    pub async fn mark_read(&self, reader: &TestUser, sender_id: Uuid) -> Value {
        let resp = self
            .client
            .put(format!("{}/messages/mark-read", self.api_url))
            .bearer_auth(&reader.token)
            .json(&serde_json::json!({ "senderId": sender_id }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        resp.json().await.unwrap()
    }

    /// Opens a live connection and waits until the server has registered it.
    pub async fn connect_ws(&self, user: &TestUser) -> TestWsClient {
        let (stream, _) = connect_async(format!("{}?token={}", self.ws_url, user.token)).await.unwrap();
        let mut client = TestWsClient { stream };

        // The connect broadcast always includes the new connection itself.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let event = client.receive_any_event_timeout(remaining).await.expect("no presence snapshot after connect");
            if event["event"] == "getOnlineUsers"
                && event["data"].as_array().is_some_and(|ids| ids.iter().any(|id| id == &user.user_id.to_string()))
            {
                return client;
            }
        }
    }
}

pub struct TestWsClient {
    pub stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestWsClient {
    pub async fn receive_raw_timeout(
        &mut self,
        timeout: Duration,
    ) -> Option<Result<Message, tokio_tungstenite::tungstenite::Error>> {
        tokio::time::timeout(timeout, self.stream.next()).await.ok().flatten()
    }

    /// Next JSON event of any kind, skipping control frames.
    pub async fn receive_any_event_timeout(&mut self, timeout: Duration) -> Option<Value> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.checked_duration_since(tokio::time::Instant::now())?;
            match self.receive_raw_timeout(remaining).await? {
                Ok(Message::Text(text)) => return Some(serde_json::from_str(text.as_str()).unwrap()),
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => {}
            }
        }
    }

    /// Next event that is not a presence update.
    pub async fn receive_event_timeout(&mut self, timeout: Duration) -> Option<Value> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.checked_duration_since(tokio::time::Instant::now())?;
            let event = self.receive_any_event_timeout(remaining).await?;
            if event["event"] != "getOnlineUsers" {
                return Some(event);
            }
        }
    }

    pub async fn receive_event(&mut self) -> Value {
        self.receive_event_timeout(Duration::from_secs(5)).await.expect("timed out waiting for live event")
    }

    pub async fn close(mut self) {
        let _ = self.stream.send(Message::Close(None)).await;
        // Drain until the server acknowledges.
        while let Some(Ok(msg)) = self.receive_raw_timeout(Duration::from_millis(500)).await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    }
}
