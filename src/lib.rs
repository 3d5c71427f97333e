//! Skillforge Rust Client Library
//!
//! A client for the Skillforge e-learning marketplace that keeps a local
//! state tree reconciled against the server over two surfaces:
//!
//! - a REST API for fetches and mutations ([`skillforge_rust_api`])
//! - a push channel for server events ([`skillforge_rust_realtime`])
//!
//! Mutations are applied optimistically: the local state changes first,
//! the request goes out, and the result either resolves the provisional
//! state with the authoritative entity or rolls it back exactly.
//!
//! # Example
//!
//! ```no_run
//! use skillforge_rust::Skillforge;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), skillforge_rust::Error> {
//!     let mut client = Skillforge::new("https://api.skillforge.dev", "wss://sync.skillforge.dev/ws")?;
//!     client.set_auth(Some("jwt...".to_string())).await;
//!     client.connect().await?;
//!
//!     client.fetch_courses(Default::default()).await?;
//!     let course = client.create_course("Intro to Rust", "instructor-1", 4900).await?;
//!     println!("created {}", course.id);
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use chrono::Utc;
use log::debug;
use tokio::sync::RwLock;

pub mod config;
pub mod error;
mod operations;

pub use config::ClientOptions;
pub use error::Error;
pub use operations::CourseUpdate;

pub use skillforge_rust_api::{ApiClient, ApiError, ListData, UnreadCount};
pub use skillforge_rust_realtime::{
    ClientCommand, ConnectionState, SyncClient, SyncClientOptions, SyncError,
};
pub use skillforge_rust_store::{
    Announcement, CollectionState, ContentReport, Course, CourseStatus, Entity, LoadingFlags,
    Notification, NotificationFeed, NotificationKind, Operation, Pagination, Payout,
    PayoutStatus, PresenceState, ReportStatus, ServerEvent, StoreError, StoreState, Ticket,
    TicketStatus,
};

/// Primary entry point: owns the REST client, the push channel, and the
/// reconciled state tree.
///
/// The state tree is shared behind an [`RwLock`]; consumers read it via
/// [`Skillforge::store`], and the event pump spawned by
/// [`Skillforge::connect`] writes to it as server events arrive.
pub struct Skillforge {
    api: ApiClient,
    realtime: SyncClient,
    store: Arc<RwLock<StoreState>>,
    options: ClientOptions,
}

impl Skillforge {
    pub fn new(api_url: &str, realtime_url: &str) -> Result<Self, Error> {
        Self::new_with_options(api_url, realtime_url, ClientOptions::default())
    }

    pub fn new_with_options(
        api_url: &str,
        realtime_url: &str,
        options: ClientOptions,
    ) -> Result<Self, Error> {
        let api = ApiClient::new(api_url)?;
        let realtime = SyncClient::new_with_options(realtime_url, options.sync.clone());
        let store = Arc::new(RwLock::new(StoreState::with_limit(options.page_limit)));
        Ok(Self {
            api,
            realtime,
            store,
            options,
        })
    }

    /// Set or clear the bearer token on both surfaces. Takes effect on
    /// the next REST request and the next channel (re)connect.
    pub async fn set_auth(&mut self, token: Option<String>) {
        self.api.set_token(token.clone());
        self.realtime.set_auth(token).await;
    }

    /// The shared state tree. Hold the read guard only as long as needed;
    /// the event pump takes the write side whenever a server event lands.
    pub fn store(&self) -> Arc<RwLock<StoreState>> {
        self.store.clone()
    }

    pub fn realtime(&self) -> &SyncClient {
        &self.realtime
    }

    /// Subscribe to channel state transitions (connect, reconnect, close).
    pub fn on_connection_change(&self) -> tokio::sync::broadcast::Receiver<ConnectionState> {
        self.realtime.on_state_change()
    }

    /// Open the push channel and start the two background tasks: the
    /// event pump (parses inbound frames and applies them to the store)
    /// and the typing sweeper (expires stale typing indicators).
    ///
    /// May only be called once per client; the pump owns the channel's
    /// single event receiver.
    pub async fn connect(&self) -> Result<(), Error> {
        let mut events = self
            .realtime
            .events()
            .await
            .ok_or_else(|| Error::General("connect() may only be called once".to_string()))?;
        self.realtime.connect().await?;

        let store = self.store.clone();
        tokio::spawn(async move {
            while let Some(raw) = events.recv().await {
                // Unparseable frames are logged and dropped by parse().
                if let Some(event) = ServerEvent::parse(&raw) {
                    store.write().await.apply(event);
                }
            }
            debug!("event pump stopped, channel closed");
        });

        let store = Arc::downgrade(&self.store);
        let interval = std::time::Duration::from_millis(self.options.typing_sweep_interval);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                // Stops once the last client handle is dropped.
                let Some(store) = store.upgrade() else { break };
                store.write().await.presence.sweep(Utc::now());
            }
        });

        Ok(())
    }

    /// Close the push channel. Presence is ephemeral and rebuilt from
    /// events after a reconnect, so it is cleared here.
    pub async fn disconnect(&self) -> Result<(), Error> {
        self.realtime.disconnect().await?;
        self.store.write().await.presence.clear();
        Ok(())
    }
}
