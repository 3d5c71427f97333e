//! Client configuration options

use skillforge_rust_realtime::SyncClientOptions;

/// Options for the Skillforge client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Page size requested for list fetches and used for locally
    /// constructed collections
    pub page_limit: u32,
    /// Push channel behavior (reconnect, heartbeat)
    pub sync: SyncClientOptions,
    /// How often expired typing indicators are swept, in milliseconds
    pub typing_sweep_interval: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            page_limit: 20,
            sync: SyncClientOptions::default(),
            typing_sweep_interval: 1000,
        }
    }
}

impl ClientOptions {
    pub fn with_page_limit(mut self, limit: u32) -> Self {
        self.page_limit = limit;
        self
    }

    pub fn with_sync_options(mut self, sync: SyncClientOptions) -> Self {
        self.sync = sync;
        self
    }

    pub fn with_typing_sweep_interval(mut self, millis: u64) -> Self {
        self.typing_sweep_interval = millis;
        self
    }
}
