// src/context.rs

use anyhow::Result;
use std::io::IsTerminal;
use std::time::Duration;

use crate::api::{http_client, ApiClient};
use crate::auth::resolve_credentials;
use crate::config::{AccountConfig, ConfigStore};

/// Everything a command needs besides its own arguments.
///
/// Built once in the dispatcher from the global flags and passed down by
/// mutable reference, so token refreshes land in the same store that is
/// later saved.
pub struct Context {
    pub store: ConfigStore,
    pub account: Option<String>,
    pub api_base_override: Option<String>,
    pub interactive: bool,
}

impl Context {
    pub fn new(store: ConfigStore, account: Option<String>, api_base_override: Option<String>) -> Self {
        Self {
            store,
            account,
            api_base_override,
            interactive: std::io::stdin().is_terminal(),
        }
    }

    pub fn http(&self) -> Result<reqwest::Client> {
        http_client(Duration::from_millis(self.store.config.http_timeout_ms()))
    }

    pub fn base_url_for(&self, account: &AccountConfig) -> String {
        self.api_base_override
            .clone()
            .unwrap_or_else(|| account.env.api_base_url().to_string())
    }

    /// The account this invocation targets.
    pub fn account(&self) -> Result<&AccountConfig> {
        self.store.resolve_account(self.account.as_deref())
    }

    /// Authenticated client for the target account.
    ///
    /// Refreshed tokens are written back to the config file.
    pub async fn client(&mut self) -> Result<ApiClient> {
        let name = self.account()?.name.clone();
        self.client_for(&name).await
    }

    pub async fn client_for(&mut self, name_or_id: &str) -> Result<ApiClient> {
        let http = self.http()?;

        let base_url = {
            let account = self.store.resolve_account(Some(name_or_id))?;
            self.base_url_for(account)
        };

        let account = self
            .store
            .config
            .find_account_mut(name_or_id)
            .ok_or_else(|| anyhow::anyhow!("No account named {:?} in config", name_or_id))?;
        let account_id = account.account_id;

        let (credentials, changed) = resolve_credentials(&http, &base_url, account).await?;
        if changed {
            self.store.save()?;
        }

        Ok(ApiClient::new(http, base_url, credentials, account_id))
    }
}
