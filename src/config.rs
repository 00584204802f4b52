// src/config.rs

//! CLI configuration: connected accounts, default account, preferences.
//!
//! Two on-disk flavours exist:
//! - the project-level `hubspot.config.yml` (legacy keys: `portals`,
//!   `defaultPortal`, `portalId`)
//! - the global `~/.hscli/config.yml` (`accounts`, `defaultAccount`, `accountId`)
//!
//! Both are read through the same serde model. On write the store renames
//! keys back to whichever flavour the file was loaded as.
//!
//! A `ConfigStore` is an explicit value handed to commands; nothing here is
//! process-global.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value as YamlValue};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::util::{ensure_dir, find_up, read_to_string};

pub const LEGACY_CONFIG_NAME: &str = "hubspot.config.yml";
pub const GLOBAL_CONFIG_DIR: &str = ".hscli";
pub const GLOBAL_CONFIG_NAME: &str = "config.yml";
pub const OVERRIDE_FILE_NAME: &str = ".hsaccount";

pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 15_000;

/// Root configuration model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
    #[serde(alias = "defaultPortal", default, skip_serializing_if = "Option::is_none")]
    pub default_account: Option<String>,

    #[serde(alias = "defaultMode", default, skip_serializing_if = "Option::is_none")]
    pub default_cms_publish_mode: Option<PublishMode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_timeout: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_usage_tracking: Option<bool>,

    #[serde(alias = "portals", default)]
    pub accounts: Vec<AccountConfig>,
}

/// One connected HubSpot account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountConfig {
    pub name: String,

    #[serde(alias = "portalId")]
    pub account_id: u64,

    #[serde(default)]
    pub env: HubSpotEnv,

    pub auth_type: AuthType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_mode: Option<PublishMode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<OAuthConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal_access_key: Option<String>,
}

/// OAuth2 client settings plus the cached token (shared with PAK auth).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,

    #[serde(default)]
    pub token_info: TokenInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// RFC 3339 expiry timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    #[value(name = "personalaccesskey")]
    PersonalAccessKey,
    #[value(name = "oauth2")]
    OAuth2,
    #[value(name = "apikey")]
    ApiKey,
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuthType::PersonalAccessKey => "personalaccesskey",
            AuthType::OAuth2 => "oauth2",
            AuthType::ApiKey => "apikey",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum HubSpotEnv {
    #[default]
    Prod,
    Qa,
}

impl HubSpotEnv {
    pub fn api_base_url(&self) -> &'static str {
        match self {
            HubSpotEnv::Prod => "https://api.hubapi.com",
            HubSpotEnv::Qa => "https://api.hubapiqa.com",
        }
    }

    pub fn app_base_url(&self) -> &'static str {
        match self {
            HubSpotEnv::Prod => "https://app.hubspot.com",
            HubSpotEnv::Qa => "https://app.hubspotqa.com",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PublishMode {
    Draft,
    Publish,
}

impl PublishMode {
    /// Source-code API environment segment for this mode.
    pub fn api_env(&self) -> &'static str {
        match self {
            PublishMode::Draft => "draft",
            PublishMode::Publish => "published",
        }
    }
}

impl fmt::Display for PublishMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishMode::Draft => f.write_str("draft"),
            PublishMode::Publish => f.write_str("publish"),
        }
    }
}

/// Which key set the file on disk uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Legacy,
    Global,
}

/// Validate an account name (unique key in the config; no whitespace).
pub fn validate_account_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("Account name cannot be empty");
    }
    if name.chars().any(char::is_whitespace) {
        bail!("Account name cannot contain spaces: {:?}", name);
    }
    Ok(())
}

impl CliConfig {
    /// Look an account up by name or by numeric id.
    pub fn find_account(&self, name_or_id: &str) -> Option<&AccountConfig> {
        let id = name_or_id.parse::<u64>().ok();
        self.accounts
            .iter()
            .find(|a| a.name == name_or_id || Some(a.account_id) == id)
    }

    pub fn find_account_mut(&mut self, name_or_id: &str) -> Option<&mut AccountConfig> {
        let id = name_or_id.parse::<u64>().ok();
        self.accounts
            .iter_mut()
            .find(|a| a.name == name_or_id || Some(a.account_id) == id)
    }

    pub fn default_account(&self) -> Option<&AccountConfig> {
        self.default_account
            .as_deref()
            .and_then(|d| self.find_account(d))
    }

    /// Insert a new account or replace the one with the same id.
    ///
    /// Fails if a *different* account already owns the name.
    pub fn upsert_account(&mut self, account: AccountConfig) -> Result<()> {
        validate_account_name(&account.name)?;

        if let Some(clash) = self
            .accounts
            .iter()
            .find(|a| a.name == account.name && a.account_id != account.account_id)
        {
            bail!(
                "Account name {:?} is already used by account {}",
                account.name,
                clash.account_id
            );
        }

        match self
            .accounts
            .iter_mut()
            .find(|a| a.account_id == account.account_id)
        {
            Some(existing) => {
                if self.default_account.as_deref() == Some(existing.name.as_str()) {
                    self.default_account = Some(account.name.clone());
                }
                *existing = account;
            }
            None => self.accounts.push(account),
        }
        Ok(())
    }

    /// Remove an account, clearing the default if it pointed at it.
    pub fn remove_account(&mut self, name_or_id: &str) -> Result<AccountConfig> {
        let idx = self
            .accounts
            .iter()
            .position(|a| a.name == name_or_id || a.account_id.to_string() == name_or_id)
            .with_context(|| format!("No account named {:?} in config", name_or_id))?;

        let removed = self.accounts.remove(idx);

        let default_matches = self
            .default_account
            .as_deref()
            .map(|d| d == removed.name || d == removed.account_id.to_string())
            .unwrap_or(false);
        if default_matches {
            self.default_account = None;
        }

        Ok(removed)
    }

    pub fn rename_account(&mut self, current: &str, new_name: &str) -> Result<()> {
        validate_account_name(new_name)?;
        if self.accounts.iter().any(|a| a.name == new_name) {
            bail!("An account named {:?} already exists", new_name);
        }

        let account = self
            .find_account_mut(current)
            .with_context(|| format!("No account named {:?} in config", current))?;
        let old_name = std::mem::replace(&mut account.name, new_name.to_string());

        if self.default_account.as_deref() == Some(old_name.as_str()) {
            self.default_account = Some(new_name.to_string());
        }
        Ok(())
    }

    pub fn set_default(&mut self, name_or_id: &str) -> Result<()> {
        let name = self
            .find_account(name_or_id)
            .map(|a| a.name.clone())
            .with_context(|| format!("No account named {:?} in config", name_or_id))?;
        self.default_account = Some(name);
        Ok(())
    }

    pub fn http_timeout_ms(&self) -> u64 {
        self.http_timeout.unwrap_or(DEFAULT_HTTP_TIMEOUT_MS)
    }

    pub fn publish_mode(&self) -> PublishMode {
        self.default_cms_publish_mode.unwrap_or(PublishMode::Publish)
    }
}

/// A loaded config file plus where it came from.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    format: ConfigFormat,
    persist: bool,
    pub config: CliConfig,
}

impl ConfigStore {
    /// Resolve the config location the way every command does:
    /// explicit path, else nearest `hubspot.config.yml`, else the global file.
    pub fn locate(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(p) = explicit {
            return Ok(p.to_path_buf());
        }

        let cwd = std::env::current_dir().context("Unable to read working directory")?;
        if let Some(found) = find_up(&cwd, LEGACY_CONFIG_NAME) {
            return Ok(found);
        }

        global_config_path()
    }

    /// Load an existing config file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: CliConfig = if raw.trim().is_empty() {
            CliConfig::default()
        } else {
            serde_yaml::from_str(&raw)
                .with_context(|| format!("Failed to parse YAML config {:?}", path))?
        };

        tracing::debug!(path = %path.display(), accounts = config.accounts.len(), "loaded config");

        Ok(Self {
            path: path.to_path_buf(),
            format: format_for(path),
            persist: true,
            config,
        })
    }

    /// Load the config, or start an empty one that will be created on save.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::empty(path))
        }
    }

    pub fn empty(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            format: format_for(path),
            persist: true,
            config: CliConfig::default(),
        }
    }

    /// Build a config from `HUBSPOT_*` environment variables.
    ///
    /// Such a store is never written back to disk.
    pub fn from_env() -> Result<Self> {
        let account_id: u64 = std::env::var("HUBSPOT_ACCOUNT_ID")
            .context("HUBSPOT_ACCOUNT_ID must be set when using --use-env")?
            .trim()
            .parse()
            .context("HUBSPOT_ACCOUNT_ID must be numeric")?;

        let env = match std::env::var("HUBSPOT_ENV").ok().as_deref() {
            Some("qa") => HubSpotEnv::Qa,
            _ => HubSpotEnv::Prod,
        };

        let pak = std::env::var("HUBSPOT_PERSONAL_ACCESS_KEY").ok();
        let api_key = std::env::var("HUBSPOT_API_KEY").ok();

        let account = match (pak, api_key) {
            (Some(key), _) => AccountConfig {
                name: account_id.to_string(),
                account_id,
                env,
                auth_type: AuthType::PersonalAccessKey,
                default_mode: None,
                auth: None,
                api_key: None,
                personal_access_key: Some(key),
            },
            (None, Some(key)) => AccountConfig {
                name: account_id.to_string(),
                account_id,
                env,
                auth_type: AuthType::ApiKey,
                default_mode: None,
                auth: None,
                api_key: Some(key),
                personal_access_key: None,
            },
            (None, None) => bail!(
                "Set HUBSPOT_PERSONAL_ACCESS_KEY or HUBSPOT_API_KEY when using --use-env"
            ),
        };

        Ok(Self {
            path: PathBuf::from("<environment>"),
            format: ConfigFormat::Global,
            persist: false,
            config: CliConfig {
                default_account: Some(account.name.clone()),
                accounts: vec![account],
                ..CliConfig::default()
            },
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> ConfigFormat {
        self.format
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Serialize into YAML using this file's key flavour.
    pub fn to_yaml(&self) -> Result<String> {
        let mut value =
            serde_yaml::to_value(&self.config).context("Failed to serialize config")?;

        if self.format == ConfigFormat::Legacy {
            to_legacy_keys(&mut value);
        }

        serde_yaml::to_string(&value).context("Failed to render config YAML")
    }

    /// Write the config back to disk (no-op for environment-backed stores).
    pub fn save(&self) -> Result<()> {
        if !self.persist {
            tracing::debug!("config came from environment; not persisting");
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                ensure_dir(parent)?;
            }
        }

        let yaml = self.to_yaml()?;
        std::fs::write(&self.path, yaml)
            .with_context(|| format!("Failed to write config file {:?}", self.path))?;

        tracing::debug!(path = %self.path.display(), "wrote config");
        Ok(())
    }

    /// Delete the file backing this store.
    pub fn delete_file(&self) -> Result<()> {
        if self.persist && self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("Failed to delete config file {:?}", self.path))?;
        }
        Ok(())
    }

    /// Resolve which account a command should act on.
    ///
    /// Priority: explicit `--account`, then `.hsaccount` override, then default.
    pub fn resolve_account(&self, explicit: Option<&str>) -> Result<&AccountConfig> {
        if let Some(name) = explicit {
            return self
                .config
                .find_account(name)
                .with_context(|| format!("No account named {:?} in config {:?}", name, self.path));
        }

        let cwd = std::env::current_dir().context("Unable to read working directory")?;
        if let Some(name) = read_override(&cwd)? {
            if let Some(account) = self.config.find_account(&name) {
                tracing::debug!(account = %account.name, "using account from {}", OVERRIDE_FILE_NAME);
                return Ok(account);
            }
            tracing::warn!(
                "{} names unknown account {:?}; falling back to default",
                OVERRIDE_FILE_NAME,
                name
            );
        }

        self.config.default_account().with_context(|| {
            format!(
                "No default account is set in {:?}. Run `hs init` or `hs accounts use`.",
                self.path
            )
        })
    }
}

/// Path of the global config file (`~/.hscli/config.yml`).
pub fn global_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Unable to determine home directory")?;
    Ok(home.join(GLOBAL_CONFIG_DIR).join(GLOBAL_CONFIG_NAME))
}

fn format_for(path: &Path) -> ConfigFormat {
    let is_global = path
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n == GLOBAL_CONFIG_DIR)
        .unwrap_or(false);

    if is_global {
        ConfigFormat::Global
    } else {
        ConfigFormat::Legacy
    }
}

fn rename_key(map: &mut Mapping, from: &str, to: &str) {
    if let Some(v) = map.remove(from) {
        map.insert(YamlValue::String(to.to_string()), v);
    }
}

fn to_legacy_keys(value: &mut YamlValue) {
    let Some(root) = value.as_mapping_mut() else {
        return;
    };

    rename_key(root, "defaultAccount", "defaultPortal");

    if let Some(YamlValue::Sequence(accounts)) = root.get_mut("accounts") {
        for account in accounts.iter_mut() {
            if let Some(map) = account.as_mapping_mut() {
                rename_key(map, "accountId", "portalId");
            }
        }
    }
    rename_key(root, "accounts", "portals");
}

/* ---------------- account override file ---------------- */

/// Read the nearest `.hsaccount` override, if any.
pub fn read_override(start: &Path) -> Result<Option<String>> {
    match find_up(start, OVERRIDE_FILE_NAME) {
        Some(path) => {
            let name = read_to_string(&path)?.trim().to_string();
            Ok((!name.is_empty()).then_some(name))
        }
        None => Ok(None),
    }
}

pub fn write_override(dir: &Path, account_name: &str) -> Result<PathBuf> {
    let path = dir.join(OVERRIDE_FILE_NAME);
    std::fs::write(&path, format!("{}\n", account_name))
        .with_context(|| format!("Failed to write {:?}", path))?;
    Ok(path)
}

/// Remove the nearest override file; returns its path if one existed.
pub fn remove_override(start: &Path) -> Result<Option<PathBuf>> {
    match find_up(start, OVERRIDE_FILE_NAME) {
        Some(path) => {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to delete {:?}", path))?;
            Ok(Some(path))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn pak_account(name: &str, id: u64) -> AccountConfig {
        AccountConfig {
            name: name.to_string(),
            account_id: id,
            env: HubSpotEnv::Prod,
            auth_type: AuthType::PersonalAccessKey,
            default_mode: None,
            auth: None,
            api_key: None,
            personal_access_key: Some(format!("pak-{}", id)),
        }
    }

    #[test]
    fn reads_legacy_keys() {
        let yaml = r#"
defaultPortal: prod
defaultMode: draft
portals:
  - name: prod
    portalId: 123
    authType: personalaccesskey
    personalAccessKey: abc
"#;
        let cfg: CliConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.default_account.as_deref(), Some("prod"));
        assert_eq!(cfg.default_cms_publish_mode, Some(PublishMode::Draft));
        assert_eq!(cfg.accounts[0].account_id, 123);
        assert_eq!(cfg.accounts[0].env, HubSpotEnv::Prod);
    }

    #[test]
    fn legacy_file_is_written_with_portal_keys() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join(LEGACY_CONFIG_NAME);

        let mut store = ConfigStore::empty(&path);
        store.config.upsert_account(pak_account("prod", 123)).unwrap();
        store.config.set_default("prod").unwrap();
        store.save().unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("defaultPortal: prod"));
        assert!(raw.contains("portals:"));
        assert!(raw.contains("portalId: 123"));
        assert!(!raw.contains("accountId"));

        let reloaded = ConfigStore::load(&path).unwrap();
        assert_eq!(reloaded.config, store.config);
    }

    #[test]
    fn global_file_keeps_account_keys() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join(GLOBAL_CONFIG_DIR).join(GLOBAL_CONFIG_NAME);

        let mut store = ConfigStore::empty(&path);
        assert_eq!(store.format(), ConfigFormat::Global);
        store.config.upsert_account(pak_account("prod", 1)).unwrap();
        store.save().unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("accounts:"));
        assert!(raw.contains("accountId: 1"));
    }

    #[test]
    fn upsert_enforces_unique_names() {
        let mut cfg = CliConfig::default();
        cfg.upsert_account(pak_account("a", 1)).unwrap();
        cfg.upsert_account(pak_account("b", 2)).unwrap();

        assert!(cfg.upsert_account(pak_account("a", 3)).is_err());

        // same id replaces in place
        let mut updated = pak_account("a2", 1);
        updated.personal_access_key = Some("new".into());
        cfg.upsert_account(updated).unwrap();
        assert_eq!(cfg.accounts.len(), 2);
        assert_eq!(cfg.find_account("1").unwrap().name, "a2");
    }

    #[test]
    fn upsert_rejects_names_with_spaces() {
        let mut cfg = CliConfig::default();
        assert!(cfg.upsert_account(pak_account("my account", 1)).is_err());
    }

    #[test]
    fn remove_clears_default() {
        let mut cfg = CliConfig::default();
        cfg.upsert_account(pak_account("a", 1)).unwrap();
        cfg.set_default("a").unwrap();

        let removed = cfg.remove_account("a").unwrap();
        assert_eq!(removed.account_id, 1);
        assert!(cfg.accounts.is_empty());
        assert!(cfg.default_account.is_none());
        assert!(cfg.remove_account("a").is_err());
    }

    #[test]
    fn rename_follows_default() {
        let mut cfg = CliConfig::default();
        cfg.upsert_account(pak_account("a", 1)).unwrap();
        cfg.upsert_account(pak_account("b", 2)).unwrap();
        cfg.set_default("1").unwrap();

        assert!(cfg.rename_account("a", "b").is_err());
        cfg.rename_account("a", "renamed").unwrap();
        assert_eq!(cfg.default_account.as_deref(), Some("renamed"));
    }

    #[test]
    fn override_file_roundtrip() {
        let tmp = tempdir().unwrap();
        let nested = tmp.path().join("src/modules");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(read_override(&nested).unwrap(), None);
        write_override(tmp.path(), "sandbox").unwrap();
        assert_eq!(read_override(&nested).unwrap().as_deref(), Some("sandbox"));

        let removed = remove_override(&nested).unwrap();
        assert_eq!(removed, Some(tmp.path().join(OVERRIDE_FILE_NAME)));
        assert_eq!(read_override(&nested).unwrap(), None);
    }
}
