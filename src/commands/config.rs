// src/commands/config.rs

use anyhow::{bail, Result};

use crate::cli::{ConfigCommand, ConfigSetArgs};
use crate::config::{global_config_path, ConfigFormat, ConfigStore, PublishMode};
use crate::context::Context;
use crate::prompts;

pub async fn handle(ctx: &mut Context, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Set(args) => set(ctx, args),
        ConfigCommand::Migrate => {
            let target = global_config_path()?;
            migrate(&ctx.store, &target)
        }
    }
}

const SETTINGS: &[&str] = &["defaultCmsPublishMode", "httpTimeout", "allowUsageTracking"];

/// Ask which setting to change when no flag was passed.
fn prompt_for_setting(interactive: bool) -> Result<ConfigSetArgs> {
    let choice = prompts::select(interactive, "Which setting?", SETTINGS, "a setting flag")?;
    let mut args = ConfigSetArgs::default();

    match choice {
        0 => {
            let modes = [PublishMode::Draft, PublishMode::Publish];
            let i = prompts::select(interactive, "Default publish mode", &modes, "--default-cms-publish-mode")?;
            args.default_cms_publish_mode = Some(modes[i]);
        }
        1 => {
            let raw = prompts::text(interactive, "HTTP timeout (ms)", "--http-timeout")?;
            args.http_timeout = Some(raw.trim().parse()?);
        }
        _ => {
            let allow = prompts::confirm(interactive, "Allow usage tracking?", "--allow-usage-tracking")?;
            args.allow_usage_tracking = Some(allow);
        }
    }
    Ok(args)
}

fn set(ctx: &mut Context, args: ConfigSetArgs) -> Result<()> {
    let args = if args.default_cms_publish_mode.is_none()
        && args.http_timeout.is_none()
        && args.allow_usage_tracking.is_none()
    {
        prompt_for_setting(ctx.interactive)?
    } else {
        args
    };

    let config = &mut ctx.store.config;

    if let Some(mode) = args.default_cms_publish_mode {
        config.default_cms_publish_mode = Some(mode);
        tracing::info!("defaultCmsPublishMode set to {}", mode);
    }
    if let Some(ms) = args.http_timeout {
        if ms < 3_000 {
            bail!("httpTimeout must be at least 3000 ms");
        }
        config.http_timeout = Some(ms);
        tracing::info!("httpTimeout set to {} ms", ms);
    }
    if let Some(allow) = args.allow_usage_tracking {
        config.allow_usage_tracking = Some(allow);
        tracing::info!("allowUsageTracking set to {}", allow);
    }

    ctx.store.save()
}

/// Merge a legacy project config into the global file and delete the legacy one.
///
/// Accounts already present in the global file (same id) are kept as-is. A
/// legacy account whose name belongs to a different global account aborts
/// the migration before anything is written.
fn migrate(legacy: &ConfigStore, target: &std::path::Path) -> Result<()> {
    if legacy.format() != ConfigFormat::Legacy || !legacy.exists() {
        bail!("No hubspot.config.yml found to migrate");
    }

    let mut global = ConfigStore::load_or_default(target)?;

    let clashes: Vec<String> = legacy
        .config
        .accounts
        .iter()
        .filter(|account| {
            global
                .config
                .accounts
                .iter()
                .any(|g| g.name == account.name && g.account_id != account.account_id)
        })
        .map(|account| format!("{} ({})", account.name, account.account_id))
        .collect();
    if !clashes.is_empty() {
        bail!(
            "Account name(s) already used in {}: {}. Rename them with `hs accounts rename` and retry; nothing was migrated",
            target.display(),
            clashes.join(", ")
        );
    }

    let mut added = 0;

    for account in &legacy.config.accounts {
        if global
            .config
            .accounts
            .iter()
            .any(|a| a.account_id == account.account_id)
        {
            tracing::warn!(
                "Account {} ({}) already exists in {}; skipping",
                account.name,
                account.account_id,
                target.display()
            );
            continue;
        }
        global.config.accounts.push(account.clone());
        added += 1;
    }

    let cfg = &mut global.config;
    if cfg.default_account().is_none() {
        if let Some(default) = legacy.config.default_account() {
            if cfg.find_account(&default.name).is_some() {
                cfg.default_account = Some(default.name.clone());
            }
        }
    }
    if cfg.default_cms_publish_mode.is_none() {
        cfg.default_cms_publish_mode = legacy.config.default_cms_publish_mode;
    }
    if cfg.http_timeout.is_none() {
        cfg.http_timeout = legacy.config.http_timeout;
    }
    if cfg.allow_usage_tracking.is_none() {
        cfg.allow_usage_tracking = legacy.config.allow_usage_tracking;
    }

    global.save()?;
    legacy.delete_file()?;

    tracing::info!(
        "Migrated {} account(s) from {} to {}",
        added,
        legacy.path().display(),
        target.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GLOBAL_CONFIG_DIR, GLOBAL_CONFIG_NAME, LEGACY_CONFIG_NAME};

    #[test]
    fn setting_same_value_twice_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(LEGACY_CONFIG_NAME);
        std::fs::write(
            &path,
            "defaultPortal: dev\nportals:\n  - name: dev\n    portalId: 1\n    authType: apikey\n    apiKey: k\n",
        )
        .unwrap();

        let run = || {
            let mut ctx = Context::new(ConfigStore::load(&path).unwrap(), None, None);
            set(
                &mut ctx,
                ConfigSetArgs {
                    default_cms_publish_mode: Some(PublishMode::Draft),
                    ..Default::default()
                },
            )
            .unwrap();
            std::fs::read_to_string(&path).unwrap()
        };

        let first = run();
        let second = run();
        assert_eq!(first, second);
        assert!(first.contains("defaultCmsPublishMode: draft"));
    }

    #[test]
    fn rejects_tiny_timeouts() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ctx = Context::new(ConfigStore::empty(&tmp.path().join(LEGACY_CONFIG_NAME)), None, None);
        let err = set(
            &mut ctx,
            ConfigSetArgs {
                http_timeout: Some(10),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("3000"));
    }

    #[test]
    fn migrate_merges_accounts_and_removes_legacy_file() {
        let tmp = tempfile::tempdir().unwrap();
        let legacy_path = tmp.path().join(LEGACY_CONFIG_NAME);
        std::fs::write(
            &legacy_path,
            "defaultPortal: a\nportals:\n  - name: a\n    portalId: 1\n    authType: apikey\n    apiKey: k1\n  - name: b\n    portalId: 2\n    authType: apikey\n    apiKey: k2\n",
        )
        .unwrap();

        let global_path = tmp.path().join(GLOBAL_CONFIG_DIR).join(GLOBAL_CONFIG_NAME);
        std::fs::create_dir_all(global_path.parent().unwrap()).unwrap();
        std::fs::write(
            &global_path,
            "accounts:\n  - name: existing\n    accountId: 2\n    authType: apikey\n    apiKey: k3\n",
        )
        .unwrap();

        let legacy = ConfigStore::load(&legacy_path).unwrap();
        migrate(&legacy, &global_path).unwrap();

        assert!(!legacy_path.exists());
        let raw = std::fs::read_to_string(&global_path).unwrap();
        assert!(raw.contains("defaultAccount: a"));
        assert!(raw.contains("accountId: 1"));
        assert!(!raw.contains("portalId"));

        let global = ConfigStore::load(&global_path).unwrap();
        let names: Vec<_> = global.config.accounts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["existing", "a"]);
    }

    #[test]
    fn migrate_refuses_name_clash_and_keeps_legacy_file() {
        let tmp = tempfile::tempdir().unwrap();
        let legacy_path = tmp.path().join(LEGACY_CONFIG_NAME);
        std::fs::write(
            &legacy_path,
            "portals:\n  - name: prod\n    portalId: 111\n    authType: apikey\n    apiKey: LEGACY-KEY\n",
        )
        .unwrap();

        let global_path = tmp.path().join(GLOBAL_CONFIG_DIR).join(GLOBAL_CONFIG_NAME);
        std::fs::create_dir_all(global_path.parent().unwrap()).unwrap();
        let global_before = "accounts:\n  - name: prod\n    accountId: 222\n    authType: apikey\n    apiKey: k\n";
        std::fs::write(&global_path, global_before).unwrap();

        let legacy = ConfigStore::load(&legacy_path).unwrap();
        let err = migrate(&legacy, &global_path).unwrap_err();
        assert!(err.to_string().contains("prod (111)"));

        assert!(std::fs::read_to_string(&legacy_path).unwrap().contains("LEGACY-KEY"));
        assert_eq!(std::fs::read_to_string(&global_path).unwrap(), global_before);
    }
}
