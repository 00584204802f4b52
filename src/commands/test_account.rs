// src/commands/test_account.rs

use anyhow::{bail, Context as _, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::api::test_accounts;
use crate::cli::TestAccountCommand;
use crate::config::{AccountConfig, AuthType, CliConfig};
use crate::context::Context;
use crate::prompts;
use crate::util::{read_json, write_json};

/// Hub tier requested for each product line of a test account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HubLevel {
    Free,
    Starter,
    Professional,
    Enterprise,
}

/// Definition file written by `create-config` and read by `create`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestAccountDefinition {
    pub account_name: String,
    #[serde(default)]
    pub description: String,
    pub marketing_level: HubLevel,
    pub ops_level: HubLevel,
    pub service_level: HubLevel,
    pub sales_level: HubLevel,
    pub content_level: HubLevel,
}

impl TestAccountDefinition {
    pub fn enterprise(account_name: &str, description: &str) -> Self {
        Self {
            account_name: account_name.to_string(),
            description: description.to_string(),
            marketing_level: HubLevel::Enterprise,
            ops_level: HubLevel::Enterprise,
            service_level: HubLevel::Enterprise,
            sales_level: HubLevel::Enterprise,
            content_level: HubLevel::Enterprise,
        }
    }
}

pub async fn handle(ctx: &mut Context, command: TestAccountCommand) -> Result<()> {
    match command {
        TestAccountCommand::CreateConfig {
            name,
            description,
            path,
        } => {
            let name = match name {
                Some(n) => n,
                None => prompts::text(ctx.interactive, "Test account name", "--name")?,
            };
            let path = path.unwrap_or_else(|| PathBuf::from(format!("{}.json", name)));
            create_config(&name, description.as_deref().unwrap_or(""), &path)?;
            tracing::info!("Wrote test account definition {}", path.display());
            Ok(())
        }

        TestAccountCommand::Create { path } => create(ctx, &path).await,

        TestAccountCommand::Delete { id, yes } => {
            let confirmed = yes
                || prompts::confirm(ctx.interactive, &format!("Delete test account {}?", id), "--yes")?;
            if !confirmed {
                return Ok(());
            }
            let client = ctx.client().await?;
            test_accounts::delete(&client, id).await?;

            let id_str = id.to_string();
            if ctx.store.config.find_account(&id_str).is_some() {
                ctx.store.config.remove_account(&id_str)?;
                ctx.store.save()?;
            }
            tracing::info!("Deleted test account {}", id);
            Ok(())
        }

        TestAccountCommand::ImportData { path, object_type } => {
            let batches = records_by_type(read_json(&path)?, object_type.as_deref())?;
            let client = ctx.client().await?;

            for (object_type, records) in batches {
                let created = test_accounts::batch_create_records(&client, &object_type, &records).await?;
                tracing::info!(
                    "Imported {} {} record(s) into account {}",
                    created,
                    object_type,
                    client.account_id()
                );
            }
            Ok(())
        }
    }
}

fn create_config(name: &str, description: &str, path: &Path) -> Result<()> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    let definition = TestAccountDefinition::enterprise(name, description);
    write_json(path, &serde_json::to_value(definition)?)
}

async fn create(ctx: &mut Context, path: &Path) -> Result<()> {
    let definition: TestAccountDefinition = serde_json::from_value(read_json(path)?)
        .with_context(|| format!("Invalid test account definition {}", path.display()))?;

    let env = ctx.account()?.env;
    let client = ctx.client().await?;
    let created =
        test_accounts::create(&client, &serde_json::to_value(&definition)?).await?;
    tracing::info!("Created test account {} ({})", definition.account_name, created.id);

    // keep the new account usable from the CLI right away
    let Some(pak) = created.personal_access_key else {
        return Ok(());
    };
    let name = local_name(&ctx.store.config, &definition.account_name, created.id);
    let account = AccountConfig {
        name: name.clone(),
        account_id: created.id,
        env,
        auth_type: AuthType::PersonalAccessKey,
        default_mode: None,
        auth: None,
        api_key: None,
        personal_access_key: Some(pak.clone()),
    };

    let saved = ctx
        .store
        .config
        .upsert_account(account)
        .and_then(|_| ctx.store.save());
    if let Err(e) = saved {
        tracing::error!(
            "Test account {} was created but could not be saved; add it with `hs auth --personal-access-key {}`",
            created.id,
            pak
        );
        return Err(e);
    }
    tracing::info!("Added {} to {}", name, ctx.store.path().display());
    Ok(())
}

/// Config name for a new test account: its own name when free, else `<name>-<id>`.
fn local_name(config: &CliConfig, account_name: &str, id: u64) -> String {
    let base = account_name.split_whitespace().collect::<Vec<_>>().join("-");
    let taken = config
        .accounts
        .iter()
        .any(|a| a.name == base && a.account_id != id);
    if taken {
        format!("{}-{}", base, id)
    } else {
        base
    }
}

/// Group an import file into `(objectType, records)` batches.
///
/// Accepts either a bare array (with `--object-type`) or an object mapping
/// object types to arrays of records.
pub fn records_by_type(file: Value, object_type: Option<&str>) -> Result<Vec<(String, Vec<Value>)>> {
    match file {
        Value::Array(records) => {
            let object_type = object_type
                .context("--object-type is required when the file is a plain array")?;
            Ok(vec![(object_type.to_string(), records)])
        }
        Value::Object(map) => map
            .into_iter()
            .filter(|(k, _)| object_type.map(|t| t == k).unwrap_or(true))
            .map(|(k, v)| match v {
                Value::Array(records) => Ok((k, records)),
                _ => bail!("Records for {} must be an array", k),
            })
            .collect(),
        _ => bail!("Import file must be an array or an object of arrays"),
    }
}
