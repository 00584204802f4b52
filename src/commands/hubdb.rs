// src/commands/hubdb.rs

use anyhow::{bail, Context as _, Result};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};

use super::table;
use crate::api::{hubdb, ApiClient};
use crate::cli::HubdbCommand;
use crate::context::Context;
use crate::prompts;
use crate::util::{read_json, write_json};

pub async fn handle(ctx: &mut Context, command: HubdbCommand) -> Result<()> {
    let client = ctx.client().await?;

    match command {
        HubdbCommand::Create { path } => create(&client, &path).await,
        HubdbCommand::Delete { table, yes } => {
            let confirmed = yes
                || prompts::confirm(ctx.interactive, &format!("Delete table {}?", table), "--yes")?;
            if confirmed {
                hubdb::delete_table(&client, &table).await?;
                tracing::info!("Deleted table {}", table);
            }
            Ok(())
        }
        HubdbCommand::Clear { table } => clear(&client, &table).await,
        HubdbCommand::Fetch { table, dest } => fetch(&client, &table, dest).await,
        HubdbCommand::List => list(&client).await,
    }
}

/// Split a table file into the definition and its optional `rows`.
pub fn split_table_file(mut file: Value) -> Result<(Value, Vec<Value>)> {
    let Some(obj) = file.as_object_mut() else {
        bail!("HubDB table file must be a JSON object");
    };
    if !obj.contains_key("name") || !obj.contains_key("label") {
        bail!("HubDB table file must include `name` and `label`");
    }

    let rows = match obj.remove("rows") {
        Some(Value::Array(rows)) => rows,
        Some(_) => bail!("`rows` must be an array"),
        None => Vec::new(),
    };
    Ok((file, rows))
}

async fn create(client: &ApiClient, path: &Path) -> Result<()> {
    let (definition, rows) = split_table_file(read_json(path)?)
        .with_context(|| format!("Invalid table file {}", path.display()))?;

    let created = hubdb::create_table(client, &definition).await?;
    if !rows.is_empty() {
        hubdb::create_rows(client, &created.id, &rows).await?;
    }
    hubdb::publish_table(client, &created.id).await?;

    tracing::info!(
        "Created and published table {} ({}) with {} row(s)",
        created.name,
        created.id,
        rows.len()
    );
    Ok(())
}

async fn clear(client: &ApiClient, table_id: &str) -> Result<()> {
    let rows = hubdb::fetch_draft_rows(client, table_id).await?;
    let ids: Vec<String> = rows
        .iter()
        .filter_map(|r| match r.get("id") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
        .collect();

    if !ids.is_empty() {
        hubdb::purge_draft_rows(client, table_id, &ids).await?;
    }
    hubdb::publish_table(client, table_id).await?;

    tracing::info!("Removed {} row(s) from table {} and published", ids.len(), table_id);
    Ok(())
}

/// Keep only what `hubdb create` accepts back: the definition plus row values.
fn to_table_file(definition: Value, rows: Vec<Value>) -> Value {
    const KEEP: &[&str] = &[
        "name",
        "label",
        "columns",
        "useForPages",
        "allowPublicApiAccess",
        "allowChildTables",
        "enableChildTablePages",
        "dynamicMetaTags",
    ];

    let mut out = Map::new();
    if let Value::Object(def) = definition {
        for (k, v) in def {
            if KEEP.contains(&k.as_str()) {
                out.insert(k, v);
            }
        }
    }

    let rows: Vec<Value> = rows
        .into_iter()
        .map(|r| {
            let mut row = Map::new();
            for key in ["path", "name", "childTableId", "values"] {
                if let Some(v) = r.get(key) {
                    if !v.is_null() {
                        row.insert(key.to_string(), v.clone());
                    }
                }
            }
            Value::Object(row)
        })
        .collect();
    out.insert("rows".to_string(), json!(rows));

    Value::Object(out)
}

async fn fetch(client: &ApiClient, table_id: &str, dest: Option<PathBuf>) -> Result<()> {
    let definition = hubdb::fetch_table(client, table_id).await?;
    let rows = hubdb::fetch_rows(client, table_id).await?;

    let name = definition
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or(table_id)
        .to_string();
    let path = match dest {
        Some(p) if p.extension().is_some() => p,
        Some(dir) => dir.join(format!("{}.hubdb.json", name)),
        None => PathBuf::from(format!("{}.hubdb.json", name)),
    };

    let count = rows.len();
    write_json(&path, &to_table_file(definition, rows))?;
    tracing::info!("Saved table {} with {} row(s) to {}", name, count, path.display());
    Ok(())
}

async fn list(client: &ApiClient) -> Result<()> {
    let tables = hubdb::list_tables(client).await?;
    if tables.is_empty() {
        tracing::info!("No HubDB tables in account {}", client.account_id());
        return Ok(());
    }

    let rows: Vec<Vec<String>> = tables
        .iter()
        .map(|t| {
            vec![
                t.id.clone(),
                t.name.clone(),
                t.label.clone().unwrap_or_default(),
                t.row_count.to_string(),
                if t.published { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect();
    println!("{}", table(&["Id", "Name", "Label", "Rows", "Published"], &rows));
    Ok(())
}
