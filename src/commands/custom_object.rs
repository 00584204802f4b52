// src/commands/custom_object.rs

use anyhow::{bail, Context as _, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};

use super::table;
use crate::api::{custom_objects, ApiClient};
use crate::cli::{CustomObjectCommand, SchemaCommand};
use crate::context::Context;
use crate::prompts;
use crate::util::{read_json, write_json};

pub async fn handle(ctx: &mut Context, command: CustomObjectCommand) -> Result<()> {
    let CustomObjectCommand::Schema { command } = command;
    let client = ctx.client().await?;

    match command {
        SchemaCommand::Create { path } => {
            let definition = load_definition(&path)?;
            let created = custom_objects::create(&client, &definition).await?;
            tracing::info!(
                "Created schema {} in account {}",
                schema_name(&created).unwrap_or("<unnamed>"),
                client.account_id()
            );
            Ok(())
        }

        SchemaCommand::Update { name, path } => {
            let definition = load_definition(&path)?;
            custom_objects::update(&client, &name, &definition).await?;
            tracing::info!("Updated schema {}", name);
            Ok(())
        }

        SchemaCommand::Delete { name, yes } => {
            let confirmed = yes
                || prompts::confirm(ctx.interactive, &format!("Delete schema {}?", name), "--yes")?;
            if !confirmed {
                return Ok(());
            }
            custom_objects::delete(&client, &name).await?;
            tracing::info!("Deleted schema {}", name);
            Ok(())
        }

        SchemaCommand::List => list(&client).await,

        SchemaCommand::Fetch { name, dest } => {
            let schema = custom_objects::fetch(&client, &name).await?;
            let path = write_schema(&dest.unwrap_or_else(|| PathBuf::from(".")), &schema)?;
            tracing::info!("Saved schema {} to {}", name, path.display());
            Ok(())
        }

        SchemaCommand::FetchAll { dest } => {
            let dest = dest.unwrap_or_else(|| PathBuf::from("."));
            let schemas = custom_objects::list(&client).await?;
            for schema in &schemas {
                write_schema(&dest, schema)?;
            }
            tracing::info!("Saved {} schema(s) to {}", schemas.len(), dest.display());
            Ok(())
        }
    }
}

fn schema_name(schema: &Value) -> Option<&str> {
    schema.get("name").and_then(Value::as_str)
}

/// Read a schema definition and check the fields the API requires.
pub fn load_definition(path: &Path) -> Result<Value> {
    let definition = read_json(path)?;
    validate_definition(&definition)
        .with_context(|| format!("Invalid schema definition in {}", path.display()))?;
    Ok(definition)
}

pub fn validate_definition(definition: &Value) -> Result<()> {
    let Some(obj) = definition.as_object() else {
        bail!("definition must be a JSON object");
    };

    match obj.get("name") {
        Some(Value::String(s)) if !s.trim().is_empty() => {}
        _ => bail!("`name` must be a non-empty string"),
    }

    let labels = obj.get("labels").and_then(Value::as_object);
    let has_labels = labels
        .map(|l| l.get("singular").is_some() && l.get("plural").is_some())
        .unwrap_or(false);
    if !has_labels {
        bail!("`labels` must be an object with `singular` and `plural`");
    }

    match obj.get("properties") {
        Some(Value::Array(props)) if !props.is_empty() => Ok(()),
        _ => bail!("`properties` must be a non-empty array"),
    }
}

fn write_schema(dest: &Path, schema: &Value) -> Result<PathBuf> {
    let name = schema_name(schema).context("Schema response has no name")?;
    let path = dest.join(format!("{}.json", name));
    write_json(&path, schema)?;
    Ok(path)
}

async fn list(client: &ApiClient) -> Result<()> {
    let schemas = custom_objects::list(client).await?;
    if schemas.is_empty() {
        tracing::info!("No custom object schemas in account {}", client.account_id());
        return Ok(());
    }

    let rows: Vec<Vec<String>> = schemas
        .iter()
        .map(|s| {
            let text = |key: &str| s.get(key).and_then(Value::as_str).unwrap_or("").to_string();
            let label = s
                .pointer("/labels/singular")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            vec![text("name"), label, text("objectTypeId")]
        })
        .collect();

    println!("{}", table(&["Name", "Label", "Object Type"], &rows));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_complete_definition() {
        let def = json!({
            "name": "cars",
            "labels": { "singular": "Car", "plural": "Cars" },
            "properties": [{ "name": "vin", "label": "VIN", "type": "string" }]
        });
        assert!(validate_definition(&def).is_ok());
    }

    #[test]
    fn rejects_incomplete_definitions() {
        let missing_labels = json!({ "name": "cars", "properties": [{}] });
        assert!(validate_definition(&missing_labels)
            .unwrap_err()
            .to_string()
            .contains("labels"));

        let empty_props = json!({
            "name": "cars",
            "labels": { "singular": "Car", "plural": "Cars" },
            "properties": []
        });
        assert!(validate_definition(&empty_props).is_err());
        assert!(validate_definition(&json!([1, 2])).is_err());
    }

    #[test]
    fn load_definition_names_the_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("car.json");
        std::fs::write(&path, r#"{"name": ""}"#).unwrap();
        let err = load_definition(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("car.json"));
    }
}
