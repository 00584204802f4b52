// src/api/projects.rs

//! Developer projects: upload, build status, deploy.

use anyhow::Result;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;

use super::{api_path, ApiClient};

const BASE: &str = "/project-components-external/v3";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub latest_build: Option<BuildRef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRef {
    pub build_id: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    #[serde(alias = "createdBuildId")]
    pub build_id: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    pub status: String,
    #[serde(default)]
    pub errors: Vec<serde_json::Value>,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "SUCCESS" | "FAILURE")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeployRef {
    pub id: u64,
}

pub async fn fetch(client: &ApiClient, name: &str) -> Result<Project> {
    client
        .get(&api_path(BASE, &["projects", name])?, &[])
        .await
}

pub async fn create(client: &ApiClient, name: &str) -> Result<Project> {
    client
        .post(&format!("{}/projects", BASE), &json!({ "name": name }))
        .await
}

pub async fn upload(client: &ApiClient, name: &str, zip: Vec<u8>, message: &str) -> Result<UploadResult> {
    let form = Form::new()
        .part(
            "file",
            Part::bytes(zip)
                .file_name("project.zip")
                .mime_str("application/zip")?,
        )
        .text("uploadMessage", message.to_string());

    client
        .post_multipart(&api_path(BASE, &["upload", name])?, form)
        .await
}

pub async fn build_status(client: &ApiClient, name: &str, build_id: u64) -> Result<TaskStatus> {
    client
        .get(
            &api_path(BASE, &["build", "status", name, build_id.to_string().as_str()])?,
            &[],
        )
        .await
}

pub async fn deploy(client: &ApiClient, name: &str, build_id: u64) -> Result<DeployRef> {
    client
        .post(
            &format!("{}/deploys/queue/async", BASE),
            &json!({ "projectName": name, "buildId": build_id }),
        )
        .await
}

pub async fn deploy_status(client: &ApiClient, name: &str, deploy_id: u64) -> Result<TaskStatus> {
    client
        .get(
            &api_path(BASE, &["deploy", "status", name, deploy_id.to_string().as_str()])?,
            &[],
        )
        .await
}
