//! Sync the exported setup through a private GitHub Gist.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::Config;
use crate::snapshot::{Export, merge_export};
use crate::ui;

const API: &str = "https://api.github.com";
/// File name inside the gist
pub const GIST_FILE: &str = "stowaway.json";

#[derive(Debug, thiserror::Error)]
pub enum GistError {
    #[error("no GitHub token: set github.token in the config or GITHUB_TOKEN")]
    MissingToken,
    #[error("no gist id given and none stored in the config")]
    MissingId,
    #[error("GitHub API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("gist {0} has no stowaway.json file")]
    MissingFile(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
pub struct GistFile {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub truncated: bool,
    #[serde(default)]
    pub raw_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GistResponse {
    pub id: String,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub files: BTreeMap<String, GistFile>,
}

/// Request body for creating or updating the gist
pub fn build_payload(content: &str, description: &str, public: Option<bool>) -> Value {
    let mut payload = json!({
        "description": description,
        "files": { GIST_FILE: { "content": content } },
    });
    if let Some(public) = public {
        payload["public"] = Value::Bool(public);
    }
    payload
}

/// Where the stowaway file lives in a gist response
pub enum FileContent<'a> {
    Inline(&'a str),
    Raw(&'a str),
}

pub fn extract_file(gist: &GistResponse) -> Result<FileContent<'_>, GistError> {
    let file = gist
        .files
        .get(GIST_FILE)
        .ok_or_else(|| GistError::MissingFile(gist.id.clone()))?;

    match (&file.content, file.truncated, &file.raw_url) {
        (Some(content), false, _) => Ok(FileContent::Inline(content)),
        (_, _, Some(raw)) => Ok(FileContent::Raw(raw)),
        _ => Err(GistError::MissingFile(gist.id.clone())),
    }
}

struct Client {
    http: reqwest::Client,
    token: String,
}

impl Client {
    fn new(token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            token,
        }
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", concat!("stowaway/", env!("CARGO_PKG_VERSION")))
            .header("X-GitHub-Api-Version", "2022-11-28")
            .bearer_auth(&self.token)
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, GistError> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v["message"].as_str().map(str::to_string))
                .unwrap_or(body);
            return Err(GistError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    async fn upload(&self, id: Option<&str>, payload: &Value) -> Result<GistResponse, GistError> {
        let builder = match id {
            Some(id) => self.request(reqwest::Method::PATCH, &format!("{}/gists/{}", API, id)),
            None => self.request(reqwest::Method::POST, &format!("{}/gists", API)),
        };
        Ok(self.send(builder.json(payload)).await?.json().await?)
    }

    async fn fetch(&self, id: &str) -> Result<GistResponse, GistError> {
        let builder = self.request(reqwest::Method::GET, &format!("{}/gists/{}", API, id));
        Ok(self.send(builder).await?.json().await?)
    }

    /// Raw files live on another host, which gets neither the token nor API headers
    fn raw_request(&self, url: &str) -> reqwest::RequestBuilder {
        self.http
            .get(url)
            .header("User-Agent", concat!("stowaway/", env!("CARGO_PKG_VERSION")))
    }

    async fn raw(&self, url: &str) -> Result<String, GistError> {
        Ok(self.send(self.raw_request(url)).await?.text().await?)
    }
}

/// `stowaway gist push`
pub async fn push(config_path: &Path, public: bool, description: Option<String>) -> Result<()> {
    let mut config = Config::load(config_path)?;
    let token = config.github_token().ok_or(GistError::MissingToken)?;
    let client = Client::new(token);

    let content = serde_json::to_string_pretty(&Export::from_config(&config))?;
    let description = description.unwrap_or_else(|| "stowaway machine setup".to_string());
    let existing = config.github.gist_id.clone();
    // visibility can only be chosen on creation
    let payload = build_payload(
        &content,
        &description,
        existing.is_none().then_some(public),
    );

    let spinner = ui::spinner("Uploading to GitHub Gist");
    let result = client.upload(existing.as_deref(), &payload).await;
    spinner.finish_and_clear();
    let gist = result.context("Failed to upload gist")?;

    if existing.as_deref() != Some(gist.id.as_str()) {
        config.github.gist_id = Some(gist.id.clone());
        config.commit(config_path)?;
    }

    ui::success(format!(
        "Pushed setup to gist {}",
        gist.html_url.as_deref().unwrap_or(&gist.id)
    ));
    Ok(())
}

/// `stowaway gist pull`
pub async fn pull(config_path: &Path, id: Option<String>, replace: bool) -> Result<()> {
    let mut config = Config::load(config_path)?;
    let token = config.github_token().ok_or(GistError::MissingToken)?;
    let id = id
        .or_else(|| config.github.gist_id.clone())
        .ok_or(GistError::MissingId)?;
    let client = Client::new(token);

    let spinner = ui::spinner(format!("Downloading gist {}", id));
    let result = download(&client, &id).await;
    spinner.finish_and_clear();
    let content = result.context("Failed to download gist")?;

    let export: Export =
        serde_json::from_str(&content).context("Gist does not contain a stowaway export")?;
    merge_export(&mut config, export, replace);
    config.github.gist_id = Some(id.clone());
    config.commit(config_path)?;

    ui::success(format!(
        "Pulled gist {} ({} packages, {} bundles)",
        id,
        config.packages.len(),
        config.bundles.len()
    ));
    Ok(())
}

async fn download(client: &Client, id: &str) -> Result<String, GistError> {
    let gist = client.fetch(id).await?;
    match extract_file(&gist)? {
        FileContent::Inline(content) => Ok(content.to_string()),
        FileContent::Raw(url) => client.raw(url).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_download_carries_no_token() {
        let client = Client::new("secret".to_string());
        let raw = client
            .raw_request("https://gist.githubusercontent.com/u/abc/raw/stowaway.json")
            .build()
            .unwrap();
        assert!(raw.headers().get(reqwest::header::AUTHORIZATION).is_none());
        assert!(raw.headers().get(reqwest::header::ACCEPT).is_none());

        let api = client
            .request(reqwest::Method::GET, "https://api.github.com/gists/abc")
            .build()
            .unwrap();
        assert!(api.headers().get(reqwest::header::AUTHORIZATION).is_some());
    }

    #[test]
    fn test_payload_for_new_gist() {
        let payload = build_payload("{}", "desc", Some(false));
        assert_eq!(payload["public"], Value::Bool(false));
        assert_eq!(payload["files"][GIST_FILE]["content"], "{}");
        assert_eq!(payload["description"], "desc");
    }

    #[test]
    fn test_payload_for_update_has_no_visibility() {
        let payload = build_payload("{}", "desc", None);
        assert!(payload.get("public").is_none());
    }

    #[test]
    fn test_extract_inline_content() {
        let gist: GistResponse = serde_json::from_value(json!({
            "id": "abc",
            "files": { "stowaway.json": { "content": "{\"packages\":[]}", "truncated": false } }
        }))
        .unwrap();
        match extract_file(&gist).unwrap() {
            FileContent::Inline(content) => assert!(content.contains("packages")),
            FileContent::Raw(_) => panic!("expected inline content"),
        }
    }

    #[test]
    fn test_extract_truncated_uses_raw_url() {
        let gist: GistResponse = serde_json::from_value(json!({
            "id": "abc",
            "files": { "stowaway.json": {
                "content": "{\"pack",
                "truncated": true,
                "raw_url": "https://gist.githubusercontent.com/raw/abc"
            } }
        }))
        .unwrap();
        assert!(matches!(extract_file(&gist).unwrap(), FileContent::Raw(_)));
    }

    #[test]
    fn test_extract_missing_file() {
        let gist: GistResponse = serde_json::from_value(json!({
            "id": "abc",
            "files": { "other.txt": { "content": "x" } }
        }))
        .unwrap();
        assert!(matches!(extract_file(&gist), Err(GistError::MissingFile(_))));
    }

    #[test]
    fn test_token_from_config() {
        let mut config = Config::default();
        config.github.token = Some("ghp_x".into());
        assert_eq!(config.github_token().as_deref(), Some("ghp_x"));
    }
}
