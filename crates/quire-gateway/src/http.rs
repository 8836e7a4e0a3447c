//! HTTP implementation of the notes gateway.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use quire_core::{Error, Folder, Note, NotesGateway, Result};

use crate::config::ApiConfig;

/// Gateway talking JSON over HTTP to the notes server.
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    /// Create a gateway from an explicit configuration.
    pub fn new(config: ApiConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        debug!(
            base_url = %config.base_url,
            timeout_secs = config.timeout_secs,
            "Initializing HTTP gateway"
        );

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ApiConfig::from_env())
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    /// Send a request and map transport errors and non-2xx statuses.
    async fn send(&self, op: &'static str, request: RequestBuilder) -> Result<Response> {
        let start = Instant::now();

        let response = request.send().await.map_err(|e| {
            warn!(op, error = %e, "Request failed");
            Error::Request(format!("{} failed: {}", op, e))
        })?;

        let elapsed = start.elapsed().as_millis() as u64;
        if elapsed > quire_core::defaults::SLOW_REQUEST_MS {
            warn!(op, duration_ms = elapsed, slow = true, "Slow gateway call");
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(op, status = status.as_u16(), duration_ms = elapsed, "Server rejected request");
            return Err(Error::Remote {
                status: status.as_u16(),
                body,
            });
        }

        debug!(op, status = status.as_u16(), duration_ms = elapsed, "Gateway call complete");
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        op: &'static str,
        request: RequestBuilder,
    ) -> Result<T> {
        let response = self.send(op, request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| Error::Serialization(format!("Failed to parse {} response: {}", op, e)))
    }
}

fn segment(id: &str) -> String {
    urlencoding::encode(id).into_owned()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateFolderBody<'a> {
    folder_name: &'a str,
    parent_folder_id: Option<&'a str>,
}

#[derive(Serialize)]
struct RenameFolderBody<'a> {
    name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateNoteBody<'a> {
    content: &'a str,
    folder_id: &'a str,
}

#[derive(Serialize)]
struct EditNoteBody<'a> {
    content: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MoveNoteBody<'a> {
    target_folder_id: &'a str,
}

#[async_trait]
impl NotesGateway for HttpGateway {
    #[instrument(skip(self), fields(subsystem = "gateway", component = "http", op = "list_folders"))]
    async fn list_folders(&self) -> Result<Vec<Folder>> {
        let folders: Vec<Folder> = self
            .send_json("list_folders", self.client.get(self.url("/folders")))
            .await?;
        debug!(result_count = folders.len(), "Folders listed");
        Ok(folders)
    }

    #[instrument(skip(self), fields(subsystem = "gateway", component = "http", op = "create_folder"))]
    async fn create_folder(&self, name: &str, parent_folder_id: Option<&str>) -> Result<Folder> {
        let body = CreateFolderBody {
            folder_name: name,
            parent_folder_id,
        };
        self.send_json(
            "create_folder",
            self.client.post(self.url("/folders")).json(&body),
        )
        .await
    }

    #[instrument(skip(self), fields(subsystem = "gateway", component = "http", op = "rename_folder"))]
    async fn rename_folder(&self, folder_id: &str, name: &str) -> Result<Folder> {
        let url = self.url(&format!("/folders/{}/rename", segment(folder_id)));
        self.send_json(
            "rename_folder",
            self.client.put(url).json(&RenameFolderBody { name }),
        )
        .await
    }

    #[instrument(skip(self), fields(subsystem = "gateway", component = "http", op = "delete_folder"))]
    async fn delete_folder(&self, folder_id: &str) -> Result<()> {
        let url = self.url(&format!("/folders/{}", segment(folder_id)));
        self.send("delete_folder", self.client.delete(url)).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(subsystem = "gateway", component = "http", op = "list_notes"))]
    async fn list_notes(&self, folder_id: &str) -> Result<Vec<Note>> {
        let url = self.url(&format!("/notes/folder/{}", segment(folder_id)));
        let notes: Vec<Note> = self.send_json("list_notes", self.client.get(url)).await?;
        debug!(result_count = notes.len(), "Notes listed");
        Ok(notes)
    }

    #[instrument(skip(self), fields(subsystem = "gateway", component = "http", op = "list_deleted_notes"))]
    async fn list_deleted_notes(&self) -> Result<Vec<Note>> {
        let notes: Vec<Note> = self
            .send_json(
                "list_deleted_notes",
                self.client.get(self.url("/notes/recycled")),
            )
            .await?;
        debug!(result_count = notes.len(), "Deleted notes listed");
        Ok(notes)
    }

    #[instrument(skip(self, content), fields(subsystem = "gateway", component = "http", op = "create_note", content_len = content.len()))]
    async fn create_note(&self, content: &str, folder_id: &str) -> Result<Note> {
        let body = CreateNoteBody { content, folder_id };
        self.send_json("create_note", self.client.post(self.url("/notes/")).json(&body))
            .await
    }

    #[instrument(skip(self, content), fields(subsystem = "gateway", component = "http", op = "edit_note", content_len = content.len()))]
    async fn edit_note(&self, note_id: &str, content: &str) -> Result<()> {
        let url = self.url(&format!("/notes/{}", segment(note_id)));
        self.send("edit_note", self.client.put(url).json(&EditNoteBody { content }))
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(subsystem = "gateway", component = "http", op = "delete_note"))]
    async fn delete_note(&self, note_id: &str) -> Result<()> {
        let url = self.url(&format!("/notes/{}", segment(note_id)));
        self.send("delete_note", self.client.delete(url)).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(subsystem = "gateway", component = "http", op = "move_note"))]
    async fn move_note(&self, note_id: &str, target_folder_id: &str) -> Result<()> {
        let url = self.url(&format!("/notes/{}/move", segment(note_id)));
        self.send(
            "move_note",
            self.client
                .put(url)
                .json(&MoveNoteBody { target_folder_id }),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(subsystem = "gateway", component = "http", op = "restore_note"))]
    async fn restore_note(&self, note_id: &str) -> Result<()> {
        let url = self.url(&format!("/notes/{}/restore", segment(note_id)));
        self.send("restore_note", self.client.put(url)).await?;
        Ok(())
    }
}
