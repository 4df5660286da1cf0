use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::types::{GalleryItem, ListPage};

const LIST_PATH: &str = "/list_files";
const UPLOAD_PATH: &str = "/upload";
const DELETE_PATH: &str = "/delete";

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("api reported failure: {0}")]
    Server(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorClass {
    RateLimit,
    Transient,
    Permanent,
}

#[derive(Clone)]
pub struct GalleryClient {
    http: Client,
    base_url: Url,
}

impl GalleryClient {
    pub fn new(base_url: &str) -> Result<Self, GalleryError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
        })
    }

    pub fn with_http(base_url: &str, http: Client) -> Result<Self, GalleryError> {
        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
        })
    }

    /// Fetches one listing page. The server either returns a paginated
    /// object (`items`/`has_more`/`next_token`) or, on deployments without
    /// pagination, a bare item array; both decode into one [`ListPage`]
    /// here so nothing past this boundary cares which shape arrived.
    pub async fn list_page(
        &self,
        token: Option<&str>,
        max: u32,
    ) -> Result<ListPage, GalleryError> {
        let mut url = self.endpoint(LIST_PATH)?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(token) = token {
                query.append_pair("token", token);
            }
            query.append_pair("max", &max.to_string());
        }
        let response = self.http.get(url).send().await?;
        let payload: ListResponse = Self::handle_response(response).await?;
        Ok(payload.normalize())
    }

    /// Uploads a single in-memory file as the multipart `file` part.
    /// A 2xx body that still carries a non-empty `error` field counts as
    /// a failure.
    pub async fn upload(
        &self,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), GalleryError> {
        let url = self.endpoint(UPLOAD_PATH)?;
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(name.to_string())
            .mime_str(content_type)?;
        let form = reqwest::multipart::Form::new().part("file", part);
        let response = self.http.post(url).multipart(form).send().await?;
        let payload: MutationResponse = Self::handle_response(response).await?;
        if let Some(error) = payload.error.filter(|e| !e.is_empty()) {
            return Err(GalleryError::Server(error));
        }
        Ok(())
    }

    /// Deletes one item by name; returns the server's confirmation
    /// message.
    pub async fn delete(&self, filename: &str) -> Result<String, GalleryError> {
        let url = self.endpoint(DELETE_PATH)?;
        let response = self
            .http
            .post(url)
            .json(&DeleteRequest { filename })
            .send()
            .await?;
        let payload: MutationResponse = Self::handle_response(response).await?;
        if let Some(error) = payload.error.filter(|e| !e.is_empty()) {
            return Err(GalleryError::Server(error));
        }
        Ok(payload
            .message
            .unwrap_or_else(|| format!("{filename} removed")))
    }

    fn endpoint(&self, path: &str) -> Result<Url, GalleryError> {
        Ok(self.base_url.join(path)?)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GalleryError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(GalleryError::Api { status, body })
        }
    }
}

impl GalleryError {
    pub fn classification(&self) -> Option<ApiErrorClass> {
        match self {
            GalleryError::Api { status, .. } => Some(classify_api_status(*status)),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.classification(),
            Some(ApiErrorClass::RateLimit | ApiErrorClass::Transient)
        )
    }
}

fn classify_api_status(status: StatusCode) -> ApiErrorClass {
    if status == StatusCode::TOO_MANY_REQUESTS {
        ApiErrorClass::RateLimit
    } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        ApiErrorClass::Transient
    } else {
        ApiErrorClass::Permanent
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListResponse {
    Paged {
        items: Vec<GalleryItem>,
        #[serde(default)]
        has_more: bool,
        #[serde(default)]
        next_token: Option<String>,
    },
    Flat(Vec<GalleryItem>),
}

impl ListResponse {
    fn normalize(self) -> ListPage {
        let (mut items, has_more, next_token) = match self {
            ListResponse::Paged {
                items,
                has_more,
                next_token,
            } => (items, has_more, next_token),
            ListResponse::Flat(items) => (items, false, None),
        };
        // The server lists folder placeholder keys as empty names.
        items.retain(|item| !item.name.is_empty());
        ListPage {
            items,
            has_more,
            next_token,
        }
    }
}

#[derive(Debug, Serialize)]
struct DeleteRequest<'a> {
    filename: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct MutationResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}
