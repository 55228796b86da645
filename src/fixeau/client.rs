use futures::stream::{self, Stream, TryStreamExt};
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Display;
use std::path::Path;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::fixeau::models::{Page, Photo, TokenResponse};

/// Client for the fixeau.com REST API.
///
/// The JWT token is obtained once in [`FixeauClient::login`] and attached to
/// every request made through the returned client.
pub struct FixeauClient {
    http_client: Client,
    base_url: String,
    token: String,
}

/// Position of a paginated listing
enum Cursor {
    First(RequestBuilder),
    Next(String),
    Done,
}

impl FixeauClient {
    /// Exchange the configured credentials for a token.
    ///
    /// # Errors
    ///
    /// Returns `AppError::FixeauApi` if the credentials are rejected, or
    /// `AppError::Request` if the API cannot be reached.
    pub async fn login(config: &Config) -> AppResult<Self> {
        let http_client = Client::builder()
            .danger_accept_invalid_certs(config.skip_tls_verify)
            .build()?;
        let base_url = config.base_url().to_string();

        let response = http_client
            .post(format!("{base_url}/token/"))
            .form(&[
                ("username", config.username.as_str()),
                ("password", config.password.as_str()),
            ])
            .send()
            .await?;
        let token: TokenResponse = parse_json(check_status(response).await?).await?;

        tracing::debug!(url = %base_url, username = %config.username, "Obtained API token");

        Ok(Self {
            http_client,
            base_url,
            token: token.token,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for `path`. Absolute URLs (pagination cursors) are kept as is.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http_client
            .request(method, self.url(path))
            .header(AUTHORIZATION, format!("JWT {}", self.token))
    }

    async fn send(&self, request: RequestBuilder) -> AppResult<Response> {
        check_status(request.send().await?).await
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> AppResult<T> {
        parse_json(self.send(request).await?).await
    }

    /// POST `body` as JSON to `path`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::FixeauApi` on any non-2xx response.
    pub async fn create<B, T>(&self, path: &str, body: &B) -> AppResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(self.request(Method::POST, path).json(body)).await
    }

    /// PUT `body` to the object `id` under `path`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::FixeauApi` on any non-2xx response.
    pub async fn replace<B, T>(&self, path: &str, id: impl Display, body: &B) -> AppResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = object_path(path, id);
        self.send_json(self.request(Method::PUT, &url).json(body)).await
    }

    /// PATCH `body` onto the object `id` under `path`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::FixeauApi` on any non-2xx response.
    pub async fn partial_update<B, T>(&self, path: &str, id: impl Display, body: &B) -> AppResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = object_path(path, id);
        self.send_json(self.request(Method::PATCH, &url).json(body)).await
    }

    /// GET `path` (relative to the base URL, or absolute).
    ///
    /// # Errors
    ///
    /// Returns `AppError::FixeauApi` on any non-2xx response.
    pub async fn read<T: DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        self.send_json(self.request(Method::GET, path)).await
    }

    /// Get an object by primary key, `None` when the API answers 404.
    ///
    /// # Errors
    ///
    /// Returns `AppError::FixeauApi` on any other non-2xx response.
    pub async fn get_object<T: DeserializeOwned>(
        &self,
        path: &str,
        id: impl Display,
    ) -> AppResult<Option<T>> {
        let response = self
            .request(Method::GET, &object_path(path, id))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        parse_json(check_status(response).await?).await.map(Some)
    }

    /// Lazily list every object under `path` matching `query`.
    ///
    /// The query goes out with the first request only; later pages are fetched
    /// from the `next` URL of the previous page. The stream ends when `next` is
    /// null or a page comes back empty.
    pub fn list<'a, T>(
        &'a self,
        path: &str,
        query: &[(&str, &str)],
    ) -> impl Stream<Item = AppResult<T>> + use<'a, T>
    where
        T: DeserializeOwned,
    {
        let first = self.request(Method::GET, path).query(query);

        stream::try_unfold(Cursor::First(first), move |cursor| async move {
            let request = match cursor {
                Cursor::First(request) => request,
                Cursor::Next(url) => self.request(Method::GET, &url),
                Cursor::Done => return Ok::<_, AppError>(None),
            };

            let page: Page<T> = self.send_json(request).await?;
            if page.results.is_empty() {
                return Ok(None);
            }

            let cursor = page.next.map_or(Cursor::Done, Cursor::Next);
            Ok(Some((page.results, cursor)))
        })
        .map_ok(|results| stream::iter(results.into_iter().map(Ok::<T, AppError>)))
        .try_flatten()
    }

    /// First object under `path` matching `query`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::FixeauApi` if the first page cannot be fetched.
    pub async fn find_first<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> AppResult<Option<T>> {
        let mut results = std::pin::pin!(self.list(path, query));
        results.try_next().await
    }

    /// Upload an image file as multipart form data to `/photo/`, stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the file cannot be read, or
    /// `AppError::FixeauApi` if the upload is rejected.
    pub async fn upload_photo(&self, file: &Path, name: &str) -> AppResult<Photo> {
        let bytes = tokio::fs::read(file).await?;
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let form = Form::new()
            .text("name", name.to_string())
            .part("image", Part::bytes(bytes).file_name(file_name));

        self.send_json(self.request(Method::POST, "/photo/").multipart(form))
            .await
    }
}

/// `path` must end with a slash, e.g. `/series/` -> `/series/42/`
fn object_path(path: &str, id: impl Display) -> String {
    format!("{path}{id}/")
}

async fn check_status(response: Response) -> AppResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    Err(AppError::FixeauApi {
        status: status.as_u16(),
        body: response.text().await.unwrap_or_default(),
    })
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> AppResult<T> {
    let text = response.text().await?;

    serde_json::from_str(&text).map_err(|e| {
        tracing::error!(
            error = %e,
            body_preview = %text.chars().take(500).collect::<String>(),
            "Failed to parse fixeau response"
        );
        AppError::Parse(e.to_string())
    })
}
