use chrono::Utc;
use reqwest::Method;
use reqwest::header::AUTHORIZATION;
use std::path::Path;
use url::Url;

use super::digest::{collect_files, content_hash, content_id};
use super::shared_key::SharedKeySigner;
use super::{
    ArtifactUploader, AssetLocator, StorageCredential, StorageTarget, UPLOAD_STATUS_COMPLETED,
    UPLOAD_STATUS_KEY, UploadError,
};
use crate::credentials::AccessToken;

const STORAGE_API_VERSION: &str = "2020-04-08";

/// Uploads artifacts through the blob REST API.
///
/// SAS credentials travel in the query string and account keys sign each
/// request. A datastore without either uses the bearer token the client was
/// built with.
#[derive(Debug, Clone)]
pub struct BlobStorageClient {
    http_client: reqwest::blocking::Client,
    token: Option<AccessToken>,
}

enum Authorization {
    Sas,
    Bearer(String),
    SharedKey(SharedKeySigner),
}

impl Default for BlobStorageClient {
    fn default() -> Self {
        Self::new(None)
    }
}

impl BlobStorageClient {
    pub fn new(token: Option<AccessToken>) -> Self {
        Self {
            http_client: reqwest::blocking::Client::new(),
            token,
        }
    }

    fn blob_url(&self, target: &StorageTarget, blob_path: &str) -> Result<Url, UploadError> {
        let mut url = Url::parse(&target.account_url())
            .map_err(|_| UploadError::InvalidSource(target.account_url()))?;
        url.path_segments_mut()
            .map_err(|_| UploadError::InvalidSource(target.account_url()))?
            .push(&target.container_name)
            .extend(blob_path.split('/').filter(|s| !s.is_empty()));
        if let StorageCredential::Sas(token) = &target.credential {
            url.set_query(Some(token.trim_start_matches('?')));
        }
        Ok(url)
    }

    fn authorization(&self, target: &StorageTarget) -> Result<Authorization, UploadError> {
        match (&target.credential, &self.token) {
            (StorageCredential::Sas(_), _) => Ok(Authorization::Sas),
            (StorageCredential::AccountKey(key), _) => Ok(Authorization::SharedKey(
                SharedKeySigner::new(&target.account_name, key)?,
            )),
            (StorageCredential::None, Some(token)) => {
                Ok(Authorization::Bearer(token.secret().to_string()))
            }
            (StorageCredential::None, None) => {
                Err(UploadError::MissingCredential(target.account_name.clone()))
            }
        }
    }

    fn request(
        &self,
        method: Method,
        url: Url,
        authorization: &Authorization,
        headers: Vec<(String, String)>,
        body: Option<Vec<u8>>,
    ) -> reqwest::blocking::RequestBuilder {
        let content_length = body.as_ref().map_or(0, Vec::len);
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let headers =
            signed_headers(&method, &url, authorization, headers, content_length, &date);

        let mut builder = self.http_client.request(method, url);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        match body {
            Some(body) => builder.body(body),
            None => builder,
        }
    }

    fn upload_completed(
        &self,
        url: Url,
        authorization: &Authorization,
    ) -> Result<bool, UploadError> {
        let response = self
            .request(Method::HEAD, url, authorization, Vec::new(), None)
            .send()?;
        if !response.status().is_success() {
            return Ok(false);
        }
        let status = response
            .headers()
            .get(format!("x-ms-meta-{UPLOAD_STATUS_KEY}"))
            .and_then(|value| value.to_str().ok());
        Ok(status == Some(UPLOAD_STATUS_COMPLETED))
    }

    fn put_blob(
        &self,
        url: Url,
        authorization: &Authorization,
        body: Vec<u8>,
        metadata: Option<(&str, &str)>,
    ) -> Result<(), UploadError> {
        let url_text = url.to_string();
        let mut headers = vec![("x-ms-blob-type".to_string(), "BlockBlob".to_string())];
        if let Some((key, value)) = metadata {
            headers.push((format!("x-ms-meta-{key}"), value.to_string()));
        }
        let response = self
            .request(Method::PUT, url, authorization, headers, Some(body))
            .send()?;
        if !response.status().is_success() {
            return Err(UploadError::Status {
                url: strip_query(&url_text),
                status: response.status(),
            });
        }
        Ok(())
    }
}

/// Headers of one storage request, `Authorization` included.
fn signed_headers(
    method: &Method,
    url: &Url,
    authorization: &Authorization,
    mut headers: Vec<(String, String)>,
    content_length: usize,
    date: &str,
) -> Vec<(String, String)> {
    headers.push(("x-ms-version".to_string(), STORAGE_API_VERSION.to_string()));
    headers.push(("x-ms-date".to_string(), date.to_string()));
    let value = match authorization {
        Authorization::Sas => None,
        Authorization::Bearer(token) => Some(format!("Bearer {token}")),
        Authorization::SharedKey(signer) => {
            Some(signer.authorization(method, url, content_length, &headers))
        }
    };
    if let Some(value) = value {
        headers.push((AUTHORIZATION.as_str().to_string(), value));
    }
    headers
}

impl ArtifactUploader for BlobStorageClient {
    fn upload(&self, target: &StorageTarget, source: &Path) -> Result<AssetLocator, UploadError> {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| UploadError::InvalidSource(source.display().to_string()))?;
        let authorization = self.authorization(target)?;

        let files = collect_files(source)?;
        let id = content_id(&content_hash(&files)?);
        let mut locator = AssetLocator::for_content(&id, &name, source.is_dir());

        let marker = self.blob_url(target, &AssetLocator::marker_path(&id))?;
        if self.upload_completed(marker.clone(), &authorization)? {
            log::debug!("Content {id} already uploaded, skipping");
            locator.reused = true;
            return Ok(locator);
        }

        for file in &files {
            let blob_path = if file.relative.is_empty() {
                locator.path.clone()
            } else {
                format!("{}/{}", locator.path, file.relative)
            };
            log::debug!("Uploading {} to {blob_path}", file.absolute.display());
            let body = std::fs::read(&file.absolute)?;
            self.put_blob(
                self.blob_url(target, &blob_path)?,
                &authorization,
                body,
                None,
            )?;
        }

        self.put_blob(
            marker,
            &authorization,
            Vec::new(),
            Some((UPLOAD_STATUS_KEY, UPLOAD_STATUS_COMPLETED)),
        )?;
        log::info!(
            "Uploaded {} file(s) from {} to {}",
            files.len(),
            source.display(),
            locator.path
        );
        Ok(locator)
    }
}

// SAS tokens must not leak into error messages.
fn strip_query(url: &str) -> String {
    url.split('?').next().unwrap_or(url).to_string()
}
