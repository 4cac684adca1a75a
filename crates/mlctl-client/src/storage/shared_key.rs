use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use reqwest::Method;
use sha2::Sha256;
use url::Url;

use super::UploadError;

/// Signs blob requests with a storage account key.
#[derive(Clone)]
pub(crate) struct SharedKeySigner {
    account: String,
    mac: Hmac<Sha256>,
}

impl SharedKeySigner {
    /// `key` is the base64 account key as the datastore returns it.
    pub(crate) fn new(account: &str, key: &str) -> Result<Self, UploadError> {
        let invalid = || UploadError::InvalidAccountKey(account.to_string());
        let key = STANDARD.decode(key.trim()).map_err(|_| invalid())?;
        let mac = Hmac::<Sha256>::new_from_slice(&key).map_err(|_| invalid())?;
        Ok(Self {
            account: account.to_string(),
            mac,
        })
    }

    /// Blob service string-to-sign. Only `x-ms-*` headers take part; the
    /// standard headers this client never sends stay empty.
    pub(crate) fn string_to_sign(
        &self,
        method: &Method,
        url: &Url,
        content_length: usize,
        headers: &[(String, String)],
    ) -> String {
        let length = if content_length == 0 {
            String::new()
        } else {
            content_length.to_string()
        };

        let mut ms_headers: Vec<(String, &str)> = headers
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.trim()))
            .filter(|(name, _)| name.starts_with("x-ms-"))
            .collect();
        ms_headers.sort();
        let canonical_headers: String = ms_headers
            .iter()
            .map(|(name, value)| format!("{name}:{value}\n"))
            .collect();

        let mut resource = format!("/{}{}", self.account, url.path());
        let mut params: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.to_lowercase(), v.into_owned()))
            .collect();
        params.sort();
        for (name, value) in params {
            resource.push_str(&format!("\n{name}:{value}"));
        }

        format!("{method}\n\n\n{length}\n\n\n\n\n\n\n\n\n{canonical_headers}{resource}")
    }

    /// `Authorization` header value for the request.
    pub(crate) fn authorization(
        &self,
        method: &Method,
        url: &Url,
        content_length: usize,
        headers: &[(String, String)],
    ) -> String {
        let mut mac = self.mac.clone();
        mac.update(
            self.string_to_sign(method, url, content_length, headers)
                .as_bytes(),
        );
        let signature = STANDARD.encode(mac.finalize().into_bytes());
        format!("SharedKey {}:{signature}", self.account)
    }
}
