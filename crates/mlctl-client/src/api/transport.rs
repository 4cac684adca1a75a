use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::ClientError;

/// Request/response seam between the control-plane core and the network.
///
/// Paths are resource paths relative to the management endpoint, which means a
/// canonical resource id can be used as a path directly. Every call carries the
/// API version the resource kind is served under.
pub trait Transport: Send + Sync {
    fn get(
        &self,
        path: &str,
        api_version: &str,
        query: &[(&str, &str)],
    ) -> Result<Value, ClientError>;

    /// Fetches every page of a collection and returns the concatenated items.
    fn list(
        &self,
        path: &str,
        api_version: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<Value>, ClientError>;

    fn put(&self, path: &str, api_version: &str, body: &Value) -> Result<Value, ClientError>;

    fn post(
        &self,
        path: &str,
        api_version: &str,
        body: Option<&Value>,
    ) -> Result<Value, ClientError>;

    fn delete(&self, path: &str, api_version: &str) -> Result<(), ClientError>;
}

/// Typed helpers on top of any [`Transport`].
pub trait TransportExt: Transport {
    fn get_json<R>(&self, path: &str, api_version: &str) -> Result<R, ClientError>
    where
        R: DeserializeOwned,
    {
        let value = self.get(path, api_version, &[])?;
        Ok(serde_json::from_value(value)?)
    }

    fn put_json<T, R>(&self, path: &str, api_version: &str, body: &T) -> Result<R, ClientError>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        let value = self.put(path, api_version, &body)?;
        Ok(serde_json::from_value(value)?)
    }

    fn list_json<R>(
        &self,
        path: &str,
        api_version: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<R>, ClientError>
    where
        R: DeserializeOwned,
    {
        self.list(path, api_version, query)?
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(ClientError::from))
            .collect()
    }
}

impl<T: Transport + ?Sized> TransportExt for T {}
