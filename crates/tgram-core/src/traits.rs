use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TgramError;

/// Bot API transport trait.
///
/// Performs one remote method call and returns the unwrapped `result` of the
/// response envelope. The HTTP client implements it; tests substitute
/// scripted implementations.
#[async_trait]
pub trait BotApi: Send + Sync {
    /// Call `method` with a JSON object of parameters.
    async fn call(&self, method: &str, params: Value) -> Result<Value, TgramError>;

    /// Call `method` as a multipart upload, attaching the file at `file_path`
    /// under `file_field`.
    async fn upload(
        &self,
        method: &str,
        _params: Value,
        _file_field: &str,
        _file_path: &Path,
    ) -> Result<Value, TgramError> {
        Err(TgramError::Http(format!(
            "{method}: file upload not supported by this client"
        )))
    }
}
