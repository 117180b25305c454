//! Shared error type for the external service clients.

/// Errors from the external service client layer.
#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("service API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The service reported an explicit failure for the task.
    #[error("service reported failure: {0}")]
    Service(String),

    /// The poll loop exhausted its wall-clock budget.
    #[error("service did not finish within {waited_secs}s")]
    Timeout { waited_secs: u64 },

    /// The response body did not have the expected shape.
    #[error("unexpected response shape: {0}")]
    Decode(String),
}

/// Ensure the response has a success status code. Returns the response
/// unchanged on success, or a [`ComputeError::Api`] containing the
/// status and body text on failure.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, ComputeError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(ComputeError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}
