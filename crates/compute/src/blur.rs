//! Client for the blur removal API.

use crate::error::{ensure_success, ComputeError};

/// HTTP client for the blur service.
///
/// One call: POST the image as multipart, get the blurred image back as
/// the response body. The service authenticates with a bearer token.
pub struct BlurClient {
    client: reqwest::Client,
    url: String,
    token: String,
}

impl BlurClient {
    /// Create a new client for the service at `url`.
    pub fn new(url: String, token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            token,
        }
    }

    /// Create a client reusing an existing [`reqwest::Client`]
    /// (connection pooling across services).
    pub fn with_client(client: reqwest::Client, url: String, token: String) -> Self {
        Self { client, url, token }
    }

    /// Submit an image and return the blurred bytes.
    pub async fn blur(&self, file_name: &str, bytes: Vec<u8>) -> Result<Vec<u8>, ComputeError> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        Ok(response.bytes().await?.to_vec())
    }
}
