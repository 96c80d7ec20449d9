use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{event, Level};

/// A password to use by default for users in unit tests.
pub const TEST_PASSWORD: &str = "the-password";
/// A hash created from [TEST_PASSWORD]
pub const TEST_PASSWORD_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$7Pdxrl3fSrSIelBARWvE5g$0D8uG+7ezAU7CWbIZZ+IbrL3QrEXNZOAI4oYM5mWijk";

/// An HTTP client set up for ease of use in tests. It takes a base URL when constructed and
/// makes all requests relative to that base. Each client has its own cookie jar, so each one
/// acts as a separate logged-in user.
#[derive(Clone, Debug)]
pub struct TestClient {
    /// The base URL prepended to all requests
    pub base: String,
    /// The HTTP client actually used to make requests
    pub client: reqwest::Client,
}

impl TestClient {
    /// Create a new TestClient with a base URL
    pub fn new(base: impl Into<String>) -> TestClient {
        TestClient {
            base: base.into(),
            client: new_client_builder().build().expect("Building client"),
        }
    }

    /// Create a new TestClient with the same base URL and an empty cookie jar
    pub fn fresh(&self) -> TestClient {
        TestClient::new(self.base.clone())
    }

    /// Create a new GET request
    pub fn get(&self, url: impl AsRef<str>) -> reqwest::RequestBuilder {
        self.client.get(format!("{}/{}", self.base, url.as_ref()))
    }

    /// Create a new POST request
    pub fn post(&self, url: impl AsRef<str>) -> reqwest::RequestBuilder {
        self.client.post(format!("{}/{}", self.base, url.as_ref()))
    }

    /// Create a new PUT request
    pub fn put(&self, url: impl AsRef<str>) -> reqwest::RequestBuilder {
        self.client.put(format!("{}/{}", self.base, url.as_ref()))
    }
}

fn new_client_builder() -> reqwest::ClientBuilder {
    reqwest::ClientBuilder::new()
        .cookie_store(true)
        .timeout(std::time::Duration::from_secs(30))
}

/// Extensions for reqwest::Response
#[async_trait]
pub trait ResponseExt {
    /// If the response is an error, log it. This can be used in place of [error_for_status].
    async fn log_error(self) -> Result<reqwest::Response, reqwest::Error>;

    /// Read an error response, returning the status code and the `error` message from the body.
    async fn error_message(self) -> (StatusCode, String);
}

#[async_trait]
impl ResponseExt for reqwest::Response {
    async fn log_error(self) -> Result<reqwest::Response, reqwest::Error> {
        if let Err(e) = self.error_for_status_ref() {
            let status = self.status().as_u16();
            let url = self.url().clone();
            let text = self.text().await.unwrap_or_default();
            event!(Level::ERROR, url=%url, %status, response=text);
            Err(e)
        } else {
            Ok(self)
        }
    }

    async fn error_message(self) -> (StatusCode, String) {
        let status = self.status();
        let body = self
            .json::<serde_json::Value>()
            .await
            .unwrap_or_default();
        let message = body
            .get("error")
            .and_then(|e| e.as_str())
            .unwrap_or_default()
            .to_string();
        (status, message)
    }
}
