//! Fire-and-forget operational notifications
//!
//! A webhook that receives one line of text on run start, finish and
//! error. Absence of the sink never affects run correctness; failures
//! to send are logged and swallowed.

use serde_json::json;
use tracing::warn;

/// Webhook-backed notification sink
#[derive(Clone)]
pub struct Notifier {
    http: reqwest::Client,
    url: String,
}

impl Notifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// Send one line of text; errors are logged, never returned
    pub async fn send(&self, line: &str) {
        let result = self
            .http
            .post(&self.url)
            .json(&json!({ "content": line }))
            .send()
            .await;
        match result {
            Ok(response) if !response.status().is_success() => {
                warn!("notification sink returned HTTP {}", response.status());
            }
            Err(e) => warn!("notification sink unreachable: {}", e),
            Ok(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json_string, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_send_posts_content_line() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_json_string(r#"{"content":"run finished"}"#))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = Notifier::new(format!("{}/hook", server.uri()));
        notifier.send("run finished").await;
    }

    #[tokio::test]
    async fn test_send_swallows_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let notifier = Notifier::new(format!("{}/hook", server.uri()));
        // must not panic or propagate
        notifier.send("run failed").await;
    }
}
