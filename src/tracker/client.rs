//! Ticket tracker clients.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::json;

use super::TicketUpdate;
use crate::config::TrackerConfig;
use crate::error::{PromoteError, Result};
use crate::secrets::OutputMasker;

/// Something that can move a ticket along its workflow.
pub trait TicketTracker {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Post the transition and comment in `update`.
    fn apply(&self, update: &TicketUpdate) -> Result<()>;
}

/// Logs the transition it would make. Used when no tracker URL is set.
#[derive(Debug, Default)]
pub struct LogTracker;

impl TicketTracker for LogTracker {
    fn name(&self) -> &'static str {
        "log"
    }

    fn apply(&self, update: &TicketUpdate) -> Result<()> {
        tracing::info!(
            ticket = %update.ticket,
            state = %update.state,
            environment = %update.environment,
            "ticket transition (no tracker configured)"
        );
        Ok(())
    }
}

/// Talks to a tracker REST API.
///
/// Posts `{"state": ...}` to `<base>/issues/<ticket>/transitions` and
/// `{"body": ...}` to `<base>/issues/<ticket>/comments`.
pub struct HttpTracker {
    base_url: String,
    token: Option<String>,
    client: reqwest::blocking::Client,
}

impl HttpTracker {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PromoteError::Tracker {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client,
        })
    }

    fn post(&self, path: &str, body: serde_json::Value) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().map_err(|e| PromoteError::Tracker {
            message: format!("request to {} failed: {}", url, e),
        })?;

        if !response.status().is_success() {
            return Err(PromoteError::Tracker {
                message: format!("HTTP {} from {}", response.status(), url),
            });
        }

        Ok(())
    }
}

impl TicketTracker for HttpTracker {
    fn name(&self) -> &'static str {
        "http"
    }

    fn apply(&self, update: &TicketUpdate) -> Result<()> {
        self.post(
            &format!("/issues/{}/transitions", update.ticket),
            json!({ "state": update.state }),
        )?;
        self.post(
            &format!("/issues/{}/comments", update.ticket),
            json!({ "body": update.comment }),
        )?;
        tracing::info!(ticket = %update.ticket, state = %update.state, "ticket updated");
        Ok(())
    }
}

/// Tracker for the configuration: HTTP when `base_url` is set, otherwise
/// the logging stub. The token is registered with `masker`.
pub fn tracker_from_config(
    config: &TrackerConfig,
    env: &HashMap<String, String>,
    masker: &OutputMasker,
) -> Result<Box<dyn TicketTracker>> {
    match &config.base_url {
        Some(base_url) => {
            let token = env
                .get(&config.token_env)
                .filter(|t| !t.is_empty())
                .cloned();
            match &token {
                Some(token) => masker.add_secret(token.as_str()),
                None => tracing::warn!(
                    "{} is not set; calling tracker without a token",
                    config.token_env
                ),
            }
            Ok(Box::new(HttpTracker::new(
                base_url,
                token,
                Duration::from_secs(30),
            )?))
        }
        None => Ok(Box::new(LogTracker)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TicketStates;
    use crate::environment::Environment;
    use httpmock::prelude::*;

    fn update() -> TicketUpdate {
        TicketUpdate::new(
            "CRM-42",
            Environment::Production,
            &TicketStates::default(),
            "run_1700000000000_0a1b2c3d",
            "https://ci.example.com/job/7/console",
        )
    }

    #[test]
    fn http_tracker_posts_transition_and_comment() {
        let server = MockServer::start();
        let transition = server.mock(|when, then| {
            when.method(POST)
                .path("/issues/CRM-42/transitions")
                .header("Authorization", "Bearer tracker-token")
                .json_body(json!({ "state": "Done" }));
            then.status(204);
        });
        let comment = server.mock(|when, then| {
            when.method(POST)
                .path("/issues/CRM-42/comments")
                .body_includes("Deployed to PRODUCTION");
            then.status(201);
        });

        let tracker = HttpTracker::new(
            &server.url("/"),
            Some("tracker-token".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();
        tracker.apply(&update()).unwrap();

        transition.assert();
        comment.assert();
    }

    #[test]
    fn http_error_is_tracker_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/issues/CRM-42/transitions");
            then.status(500);
        });

        let tracker = HttpTracker::new(&server.base_url(), None, Duration::from_secs(5)).unwrap();
        let err = tracker.apply(&update()).unwrap_err();

        assert!(matches!(err, PromoteError::Tracker { .. }));
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn log_tracker_by_default() {
        let tracker =
            tracker_from_config(&TrackerConfig::default(), &HashMap::new(), &OutputMasker::new())
                .unwrap();
        assert_eq!(tracker.name(), "log");
        assert!(tracker.apply(&update()).is_ok());
    }

    #[test]
    fn http_tracker_when_url_configured() {
        let config = TrackerConfig {
            base_url: Some("https://tracker.example.com/api".to_string()),
            ..Default::default()
        };
        let tracker = tracker_from_config(&config, &HashMap::new(), &OutputMasker::new()).unwrap();
        assert_eq!(tracker.name(), "http");
    }

    #[test]
    fn tracker_token_is_masked() {
        let config = TrackerConfig {
            base_url: Some("https://tracker.example.com/api".to_string()),
            ..Default::default()
        };
        let env = HashMap::from([(config.token_env.clone(), "trk_live_5f3a9c".to_string())]);
        let masker = OutputMasker::new();

        tracker_from_config(&config, &env, &masker).unwrap();

        assert_eq!(
            masker.mask("curl -H 'Authorization: Bearer trk_live_5f3a9c'"),
            "curl -H 'Authorization: Bearer [REDACTED]'"
        );
    }
}
