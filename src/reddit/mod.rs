//! Reddit content source over the OAuth JSON API.

mod listing;

use std::time::{Duration, Instant};

use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::RedditConfig;
use crate::credentials::RedditCredentials;
use crate::harvest::source::Result;
use crate::harvest::{ContentSource, SourceError, Thread};
use listing::{CommentArena, Listing, MoreChildrenResponse};

const AUTH_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_BASE: &str = "https://oauth.reddit.com";

/// Ids accepted by one `/api/morechildren` call.
const MORE_CHILDREN_BATCH: usize = 100;

/// Refresh the token this long before Reddit says it expires.
const TOKEN_SLACK: Duration = Duration::from_secs(60);

struct AccessToken {
    value: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
}

/// Reddit API client authenticated as a script application.
pub struct RedditClient {
    http: reqwest::Client,
    credentials: RedditCredentials,
    max_more_requests: usize,
    token: Mutex<Option<AccessToken>>,
}

impl RedditClient {
    pub fn new(credentials: RedditCredentials, config: &RedditConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            credentials,
            max_more_requests: config.max_more_requests,
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String> {
        let mut token = self.token.lock().await;
        if let Some(ref t) = *token
            && Instant::now() + TOKEN_SLACK < t.expires_at
        {
            return Ok(t.value.clone());
        }

        debug!("Requesting Reddit access token for {}", self.credentials.username);
        let resp = self
            .http
            .post(AUTH_URL)
            .basic_auth(&self.credentials.client_id, Some(&self.credentials.client_secret))
            .form(&[
                ("grant_type", "password"),
                ("username", self.credentials.username.as_str()),
                ("password", self.credentials.password.as_str()),
            ])
            .send()
            .await?;

        let body: TokenResponse = check_status(resp).await?.json().await?;

        // Bad passwords come back as 200 with an error field.
        if let Some(err) = body.error {
            return Err(SourceError::Auth(err));
        }
        let value = body
            .access_token
            .ok_or_else(|| SourceError::Auth("token response had no access_token".into()))?;
        let expires_in = Duration::from_secs(body.expires_in.unwrap_or(3600));

        info!("🔑 Authenticated with Reddit as {}", self.credentials.username);
        *token = Some(AccessToken {
            value: value.clone(),
            expires_at: Instant::now() + expires_in,
        });
        Ok(value)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let token = self.access_token().await?;
        let resp = self
            .http
            .get(format!("{API_BASE}{path}"))
            .bearer_auth(token)
            .query(&[("raw_json", "1")])
            .query(query)
            .send()
            .await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            // Force a fresh token on the next request.
            self.token.lock().await.take();
        }

        Ok(check_status(resp).await?.json().await?)
    }

    async fn more_children(&self, link_fullname: &str, ids: &[String]) -> Result<MoreChildrenResponse> {
        let children = ids.join(",");
        self.get_json(
            "/api/morechildren",
            &[("api_type", "json"), ("link_id", link_fullname), ("children", children.as_str())],
        )
        .await
    }
}

impl ContentSource for RedditClient {
    async fn list_threads(&self, topic: &str, limit: usize) -> Result<Vec<Thread>> {
        let limit = limit.to_string();
        let listing: Listing = self
            .get_json(&format!("/r/{topic}/hot"), &[("limit", limit.as_str())])
            .await?;
        Ok(listing.into_threads())
    }

    async fn expand_all_replies(&self, thread: &mut Thread) -> Result<()> {
        let (_, comments): (Listing, Listing) = self.get_json(&format!("/comments/{}", thread.id), &[]).await?;

        let mut arena = CommentArena::new(&thread.id);
        arena.extend(comments.data.children);

        let mut requests = 0;
        'expand: loop {
            let pending = arena.take_pending();
            if pending.is_empty() {
                break;
            }

            for more in pending {
                debug!("Loading {} more replies under {}", more.children.len(), more.parent_id);
                for batch in more.children.chunks(MORE_CHILDREN_BATCH) {
                    if requests >= self.max_more_requests {
                        warn!(
                            "Stopped expanding thread {} after {} requests; some replies are missing",
                            thread.id, requests
                        );
                        break 'expand;
                    }
                    requests += 1;

                    let resp = self.more_children(arena.link_fullname(), batch).await?;
                    if !resp.json.errors.is_empty() {
                        return Err(SourceError::Platform(format!(
                            "morechildren failed: {:?}",
                            resp.json.errors
                        )));
                    }
                    if let Some(data) = resp.json.data {
                        arena.extend(data.things);
                    }
                }
            }
        }

        debug!("Thread {} expanded to {} comments with {} extra requests", thread.id, arena.len(), requests);
        thread.comments = arena.into_comments();
        Ok(())
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let retry_after = resp
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = resp.text().await.unwrap_or_default();
    Err(classify_status(status, body, retry_after))
}

fn classify_status(status: StatusCode, message: String, retry_after: Option<Duration>) -> SourceError {
    match status.as_u16() {
        401 | 403 => SourceError::Auth(format!("{status}: {message}")),
        429 => SourceError::RateLimited { retry_after },
        code @ 400..=499 => SourceError::Client { status: code, message },
        _ => SourceError::Platform(format!("{status}: {message}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, String::new(), None),
            SourceError::Auth(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, "private".into(), None),
            SourceError::Auth(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, String::new(), Some(Duration::from_secs(7))),
            SourceError::RateLimited { retry_after: Some(d) } if d == Duration::from_secs(7)
        ));
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, "no such sub".into(), None),
            SourceError::Client { status: 404, .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, String::new(), None),
            SourceError::Platform(_)
        ));
    }

    #[test]
    fn test_client_builds_from_config() {
        let creds = RedditCredentials {
            client_id: "id".into(),
            client_secret: "secret".into(),
            username: "user".into(),
            password: "pw".into(),
        };
        assert!(RedditClient::new(creds, &RedditConfig::default()).is_ok());
    }
}
