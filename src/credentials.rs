//! Platform credentials read from the environment.

use thiserror::Error;

pub const REDDIT_CLIENT_ID: &str = "REDDIT_CLIENT_ID";
pub const REDDIT_CLIENT_SECRET: &str = "REDDIT_CLIENT_SECRET";
pub const REDDIT_USERNAME: &str = "REDDIT_USERNAME";
pub const REDDIT_PASSWORD: &str = "REDDIT_PASSWORD";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("missing environment variable {var}")]
    Missing { var: &'static str },
}

impl CredentialError {
    /// The shell line that fixes this error.
    pub fn hint(&self) -> String {
        match self {
            Self::Missing { var } => format!("export {var}=''"),
        }
    }
}

/// Credentials for a Reddit "script" application.
#[derive(Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for RedditCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedditCredentials")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl RedditCredentials {
    pub fn from_env() -> Result<Self, CredentialError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Resolve each variable through `lookup`, failing on the first one that is
    /// unset. Empty values count as set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CredentialError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |var: &'static str| lookup(var).ok_or(CredentialError::Missing { var });

        Ok(Self {
            client_id: require(REDDIT_CLIENT_ID)?,
            client_secret: require(REDDIT_CLIENT_SECRET)?,
            username: require(REDDIT_USERNAME)?,
            password: require(REDDIT_PASSWORD)?,
        })
    }
}
