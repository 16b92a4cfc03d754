use awbw_integrations::Log;

use super::APIClient;

/// Various errors that can happen during a username lookup.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error(transparent)]
    Request(ureq::Error),

    #[error(transparent)]
    IO(std::io::Error),

    #[error("Invalid username response: {0}")]
    InvalidResponse(serde_json::Error),
}

/// The payload the site returns for a username request. A missing or `null`
/// username means the site doesn't know the user.
#[derive(Debug, Default, serde::Deserialize)]
pub struct UsernameResponse {
    #[serde(default)]
    pub username: Option<String>,
}

/// Resolves external user ids to display names.
///
/// This is a trait so that the catalog can be driven by something other than the
/// network in tests, or by a host application that already has its own client.
pub trait UsernameLookup: Send + Sync {
    /// Returns `Ok(None)` when the service answered but has no name for `user_id`.
    fn lookup_username(&self, user_id: i64) -> Result<Option<String>, LookupError>;
}

impl UsernameLookup for APIClient {
    fn lookup_username(&self, user_id: i64) -> Result<Option<String>, LookupError> {
        let url = self.url("api/player/username");

        tracing::info!(target: Log::Api, ?user_id, "Fetching username");

        let response = match self.get(&url).query("user_id", &user_id.to_string()).call() {
            Ok(response) => response,

            // The site answers unknown ids with a 404; that's a "not found", not a failure.
            Err(ureq::Error::Status(404, _)) => return Ok(None),

            Err(error) => return Err(LookupError::Request(error)),
        };

        let body = response.into_string().map_err(LookupError::IO)?;
        let payload = parse_username_response(&body)?;

        Ok(payload.username.filter(|name| !name.trim().is_empty()))
    }
}

/// Split out so the response handling can be exercised without a network.
pub(crate) fn parse_username_response(body: &str) -> Result<UsernameResponse, LookupError> {
    serde_json::from_str(body).map_err(|error| {
        tracing::error!(target: Log::Api, ?error, "Failed to deserialize username response");
        LookupError::InvalidResponse(error)
    })
}
