use std::ops::Deref;
use std::time::Duration;

use ureq::{Agent, AgentBuilder};

mod username;
pub use username::{LookupError, UsernameLookup, UsernameResponse};

/// Re-export `ureq::Error` for simplicity.
pub type Error = ureq::Error;

/// Default timeout that we use on client types.
pub(crate) fn default_timeout() -> Duration {
    Duration::from_millis(5000)
}

/// A wrapper type that simply dereferences to a `ureq::Agent`, along with the
/// base URL that requests get issued against.
///
/// Anything that can be called on a `ureq::Agent` can be called on
/// this type. You can also clone this with little cost, and pass it freely
/// to other threads, as it manages itself under the hood with `Arc`.
#[derive(Clone, Debug)]
pub struct APIClient {
    agent: Agent,
    base_url: String,
}

impl APIClient {
    /// Creates and initializes a new APIClient.
    ///
    /// `base_url` should not have a trailing slash; one is stripped if present.
    pub fn new(base_url: &str, app_version: &str) -> Self {
        // The site is informally rate limited, so there's no reason to keep
        // a large idle pool around.
        let agent = AgentBuilder::new()
            .max_idle_connections(2)
            .timeout(default_timeout())
            .user_agent(&format!("AWBWReplayCore/{} (Rust)", app_version))
            .build();

        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// The base URL this client was configured with.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Joins `path` onto the configured base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl Deref for APIClient {
    type Target = Agent;

    fn deref(&self) -> &Self::Target {
        &self.agent
    }
}
