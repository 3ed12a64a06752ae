//! Builder pattern for client configuration.
//!
//! Provides a fluent API for configuring and creating [`AgentClient`] instances.
//!
//! # Example
//!
//! ```no_run
//! use agent_link::AgentClient;
//!
//! # fn example() -> agent_link::Result<()> {
//! let client = AgentClient::builder()
//!     .endpoint("wss://control.example.com")
//!     .api_key("secret")
//!     .agent("build-box")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::AgentId;
use crate::session::{DEFAULT_CHUNK_SIZE, DEFAULT_REQUEST_TIMEOUT};
use crate::transport::{DEFAULT_CONNECT_TIMEOUT, redact};

use super::core::AgentClient;

// ============================================================================
// ClientConfig
// ============================================================================

/// Validated client configuration.
#[derive(Clone)]
pub(crate) struct ClientConfig {
    /// Full socket URL including credentials.
    pub url: Url,
    /// Agent name.
    pub agent: String,
    /// Optional agent id.
    pub agent_id: Option<AgentId>,
    /// Deadline for opening the socket.
    pub connect_timeout: Duration,
    /// Default deadline for file requests.
    pub request_timeout: Option<Duration>,
    /// Transfer chunk size.
    pub chunk_size: usize,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("url", &redact(&self.url))
            .field("agent", &self.agent)
            .field("agent_id", &self.agent_id)
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

// ============================================================================
// AgentClientBuilder
// ============================================================================

/// Builder for configuring an [`AgentClient`] instance.
///
/// Use [`AgentClient::builder()`] to create a new builder.
#[derive(Clone)]
pub struct AgentClientBuilder {
    /// Base URL of the control server.
    endpoint: Option<String>,
    /// API key sent as a query parameter.
    api_key: Option<String>,
    /// Agent name.
    agent: Option<String>,
    /// Optional agent id.
    agent_id: Option<AgentId>,
    /// Deadline for opening the socket.
    connect_timeout: Duration,
    /// Default deadline for file requests.
    request_timeout: Option<Duration>,
    /// Transfer chunk size.
    chunk_size: usize,
}

impl Default for AgentClientBuilder {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            agent: None,
            agent_id: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl fmt::Debug for AgentClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentClientBuilder")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("agent", &self.agent)
            .field("agent_id", &self.agent_id)
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

// ============================================================================
// AgentClientBuilder Implementation
// ============================================================================

impl AgentClientBuilder {
    /// Creates a new builder with default timeouts and chunk size.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the control server base URL.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - `ws://` or `wss://` URL (e.g., "wss://control.example.com")
    #[inline]
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the API key.
    #[inline]
    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the agent name.
    #[inline]
    #[must_use]
    pub fn agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    /// Sets the agent id.
    #[inline]
    #[must_use]
    pub fn agent_id(mut self, agent_id: impl Into<AgentId>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    /// Sets the deadline for opening the socket.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the default deadline for file requests.
    ///
    /// `None` waits until a reply arrives or the socket closes.
    #[inline]
    #[must_use]
    pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the transfer chunk size in bytes.
    #[inline]
    #[must_use]
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Builds the client with validation.
    ///
    /// Nothing is opened until [`AgentClient::connect`] is called.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if endpoint, API key or agent is not set
    /// - [`Error::Config`] if the endpoint is not a `ws`/`wss` URL
    /// - [`Error::Config`] if the chunk size or a timeout is zero
    pub fn build(self) -> Result<AgentClient> {
        let config = self.validate()?;
        Ok(AgentClient::new(config))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl AgentClientBuilder {
    fn validate(&self) -> Result<ClientConfig> {
        let agent = self.validate_agent()?;
        let url = self.socket_url(&agent)?;

        if self.chunk_size == 0 {
            return Err(Error::config("Chunk size must be greater than zero."));
        }

        if self.connect_timeout.is_zero() || self.request_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::config(
                "Timeouts must be greater than zero. Use .request_timeout(None) to wait forever.",
            ));
        }

        Ok(ClientConfig {
            url,
            agent,
            agent_id: self.agent_id,
            connect_timeout: self.connect_timeout,
            request_timeout: self.request_timeout,
            chunk_size: self.chunk_size,
        })
    }

    fn validate_agent(&self) -> Result<String> {
        match self.agent.as_deref() {
            Some(agent) if !agent.is_empty() => Ok(agent.to_string()),
            _ => Err(Error::config(
                "Agent name is required. Use .agent() to set it.\n\
                 Example: AgentClient::builder().agent(\"build-box\")",
            )),
        }
    }

    /// Builds `<endpoint>/api/agent/<agent>/omni/?api_key=..[&agent_id=..]`.
    fn socket_url(&self, agent: &str) -> Result<Url> {
        let endpoint = self.endpoint.as_deref().ok_or_else(|| {
            Error::config(
                "Endpoint is required. Use .endpoint() to set it.\n\
                 Example: AgentClient::builder().endpoint(\"wss://control.example.com\")",
            )
        })?;

        let api_key = self.api_key.as_deref().ok_or_else(|| {
            Error::config("API key is required. Use .api_key() to set it.")
        })?;

        let mut url = Url::parse(endpoint)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::config(format!(
                "Endpoint must use ws:// or wss://, got {}://",
                url.scheme()
            )));
        }

        url.path_segments_mut()
            .map_err(|()| Error::config(format!("Endpoint cannot be a base URL: {endpoint}")))?
            .pop_if_empty()
            .extend(["api", "agent", agent, "omni", ""]);

        url.set_query(None);
        url.set_fragment(None);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("api_key", api_key);
            if let Some(agent_id) = self.agent_id {
                query.append_pair("agent_id", &agent_id.to_string());
            }
        }

        Ok(url)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> AgentClientBuilder {
        AgentClientBuilder::new()
            .endpoint("wss://control.example.com")
            .api_key("k3y")
            .agent("build-box")
    }

    #[test]
    fn test_new_has_defaults() {
        let builder = AgentClientBuilder::new();
        assert!(builder.endpoint.is_none());
        assert!(builder.api_key.is_none());
        assert_eq!(builder.connect_timeout, Duration::from_secs(30));
        assert_eq!(builder.request_timeout, Some(Duration::from_secs(30)));
        assert_eq!(builder.chunk_size, 40960);
    }

    #[test]
    fn test_socket_url_format() {
        let config = complete().validate().unwrap();
        assert_eq!(
            config.url.as_str(),
            "wss://control.example.com/api/agent/build-box/omni/?api_key=k3y"
        );
    }

    #[test]
    fn test_socket_url_with_agent_id_and_base_path() {
        let config = complete()
            .endpoint("ws://localhost:8080/base/")
            .agent_id(42u64)
            .validate()
            .unwrap();
        assert_eq!(
            config.url.as_str(),
            "ws://localhost:8080/base/api/agent/build-box/omni/?api_key=k3y&agent_id=42"
        );
        assert_eq!(config.agent_id, Some(AgentId::new(42)));
    }

    #[test]
    fn test_socket_url_encodes_values() {
        let config = complete()
            .agent("my agent")
            .api_key("a&b=c")
            .validate()
            .unwrap();
        assert!(config.url.path().contains("/my%20agent/"));
        assert_eq!(config.url.query(), Some("api_key=a%26b%3Dc"));
    }

    #[test]
    fn test_build_fails_without_endpoint() {
        let err = AgentClientBuilder::new()
            .api_key("k")
            .agent("a")
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("Endpoint"));
    }

    #[test]
    fn test_build_fails_without_api_key() {
        let err = AgentClientBuilder::new()
            .endpoint("ws://h")
            .agent("a")
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("API key"));
    }

    #[test]
    fn test_build_fails_without_agent() {
        let err = complete().agent("").validate().unwrap_err();
        assert!(err.to_string().contains("Agent name"));
    }

    #[test]
    fn test_build_rejects_http_scheme() {
        let err = complete()
            .endpoint("https://control.example.com")
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_build_rejects_unparsable_endpoint() {
        let err = complete().endpoint("not a url").validate().unwrap_err();
        assert!(matches!(err, Error::Url(_)));
    }

    #[test]
    fn test_build_rejects_zero_values() {
        assert!(complete().chunk_size(0).validate().is_err());
        assert!(complete().connect_timeout(Duration::ZERO).validate().is_err());
        assert!(complete()
            .request_timeout(Some(Duration::ZERO))
            .validate()
            .is_err());
        assert!(complete().request_timeout(None).validate().is_ok());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let debug = format!("{:?}", complete());
        assert!(!debug.contains("k3y"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_config_debug_strips_query() {
        let config = complete().agent_id(9u64).validate().unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("k3y"));
        assert!(debug.contains("wss://control.example.com/api/agent/build-box/omni/"));
        assert!(debug.contains("build-box"));
    }
}
