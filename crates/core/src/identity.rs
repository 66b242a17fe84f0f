use serde::{Deserialize, Serialize};

/// Ambient caller data attached to one intercepted data-layer call.
///
/// Every field is optional: system-initiated calls carry no user and no
/// transport metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    user_id: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
}

impl CallerIdentity {
    /// Creates an identity for a system-initiated call.
    #[must_use]
    pub fn system() -> Self {
        Self::default()
    }

    /// Creates an identity for a user-initiated call.
    #[must_use]
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ip_address: None,
            user_agent: None,
        }
    }

    /// Attaches the caller's source IP address.
    #[must_use]
    pub fn with_ip_address(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }

    /// Attaches the caller's user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Returns the user identifier, if the call was user-initiated.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Returns the source IP address, if the transport supplied one.
    #[must_use]
    pub fn ip_address(&self) -> Option<&str> {
        self.ip_address.as_deref()
    }

    /// Returns the user agent, if the transport supplied one.
    #[must_use]
    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }
}
