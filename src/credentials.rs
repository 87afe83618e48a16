//! Credential sources
//!
//! The chat socket authenticates each request with an opaque token placed in
//! the outbound frame. Where the token comes from is up to the embedding
//! application; it is read at send time and never cached here.

/// Synchronous provider of the outbound request token
pub trait CredentialSource: Send + Sync {
    /// Current token, `None` (or empty) when unavailable
    fn credential(&self) -> Option<String>;
}

/// A fixed token
#[derive(Debug, Clone)]
pub struct StaticCredential(String);

impl StaticCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl CredentialSource for StaticCredential {
    fn credential(&self) -> Option<String> {
        non_empty(self.0.clone())
    }
}

/// Token read from an environment variable on every call, so rotation is
/// picked up without restarting
#[derive(Debug, Clone)]
pub struct EnvCredential {
    var: String,
}

impl EnvCredential {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvCredential {
    fn default() -> Self {
        Self::new("CHAT_TOKEN")
    }
}

impl CredentialSource for EnvCredential {
    fn credential(&self) -> Option<String> {
        std::env::var(&self.var).ok().and_then(non_empty)
    }
}

impl<F> CredentialSource for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn credential(&self) -> Option<String> {
        (self)().and_then(non_empty)
    }
}

fn non_empty(token: String) -> Option<String> {
    if token.trim().is_empty() {
        None
    } else {
        Some(token)
    }
}
