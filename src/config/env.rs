//! Process environment read once at startup.
//!
//! - `GATEWAY_API_SECRET`: bearer secret for routes with `require_auth`
//! - `GATEWAY_ENV`: `production` or `development`; unset means production

use std::sync::Arc;

pub const SECRET_VAR: &str = "GATEWAY_API_SECRET";
pub const ENV_VAR: &str = "GATEWAY_ENV";

/// Whether internal error detail may be echoed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeMode {
    #[default]
    Production,
    Development,
}

impl RuntimeMode {
    pub fn is_production(self) -> bool {
        self == RuntimeMode::Production
    }

    fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()) {
            Some(v) if v == "development" || v == "dev" || v == "test" => RuntimeMode::Development,
            _ => RuntimeMode::Production,
        }
    }
}

/// Secret and mode shared by every gateway in the process.
#[derive(Clone, Default)]
pub struct RuntimeEnv {
    auth_secret: Option<Arc<str>>,
    mode: RuntimeMode,
}

impl RuntimeEnv {
    pub fn new(auth_secret: Option<&str>, mode: RuntimeMode) -> Self {
        Self {
            auth_secret: auth_secret.filter(|s| !s.is_empty()).map(Arc::from),
            mode,
        }
    }

    /// Read `GATEWAY_API_SECRET` and `GATEWAY_ENV`.
    pub fn from_env() -> Self {
        let secret = std::env::var(SECRET_VAR).ok();
        let mode = RuntimeMode::parse(std::env::var(ENV_VAR).ok().as_deref());
        Self::new(secret.as_deref(), mode)
    }

    pub fn auth_secret(&self) -> Option<Arc<str>> {
        self.auth_secret.clone()
    }

    pub fn mode(&self) -> RuntimeMode {
        self.mode
    }
}

impl std::fmt::Debug for RuntimeEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeEnv")
            .field("auth_secret", &self.auth_secret.as_ref().map(|_| "<redacted>"))
            .field("mode", &self.mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!(RuntimeMode::parse(None), RuntimeMode::Production);
        assert_eq!(RuntimeMode::parse(Some("production")), RuntimeMode::Production);
        assert_eq!(RuntimeMode::parse(Some(" Development ")), RuntimeMode::Development);
        assert_eq!(RuntimeMode::parse(Some("garbage")), RuntimeMode::Production);
    }

    #[test]
    fn test_empty_secret_is_none() {
        let env = RuntimeEnv::new(Some(""), RuntimeMode::Development);
        assert!(env.auth_secret().is_none());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let env = RuntimeEnv::new(Some("hunter2"), RuntimeMode::Production);
        let printed = format!("{env:?}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("<redacted>"));
    }
}
