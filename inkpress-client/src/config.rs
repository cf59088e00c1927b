//! Client configuration

/// Which platform deployment the client talks to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    /// Production. Orders placed here are printed and charged.
    #[default]
    Live,
    /// Sandbox for integration work. Accepts test payment tokens and
    /// prints nothing.
    Sandbox,
}

impl Environment {
    pub fn endpoint(&self) -> &'static str {
        match self {
            Environment::Live => "https://api.inkpress.io/v4.0",
            Environment::Sandbox => "https://api.sandbox.inkpress.io/v4.0",
        }
    }
}

/// Configuration for [`PrintClient`](crate::client::PrintClient)
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API key from the platform dashboard. Live and sandbox use
    /// separate keys.
    pub api_key: String,
    pub environment: Environment,
    /// Overrides the environment's endpoint, for tests and staging
    pub endpoint_override: Option<String>,
    /// Request timeout in seconds
    pub timeout: u64,
    /// BCP 47 locale forwarded with each order, e.g. `en_GB`
    pub locale: String,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        ClientConfig {
            api_key: api_key.into(),
            environment: Environment::default(),
            endpoint_override: None,
            timeout: 30,
            locale: "en_US".to_string(),
        }
    }

    pub fn sandbox(api_key: impl Into<String>) -> Self {
        ClientConfig::new(api_key).with_environment(Environment::Sandbox)
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint_override = Some(endpoint.into());
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds;
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    /// The endpoint requests actually go to
    pub fn endpoint(&self) -> &str {
        self.endpoint_override
            .as_deref()
            .unwrap_or_else(|| self.environment.endpoint())
    }
}
