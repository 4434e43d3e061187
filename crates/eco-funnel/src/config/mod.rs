use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub upstream: UpstreamConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            upstream: UpstreamConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Endpoints and credentials for every external collaborator. Credentials
/// are optional at load time; constructing a collaborator without the ones
/// it needs is the configuration error, so demo and test setups that never
/// touch the network do not require them.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub registry: RegistryConfig,
    pub address: AddressLookupConfig,
    pub intake: IntakeConfig,
    pub council: CouncilConfig,
}

impl UpstreamConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let registry = RegistryConfig {
            base_url: env::var("EPC_BASE_URL")
                .unwrap_or_else(|_| "https://epc.opendatacommunities.org/api/v1/domestic".into()),
            credentials: RegistryCredentials::from_env(),
        };

        let address = AddressLookupConfig {
            base_url: env::var("ADDRESS_API_URL")
                .unwrap_or_else(|_| "https://api.ideal-postcodes.co.uk".into()),
            api_key: non_empty_var("ADDRESS_API_KEY"),
        };

        let timeout_secs = env::var("SUBMIT_TIMEOUT_SECS")
            .unwrap_or_else(|_| "8".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidTimeout)?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        let intake = IntakeConfig {
            webhook_url: non_empty_var("LEAD_WEBHOOK_URL"),
            timeout: Duration::from_secs(timeout_secs),
        };

        let council = CouncilConfig {
            base_url: env::var("COUNCIL_API_URL")
                .unwrap_or_else(|_| "https://mapit.mysociety.org".into()),
        };

        Ok(Self {
            registry,
            address,
            intake,
            council,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Certificate registry endpoint plus auth material.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub base_url: String,
    pub credentials: Option<RegistryCredentials>,
}

/// Registry auth: a preassembled basic-auth header wins over a separate
/// username/password pair.
#[derive(Clone)]
pub enum RegistryCredentials {
    BasicToken(String),
    UserPassword { username: String, password: String },
}

impl RegistryCredentials {
    fn from_env() -> Option<Self> {
        if let Some(token) = non_empty_var("EPC_AUTH_BASIC") {
            return Some(Self::BasicToken(token));
        }
        match (non_empty_var("EPC_USERNAME"), non_empty_var("EPC_PASSWORD")) {
            (Some(username), Some(password)) => Some(Self::UserPassword { username, password }),
            _ => None,
        }
    }
}

impl fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryCredentials::BasicToken(_) => f.write_str("BasicToken(<redacted>)"),
            RegistryCredentials::UserPassword { .. } => f.write_str("UserPassword(<redacted>)"),
        }
    }
}

/// Address search endpoint; the key is mandatory only when the HTTP
/// implementation is constructed.
#[derive(Clone)]
pub struct AddressLookupConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl fmt::Debug for AddressLookupConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressLookupConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Lead intake webhook plus the hard submission timeout.
#[derive(Debug, Clone)]
pub struct IntakeConfig {
    pub webhook_url: Option<String>,
    pub timeout: Duration,
}

/// Council/boundary enrichment endpoint (no credentials required).
#[derive(Debug, Clone)]
pub struct CouncilConfig {
    pub base_url: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidTimeout,
    MissingRegistryCredentials,
    MissingAddressApiKey,
    MissingWebhookUrl,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidTimeout => {
                write!(f, "SUBMIT_TIMEOUT_SECS must be a positive integer")
            }
            ConfigError::MissingRegistryCredentials => {
                write!(
                    f,
                    "EPC_AUTH_BASIC or EPC_USERNAME/EPC_PASSWORD must be set for registry access"
                )
            }
            ConfigError::MissingAddressApiKey => {
                write!(f, "ADDRESS_API_KEY must be set for address lookups")
            }
            ConfigError::MissingWebhookUrl => {
                write!(f, "LEAD_WEBHOOK_URL must be set for lead submission")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
