//! Harness configuration
//!
//! Loaded from TOML; every section and field is optional and falls back
//! to the local development defaults. Command-line flags override the
//! file.

use crate::error::{CliError, CliResult};
use crate::journeys::JourneyKind;
use journey_engine::MIN_PASS_FRACTION;
use journey_probe::ProbeConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Harness configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub targets: Targets,
    pub probe: ProbeSettings,
    pub run: RunSettings,
    pub cleanup: CleanupSettings,
    pub fixtures: Fixtures,
}

/// Base URLs of the services under test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Targets {
    /// Backend API
    pub api_url: String,
    /// MPC core service
    pub mpc_url: String,
    /// Blockchain middleware, including its API prefix
    pub blockchain_url: String,
    /// Ethereum JSON-RPC node
    pub rpc_url: String,
    /// Web frontend
    pub frontend_url: String,
}

impl Default for Targets {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3000".into(),
            mpc_url: "http://localhost:8081".into(),
            blockchain_url: "http://localhost:8082/api/v1".into(),
            rpc_url: "http://localhost:8545".into(),
            frontend_url: "http://localhost:3001".into(),
        }
    }
}

/// Availability gate settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    pub enabled: bool,
    pub max_attempts: u32,
    pub interval_secs: u64,
    pub request_timeout_secs: u64,
    /// Also require `{"status": <value>}` in health bodies when set
    pub expect_status: Option<String>,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        let defaults = ProbeConfig::default();
        Self {
            enabled: true,
            max_attempts: defaults.max_attempts,
            interval_secs: defaults.interval.as_secs(),
            request_timeout_secs: defaults.request_timeout.as_secs(),
            expect_status: None,
        }
    }
}

impl ProbeSettings {
    pub fn to_probe_config(&self) -> ProbeConfig {
        ProbeConfig::default()
            .with_max_attempts(self.max_attempts)
            .with_interval(Duration::from_secs(self.interval_secs))
            .with_request_timeout(Duration::from_secs(self.request_timeout_secs.max(1)))
    }
}

/// Journey run settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Journey run when none is named on the command line
    pub journey: JourneyKind,
    /// Per-call timeout for steps that do not set their own
    pub step_timeout_secs: u64,
    /// Overrides the journey's own pass fraction when set
    pub pass_fraction: Option<f64>,
    /// Pause between phases of multi-phase calls
    pub ceremony_pause_ms: u64,
    /// Unit of the pauses between onboarding steps
    pub step_pause_ms: u64,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            journey: JourneyKind::Gateway,
            step_timeout_secs: 10,
            pass_fraction: None,
            ceremony_pause_ms: 1000,
            step_pause_ms: 1000,
        }
    }
}

/// Pretest cleanup settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupSettings {
    pub enabled: bool,
    /// Identity removed before each run
    pub identity: String,
}

impl Default for CleanupSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            identity: "testuser@example.com".into(),
        }
    }
}

/// Fixed request data sent by the journeys
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fixtures {
    /// Identity provider token exchanged at the auth callback
    pub provider_token: String,
    pub provider_user_id: String,
    pub provider_user_name: String,
    pub provider_user_email: String,
    /// Password login used by the gateway journey
    pub username: String,
    pub password: String,
    pub wallet_name: String,
    pub transfer: TransferFixture,
}

impl Default for Fixtures {
    fn default() -> Self {
        Self {
            provider_token: "test_facebook_access_token".into(),
            provider_user_id: "test_fb_user_123".into(),
            provider_user_name: "Test User".into(),
            provider_user_email: "test@example.com".into(),
            username: "test_user".into(),
            password: "test_password".into(),
            wallet_name: "Test Wallet".into(),
            transfer: TransferFixture::default(),
        }
    }
}

/// Transaction signed and broadcast by the journeys
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferFixture {
    pub from_address: String,
    pub to_address: String,
    pub amount: String,
    pub chain: String,
    pub chain_id: String,
    pub gas_limit: String,
    pub gas_price: String,
}

impl Default for TransferFixture {
    fn default() -> Self {
        Self {
            from_address: "0xTestAddress123".into(),
            to_address: "0x742d35Cc6634C0532925a3b8a1888e6a6c7a4b7e".into(),
            amount: "0.001".into(),
            chain: "ethereum".into(),
            chain_id: "1".into(),
            gas_limit: "21000".into(),
            gas_price: "20".into(),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from file
    pub fn load(path: Option<&str>) -> CliResult<Self> {
        let config_path = match path {
            Some(p) => PathBuf::from(p),
            None => Self::default_config_path()?,
        };
        Self::load_from(&config_path)
    }

    fn load_from(path: &Path) -> CliResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: HarnessConfig =
            toml::from_str(&contents).map_err(|e| CliError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> CliResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CliError::Config("Cannot find config directory".into()))?;
        Ok(config_dir.join("journey").join("config.toml"))
    }

    pub fn validate(&self) -> CliResult<()> {
        if let Some(fraction) = self.run.pass_fraction {
            if !(MIN_PASS_FRACTION..=1.0).contains(&fraction) {
                return Err(CliError::Config(format!(
                    "pass_fraction must be within {}..=1.0, got {}",
                    MIN_PASS_FRACTION,
                    fraction
                )));
            }
        }
        if self.cleanup.enabled && self.cleanup.identity.trim().is_empty() {
            return Err(CliError::Config("cleanup.identity must not be empty".into()));
        }
        Ok(())
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.run.step_timeout_secs.max(1))
    }

    pub fn ceremony_pause(&self) -> Duration {
        Duration::from_millis(self.run.ceremony_pause_ms)
    }

    /// `units` multiples of the configured step pause.
    pub fn step_pause(&self, units: u32) -> Duration {
        Duration::from_millis(self.run.step_pause_ms) * units
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = HarnessConfig::default();
        assert_eq!(config.targets.api_url, "http://localhost:3000");
        assert_eq!(config.probe.max_attempts, 30);
        assert_eq!(config.probe.interval_secs, 5);
        assert_eq!(config.run.journey, JourneyKind::Gateway);
        assert!(config.run.pass_fraction.is_none());
    }

    #[test]
    fn test_load_missing_config() {
        let config = HarnessConfig::load(Some("/nonexistent/path/config.toml")).unwrap();
        assert_eq!(config, HarnessConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[targets]\napi_url = \"http://api.test:9000\"\n\n[run]\njourney = \"legacy\"\npass_fraction = 0.75"
        )
        .unwrap();

        let config = HarnessConfig::load(file.path().to_str()).unwrap();
        assert_eq!(config.targets.api_url, "http://api.test:9000");
        assert_eq!(config.targets.mpc_url, "http://localhost:8081");
        assert_eq!(config.run.journey, JourneyKind::Legacy);
        assert_eq!(config.run.pass_fraction, Some(0.75));
        assert_eq!(config.probe.max_attempts, 30);
    }

    #[test]
    fn test_out_of_range_fraction_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[run]\npass_fraction = 2.0").unwrap();
        assert!(matches!(
            HarnessConfig::load(file.path().to_str()),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn test_fraction_below_half_rejected() {
        let mut config = HarnessConfig::default();
        for fraction in [0.0, 0.25, 0.49, f64::NAN] {
            config.run.pass_fraction = Some(fraction);
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("0.5..=1.0"), "{}", err);
        }

        config.run.pass_fraction = Some(0.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_step_pause_scales() {
        let mut config = HarnessConfig::default();
        assert_eq!(config.step_pause(2), Duration::from_secs(2));
        config.run.step_pause_ms = 0;
        assert_eq!(config.step_pause(2), Duration::ZERO);
    }

    #[test]
    fn test_gate_settings_conversion() {
        let settings = ProbeSettings {
            enabled: true,
            max_attempts: 3,
            interval_secs: 0,
            request_timeout_secs: 0,
            expect_status: None,
        };
        let config = settings.to_probe_config();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.interval, Duration::ZERO);
        assert_eq!(config.request_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_roundtrips_through_toml() {
        let config = HarnessConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: HarnessConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
