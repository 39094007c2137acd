//! Configuration model for fleetdeploy.
//!
//! Configuration is layered, lowest precedence first:
//!
//! 1. built-in defaults (interval 15 s, abort on failure, region `us-east-1`)
//! 2. `FLEET_*` environment variables (credentials and endpoint)
//! 3. the `[options]` table of `fleetdeploy.toml`
//! 4. the selected `[targets.<name>]` table
//! 5. explicit CLI flags
//!
//! Each layer overrides the one below field-by-field; the nested credentials
//! object is merged key-by-key so a target can override just the region while
//! inheriting the shared keys. Validation runs on the fully merged value and
//! fails before any network call is attempted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::client::DeploymentRequest;
use crate::errors::ConfigError;

/// Wait between the completion of one status fetch and the start of the next.
pub const DEFAULT_CHECK_INTERVAL_MS: u64 = 15_000;

/// Region used when neither config nor environment names one.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "fleetdeploy.toml";

/// Validated control-plane credentials.
///
/// Opaque to the orchestrator; handed to the client at construction and never
/// touched again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
}

/// Credentials as they appear in config files: every field optional so layers
/// can each contribute a subset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCredentials {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub region: Option<String>,
}

impl RawCredentials {
    /// Key-by-key merge: fields present on `self` win over `base`.
    fn merged_over(&self, base: &RawCredentials) -> RawCredentials {
        RawCredentials {
            access_key_id: self.access_key_id.clone().or_else(|| base.access_key_id.clone()),
            secret_access_key: self
                .secret_access_key
                .clone()
                .or_else(|| base.secret_access_key.clone()),
            region: self.region.clone().or_else(|| base.region.clone()),
        }
    }
}

/// One deploy target as declared in `fleetdeploy.toml` (or assembled from CLI
/// flags). Every field optional; [`RawTarget::resolve`] enforces requiredness
/// after merging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTarget {
    pub stack_id: Option<String>,
    pub app_id: Option<String>,
    /// Deployment command to execute (e.g. "deploy" or "setup").
    pub command: Option<String>,
    /// Optional command arguments, keyed by argument name.
    pub args: Option<BTreeMap<String, Vec<String>>>,
    pub credentials: Option<RawCredentials>,
    /// Control-plane endpoint override.
    pub endpoint: Option<String>,
    /// Milliseconds between status checks.
    pub check_interval_ms: Option<u64>,
    /// Fail the run when the deployment finishes unsuccessfully (default true).
    pub abort_on_failed_deployment: Option<bool>,
    /// Optional overall deadline for the whole run, in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl RawTarget {
    /// Shallow field-by-field merge, `self` winning; credentials merged key-by-key.
    pub fn merged_over(&self, base: &RawTarget) -> RawTarget {
        let credentials = match (&self.credentials, &base.credentials) {
            (Some(ours), Some(theirs)) => Some(ours.merged_over(theirs)),
            (Some(ours), None) => Some(ours.clone()),
            (None, Some(theirs)) => Some(theirs.clone()),
            (None, None) => None,
        };
        RawTarget {
            stack_id: self.stack_id.clone().or_else(|| base.stack_id.clone()),
            app_id: self.app_id.clone().or_else(|| base.app_id.clone()),
            command: self.command.clone().or_else(|| base.command.clone()),
            args: self.args.clone().or_else(|| base.args.clone()),
            credentials,
            endpoint: self.endpoint.clone().or_else(|| base.endpoint.clone()),
            check_interval_ms: self.check_interval_ms.or(base.check_interval_ms),
            abort_on_failed_deployment: self
                .abort_on_failed_deployment
                .or(base.abort_on_failed_deployment),
            timeout_ms: self.timeout_ms.or(base.timeout_ms),
        }
    }

    /// Layer holding `FLEET_ACCESS_KEY_ID`, `FLEET_SECRET_ACCESS_KEY`,
    /// `FLEET_REGION`, and `FLEET_ENDPOINT` from the process environment.
    pub fn from_env() -> RawTarget {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Same as [`RawTarget::from_env`] with an injectable lookup for tests.
    pub fn from_env_with(lookup: impl Fn(&str) -> Option<String>) -> RawTarget {
        let credentials = RawCredentials {
            access_key_id: lookup("FLEET_ACCESS_KEY_ID"),
            secret_access_key: lookup("FLEET_SECRET_ACCESS_KEY"),
            region: lookup("FLEET_REGION"),
        };
        RawTarget {
            credentials: (credentials != RawCredentials::default()).then_some(credentials),
            endpoint: lookup("FLEET_ENDPOINT"),
            ..RawTarget::default()
        }
    }

    /// Validate the merged target and produce the non-optional configuration.
    ///
    /// Collects every violation so one round trip reports all missing fields.
    pub fn resolve(&self) -> Result<ResolvedTarget, ConfigError> {
        let mut missing = Vec::new();

        let present = |value: &Option<String>| {
            value.as_deref().is_some_and(|s| !s.trim().is_empty())
        };

        match &self.credentials {
            None => missing.push("credentials".to_string()),
            Some(creds) => {
                if !present(&creds.access_key_id) {
                    missing.push("credentials.access_key_id".to_string());
                }
                if !present(&creds.secret_access_key) {
                    missing.push("credentials.secret_access_key".to_string());
                }
            }
        }
        if !present(&self.command) {
            missing.push("command".to_string());
        }
        if !present(&self.stack_id) {
            missing.push("stack_id".to_string());
        }
        if !present(&self.app_id) {
            missing.push("app_id".to_string());
        }

        if !missing.is_empty() {
            return Err(ConfigError::MissingFields { fields: missing });
        }

        let creds = self.credentials.as_ref().expect("validated above");
        let credentials = Credentials {
            access_key_id: creds.access_key_id.clone().expect("validated above"),
            secret_access_key: creds.secret_access_key.clone().expect("validated above"),
            region: creds.region.clone().unwrap_or_else(|| DEFAULT_REGION.to_string()),
        };

        Ok(ResolvedTarget {
            request: DeploymentRequest {
                stack_id: self.stack_id.clone().expect("validated above"),
                app_id: self.app_id.clone().expect("validated above"),
                command: self.command.clone().expect("validated above"),
                args: self.args.clone(),
            },
            credentials,
            endpoint: self.endpoint.clone(),
            orchestrator: OrchestratorConfig {
                check_interval: Duration::from_millis(
                    self.check_interval_ms.unwrap_or(DEFAULT_CHECK_INTERVAL_MS),
                ),
                abort_on_failure: self.abort_on_failed_deployment.unwrap_or(true),
                overall_timeout: self.timeout_ms.map(Duration::from_millis),
            },
        })
    }
}

/// Timing and failure-handling knobs for the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Fixed wait between one status fetch completing and the next starting.
    pub check_interval: Duration,
    /// When true, a non-successful terminal status fails the run.
    pub abort_on_failure: bool,
    /// Optional overall deadline for the run. Off by default; the original
    /// tool polled indefinitely.
    pub overall_timeout: Option<Duration>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_millis(DEFAULT_CHECK_INTERVAL_MS),
            abort_on_failure: true,
            overall_timeout: None,
        }
    }
}

/// Fully merged and validated configuration for one deployment run.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    pub request: DeploymentRequest,
    pub credentials: Credentials,
    pub endpoint: Option<String>,
    pub orchestrator: OrchestratorConfig,
}

/// The `fleetdeploy.toml` file: shared `[options]` plus named `[targets.*]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeployToml {
    #[serde(default)]
    pub options: RawTarget,
    #[serde(default)]
    pub targets: BTreeMap<String, RawTarget>,
}

impl DeployToml {
    /// Parse from TOML text.
    pub fn parse(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::ParseFailed {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Load from a file path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Load from `path`, or fall back to an empty config when the default
    /// file is simply absent. An explicitly named file must exist.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default = Path::new(CONFIG_FILE_NAME);
                if default.exists() {
                    Self::load(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Merge a named target (or just `[options]` when `name` is `None`) over
    /// the options, environment, and built-in default layers.
    pub fn merged_target(
        &self,
        name: Option<&str>,
        env: &RawTarget,
    ) -> Result<RawTarget, ConfigError> {
        let base = self.options.merged_over(env);
        match name {
            None => Ok(base),
            Some(name) => {
                let target = self.targets.get(name).ok_or_else(|| ConfigError::InvalidField {
                    field: "target".to_string(),
                    message: format!(
                        "no target named \"{}\" (available: {})",
                        name,
                        self.target_names().join(", ")
                    ),
                })?;
                Ok(target.merged_over(&base))
            }
        }
    }

    /// Names of all declared targets, sorted.
    pub fn target_names(&self) -> Vec<String> {
        self.targets.keys().cloned().collect()
    }
}
