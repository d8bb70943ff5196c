use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::llm::{DEFAULT_ENDPOINT, DEFAULT_MODEL, DEFAULT_TOKEN_ENV};
use crate::probe::{DEFAULT_MAX_OUTPUT_BYTES, ProbeSpec};
use crate::summarizer::PromptProfile;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub llm: LlmConfig,
    pub probes: ProbesConfig,
    pub scan: ScanConfig,
    pub bruteforce: BruteForceConfig,
    pub profiles: ProfilesConfig,
    pub reports: ReportsConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the API token
    pub token_env: String,
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            token_env: DEFAULT_TOKEN_ENV.to_string(),
            timeout_ms: 120000,
        }
    }
}

/// Cluster inspection probes, run together for every snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbesConfig {
    pub max_output_bytes: usize,
    pub cluster: Vec<ProbeSpec>,
}

impl Default for ProbesConfig {
    fn default() -> Self {
        let selector = "app=juice-shop";
        Self {
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            cluster: vec![
                ProbeSpec::new("pod-status", ["kubectl", "get", "pods", "-l", selector, "-o", "wide"])
                    .title("Pod Status"),
                ProbeSpec::new("pod-details", ["kubectl", "describe", "pods", "-l", selector]).title("Pod Details"),
                ProbeSpec::new("recent-logs", ["kubectl", "logs", "-l", selector, "--tail=20"]).title("Recent Logs"),
            ],
        }
    }
}

/// Host directory shared with the security tool containers
fn shared_dir(name: &str) -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(name)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub probe: ProbeSpec,
    /// Where the scanner's JSON report lands on the host
    pub report_path: PathBuf,
    pub max_findings: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        let mount = shared_dir("zap");
        Self {
            probe: ProbeSpec::new(
                "zap-baseline",
                [
                    "docker".to_string(),
                    "run".to_string(),
                    "--rm".to_string(),
                    "--init".to_string(),
                    "--network".to_string(),
                    "host".to_string(),
                    "-v".to_string(),
                    format!("{}:/zap/wrk/:rw", mount.display()),
                    "ghcr.io/zaproxy/zaproxy:stable".to_string(),
                    "zap-baseline.py".to_string(),
                    "-t".to_string(),
                    "http://localhost:3000".to_string(),
                    "-J".to_string(),
                    "zap-report.json".to_string(),
                ],
            )
            .title("Vulnerability Scan")
            .timeout_ms(600000),
            report_path: mount.join("zap-report.json"),
            max_findings: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BruteForceConfig {
    pub probe: ProbeSpec,
}

impl Default for BruteForceConfig {
    fn default() -> Self {
        let wordlists = shared_dir("wordlists");
        Self {
            probe: ProbeSpec::new(
                "hydra",
                [
                    "docker".to_string(),
                    "run".to_string(),
                    "--rm".to_string(),
                    "--init".to_string(),
                    "--network".to_string(),
                    "host".to_string(),
                    "-v".to_string(),
                    format!("{}:/wordlists:ro", wordlists.display()),
                    "vanhauser/hydra".to_string(),
                    "-l".to_string(),
                    "admin@juice-sh.op".to_string(),
                    "-P".to_string(),
                    "/wordlists/passwords.txt".to_string(),
                    "-s".to_string(),
                    "3000".to_string(),
                    "-f".to_string(),
                    "localhost".to_string(),
                    "http-post-form".to_string(),
                    "/rest/user/login:email=^USER^&password=^PASS^:F=Invalid email or password".to_string(),
                ],
            )
            .title("Brute-Force Test")
            .timeout_ms(300000),
        }
    }
}

/// Sampling and size limits for one prompt profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileSettings {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub max_digest_chars: usize,
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            top_p: 1.0,
            max_tokens: 1000,
            max_digest_chars: 24000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilesConfig {
    pub cluster_health: ProfileSettings,
    pub vulnerability_report: ProfileSettings,
    pub auth_brute_force: ProfileSettings,
}

impl Default for ProfilesConfig {
    fn default() -> Self {
        Self {
            cluster_health: ProfileSettings::default(),
            vulnerability_report: ProfileSettings {
                temperature: 0.2,
                max_tokens: 1500,
                max_digest_chars: 16000,
                ..ProfileSettings::default()
            },
            auth_brute_force: ProfileSettings {
                temperature: 0.2,
                max_tokens: 800,
                max_digest_chars: 8000,
                ..ProfileSettings::default()
            },
        }
    }
}

impl ProfilesConfig {
    pub fn get(&self, profile: PromptProfile) -> &ProfileSettings {
        match profile {
            PromptProfile::ClusterHealth => &self.cluster_health,
            PromptProfile::VulnerabilityReport => &self.vulnerability_report,
            PromptProfile::AuthBruteForce => &self.auth_brute_force,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportsConfig {
    pub dir: PathBuf,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("Reports"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            llm: LlmConfig::default(),
            probes: ProbesConfig::default(),
            scan: ScanConfig::default(),
            bruteforce: BruteForceConfig::default(),
            profiles: ProfilesConfig::default(),
            reports: ReportsConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

fn validate_probe(section: &str, spec: &ProbeSpec) -> Result<()> {
    if spec.name.trim().is_empty() {
        eyre::bail!("{}: probe name must not be empty", section);
    }
    if spec.command.is_empty() || spec.command[0].trim().is_empty() {
        eyre::bail!("{}: probe '{}' has no command", section, spec.name);
    }
    if spec.timeout_ms == 0 {
        eyre::bail!("{}: probe '{}' timeout_ms must be > 0", section, spec.name);
    }
    Ok(())
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for spec in &self.probes.cluster {
            validate_probe("probes.cluster", spec)?;
            if !names.insert(spec.name.as_str()) {
                eyre::bail!("probes.cluster: duplicate probe name '{}'", spec.name);
            }
        }
        validate_probe("scan.probe", &self.scan.probe)?;
        validate_probe("bruteforce.probe", &self.bruteforce.probe)?;

        if self.probes.max_output_bytes == 0 {
            eyre::bail!("probes.max_output_bytes must be > 0");
        }
        if self.scan.max_findings == 0 {
            eyre::bail!("scan.max_findings must be > 0");
        }
        if self.llm.timeout_ms == 0 {
            eyre::bail!("llm.timeout_ms must be > 0");
        }
        if self.llm.token_env.trim().is_empty() {
            eyre::bail!("llm.token_env must not be empty");
        }

        for profile in [
            PromptProfile::ClusterHealth,
            PromptProfile::VulnerabilityReport,
            PromptProfile::AuthBruteForce,
        ] {
            let settings = self.profiles.get(profile);
            if settings.max_digest_chars == 0 || settings.max_tokens == 0 {
                eyre::bail!("profiles.{}: max_digest_chars and max_tokens must be > 0", profile);
            }
            if !(0.0..=2.0).contains(&settings.temperature) {
                eyre::bail!("profiles.{}: temperature must be within 0.0-2.0", profile);
            }
        }
        Ok(())
    }
}
