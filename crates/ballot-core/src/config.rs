use crate::error::{BallotError, Result};
use crate::types::{IgnoreList, Wallet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_ENDPOINT: &str = "https://hub.snapshot.org/graphql";

/// Titles containing any of these are treated as suspicious
pub const DEFAULT_KEYWORD_TRIGGERS: [&str; 4] = ["bot", "sybil", "human", "Do not vote"];

/// Pipeline configuration.
///
/// Every field has a default, so an empty TOML file (or no file at all) is a
/// valid configuration. Paths point at flat whole-document JSON/CSV files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub endpoint: String,
    pub wallet_path: PathBuf,
    pub history_path: PathBuf,
    pub export_json_path: PathBuf,
    pub choices_json_path: PathBuf,
    pub export_csv_path: PathBuf,

    /// Followed spaces fetched per wallet; the rest are silently dropped
    pub follow_limit: usize,
    /// Active proposals fetched per batched space query
    pub proposal_limit: usize,
    /// Most recent votes sampled per proposal
    pub vote_sample_limit: usize,
    /// Below this sample size no leading choice is inferred
    pub min_sample_votes: u64,

    /// Per-wallet probability of dropping one random recommendation
    pub thinning_probability: f64,

    pub keyword_triggers: Vec<String>,
    pub keyword_case_sensitive: bool,

    /// Minimum share of the space baseline a proposal's sample must reach
    pub engagement_ratio: f64,
    /// Closed proposals averaged into a space baseline
    pub engagement_window: usize,

    pub ignore_list: Vec<String>,

    pub retry_backoff_ms: u64,
    /// `None` retries forever
    pub retry_max_attempts: Option<u32>,
    pub history_bootstrap_attempts: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            wallet_path: PathBuf::from("./wallets.txt"),
            history_path: PathBuf::from("./already_voted.json"),
            export_json_path: PathBuf::from("./to_vote.json"),
            choices_json_path: PathBuf::from("./to_vote_choices.json"),
            export_csv_path: PathBuf::from("./to_vote.csv"),
            follow_limit: 300,
            proposal_limit: 50,
            vote_sample_limit: 1000,
            min_sample_votes: 50,
            thinning_probability: 0.3,
            keyword_triggers: DEFAULT_KEYWORD_TRIGGERS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            keyword_case_sensitive: true,
            engagement_ratio: 0.3,
            engagement_window: 2,
            ignore_list: Vec::new(),
            retry_backoff_ms: 500,
            retry_max_attempts: None,
            history_bootstrap_attempts: 3,
        }
    }
}

impl PipelineConfig {
    /// Load config from TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: PipelineConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| BallotError::config(format!("cannot serialise config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Override paths and endpoint from `BALLOT_*` environment variables.
    /// Useful for containerized deployments.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Same as [`apply_env`](Self::apply_env) with an injectable lookup
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("BALLOT_ENDPOINT") {
            self.endpoint = v;
        }
        if let Some(v) = non_empty("BALLOT_WALLETS") {
            self.wallet_path = PathBuf::from(v);
        }
        if let Some(v) = non_empty("BALLOT_HISTORY") {
            self.history_path = PathBuf::from(v);
        }
        if let Some(v) = non_empty("BALLOT_EXPORT_JSON") {
            self.export_json_path = PathBuf::from(v);
        }
        if let Some(v) = non_empty("BALLOT_CHOICES_JSON") {
            self.choices_json_path = PathBuf::from(v);
        }
        if let Some(v) = non_empty("BALLOT_EXPORT_CSV") {
            self.export_csv_path = PathBuf::from(v);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(BallotError::config("endpoint cannot be empty"));
        }

        if !(0.0..=1.0).contains(&self.thinning_probability) {
            return Err(BallotError::config(format!(
                "thinning_probability must be within [0, 1], got {}",
                self.thinning_probability
            )));
        }

        if !(0.0..=1.0).contains(&self.engagement_ratio) {
            return Err(BallotError::config(format!(
                "engagement_ratio must be within [0, 1], got {}",
                self.engagement_ratio
            )));
        }

        if self.follow_limit == 0 || self.proposal_limit == 0 || self.vote_sample_limit == 0 {
            return Err(BallotError::config("fetch limits must be greater than zero"));
        }

        if self.engagement_window == 0 {
            return Err(BallotError::config("engagement_window must be greater than zero"));
        }

        if self.history_bootstrap_attempts == 0 {
            return Err(BallotError::config(
                "history_bootstrap_attempts must be greater than zero",
            ));
        }

        if self.retry_max_attempts == Some(0) {
            return Err(BallotError::config(
                "retry_max_attempts must be unset or greater than zero",
            ));
        }

        if self.keyword_triggers.iter().any(|t| t.is_empty()) {
            return Err(BallotError::config(
                "keyword_triggers cannot contain an empty string (it matches every title)",
            ));
        }

        Ok(())
    }

    pub fn ignore_list(&self) -> IgnoreList {
        IgnoreList::new(self.ignore_list.iter().cloned())
    }
}

/// Everything a pipeline run needs besides the remote index.
///
/// Replaces process-wide state: the ignore list travels with the config.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub config: PipelineConfig,
    pub ignore: IgnoreList,
}

impl PipelineContext {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let ignore = config.ignore_list();
        Ok(Self { config, ignore })
    }
}

/// Read the wallet list: one address per line.
///
/// Surrounding whitespace is trimmed, blank lines and `#` comments are
/// skipped, duplicates collapse. Addresses are otherwise kept verbatim.
pub fn load_wallets(path: &Path) -> Result<BTreeSet<Wallet>> {
    let content = fs::read_to_string(path)?;
    Ok(parse_wallets(&content))
}

pub fn parse_wallets(content: &str) -> BTreeSet<Wallet> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
