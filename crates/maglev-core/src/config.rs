//! Run configuration, resolved once at startup.
//!
//! [`MaglevConfig::from_env`] reads the process environment;
//! [`MaglevConfig::from_lookup`] takes any key lookup so tests never touch
//! real environment variables.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::ConfigError;
use crate::retry::RetryPolicy;

pub const DEFAULT_SLACK_CHANNEL: &str = "#maglev";
pub const DEFAULT_GUARD_PAGE_SIZE: usize = 10;

/// A credential. `Debug`, `Display` and `Serialize` never show the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("***")
    }
}

/// How the live commit of the leader target is discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BaselineStrategy {
    /// Latest release, then its slug, then the slug's commit.
    #[default]
    Release,
    /// `source_blob.version` of the latest build.
    LatestBuild,
}

impl FromStr for BaselineStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "release" => Ok(Self::Release),
            "latest-build" | "latest_build" | "build" => Ok(Self::LatestBuild),
            other => Err(format!("expected `release` or `latest-build`, got `{}`", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    pub fn is_json(self) -> bool {
        self == Self::Json
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("expected `json` or `text`, got `{}`", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CircleCiSettings {
    pub token: Secret,
    /// e.g. `gh/acme/shop`
    pub project_slug: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GitHubSettings {
    pub token: Secret,
    pub owner: String,
    pub repo: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HerokuSettings {
    pub token: Secret,
    /// Target app names; the first one is the leader the baseline is read from.
    pub apps: Vec<String>,
    pub baseline: BaselineStrategy,
    /// How many recent builds the guard inspects per target.
    pub guard_page_size: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlackSettings {
    pub token: Secret,
    pub channel: String,
}

/// Everything a run needs, passed by reference to clients and the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct MaglevConfig {
    pub branch: String,
    pub dry_run: bool,
    pub log_format: LogFormat,
    pub retry: RetryPolicy,
    pub circleci: CircleCiSettings,
    pub github: GitHubSettings,
    pub heroku: HerokuSettings,
    pub slack: SlackSettings,
}

impl MaglevConfig {
    /// Resolve from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary key lookup.
    ///
    /// Fails when `TRAIN_IS_RUNNING` is not `true`, when a required key is
    /// missing or blank, or when an optional key does not parse. An app named
    /// twice in `HEROKU_APP_NAME` is rejected: it would be guarded and
    /// triggered twice in one run.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(lookup);

        let running = env.required("TRAIN_IS_RUNNING")?;
        if !running.trim().eq_ignore_ascii_case("true") {
            return Err(ConfigError::RunDisabled("TRAIN_IS_RUNNING".to_string()));
        }

        let apps: Vec<String> = env
            .required("HEROKU_APP_NAME")?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if apps.is_empty() {
            return Err(ConfigError::Invalid {
                key: "HEROKU_APP_NAME".to_string(),
                reason: "no app names given".to_string(),
            });
        }
        if let Some(dup) = apps
            .iter()
            .enumerate()
            .find_map(|(i, app)| apps[..i].contains(app).then_some(app))
        {
            return Err(ConfigError::Invalid {
                key: "HEROKU_APP_NAME".to_string(),
                reason: format!("{} is listed more than once", dup),
            });
        }

        let guard_page_size = env.parsed("MAGLEV_GUARD_PAGE_SIZE", DEFAULT_GUARD_PAGE_SIZE)?;
        if guard_page_size == 0 {
            return Err(ConfigError::Invalid {
                key: "MAGLEV_GUARD_PAGE_SIZE".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_attempts: env.parsed("MAGLEV_FETCH_ATTEMPTS", defaults.max_attempts)?,
            timeout_ms: env.parsed("MAGLEV_HTTP_TIMEOUT_MS", defaults.timeout_ms)?,
            backoff_base_ms: env.parsed("MAGLEV_RETRY_BACKOFF_MS", defaults.backoff_base_ms)?,
        };
        if retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "MAGLEV_FETCH_ATTEMPTS".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            branch: env.required("SOURCE_BRANCH")?,
            dry_run: env.flag("MAGLEV_DRY_RUN")?,
            log_format: env.parsed("MAGLEV_LOG_FORMAT", LogFormat::default())?,
            retry,
            circleci: CircleCiSettings {
                token: Secret::new(env.required("CIRCLECI_TOKEN")?),
                project_slug: env.required("CIRCLECI_PROJECT_SLUG")?,
            },
            github: GitHubSettings {
                token: Secret::new(env.required("GITHUB_ACCESS_TOKEN")?),
                owner: env.required("GITHUB_OWNER")?,
                repo: env.required("GITHUB_REPO")?,
            },
            heroku: HerokuSettings {
                token: Secret::new(env.required("HEROKU_ACCESS_TOKEN")?),
                apps,
                baseline: env.parsed("MAGLEV_BASELINE", BaselineStrategy::default())?,
                guard_page_size,
            },
            slack: SlackSettings {
                token: Secret::new(env.required("SLACK_API_TOKEN")?),
                channel: env
                    .optional("SLACK_CHANNEL")
                    .unwrap_or_else(|| DEFAULT_SLACK_CHANNEL.to_string()),
            },
        })
    }

    /// Target names in configured order.
    pub fn targets(&self) -> &[String] {
        &self.heroku.apps
    }
}

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::Missing(key.to_string()))
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.optional(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    fn flag(&self, key: &str) -> Result<bool, ConfigError> {
        match self.optional(key).map(|v| v.trim().to_ascii_lowercase()) {
            None => Ok(false),
            Some(v) => match v.as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::Invalid {
                    key: key.to_string(),
                    reason: format!("expected a boolean, got `{}`", v),
                }),
            },
        }
    }
}
