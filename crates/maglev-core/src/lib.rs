//! Maglev core library
//!
//! The deploy bundle pipeline: discover green candidate builds, compare each
//! against what is live, pick the newest fast-forward, guard against
//! in-flight deploys, trigger it on every target, and report.

pub mod bundle_builder;
pub mod collaborators;
pub mod comparator;
pub mod config;
pub mod domain;
pub mod dry_run;
pub mod error;
pub mod executor;
pub mod fakes;
pub mod guard;
pub mod obs;
pub mod pipeline;
pub mod report;
pub mod retry;
pub mod selector;
pub mod telemetry;

pub use bundle_builder::BundleBuilder;
pub use collaborators::{CiProvider, DeployTarget, NotificationSink, SourceControl};
pub use comparator::Comparator;
pub use config::{BaselineStrategy, LogFormat, MaglevConfig, Secret};
pub use domain::{
    BaselineSource, Block, Bundle, CandidateBuild, CommitSummary, ComparisonResult, Delivery,
    DeployedBaseline, Deployment, DeploymentStatus, NotificationMessage, TargetBuild,
    TargetBuildStatus, TargetOutcome,
};
pub use dry_run::DryRunTarget;
pub use error::{
    BundleCreationFailure, ConfigError, DeployError, FetchError, FetchErrorKind, FetchResult,
    GuardError,
};
pub use executor::DeployExecutor;
pub use guard::DeployGuard;
pub use pipeline::{FetchStage, Pipeline, PipelineOutcome, PipelineSettings, RunReport, Stage};
pub use retry::RetryPolicy;
pub use selector::select_best;
pub use telemetry::init_tracing;

/// Crate version, reported in the client user agent.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
