//! Domain model for the deploy bundle pipeline.
//!
//! Data flows strictly forward: candidates and a baseline become bundles,
//! one bundle is selected, and executing it yields a deployment. Every type
//! here is immutable once constructed and handed by value to the next stage.

pub mod baseline;
pub mod bundle;
pub mod candidate;
pub mod comparison;
pub mod deployment;
pub mod notification;
pub mod target_build;

pub use baseline::{BaselineSource, DeployedBaseline};
pub use bundle::Bundle;
pub use candidate::{CandidateBuild, SUCCESS_STATUS};
pub use comparison::{CommitSummary, ComparisonResult};
pub use deployment::{Deployment, DeploymentStatus, TargetOutcome};
pub use notification::{Block, Delivery, NotificationMessage};
pub use target_build::{TargetBuild, TargetBuildStatus};
