//! Shared data model for the build-request scheduling and results-caching
//! core: configurations, requests, results, name-insensitive comparison,
//! and the closed-world error classification every other crate here builds
//! on.

pub mod config;
pub mod error;
pub mod names;
pub mod request;
pub mod result;
pub mod target_builder;
pub mod taskhost;

pub use config::{BuildRequestConfiguration, ConfigurationId, ConfigurationKey, ProjectInstance};
pub use error::{BuildException, Error, ErrorKind, Result, GENERIC_RUNTIME_ERROR_TYPE};
pub use names::{CiString, GlobalProperties};
pub use request::{BuildRequest, BuildRequestFlags, RequestedProjectState};
pub use result::{
    ActionCode, BuildResult, ProjectStateAfterBuild, TargetResult, TargetResultCode, TaskItem,
    WorkUnitResult,
};
pub use target_builder::{SubRequest, TargetBuilder, TargetBuilderOutcome};
pub use taskhost::{
    NodeConfiguration, TaskCompleteType, TaskHostConfiguration, TaskHostTaskComplete, TaskParameterValue,
};
