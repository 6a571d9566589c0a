pub mod deployer;
pub mod docker;
pub mod errors;
pub mod infrastructure;
pub mod lifecycle;
pub mod status;

pub use deployer::{
    BuildMode, DeployOptions, Deployer, DeploymentReport, DeploymentState, DeploymentStep,
    StepRecord,
};
pub use docker::commands::ComposeCli;
pub use errors::{ContainerStartError, DeployError, ScaffoldError};
pub use infrastructure::template::{ComposeTemplateContext, render_compose, write_compose_file};
pub use lifecycle::{
    container_start::{ContainerStarter, StartSummary},
    rollback::rollback,
};
pub use status::{
    BuildStatus, ContainerStatus, StatusReport, StatusReporter, parse_ps_output, render_status,
};
