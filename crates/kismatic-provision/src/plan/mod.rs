//! Configuration plan assembly, rendering and staging
//!
//! - [`assemble`]: provisioned topology + options -> [`ConfigurationPlan`]
//! - [`document`]: [`ConfigurationPlan`] -> Kismatic plan YAML
//! - [`stage`]: copy the written plan onto the bootstrap node

pub mod assemble;
pub mod document;
pub mod stage;

pub use assemble::{ConfigurationPlan, PlanOptions, assemble_plan, remote_path};
pub use document::render_plan;
pub use stage::{StagingOutcome, stage_plan};
