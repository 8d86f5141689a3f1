//! Domain layer
//!
//! Input object model for declaration synthesis: routing resources with
//! their virtuals, pools and endpoint policies. These types carry no
//! appliance-specific structure; the `declaration` module owns that.

pub mod policy;
pub mod resource;
pub mod source_file;

pub use policy::{Action, Condition, Policy, Rule};
pub use resource::{Member, Pool, PolicyRef, ResourceConfig, ResourceConfigs, Virtual};
pub use source_file::{into_configs, load_resource_file, parse_resource_entries, ResourceEntry};
