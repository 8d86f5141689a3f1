//! Declaration synthesis
//!
//! Translates routing resource configs into the class-tagged declaration
//! document consumed by the load-balancing appliance:
//!
//! ```text
//! AS3 → ADC → <partition>_AS3 (Tenant) → Shared (Application) → named objects
//! ```
//!
//! - `context`: tenant naming and reference-path construction
//! - `model`: typed document (objects, conditions, actions)
//! - `conditions` / `actions`: flag-to-object translators
//! - `synthesizer`: per-resource builders and document composition
//! - `template`: header fields shared by every declaration

pub mod actions;
pub mod conditions;
pub mod context;
pub mod model;
pub mod synthesizer;
pub mod template;

pub use context::{last_segment, SynthesisContext, SHARED_APPLICATION};
pub use model::{
    ActionKind, Adc, Application, As3Object, CompareOperand, CompareString, ConditionMatch,
    Declaration, EndpointPolicy, ForwardSelect, PolicyAction, PolicyCondition, PolicyEndpoint,
    PolicyEvent, PolicyRule, Pool, PoolMember, Replacement, ResourcePointer, Service, Tenant,
};
pub use synthesizer::{synthesize, VirtualAddress};
