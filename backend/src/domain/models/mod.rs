pub mod actor;
pub mod policy_patch;

pub use actor::ActorContext;
pub use policy_patch::{CapabilityPatch, ChargingPatch, CurfewPatch, GeofencePatch, PolicyPatch};
