//! Scene reconstruction for decoded rigged-mesh containers.
//!
//! Turns decoded bone, mesh and material records into a rest-pose armature,
//! skin-bound geometry and placeholder materials, then commits the result to
//! a [`sink::SceneSink`] in one step.

pub mod convert;
pub mod error;
pub mod glb;
pub mod logging;
pub mod record;
pub mod sink;
pub mod transform;

pub use convert::{ImportOptions, ImportReport, ReconstructedScene, import_into, reconstruct_scene};
pub use error::{DecodeError, ImportError, MeshError};
pub use record::{DecodedModel, ModelSource};
