//! Records produced by the container decoder.
//!
//! The decoder itself lives outside this crate. Anything that can hand over
//! bones, meshes, materials and the per-mesh inflate results implements
//! [`ModelSource`]; [`DecodedModel`] is the plain in-memory form, also used
//! for JSON dumps.

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Index value marking an absent parent, child or sibling link.
pub const NO_BONE: i32 = -1;

/// One bone as stored in the container: linked-index tree node plus a local
/// rest transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoneRecord {
    pub name: String,
    pub parent_index: i32,
    /// First child, or [`NO_BONE`].
    pub child_index: i32,
    pub next_sibling_index: i32,
    pub translation: [f32; 3],
    /// Euler angles in radians, applied X first, then Z, then Y.
    pub rotation: [f32; 3],
}

impl BoneRecord {
    /// Root bone at `translation` with no rotation and no links.
    pub fn root(name: impl Into<String>, translation: [f32; 3]) -> Self {
        Self {
            name: name.into(),
            parent_index: NO_BONE,
            child_index: NO_BONE,
            next_sibling_index: NO_BONE,
            translation,
            rotation: [0.0; 3],
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_index < 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshRecord {
    pub material_index: i32,
    /// Maps a mesh-local weight slot to a global bone index.
    pub bone_indices: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialRecord {
    pub name: String,
}

/// Flat vertex and face buffers for one mesh, already triangulated.
///
/// `bone_indices` and `bone_weights` are parallel per-vertex lists of local
/// slots and weights. Both may be empty for an unweighted mesh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InflatedBuffer {
    pub positions: Vec<[f32; 3]>,
    pub uv: Vec<[f32; 2]>,
    #[serde(default)]
    pub bone_indices: Vec<Vec<u32>>,
    #[serde(default)]
    pub bone_weights: Vec<Vec<f32>>,
    pub faces: Vec<[u32; 3]>,
}

impl InflatedBuffer {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

/// Read-only view of a decoded container.
pub trait ModelSource {
    fn bones(&self) -> &[BoneRecord];
    fn meshes(&self) -> &[MeshRecord];
    fn materials(&self) -> &[MaterialRecord];

    /// One entry per mesh record, positionally paired. `None` marks a mesh
    /// with nothing to draw.
    fn inflate(&self) -> Result<Vec<Option<InflatedBuffer>>, DecodeError>;
}

/// Fully decoded container held in memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecodedModel {
    pub bones: Vec<BoneRecord>,
    pub meshes: Vec<MeshRecord>,
    pub materials: Vec<MaterialRecord>,
    pub inflated: Vec<Option<InflatedBuffer>>,
}

impl ModelSource for DecodedModel {
    fn bones(&self) -> &[BoneRecord] {
        &self.bones
    }

    fn meshes(&self) -> &[MeshRecord] {
        &self.meshes
    }

    fn materials(&self) -> &[MaterialRecord] {
        &self.materials
    }

    fn inflate(&self) -> Result<Vec<Option<InflatedBuffer>>, DecodeError> {
        Ok(self.inflated.clone())
    }
}
