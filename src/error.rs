use thiserror::Error;

/// Failure reported by the external container decoder.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("decoder failed: {0}")]
pub struct DecodeError(pub String);

/// Fatal errors: nothing from the import is committed when one of these is returned.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The bone forest is cyclic, shares children between parents, or
    /// references bones that do not exist.
    #[error("malformed skeleton at bone {bone_index}: {reason}")]
    MalformedSkeleton { bone_index: usize, reason: String },

    #[error("{meshes} mesh records but {buffers} inflated buffers")]
    InflateCountMismatch { meshes: usize, buffers: usize },

    #[error("scene sink rejected the import: {0}")]
    Sink(String),
}

/// Errors that invalidate a single mesh. The composer skips the mesh and
/// keeps importing the rest.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeshError {
    #[error("{attribute} has {actual} entries, expected {expected}")]
    LengthMismatch {
        attribute: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("face {face} references vertex {vertex_index} but only {vertex_count} exist")]
    FaceIndexOutOfRange {
        face: usize,
        vertex_index: u32,
        vertex_count: usize,
    },

    #[error("vertex {vertex} uses weight slot {slot} but the mesh maps {slot_count} bones")]
    SlotOutOfRange {
        vertex: usize,
        slot: usize,
        slot_count: usize,
    },

    #[error("weight slot {slot} maps to bone {bone_index} but the skeleton has {bone_count} bones")]
    BoneIndexOutOfRange {
        slot: usize,
        bone_index: i32,
        bone_count: usize,
    },

    #[error("material index {material_index} out of range ({material_count} materials)")]
    MaterialIndexOutOfRange {
        material_index: i32,
        material_count: usize,
    },

    #[error("vertex {vertex} has {indices} bone indices but {weights} bone weights")]
    WeightArityMismatch {
        vertex: usize,
        indices: usize,
        weights: usize,
    },
}
