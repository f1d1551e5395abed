use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::transform::AxisOrder;

/// Rest length given to every bone before the connect pass. The container
/// stores no bone lengths.
pub const DEFAULT_BONE_LENGTH: f32 = 0.05;

// ─── Options ──────────────────────────────────────────────────────────────────

/// Import options shared by the CLI and library callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Swap the second and third axes of every coordinate (Y-up to Z-up).
    pub swap_secondary_axes: bool,
    /// Build an armature and bind geometry to it.
    pub import_skeleton: bool,
    /// Turn disjoint bones into a continuous chain. Ignored without a skeleton.
    pub connect_bones: bool,
    /// Placeholder rest length of each bone.
    pub bone_length: f32,
    pub material_colors: MaterialColorPolicy,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            swap_secondary_axes: true,
            import_skeleton: true,
            connect_bones: true,
            bone_length: DEFAULT_BONE_LENGTH,
            material_colors: MaterialColorPolicy::default(),
        }
    }
}

impl ImportOptions {
    pub fn axis_order(&self) -> AxisOrder {
        AxisOrder::from_swap(self.swap_secondary_axes)
    }
}

/// How placeholder material colors are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaterialColorPolicy {
    /// Reproducible pseudo-random color per material, derived from `seed`,
    /// the material index and the material name.
    Seeded { seed: u64 },
    /// Same RGBA color for every material.
    Fixed([f32; 4]),
}

impl Default for MaterialColorPolicy {
    fn default() -> Self {
        Self::Seeded { seed: 0 }
    }
}

// ─── Report ───────────────────────────────────────────────────────────────────

/// Severity level used by import issues.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// A recoverable condition met while importing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportIssue {
    pub severity: Severity,
    pub code: String,
    pub message: String,
}

impl ImportIssue {
    pub(super) fn new(severity: Severity, code: &str, message: String) -> Self {
        Self {
            severity,
            code: code.to_string(),
            message,
        }
    }
}

/// Summary returned after a completed import.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub model_name: String,
    pub bone_count: usize,
    pub mesh_record_count: usize,
    pub imported_mesh_count: usize,
    pub skipped_mesh_count: usize,
    pub material_count: usize,
    pub total_vertices: usize,
    pub total_faces: usize,
    pub issues: Vec<ImportIssue>,
}

// ─── Reconstructed scene ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmatureDisplay {
    /// Connected chains, drawn as sticks.
    Stick,
    Wire,
}

/// Rest-pose bone in remapped world space.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneBone {
    pub name: String,
    pub parent: Option<usize>,
    pub head: Vector3<f32>,
    pub tail: Vector3<f32>,
    /// Head is shared with the parent's tail.
    pub connected: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Armature {
    pub name: String,
    pub display: ArmatureDisplay,
    /// Indexed like the bone records.
    pub bones: Vec<SceneBone>,
}

impl Armature {
    pub fn bone_by_name(&self, name: &str) -> Option<&SceneBone> {
        self.bones.iter().find(|bone| bone.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub color: [f32; 4],
}

/// Sparse skin weights of one bone over a mesh's vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightGroup {
    /// Global bone index.
    pub bone_index: usize,
    pub name: String,
    /// `(vertex index, weight)` in ascending vertex order.
    pub weights: Vec<(usize, f32)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeometryObject {
    pub name: String,
    /// Index of the mesh record this object was built from.
    pub mesh_index: usize,
    pub positions: Vec<Vector3<f32>>,
    pub faces: Vec<[u32; 3]>,
    /// One UV per face corner, in face order.
    pub loop_uvs: Vec<[f32; 2]>,
    /// Index into [`ReconstructedScene::materials`].
    pub material_index: usize,
    pub weight_groups: Vec<WeightGroup>,
    pub parented_to_armature: bool,
}

impl GeometryObject {
    pub fn weight_group(&self, name: &str) -> Option<&WeightGroup> {
        self.weight_groups.iter().find(|group| group.name == name)
    }
}

/// Everything one import produces, ready to be committed to a sink.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconstructedScene {
    pub name: String,
    pub armature: Option<Armature>,
    pub materials: Vec<Material>,
    pub geometry: Vec<GeometryObject>,
}
