//! Binary glTF output for reconstructed scenes.
//!
//! Bones become plain nodes offset by their head positions, so every inverse
//! bind matrix is a pure translation. Geometry is expanded per face corner so
//! each corner keeps its own UV.
//!
//! Only objects with at least one weighted vertex are skinned. Inside a
//! skinned object, vertices without influences follow the first root bone
//! with full weight.

use std::{
    borrow::Cow,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use gltf::binary::{Glb, Header};
use nalgebra::{Translation3, Vector3};
use serde_json::{Value, json};

use crate::convert::{Armature, GeometryObject, ReconstructedScene};
use crate::error::ImportError;
use crate::sink::SceneSink;

const FLOAT: u32 = 5126;
const UNSIGNED_SHORT: u32 = 5123;
const UNSIGNED_INT: u32 = 5125;
const ARRAY_BUFFER: u32 = 34962;
const ELEMENT_ARRAY_BUFFER: u32 = 34963;
const TRIANGLES: u32 = 4;

/// Commits scenes by writing them to a `.glb` file.
#[derive(Debug, Clone)]
pub struct GlbSink {
    path: PathBuf,
}

impl GlbSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SceneSink for GlbSink {
    fn commit(&mut self, scene: ReconstructedScene) -> Result<(), ImportError> {
        write_glb(&scene, &self.path).map_err(|err| ImportError::Sink(format!("{err:#}")))
    }
}

/// Encode `scene` and write it to `output_path`.
///
/// The bytes go to a sibling `.partial` file first and are renamed over
/// `output_path`, so a failed write never leaves a truncated GLB behind.
pub fn write_glb(scene: &ReconstructedScene, output_path: &Path) -> Result<()> {
    let bytes = encode_glb(scene)?;
    let partial = partial_path(output_path);
    if let Err(err) = fs::write(&partial, bytes) {
        let _ = fs::remove_file(&partial);
        return Err(err)
            .with_context(|| format!("failed to write output: {}", partial.display()));
    }
    fs::rename(&partial, output_path).with_context(|| {
        format!(
            "failed to move {} to {}",
            partial.display(),
            output_path.display()
        )
    })?;
    log::info!("wrote {}", output_path.display());
    Ok(())
}

fn partial_path(output_path: &Path) -> PathBuf {
    let mut name = output_path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    output_path.with_file_name(name)
}

/// Encode `scene` as a GLB container.
pub fn encode_glb(scene: &ReconstructedScene) -> Result<Vec<u8>> {
    let mut buffer = BufferBuilder::default();
    let mut nodes = Vec::<Value>::new();
    let mut root_children = Vec::<usize>::new();
    let mut skins = Vec::<Value>::new();

    // Node 0 is the scene root named after the model.
    nodes.push(json!({ "name": scene.name }));

    // Joint that absorbs unweighted vertices of skinned objects.
    let mut fallback_joint = None;
    if let Some(armature) = &scene.armature {
        let (first_node, roots) = push_bone_nodes(armature, &mut nodes)?;
        root_children.extend(roots);
        if !armature.bones.is_empty() {
            skins.push(skin_json(armature, first_node, &mut buffer));
            fallback_joint = armature.bones.iter().position(|bone| bone.parent.is_none());
        }
    }

    let materials: Vec<Value> = scene
        .materials
        .iter()
        .map(|material| {
            json!({
                "name": material.name,
                "pbrMetallicRoughness": { "baseColorFactor": material.color },
            })
        })
        .collect();

    let mut meshes = Vec::<Value>::new();
    for object in &scene.geometry {
        let mut node = json!({ "name": object.name });
        if object.faces.is_empty() {
            // glTF has no empty primitives; the object stays as a bare node.
            log::warn!("'{}' has no faces, written without a mesh", object.name);
        } else {
            let skin_joint = fallback_joint.filter(|_| has_influences(object));
            node["mesh"] = json!(meshes.len());
            meshes.push(mesh_json(object, skin_joint, &mut buffer)?);
            if skin_joint.is_some() {
                node["skin"] = json!(0);
            }
        }
        root_children.push(nodes.len());
        nodes.push(node);
    }

    if !root_children.is_empty() {
        nodes[0]["children"] = json!(root_children);
    }

    let mut root = json!({
        "asset": { "version": "2.0", "generator": "flver2scene" },
        "scene": 0,
        "scenes": [{ "name": scene.name, "nodes": [0] }],
        "nodes": nodes,
    });
    if !meshes.is_empty() {
        root["meshes"] = json!(meshes);
    }
    if !materials.is_empty() {
        root["materials"] = json!(materials);
    }
    if !skins.is_empty() {
        root["skins"] = json!(skins);
    }

    let bin = if buffer.bin.is_empty() {
        None
    } else {
        root["buffers"] = json!([{ "byteLength": buffer.bin.len() }]);
        root["bufferViews"] = json!(buffer.views);
        root["accessors"] = json!(buffer.accessors);
        Some(Cow::Owned(buffer.bin))
    };

    let json_bytes = serde_json::to_vec(&root).context("failed to serialize glTF JSON")?;
    let glb = Glb {
        header: Header {
            magic: *b"glTF",
            version: 2,
            length: 0,
        },
        json: Cow::Owned(json_bytes),
        bin,
    };

    let mut out = Vec::new();
    glb.to_writer(&mut out).context("failed to write output GLB")?;
    Ok(out)
}

/// Append one node per bone and return the first bone node plus the root
/// bone nodes.
fn push_bone_nodes(armature: &Armature, nodes: &mut Vec<Value>) -> Result<(usize, Vec<usize>)> {
    if armature.bones.len() > u16::MAX as usize {
        bail!(
            "armature '{}' has {} bones, more than a glTF joint index can address",
            armature.name,
            armature.bones.len()
        );
    }

    let first = nodes.len();
    let mut children = vec![Vec::<usize>::new(); armature.bones.len()];
    let mut roots = Vec::new();
    for (index, bone) in armature.bones.iter().enumerate() {
        match bone.parent {
            Some(parent) => children[parent].push(first + index),
            None => roots.push(first + index),
        }
    }

    for (index, bone) in armature.bones.iter().enumerate() {
        let offset = match bone.parent {
            Some(parent) => bone.head - armature.bones[parent].head,
            None => bone.head,
        };
        let mut node = json!({
            "name": bone.name,
            "translation": [offset.x, offset.y, offset.z],
        });
        if !children[index].is_empty() {
            node["children"] = json!(children[index]);
        }
        nodes.push(node);
    }

    Ok((first, roots))
}

fn skin_json(armature: &Armature, first_node: usize, buffer: &mut BufferBuilder) -> Value {
    let inverse_binds: Vec<f32> = armature
        .bones
        .iter()
        .flat_map(|bone| {
            // Column-major, as glTF stores matrices.
            let matrix = Translation3::from(-bone.head).to_homogeneous();
            matrix.as_slice().to_vec()
        })
        .collect();
    let accessor = buffer.push_f32(&inverse_binds, "MAT4", armature.bones.len(), None);

    let joints: Vec<usize> = (first_node..first_node + armature.bones.len()).collect();
    json!({
        "name": armature.name,
        "joints": joints,
        "inverseBindMatrices": accessor,
    })
}

/// `fallback_joint` is `Some` for skinned objects and names the joint that
/// unweighted vertices are bound to.
fn mesh_json(
    object: &GeometryObject,
    fallback_joint: Option<usize>,
    buffer: &mut BufferBuilder,
) -> Result<Value> {
    let corners: Vec<usize> = object
        .faces
        .iter()
        .flat_map(|face| face.iter().map(|&index| index as usize))
        .collect();

    let positions: Vec<Vector3<f32>> = corners
        .iter()
        .map(|&vertex| object.positions[vertex])
        .collect();
    let mut min = [f32::INFINITY; 3];
    let mut max = [f32::NEG_INFINITY; 3];
    for position in &positions {
        for axis in 0..3 {
            min[axis] = min[axis].min(position[axis]);
            max[axis] = max[axis].max(position[axis]);
        }
    }
    let flat_positions: Vec<f32> = positions.iter().flat_map(|p| [p.x, p.y, p.z]).collect();
    let position_accessor =
        buffer.push_f32(&flat_positions, "VEC3", corners.len(), Some(ARRAY_BUFFER));
    buffer.accessors[position_accessor]["min"] = json!(min);
    buffer.accessors[position_accessor]["max"] = json!(max);

    let flat_uvs: Vec<f32> = object.loop_uvs.iter().flatten().copied().collect();
    let uv_accessor = buffer.push_f32(&flat_uvs, "VEC2", corners.len(), Some(ARRAY_BUFFER));

    let indices: Vec<u32> = (0..corners.len() as u32).collect();
    let index_accessor = buffer.push_u32(&indices, Some(ELEMENT_ARRAY_BUFFER));

    let mut attributes = json!({
        "POSITION": position_accessor,
        "TEXCOORD_0": uv_accessor,
    });

    if let Some(fallback_joint) = fallback_joint {
        let mut influences = vertex_influences(object);
        for pairs in influences.iter_mut().filter(|pairs| pairs.is_empty()) {
            pairs.push((fallback_joint, 1.0));
        }
        let sets = influences.iter().map(Vec::len).max().unwrap_or(1).div_ceil(4);
        for set in 0..sets {
            let mut joints = Vec::<u16>::with_capacity(corners.len() * 4);
            let mut weights = Vec::<f32>::with_capacity(corners.len() * 4);
            for &vertex in &corners {
                for lane in 0..4 {
                    let (joint, weight) = influences[vertex]
                        .get(set * 4 + lane)
                        .copied()
                        .unwrap_or((0, 0.0));
                    joints.push(u16::try_from(joint).context("joint index exceeds u16")?);
                    weights.push(weight);
                }
            }
            attributes[format!("JOINTS_{set}")] = json!(buffer.push_u16_vec4(&joints, corners.len()));
            attributes[format!("WEIGHTS_{set}")] =
                json!(buffer.push_f32(&weights, "VEC4", corners.len(), Some(ARRAY_BUFFER)));
        }
    }

    let group_names: Vec<&str> = object
        .weight_groups
        .iter()
        .map(|group| group.name.as_str())
        .collect();

    Ok(json!({
        "name": object.name,
        "primitives": [{
            "attributes": attributes,
            "indices": index_accessor,
            "material": object.material_index,
            "mode": TRIANGLES,
        }],
        "extras": { "weight_groups": group_names },
    }))
}

fn has_influences(object: &GeometryObject) -> bool {
    object
        .weight_groups
        .iter()
        .any(|group| !group.weights.is_empty())
}

/// Per-vertex `(bone, weight)` lists gathered back from the weight groups.
fn vertex_influences(object: &GeometryObject) -> Vec<Vec<(usize, f32)>> {
    let mut influences = vec![Vec::new(); object.positions.len()];
    for group in &object.weight_groups {
        for &(vertex, weight) in &group.weights {
            influences[vertex].push((group.bone_index, weight));
        }
    }
    influences
}

/// Single binary buffer with its views and accessors.
#[derive(Default)]
struct BufferBuilder {
    bin: Vec<u8>,
    views: Vec<Value>,
    accessors: Vec<Value>,
}

impl BufferBuilder {
    fn push_f32(
        &mut self,
        data: &[f32],
        accessor_type: &str,
        count: usize,
        target: Option<u32>,
    ) -> usize {
        let bytes: Vec<u8> = data.iter().flat_map(|value| value.to_le_bytes()).collect();
        self.push_accessor(&bytes, FLOAT, accessor_type, count, target)
    }

    fn push_u32(&mut self, data: &[u32], target: Option<u32>) -> usize {
        let bytes: Vec<u8> = data.iter().flat_map(|value| value.to_le_bytes()).collect();
        self.push_accessor(&bytes, UNSIGNED_INT, "SCALAR", data.len(), target)
    }

    fn push_u16_vec4(&mut self, data: &[u16], count: usize) -> usize {
        let bytes: Vec<u8> = data.iter().flat_map(|value| value.to_le_bytes()).collect();
        self.push_accessor(&bytes, UNSIGNED_SHORT, "VEC4", count, Some(ARRAY_BUFFER))
    }

    fn push_accessor(
        &mut self,
        bytes: &[u8],
        component_type: u32,
        accessor_type: &str,
        count: usize,
        target: Option<u32>,
    ) -> usize {
        let offset = self.bin.len();
        self.bin.extend_from_slice(bytes);
        while self.bin.len() % 4 != 0 {
            self.bin.push(0);
        }

        let mut view = json!({
            "buffer": 0,
            "byteOffset": offset,
            "byteLength": bytes.len(),
        });
        if let Some(target) = target {
            view["target"] = json!(target);
        }
        self.views.push(view);

        self.accessors.push(json!({
            "bufferView": self.views.len() - 1,
            "componentType": component_type,
            "count": count,
            "type": accessor_type,
        }));
        self.accessors.len() - 1
    }
}
