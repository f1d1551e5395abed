use nalgebra::Vector3;

use crate::error::MeshError;
use crate::record::{InflatedBuffer, MaterialRecord, MeshRecord};
use crate::transform::AxisOrder;

use super::skinning::{build_weight_groups, remap_vertex_weights, resolve_slot_bones};
use super::types::GeometryObject;

/// Scene-wide inputs shared by every mesh of one import.
pub(super) struct MeshContext<'a> {
    pub model_name: &'a str,
    pub axes: AxisOrder,
    /// Unique bone names, indexed like the bone records.
    pub bone_names: &'a [String],
    pub materials: &'a [MaterialRecord],
    /// Fill per-vertex weights; groups are created either way.
    pub with_weights: bool,
    pub parented_to_armature: bool,
}

/// Build one geometry object from a mesh record and its inflated buffer.
pub(super) fn assemble_mesh(
    mesh_index: usize,
    mesh: &MeshRecord,
    buffer: &InflatedBuffer,
    context: &MeshContext<'_>,
) -> Result<GeometryObject, MeshError> {
    let material_index = usize::try_from(mesh.material_index)
        .ok()
        .filter(|&index| index < context.materials.len())
        .ok_or(MeshError::MaterialIndexOutOfRange {
            material_index: mesh.material_index,
            material_count: context.materials.len(),
        })?;

    validate_buffer(buffer)?;

    let slot_bones = resolve_slot_bones(mesh, context.bone_names.len())?;
    let influences = remap_vertex_weights(buffer, &slot_bones)?;
    let weight_groups = build_weight_groups(
        &slot_bones,
        context.bone_names,
        context.with_weights.then_some(influences.as_slice()),
    );

    Ok(GeometryObject {
        name: format!(
            "{}.{}.{}",
            context.model_name, mesh_index, context.materials[material_index].name
        ),
        mesh_index,
        positions: remap_positions(&buffer.positions, context.axes),
        faces: buffer.faces.clone(),
        loop_uvs: loop_uvs(&buffer.faces, &buffer.uv),
        material_index,
        weight_groups,
        parented_to_armature: context.parented_to_armature,
    })
}

/// Convert a container V coordinate to the scene convention. Applying it
/// twice gives back the input.
pub fn flip_v([u, v]: [f32; 2]) -> [f32; 2] {
    [u, 1.0 - v]
}

fn validate_buffer(buffer: &InflatedBuffer) -> Result<(), MeshError> {
    let vertex_count = buffer.vertex_count();
    if buffer.uv.len() != vertex_count {
        return Err(MeshError::LengthMismatch {
            attribute: "uv",
            expected: vertex_count,
            actual: buffer.uv.len(),
        });
    }

    for (face, indices) in buffer.faces.iter().enumerate() {
        if let Some(&vertex_index) = indices
            .iter()
            .find(|&&index| index as usize >= vertex_count)
        {
            return Err(MeshError::FaceIndexOutOfRange {
                face,
                vertex_index,
                vertex_count,
            });
        }
    }

    Ok(())
}

fn remap_positions(positions: &[[f32; 3]], axes: AxisOrder) -> Vec<Vector3<f32>> {
    positions
        .iter()
        .map(|&position| axes.apply_array(position))
        .collect()
}

/// Per face corner UVs; face indices must already be validated.
fn loop_uvs(faces: &[[u32; 3]], uv: &[[f32; 2]]) -> Vec<[f32; 2]> {
    faces
        .iter()
        .flat_map(|face| face.iter().map(|&index| flip_v(uv[index as usize])))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn triangle() -> InflatedBuffer {
        InflatedBuffer {
            positions: vec![[0.0, 0.0, 0.0], [1.0, 2.0, 3.0], [0.0, 1.0, 0.0]],
            uv: vec![[0.0, 0.0], [1.0, 0.25], [0.5, 1.0]],
            bone_indices: vec![vec![0], vec![0, 1], vec![1]],
            bone_weights: vec![vec![1.0], vec![0.5, 0.5], vec![1.0]],
            faces: vec![[0, 1, 2]],
        }
    }

    fn context<'a>(
        bone_names: &'a [String],
        materials: &'a [MaterialRecord],
        with_weights: bool,
    ) -> MeshContext<'a> {
        MeshContext {
            model_name: "c1000",
            axes: AxisOrder::SWAP_YZ,
            bone_names,
            materials,
            with_weights,
            parented_to_armature: with_weights,
        }
    }

    fn fixtures() -> (Vec<String>, Vec<MaterialRecord>) {
        (
            vec!["boneA".to_string(), "boneB".to_string()],
            vec![MaterialRecord {
                name: "Body".to_string(),
            }],
        )
    }

    #[test]
    fn given_v_coordinates_when_flipping_twice_then_input_is_restored() {
        for v in [0.0f32, 0.25, 0.5, 0.9, 1.0, -0.5, 1.75] {
            let [u, back] = flip_v(flip_v([0.3, v]));
            assert_relative_eq!(u, 0.3);
            assert_relative_eq!(back, v, epsilon = 1e-6);
        }
    }

    #[test]
    fn given_triangle_when_assembling_then_positions_uvs_and_groups_are_built() {
        let (names, materials) = fixtures();
        let mesh = MeshRecord {
            material_index: 0,
            bone_indices: vec![0, 1],
        };

        let object = assemble_mesh(3, &mesh, &triangle(), &context(&names, &materials, true))
            .expect("valid mesh");

        assert_eq!(object.name, "c1000.3.Body");
        assert_eq!(object.positions[1], Vector3::new(1.0, 3.0, 2.0));
        assert_eq!(object.faces, vec![[0, 1, 2]]);
        assert_eq!(object.loop_uvs, vec![[0.0, 1.0], [1.0, 0.75], [0.5, 0.0]]);

        let a = object.weight_group("boneA").expect("group for boneA");
        assert_eq!(a.weights, vec![(0, 1.0), (1, 0.5)]);
        let b = object.weight_group("boneB").expect("group for boneB");
        assert_eq!(b.weights, vec![(1, 0.5), (2, 1.0)]);
        assert!(object.parented_to_armature);
    }

    #[test]
    fn given_no_skeleton_when_assembling_then_groups_are_empty() {
        let (names, materials) = fixtures();
        let mesh = MeshRecord {
            material_index: 0,
            bone_indices: vec![0, 1],
        };

        let object = assemble_mesh(0, &mesh, &triangle(), &context(&names, &materials, false))
            .expect("valid mesh");

        assert_eq!(object.weight_groups.len(), 2);
        assert!(object.weight_groups.iter().all(|g| g.weights.is_empty()));
        assert!(!object.parented_to_armature);
    }

    #[test]
    fn given_bad_material_index_when_assembling_then_mesh_error_is_returned() {
        let (names, materials) = fixtures();
        let mesh = MeshRecord {
            material_index: 1,
            bone_indices: vec![0],
        };

        let err = assemble_mesh(0, &mesh, &triangle(), &context(&names, &materials, true))
            .expect_err("material 1 does not exist");
        assert!(matches!(err, MeshError::MaterialIndexOutOfRange { .. }));
    }

    #[test]
    fn given_face_past_vertex_count_when_assembling_then_mesh_error_is_returned() {
        let (names, materials) = fixtures();
        let mesh = MeshRecord {
            material_index: 0,
            bone_indices: vec![0, 1],
        };
        let mut buffer = triangle();
        buffer.faces.push([0, 2, 3]);

        let err = assemble_mesh(0, &mesh, &buffer, &context(&names, &materials, true))
            .expect_err("vertex 3 does not exist");
        assert_eq!(
            err,
            MeshError::FaceIndexOutOfRange {
                face: 1,
                vertex_index: 3,
                vertex_count: 3
            }
        );
    }

    #[test]
    fn given_missing_uvs_when_assembling_then_length_mismatch_is_returned() {
        let (names, materials) = fixtures();
        let mesh = MeshRecord {
            material_index: 0,
            bone_indices: vec![0, 1],
        };
        let mut buffer = triangle();
        buffer.uv.pop();

        assert!(matches!(
            assemble_mesh(0, &mesh, &buffer, &context(&names, &materials, true)),
            Err(MeshError::LengthMismatch { attribute: "uv", .. })
        ));
    }
}
