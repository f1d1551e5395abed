use crate::error::MeshError;
use crate::record::{InflatedBuffer, MeshRecord};

use super::types::WeightGroup;

/// Sparse `(global bone, weight)` pairs of one vertex.
pub(super) type VertexInfluences = Vec<(usize, f32)>;

/// Resolve the mesh's local weight slots to global bone indices.
pub(super) fn resolve_slot_bones(
    mesh: &MeshRecord,
    bone_count: usize,
) -> Result<Vec<usize>, MeshError> {
    mesh.bone_indices
        .iter()
        .enumerate()
        .map(|(slot, &bone_index)| {
            usize::try_from(bone_index)
                .ok()
                .filter(|&index| index < bone_count)
                .ok_or(MeshError::BoneIndexOutOfRange {
                    slot,
                    bone_index,
                    bone_count,
                })
        })
        .collect()
}

/// Relabel every vertex's local slots through `slot_bones`.
///
/// Zero weights are dropped. Two slots of one vertex that land on the same
/// bone have their weights summed, so the weight total is unchanged.
pub(super) fn remap_vertex_weights(
    buffer: &InflatedBuffer,
    slot_bones: &[usize],
) -> Result<Vec<VertexInfluences>, MeshError> {
    let vertex_count = buffer.vertex_count();
    if buffer.bone_indices.is_empty() && buffer.bone_weights.is_empty() {
        return Ok(vec![Vec::new(); vertex_count]);
    }
    check_len("bone_indices", vertex_count, buffer.bone_indices.len())?;
    check_len("bone_weights", vertex_count, buffer.bone_weights.len())?;

    let mut influences = Vec::with_capacity(vertex_count);
    for (vertex, (slots, weights)) in buffer
        .bone_indices
        .iter()
        .zip(&buffer.bone_weights)
        .enumerate()
    {
        if slots.len() != weights.len() {
            return Err(MeshError::WeightArityMismatch {
                vertex,
                indices: slots.len(),
                weights: weights.len(),
            });
        }

        let mut pairs = VertexInfluences::new();
        for (&slot, &weight) in slots.iter().zip(weights) {
            if weight == 0.0 {
                continue;
            }
            let slot = slot as usize;
            let Some(&bone) = slot_bones.get(slot) else {
                return Err(MeshError::SlotOutOfRange {
                    vertex,
                    slot,
                    slot_count: slot_bones.len(),
                });
            };
            match pairs.iter_mut().find(|(existing, _)| *existing == bone) {
                Some((_, total)) => *total += weight,
                None => pairs.push((bone, weight)),
            }
        }
        influences.push(pairs);
    }

    Ok(influences)
}

/// One group per distinct bone referenced by the mesh, in slot order.
///
/// Groups stay empty when `influences` is `None`.
pub(super) fn build_weight_groups(
    slot_bones: &[usize],
    bone_names: &[String],
    influences: Option<&[VertexInfluences]>,
) -> Vec<WeightGroup> {
    let mut groups: Vec<WeightGroup> = Vec::new();
    for &bone_index in slot_bones {
        if groups.iter().any(|group| group.bone_index == bone_index) {
            continue;
        }
        groups.push(WeightGroup {
            bone_index,
            name: bone_names[bone_index].clone(),
            weights: Vec::new(),
        });
    }

    let Some(influences) = influences else {
        return groups;
    };

    for (vertex, pairs) in influences.iter().enumerate() {
        for &(bone_index, weight) in pairs {
            if let Some(group) = groups.iter_mut().find(|group| group.bone_index == bone_index) {
                group.weights.push((vertex, weight));
            }
        }
    }

    groups
}

fn check_len(attribute: &'static str, expected: usize, actual: usize) -> Result<(), MeshError> {
    if expected == actual {
        Ok(())
    } else {
        Err(MeshError::LengthMismatch {
            attribute,
            expected,
            actual,
        })
    }
}
