use std::collections::HashSet;

use nalgebra::{Matrix4, Vector3};

use crate::error::ImportError;
use crate::record::BoneRecord;
use crate::transform::{AxisOrder, euler_xzy_rotation, local_matrix, transform_point};

use super::types::{Armature, ArmatureDisplay, ImportIssue, SceneBone, Severity};

/// Bone arena built from the linked-index records.
#[derive(Debug, Clone)]
pub(super) struct Skeleton {
    bones: Vec<SceneBone>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
}

impl Skeleton {
    pub(super) fn bones(&self) -> &[SceneBone] {
        &self.bones
    }

    pub(super) fn into_armature(self, name: &str, display: ArmatureDisplay) -> Armature {
        Armature {
            name: name.to_string(),
            display,
            bones: self.bones,
        }
    }
}

// ─── Bone names ───────────────────────────────────────────────────────────────

/// Give every bone a unique name.
///
/// The first bone keeps its name. A later duplicate becomes `"{name}.{index}"`,
/// with `.1`, `.2`, ... appended while that still collides.
pub(super) fn unique_bone_names(records: &[BoneRecord]) -> (Vec<String>, Vec<ImportIssue>) {
    let originals: HashSet<&str> = records.iter().map(|record| record.name.as_str()).collect();
    let mut used = HashSet::<String>::new();
    let mut names = Vec::with_capacity(records.len());
    let mut issues = Vec::new();

    for (index, record) in records.iter().enumerate() {
        let name = if used.contains(&record.name) {
            let base = format!("{}.{}", record.name, index);
            let mut candidate = base.clone();
            let mut suffix = 1;
            while used.contains(&candidate) || originals.contains(candidate.as_str()) {
                candidate = format!("{base}.{suffix}");
                suffix += 1;
            }
            log::warn!(
                "duplicate bone name '{}' at index {}, renamed to '{}'",
                record.name,
                index,
                candidate
            );
            issues.push(ImportIssue::new(
                Severity::Warning,
                "DUPLICATE_BONE_NAME",
                format!(
                    "bone {} reuses the name '{}'; imported as '{}'",
                    index, record.name, candidate
                ),
            ));
            candidate
        } else {
            record.name.clone()
        };

        used.insert(name.clone());
        names.push(name);
    }

    (names, issues)
}

// ─── Rest pose ────────────────────────────────────────────────────────────────

/// Resolve head and tail of every bone in remapped space.
///
/// `names` must be indexed like `records`.
pub(super) fn build_skeleton(
    records: &[BoneRecord],
    names: &[String],
    axes: AxisOrder,
    bone_length: f32,
) -> Result<Skeleton, ImportError> {
    let (parents, children) = link_children(records)?;
    let roots: Vec<usize> = (0..records.len())
        .filter(|&index| records[index].is_root())
        .collect();

    for (index, record) in records.iter().enumerate() {
        let declared = usize::try_from(record.parent_index).ok();
        if declared != parents[index] {
            log::warn!(
                "bone {} declares parent {:?} but is linked under {:?}",
                index,
                declared,
                parents[index]
            );
        }
    }

    let mut heads = vec![Vector3::zeros(); records.len()];
    let mut tails = vec![Vector3::zeros(); records.len()];
    let mut visited = vec![false; records.len()];
    let mut visited_count = 0usize;

    // Siblings share the parent's frame, so each stack entry carries it.
    let mut stack: Vec<(usize, Matrix4<f32>)> = roots
        .iter()
        .rev()
        .map(|&root| (root, Matrix4::identity()))
        .collect();

    while let Some((index, parent_world)) = stack.pop() {
        if visited[index] {
            return Err(ImportError::MalformedSkeleton {
                bone_index: index,
                reason: "bone reached twice during traversal".to_string(),
            });
        }
        visited[index] = true;
        visited_count += 1;

        let record = &records[index];
        let translation = Vector3::from(record.translation);
        let rotation = euler_xzy_rotation(record.rotation);

        let head = transform_point(&parent_world, &translation);
        heads[index] = head;
        tails[index] = head + rotation * Vector3::new(0.0, bone_length, 0.0);

        let world = parent_world * local_matrix(&translation, &rotation);
        for &child in children[index].iter().rev() {
            stack.push((child, world));
        }
    }

    if visited_count != records.len() {
        let first_unreached = visited.iter().position(|seen| !seen).unwrap_or_default();
        return Err(ImportError::MalformedSkeleton {
            bone_index: first_unreached,
            reason: format!(
                "{} of {} bones are not reachable from any root",
                records.len() - visited_count,
                records.len()
            ),
        });
    }

    let bones = (0..records.len())
        .map(|index| SceneBone {
            name: names[index].clone(),
            parent: parents[index],
            head: axes.apply(&heads[index]),
            tail: axes.apply(&tails[index]),
            connected: false,
        })
        .collect();

    log::debug!(
        "resolved rest pose for {} bones from {} roots",
        records.len(),
        roots.len()
    );

    Ok(Skeleton {
        bones,
        children,
        roots,
    })
}

/// Expand first-child / next-sibling links into explicit parent and
/// children lists.
///
/// Every bone may be claimed by at most one parent and roots may not be
/// claimed at all, which also rules out sibling loops.
fn link_children(
    records: &[BoneRecord],
) -> Result<(Vec<Option<usize>>, Vec<Vec<usize>>), ImportError> {
    let count = records.len();
    let resolve = |owner: usize, link: i32| -> Result<Option<usize>, ImportError> {
        if link < 0 {
            return Ok(None);
        }
        let index = link as usize;
        if index >= count {
            return Err(ImportError::MalformedSkeleton {
                bone_index: owner,
                reason: format!("links to bone {} but only {} exist", link, count),
            });
        }
        Ok(Some(index))
    };

    let mut parents = vec![None::<usize>; count];
    let mut children = vec![Vec::<usize>::new(); count];

    for (parent, record) in records.iter().enumerate() {
        let mut next = resolve(parent, record.child_index)?;
        while let Some(child) = next {
            if child == parent || parents[child].is_some() || records[child].is_root() {
                return Err(ImportError::MalformedSkeleton {
                    bone_index: child,
                    reason: format!("claimed again as a child of bone {}", parent),
                });
            }
            parents[child] = Some(parent);
            children[parent].push(child);
            next = resolve(child, records[child].next_sibling_index)?;
        }
    }

    Ok((parents, children))
}

// ─── Connect heuristic ───────────────────────────────────────────────────────

/// Move tails so chains read as continuous.
///
/// - No children: point along the parent's direction, keeping the own length.
/// - One child: end at the child's head and mark the child connected.
/// - Several children: keep the tail.
pub(super) fn connect_bones(skeleton: &mut Skeleton) {
    let bones = &mut skeleton.bones;
    // Entries carry the parent's final head-to-tail direction.
    let mut stack: Vec<(usize, Option<Vector3<f32>>)> = skeleton
        .roots
        .iter()
        .rev()
        .map(|&root| (root, None))
        .collect();

    while let Some((index, parent_direction)) = stack.pop() {
        match skeleton.children[index].as_slice() {
            [] => {
                if let Some(direction) = parent_direction {
                    align_with_parent(&mut bones[index], &direction);
                }
            }
            [child] => {
                let child = *child;
                bones[index].tail = bones[child].head;
                bones[child].connected = true;
                stack.push((child, Some(bones[index].tail - bones[index].head)));
            }
            many => {
                let direction = bones[index].tail - bones[index].head;
                stack.extend(many.iter().rev().map(|&child| (child, Some(direction))));
            }
        }
    }
}

fn align_with_parent(bone: &mut SceneBone, parent_direction: &Vector3<f32>) {
    // Zero-length parents (child head on parent head) give no direction.
    let Some(direction) = parent_direction.try_normalize(f32::EPSILON) else {
        return;
    };
    let length = (bone.tail - bone.head).norm();
    bone.tail = bone.head + direction * length;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::NO_BONE;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    fn bone(
        name: &str,
        parent: i32,
        child: i32,
        sibling: i32,
        translation: [f32; 3],
    ) -> BoneRecord {
        BoneRecord {
            name: name.to_string(),
            parent_index: parent,
            child_index: child,
            next_sibling_index: sibling,
            translation,
            rotation: [0.0; 3],
        }
    }

    fn build(records: &[BoneRecord], swap: bool) -> Result<Skeleton, ImportError> {
        let (names, _) = unique_bone_names(records);
        build_skeleton(records, &names, AxisOrder::from_swap(swap), 0.05)
    }

    /// root(0) -> a(1) -> b(2), all offset along +Y.
    fn chain() -> Vec<BoneRecord> {
        vec![
            bone("root", NO_BONE, 1, NO_BONE, [0.0, 0.0, 0.0]),
            bone("a", 0, 2, NO_BONE, [0.0, 1.0, 0.0]),
            bone("b", 1, NO_BONE, NO_BONE, [0.0, 1.0, 0.0]),
        ]
    }

    #[test]
    fn given_single_root_when_swapping_axes_then_tail_points_along_z() {
        let records = vec![BoneRecord::root("root", [0.0, 0.0, 0.0])];

        let swapped = build(&records, true).expect("valid skeleton");
        assert_relative_eq!(swapped.bones()[0].head, Vector3::zeros());
        assert_relative_eq!(swapped.bones()[0].tail, Vector3::new(0.0, 0.0, 0.05));

        let plain = build(&records, false).expect("valid skeleton");
        assert_relative_eq!(plain.bones()[0].tail, Vector3::new(0.0, 0.05, 0.0));
    }

    #[test]
    fn given_root_with_translation_when_building_then_head_is_remapped_translation() {
        let records = vec![BoneRecord::root("root", [1.0, 2.0, 3.0])];
        let skeleton = build(&records, true).expect("valid skeleton");
        assert_relative_eq!(skeleton.bones()[0].head, Vector3::new(1.0, 3.0, 2.0));
    }

    #[test]
    fn given_rotated_parent_when_building_then_child_head_uses_parent_frame() {
        let mut records = chain();
        // Rz(90) turns the child's +Y offset into -X.
        records[0].rotation = [0.0, 0.0, FRAC_PI_2];
        let skeleton = build(&records, false).expect("valid skeleton");

        assert_relative_eq!(skeleton.bones()[1].head, Vector3::new(-1.0, 0.0, 0.0), epsilon = 1e-6);
        // The parent's tail follows its own rotation.
        assert_relative_eq!(skeleton.bones()[0].tail, Vector3::new(-0.05, 0.0, 0.0), epsilon = 1e-6);
        // The grandchild inherits the same frame.
        assert_relative_eq!(skeleton.bones()[2].head, Vector3::new(-2.0, 0.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn given_siblings_when_building_then_each_uses_the_parent_frame() {
        let records = vec![
            bone("root", NO_BONE, 1, NO_BONE, [0.0, 0.0, 0.0]),
            bone("left", 0, NO_BONE, 2, [-1.0, 0.0, 0.0]),
            bone("right", 0, NO_BONE, NO_BONE, [1.0, 0.0, 0.0]),
        ];
        let skeleton = build(&records, false).expect("valid skeleton");

        assert_relative_eq!(skeleton.bones()[1].head, Vector3::new(-1.0, 0.0, 0.0));
        assert_relative_eq!(skeleton.bones()[2].head, Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(skeleton.bones()[2].parent, Some(0));
    }

    #[test]
    fn given_children_out_of_index_order_when_building_then_every_bone_is_visited() {
        // Children listed at the front of the array, roots at the back.
        let records = vec![
            bone("leaf", 3, NO_BONE, NO_BONE, [0.0, 0.0, 1.0]),
            bone("second_root", NO_BONE, NO_BONE, NO_BONE, [5.0, 0.0, 0.0]),
            bone("mid_sibling", 3, NO_BONE, 0, [0.0, 1.0, 0.0]),
            bone("first_root", NO_BONE, 2, NO_BONE, [0.0, 0.0, 0.0]),
        ];
        let skeleton = build(&records, false).expect("valid skeleton");

        assert_eq!(skeleton.bones().len(), records.len());
        assert_eq!(skeleton.children[3], vec![2, 0]);
        assert_relative_eq!(skeleton.bones()[0].head, Vector3::new(0.0, 0.0, 1.0));
        assert_relative_eq!(skeleton.bones()[1].head, Vector3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn given_child_cycle_when_building_then_malformed_skeleton_is_reported() {
        let records = vec![
            bone("root", NO_BONE, NO_BONE, NO_BONE, [0.0; 3]),
            bone("a", 2, 2, NO_BONE, [0.0; 3]),
            bone("b", 1, 1, NO_BONE, [0.0; 3]),
        ];
        let err = build(&records, false).expect_err("cycle must be rejected");
        assert!(matches!(err, ImportError::MalformedSkeleton { .. }));
    }

    #[test]
    fn given_sibling_loop_when_building_then_malformed_skeleton_is_reported() {
        let records = vec![
            bone("root", NO_BONE, 1, NO_BONE, [0.0; 3]),
            bone("a", 0, NO_BONE, 2, [0.0; 3]),
            bone("b", 0, NO_BONE, 1, [0.0; 3]),
        ];
        let err = build(&records, false).expect_err("loop must be rejected");
        assert!(matches!(err, ImportError::MalformedSkeleton { bone_index: 1, .. }));
    }

    #[test]
    fn given_self_child_or_missing_link_when_building_then_malformed_skeleton_is_reported() {
        let self_child = vec![bone("root", NO_BONE, 0, NO_BONE, [0.0; 3])];
        assert!(build(&self_child, false).is_err());

        let dangling = vec![bone("root", NO_BONE, 7, NO_BONE, [0.0; 3])];
        assert!(matches!(
            build(&dangling, false),
            Err(ImportError::MalformedSkeleton { bone_index: 0, .. })
        ));
    }

    #[test]
    fn given_chain_of_three_when_connecting_then_tails_meet_child_heads() {
        let mut skeleton = build(&chain(), true).expect("valid skeleton");
        let leaf_length = (skeleton.bones()[2].tail - skeleton.bones()[2].head).norm();
        connect_bones(&mut skeleton);

        let bones = skeleton.bones();
        assert_eq!(bones[0].tail, bones[1].head);
        assert_eq!(bones[1].tail, bones[2].head);
        assert!(bones[1].connected && bones[2].connected);
        assert!(!bones[0].connected);

        // The leaf keeps its length and follows its parent's direction.
        let leaf = bones[2].tail - bones[2].head;
        assert_relative_eq!(leaf.norm(), leaf_length, epsilon = 1e-6);
        assert_relative_eq!(leaf.normalize(), Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-6);
    }

    #[test]
    fn given_branching_bone_when_connecting_then_its_tail_is_unchanged() {
        let records = vec![
            bone("root", NO_BONE, 1, NO_BONE, [0.0, 0.0, 0.0]),
            bone("left", 0, NO_BONE, 2, [-1.0, 3.0, 0.0]),
            bone("right", 0, NO_BONE, NO_BONE, [1.0, 3.0, 0.0]),
        ];
        let mut skeleton = build(&records, false).expect("valid skeleton");
        let before = skeleton.bones()[0].tail;
        connect_bones(&mut skeleton);

        assert_eq!(skeleton.bones()[0].tail, before);
        assert!(!skeleton.bones()[1].connected);
        // Leaves under a branch align with the branching bone.
        let left = skeleton.bones()[1].tail - skeleton.bones()[1].head;
        assert_relative_eq!(left, Vector3::new(0.0, 0.05, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn given_child_on_parent_head_when_connecting_then_leaf_tail_is_left_alone() {
        let records = vec![
            bone("root", NO_BONE, 1, NO_BONE, [0.0, 0.0, 0.0]),
            bone("twin", 0, NO_BONE, NO_BONE, [0.0, 0.0, 0.0]),
        ];
        let mut skeleton = build(&records, false).expect("valid skeleton");
        let before = skeleton.bones()[1].tail;
        connect_bones(&mut skeleton);

        assert_eq!(skeleton.bones()[0].tail, skeleton.bones()[0].head);
        assert_eq!(skeleton.bones()[1].tail, before);
    }

    #[test]
    fn given_duplicate_names_when_naming_then_later_bones_get_index_suffix() {
        let records = vec![
            BoneRecord::root("arm", [0.0; 3]),
            BoneRecord::root("arm", [0.0; 3]),
            BoneRecord::root("arm.1", [0.0; 3]),
            BoneRecord::root("arm", [0.0; 3]),
        ];
        let (names, issues) = unique_bone_names(&records);

        assert_eq!(names, vec!["arm", "arm.1.1", "arm.1", "arm.3"]);
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|issue| issue.code == "DUPLICATE_BONE_NAME"));
    }

    #[test]
    fn given_armature_conversion_when_finalizing_then_bones_keep_record_order() {
        let skeleton = build(&chain(), false).expect("valid skeleton");
        let armature = skeleton.into_armature("model", ArmatureDisplay::Wire);

        assert_eq!(armature.name, "model");
        let names: Vec<&str> = armature.bones.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["root", "a", "b"]);
        assert_eq!(armature.bone_by_name("b").and_then(|b| b.parent), Some(1));
    }
}
