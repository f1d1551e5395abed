mod geometry;
mod material;
mod skeleton;
mod skinning;
mod types;

use crate::error::{ImportError, MeshError};
use crate::logging::ResultExt;
use crate::record::ModelSource;
use crate::sink::SceneSink;

// Re-export public types for callers of this module.
pub use geometry::flip_v;
pub use material::placeholder_color;
pub use types::{
    Armature, ArmatureDisplay, DEFAULT_BONE_LENGTH, GeometryObject, ImportIssue, ImportOptions,
    ImportReport, Material, MaterialColorPolicy, ReconstructedScene, SceneBone, Severity,
    WeightGroup,
};

use geometry::{MeshContext, assemble_mesh};
use material::build_materials;
use skeleton::{build_skeleton, connect_bones, unique_bone_names};

/// Scene value plus the report describing how it was built.
#[derive(Debug, Clone)]
pub struct Reconstruction {
    pub scene: ReconstructedScene,
    pub report: ImportReport,
}

// ─── Public API ───────────────────────────────────────────────────────────────

/// Rebuild skeleton, materials and skinned geometry from decoded records.
///
/// Nothing is written anywhere; see [`import_into`] for committing the result.
/// Meshes without an inflated buffer or with invalid references are skipped
/// and reported, every other failure aborts the whole import.
pub fn reconstruct_scene<S: ModelSource + ?Sized>(
    source: &S,
    model_name: &str,
    options: &ImportOptions,
) -> Result<Reconstruction, ImportError> {
    let bones = source.bones();
    let meshes = source.meshes();
    let material_records = source.materials();
    let inflated = source.inflate()?;

    if inflated.len() != meshes.len() {
        return Err(ImportError::InflateCountMismatch {
            meshes: meshes.len(),
            buffers: inflated.len(),
        });
    }

    let axes = options.axis_order();
    let mut report = ImportReport {
        model_name: model_name.to_string(),
        bone_count: bones.len(),
        mesh_record_count: meshes.len(),
        material_count: material_records.len(),
        ..ImportReport::default()
    };

    let (bone_names, mut name_issues) = unique_bone_names(bones);
    report.issues.append(&mut name_issues);

    let armature = if options.import_skeleton {
        let mut skeleton = build_skeleton(bones, &bone_names, axes, options.bone_length)?;
        let display = if options.connect_bones {
            connect_bones(&mut skeleton);
            ArmatureDisplay::Stick
        } else {
            ArmatureDisplay::Wire
        };
        log::info!(
            "built armature '{}' with {} bones",
            model_name,
            skeleton.bones().len()
        );
        Some(skeleton.into_armature(model_name, display))
    } else {
        None
    };

    let materials = build_materials(material_records, options.material_colors);

    let context = MeshContext {
        model_name,
        axes,
        bone_names: &bone_names,
        materials: material_records,
        with_weights: armature.is_some(),
        parented_to_armature: armature.is_some(),
    };

    let mut geometry = Vec::new();
    for (mesh_index, (mesh, buffer)) in meshes.iter().zip(&inflated).enumerate() {
        let Some(buffer) = buffer else {
            log::debug!("mesh {} has no inflated buffer, skipping", mesh_index);
            report.skipped_mesh_count += 1;
            report.issues.push(ImportIssue::new(
                Severity::Info,
                "MESH_SKIPPED_EMPTY",
                format!("mesh {} has no geometry", mesh_index),
            ));
            continue;
        };

        match assemble_mesh(mesh_index, mesh, buffer, &context)
            .log_error(&format!("mesh {} skipped", mesh_index))
        {
            Ok(object) => {
                log::debug!(
                    "assembled '{}': {} vertices, {} faces, {} weight groups",
                    object.name,
                    object.positions.len(),
                    object.faces.len(),
                    object.weight_groups.len()
                );
                report.total_vertices += object.positions.len();
                report.total_faces += object.faces.len();
                geometry.push(object);
            }
            Err(err) => {
                report.skipped_mesh_count += 1;
                report.issues.push(invalid_mesh_issue(mesh_index, &err));
            }
        }
    }
    report.imported_mesh_count = geometry.len();

    Ok(Reconstruction {
        scene: ReconstructedScene {
            name: model_name.to_string(),
            armature,
            materials,
            geometry,
        },
        report,
    })
}

/// Reconstruct and hand the scene to `sink` in a single commit.
///
/// On any error before the commit the sink is left untouched.
pub fn import_into<S, K>(
    source: &S,
    model_name: &str,
    options: &ImportOptions,
    sink: &mut K,
) -> Result<ImportReport, ImportError>
where
    S: ModelSource + ?Sized,
    K: SceneSink + ?Sized,
{
    let Reconstruction { scene, report } =
        reconstruct_scene(source, model_name, options).log_error("import aborted")?;

    sink.commit(scene).log_error("commit failed")?;
    log::info!(
        "imported '{}': {} of {} meshes, {} issues",
        report.model_name,
        report.imported_mesh_count,
        report.mesh_record_count,
        report.issues.len()
    );

    Ok(report)
}

fn invalid_mesh_issue(mesh_index: usize, err: &MeshError) -> ImportIssue {
    ImportIssue::new(
        Severity::Error,
        "MESH_INVALID",
        format!("mesh {} skipped: {}", mesh_index, err),
    )
}
