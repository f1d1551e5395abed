use std::{env, fs, path::PathBuf, process};

use anyhow::Context;
use log::LevelFilter;

use flver2scene::{
    DecodedModel, ImportOptions, convert::import_into, glb::GlbSink, logging::init_logging,
};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:#}");
        process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let (input, output, options_path) = match args.as_slice() {
        [_, input, output] => (input, output, None),
        [_, input, output, flag, options] if flag == "--options" => (input, output, Some(options)),
        _ => {
            eprintln!("Usage: flver2scene <decoded.json> <output.glb> [--options options.json]");
            process::exit(2);
        }
    };

    init_logging(LevelFilter::Info);

    let input = PathBuf::from(input);
    let output = PathBuf::from(output);

    let options = match options_path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read options file: {path}"))?;
            serde_json::from_str::<ImportOptions>(&text)
                .with_context(|| format!("failed to parse options file: {path}"))?
        }
        None => ImportOptions::default(),
    };

    let bytes = fs::read(&input)
        .with_context(|| format!("failed to read input file: {}", input.display()))?;
    let model: DecodedModel = serde_json::from_slice(&bytes)
        .with_context(|| format!("failed to parse decoded model: {}", input.display()))?;

    let model_name = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string());

    let mut sink = GlbSink::new(&output);
    let report = import_into(&model, &model_name, &options, &mut sink)?;

    println!("Model: {}", report.model_name);
    println!("Bones: {}, Materials: {}", report.bone_count, report.material_count);
    println!(
        "Meshes: {} imported, {} skipped (of {})",
        report.imported_mesh_count, report.skipped_mesh_count, report.mesh_record_count
    );
    println!(
        "Vertices/Faces: {} / {}",
        report.total_vertices, report.total_faces
    );
    for issue in &report.issues {
        println!("[{:?}] {}: {}", issue.severity, issue.code, issue.message);
    }

    Ok(())
}
