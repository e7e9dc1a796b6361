//! spm-export - SPM mesh export tool
//!
//! Converts OBJ and glTF/GLB meshes (including skinned, animated glTF) to
//! `.spm` files and inspects existing ones.

use anyhow::Result;
use clap::{Parser, Subcommand};
use spm_common::SPM_EXT;
use std::path::PathBuf;

use spm_export::{ExportParams, convert, decoder, manifest};

#[derive(Parser)]
#[command(name = "spm-export")]
#[command(about = "SPM mesh export tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build meshes from a manifest file
    Build {
        /// Path to assets.toml manifest
        #[arg(default_value = "assets.toml")]
        manifest: PathBuf,

        /// Output directory (overrides manifest)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate manifest without building
    Check {
        /// Path to assets.toml manifest
        #[arg(default_value = "assets.toml")]
        manifest: PathBuf,
    },

    /// Export a single mesh file
    Mesh {
        /// Input mesh file (glTF/GLB/OBJ)
        input: PathBuf,

        /// Output .spm file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Omit vertex normals
        #[arg(long)]
        no_normals: bool,

        /// Omit vertex colors
        #[arg(long)]
        no_vertex_color: bool,

        /// Omit tangents
        #[arg(long)]
        no_tangents: bool,

        /// Ignore object world transforms
        #[arg(long)]
        local_space: bool,

        /// Export every frame up to the last keyframe
        #[arg(long)]
        all_frames: bool,

        /// Frame of the static pose (default: first frame)
        #[arg(long)]
        static_frame: Option<i32>,
    },

    /// Decode an .spm file and print its contents
    Inspect {
        /// Input .spm file
        file: PathBuf,

        /// Extra directory searched recursively for textures
        #[arg(short, long)]
        texture_path: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            manifest,
            output,
            verbose,
        } => {
            if verbose {
                tracing::info!("Building meshes from {:?}", manifest);
            }
            let config = manifest::load_manifest(&manifest)?;
            let warnings = manifest::build_all(&config, output.as_deref())?;
            tracing::info!("Build complete! ({} warnings)", warnings);
        }

        Commands::Check { manifest } => {
            tracing::info!("Checking manifest {:?}", manifest);
            let config = manifest::load_manifest(&manifest)?;
            manifest::validate(&config)?;
            tracing::info!("Manifest is valid!");
        }

        Commands::Mesh {
            input,
            output,
            no_normals,
            no_vertex_color,
            no_tangents,
            local_space,
            all_frames,
            static_frame,
        } => {
            let output = output.unwrap_or_else(|| input.with_extension(SPM_EXT));
            let params = ExportParams {
                export_normal: !no_normals,
                export_vertex_color: !no_vertex_color,
                export_tangent: !no_tangents,
                local_space,
                keyframes_only: !all_frames,
                static_mesh_frame: static_frame.unwrap_or(-1),
                ..Default::default()
            };
            tracing::info!("Converting {:?} -> {:?}", input, output);
            convert::convert_file(&input, &output, &params)?;
            tracing::info!("Done!");
        }

        Commands::Inspect { file, texture_path } => {
            let scene = decoder::decode_file(&file, texture_path.as_deref())?;
            tracing::info!(
                "{:?}: {:?}, flags {:#05b}, bounds {:?}",
                file,
                scene.kind,
                scene.flags,
                scene.bounding_box
            );
            for (i, material) in scene.materials.iter().enumerate() {
                tracing::info!("  material [{}] '{}': {:?}", i, material.name(), material);
            }
            for mesh in &scene.meshes {
                tracing::info!(
                    "  mesh '{}' (material {}): {} vertices, {} faces",
                    mesh.name,
                    mesh.material_id,
                    mesh.positions.len(),
                    mesh.faces.len()
                );
            }
            for armature in &scene.armatures {
                tracing::info!(
                    "  armature: {} bones ({} in use), {} keyframes",
                    armature.bones.len(),
                    armature.bones_in_use,
                    armature.keyframes.len()
                );
            }
        }
    }

    Ok(())
}
