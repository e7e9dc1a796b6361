//! Manifest parsing and build orchestration
//!
//! Parses `assets.toml` and converts every listed mesh to SPM.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::convert::convert_file;
use crate::params::ExportParams;
use spm_common::SPM_EXT;

/// Root manifest structure
#[derive(Debug, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub output: OutputConfig,
    /// Defaults for every mesh
    #[serde(default)]
    pub export: ExportParams,
    #[serde(default)]
    pub meshes: BTreeMap<String, MeshEntry>,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("assets/")
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MeshEntry {
    Simple(PathBuf),
    Detailed {
        path: PathBuf,
        #[serde(default)]
        local_space: Option<bool>,
        #[serde(default)]
        keyframes_only: Option<bool>,
        #[serde(default)]
        static_mesh_frame: Option<i32>,
    },
}

impl MeshEntry {
    pub fn path(&self) -> &Path {
        match self {
            MeshEntry::Simple(p) => p,
            MeshEntry::Detailed { path, .. } => path,
        }
    }

    /// Manifest defaults with this entry's overrides applied
    pub fn params(&self, defaults: &ExportParams) -> ExportParams {
        let mut params = defaults.clone();
        if let MeshEntry::Detailed {
            local_space,
            keyframes_only,
            static_mesh_frame,
            ..
        } = self
        {
            params.local_space = local_space.unwrap_or(params.local_space);
            params.keyframes_only = keyframes_only.unwrap_or(params.keyframes_only);
            params.static_mesh_frame = static_mesh_frame.unwrap_or(params.static_mesh_frame);
        }
        params
    }
}

/// Load and parse a manifest file
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {:?}", path))?;
    let manifest: Manifest = toml::from_str(&content)
        .with_context(|| format!("Failed to parse manifest: {:?}", path))?;
    Ok(manifest)
}

/// Validate a manifest without building
pub fn validate(manifest: &Manifest) -> Result<()> {
    for (name, entry) in &manifest.meshes {
        if !entry.path().exists() {
            anyhow::bail!("Mesh '{}' source not found: {:?}", name, entry.path());
        }
    }
    Ok(())
}

/// Build all meshes from a manifest, returning the total warning count
pub fn build_all(manifest: &Manifest, output_override: Option<&Path>) -> Result<usize> {
    let output_dir = output_override.unwrap_or(&manifest.output.dir);
    std::fs::create_dir_all(output_dir)?;

    let mut warnings = 0;
    for (name, entry) in &manifest.meshes {
        let output = output_dir.join(format!("{}.{}", name, SPM_EXT));
        tracing::info!("Converting mesh: {} -> {:?}", name, output);
        let result = convert_file(entry.path(), &output, &entry.params(&manifest.export))
            .with_context(|| format!("Mesh '{}' failed", name))?;
        warnings += result.warnings.len();
    }
    Ok(warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manifest() {
        let manifest: Manifest = toml::from_str(
            r#"
            [output]
            dir = "out/"

            [export]
            export_tangent = false
            frame_start = 5

            [meshes]
            kart = "models/kart.obj"
            driver = { path = "models/driver.glb", local_space = true, static_mesh_frame = 12 }
            "#,
        )
        .unwrap();

        assert_eq!(manifest.output.dir, PathBuf::from("out/"));
        assert!(!manifest.export.export_tangent);
        assert_eq!(manifest.meshes.len(), 2);
        assert_eq!(
            manifest.meshes["kart"].path(),
            Path::new("models/kart.obj")
        );

        let driver = manifest.meshes["driver"].params(&manifest.export);
        assert!(driver.local_space);
        assert_eq!(driver.static_mesh_frame, 12);
        assert_eq!(driver.frame_start, 5);
        assert!(!driver.export_tangent);

        let kart = manifest.meshes["kart"].params(&manifest.export);
        assert!(!kart.local_space);
        assert_eq!(kart.static_mesh_frame, -1);
    }

    #[test]
    fn test_empty_manifest_defaults() {
        let manifest: Manifest = toml::from_str("").unwrap();
        assert_eq!(manifest.output.dir, PathBuf::from("assets/"));
        assert_eq!(manifest.export, ExportParams::default());
        assert!(manifest.meshes.is_empty());
    }

    #[test]
    fn test_validate_missing_source() {
        let manifest: Manifest =
            toml::from_str("[meshes]\nghost = \"does/not/exist.obj\"\n").unwrap();
        assert!(validate(&manifest).is_err());
    }
}
