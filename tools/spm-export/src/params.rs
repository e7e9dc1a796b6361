//! Export parameters
//!
//! Mirrors the options of the editor's export dialog. Deserializable from the
//! `[export]` table of `assets.toml`; missing fields take the dialog defaults.

use serde::Deserialize;

use crate::error::{Warning, push_warning};

/// Which objects the glue layer hands to the encoder.
///
/// Selection happens before the codec runs; the encoder only records it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionScope {
    All,
    #[default]
    Scene,
    ViewLayer,
    Selected,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExportParams {
    pub selection_scope: SelectionScope,
    /// Skip the object world transform (and armature world transform on root bones)
    pub local_space: bool,
    pub apply_modifiers: bool,
    /// Only export discovered keyframes instead of every frame up to the last one
    pub keyframes_only: bool,
    pub export_normal: bool,
    pub export_vertex_color: bool,
    pub export_tangent: bool,
    /// Frame of the static pose; `<= 0` means `frame_start`
    pub static_mesh_frame: i32,
    /// First frame of the scene timeline
    pub frame_start: i32,
}

impl Default for ExportParams {
    fn default() -> Self {
        Self {
            selection_scope: SelectionScope::Scene,
            local_space: false,
            apply_modifiers: true,
            keyframes_only: true,
            export_normal: true,
            export_vertex_color: true,
            export_tangent: true,
            static_mesh_frame: -1,
            frame_start: 1,
        }
    }
}

impl ExportParams {
    /// Resolve the 1-based static pose frame, clamping invalid values.
    pub fn resolve_static_frame(&self, warnings: &mut Vec<Warning>) -> i32 {
        let frame = if self.static_mesh_frame > 0 {
            self.static_mesh_frame
        } else {
            self.frame_start
        };
        if frame < 1 {
            push_warning(
                warnings,
                Warning::ParameterClamped {
                    parameter: "static_mesh_frame",
                    given: frame,
                    used: 1,
                },
            );
            return 1;
        }
        frame
    }
}
