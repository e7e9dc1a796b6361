//! Triangle extraction
//!
//! Bakes a [`MeshObject`] into target axes, fan-triangulates its polygons and
//! produces one [`Triangle`] per resulting face, with corners stored in
//! reversed winding.

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};
use spm_common::color_to_bytes;

use super::triangle::{Influence, TextureKey, Triangle};
use super::vertex::Vertex;
use crate::error::{SkipReason, Warning, push_warning};
use crate::scene::{Face, MeshObject};

/// Editor (Z up) to engine (Y up) conversion: swaps the Y and Z axes
pub const AXIS_CONVERSION: Mat4 = Mat4::from_cols(Vec4::X, Vec4::Z, Vec4::Y, Vec4::W);

/// Matrix applied to every position before extraction
pub fn bake_matrix(world: Mat4, local_space: bool) -> Mat4 {
    if local_space {
        AXIS_CONVERSION
    } else {
        AXIS_CONVERSION * world
    }
}

/// Options shared by every object of one export
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions<'a> {
    pub local_space: bool,
    pub export_tangent: bool,
    /// Armatures that will be written; others leave vertices unskinned
    pub armatures: &'a [String],
}

/// Triangles of one object plus what the header flags need to know
#[derive(Debug, Default)]
pub struct Extraction {
    pub triangles: Vec<Triangle>,
    pub has_vertex_color: bool,
    pub has_uv0: bool,
}

/// Extract the triangles of one object
pub fn extract_triangles(
    obj: &MeshObject,
    options: &ExtractOptions<'_>,
    warnings: &mut Vec<Warning>,
) -> Extraction {
    if obj.positions.is_empty() {
        push_warning(
            warnings,
            Warning::ObjectSkipped {
                object: obj.name.clone(),
                reason: SkipReason::NoVertices,
            },
        );
        return Extraction::default();
    }

    let bake = bake_matrix(obj.world_matrix, options.local_space);
    let normal_matrix = normal_matrix(bake);

    let positions: Vec<Vec3> = obj
        .positions
        .iter()
        .map(|p| bake.transform_point3(*p))
        .collect();
    let source_normals = match &obj.normals {
        Some(normals) if normals.len() == obj.positions.len() => normals.clone(),
        _ => compute_vertex_normals(obj),
    };
    let normals: Vec<Vec3> = source_normals
        .iter()
        .map(|n| (normal_matrix * *n).normalize_or_zero())
        .collect();

    let uv0 = obj.uv_layers.first();
    let uv1 = obj.uv_layers.get(1);
    let colors = obj.color_layers.first();
    let want_tangents = options.export_tangent && uv0.is_some();

    let armature = obj
        .armature
        .as_ref()
        .filter(|arm| options.armatures.contains(&arm.name))
        .map(|arm| arm.name.clone());
    let influences = if armature.is_some() {
        vertex_influences(obj)
    } else {
        Vec::new()
    };

    let mut triangles = Vec::new();
    for face in &obj.faces {
        if face.loop_count < 3 {
            continue;
        }
        let loops = face.loop_start..face.loop_start + face.loop_count;
        let Some(corners) = obj.loop_vertices.get(loops) else {
            tracing::debug!("Face with out-of-range loops in {}", obj.name);
            continue;
        };
        if corners.iter().any(|&v| v as usize >= positions.len()) {
            tracing::debug!("Face with out-of-range vertex in {}", obj.name);
            continue;
        }
        let key = texture_key(obj, face);

        for i in 1..face.loop_count - 1 {
            // Source order, reversed below for the engine's winding
            let tri_loops = [face.loop_start, face.loop_start + i, face.loop_start + i + 1];
            let mut vertices = tri_loops.map(|l| {
                let v = obj.loop_vertices[l] as usize;
                let uv_a = layer_uv(uv0, l);
                let uv_b = layer_uv(uv1, l);
                Vertex {
                    position: positions[v],
                    normal: normals[v],
                    color: colors
                        .and_then(|layer| layer.get(l))
                        .map(|c| color_to_bytes(*c))
                        .unwrap_or([255; 3]),
                    uvs: [uv_a.x, 1.0 - uv_a.y, uv_b.x, 1.0 - uv_b.y],
                    ..Default::default()
                }
            });
            if uv0.is_none() {
                vertices.iter_mut().for_each(|v| v.uvs[..2].fill(0.0));
            }
            if uv1.is_none() {
                vertices.iter_mut().for_each(|v| v.uvs[2..].fill(0.0));
            }

            if want_tangents {
                let tangents = corner_tangents(
                    tri_loops.map(|l| positions[obj.loop_vertices[l] as usize]),
                    tri_loops.map(|l| layer_uv(uv0, l)),
                    tri_loops.map(|l| normals[obj.loop_vertices[l] as usize]),
                );
                for (v, t) in vertices.iter_mut().zip(tangents) {
                    v.tangent = t;
                }
            }

            let corner_influences = tri_loops.map(|l| {
                influences
                    .get(obj.loop_vertices[l] as usize)
                    .cloned()
                    .unwrap_or_default()
            });

            vertices.reverse();
            let [i0, i1, i2] = corner_influences;
            triangles.push(Triangle {
                vertices,
                key: key.clone(),
                armature: armature.clone(),
                influences: [i2, i1, i0],
            });
        }
    }

    if triangles.is_empty() {
        push_warning(
            warnings,
            Warning::ObjectSkipped {
                object: obj.name.clone(),
                reason: SkipReason::NoFaces,
            },
        );
        return Extraction::default();
    }
    if options.export_tangent && uv0.is_none() {
        push_warning(
            warnings,
            Warning::MissingUvForTangents {
                object: obj.name.clone(),
            },
        );
    }

    tracing::debug!("Extracted {} triangles from {}", triangles.len(), obj.name);
    Extraction {
        triangles,
        has_vertex_color: colors.is_some(),
        has_uv0: uv0.is_some(),
    }
}

fn layer_uv(layer: Option<&Vec<Vec2>>, loop_index: usize) -> Vec2 {
    layer
        .and_then(|l| l.get(loop_index))
        .copied()
        .unwrap_or(Vec2::ZERO)
}

fn normal_matrix(bake: Mat4) -> Mat3 {
    let m = Mat3::from_mat4(bake);
    if m.determinant().abs() > f32::EPSILON {
        m.inverse().transpose()
    } else {
        m
    }
}

/// Texture pair of a face. The decal texture needs a second UV map.
pub fn texture_key(obj: &MeshObject, face: &Face) -> TextureKey {
    let Some(material) = obj.material_for(face) else {
        return TextureKey::default();
    };
    let primary = material.primary_texture.clone().unwrap_or_default();
    let secondary = if obj.uv_layers.len() >= 2 {
        material.secondary_texture.clone().unwrap_or_default()
    } else {
        String::new()
    };
    TextureKey { primary, secondary }
}

/// Area-weighted vertex normals from the object's polygons (source axes)
pub fn compute_vertex_normals(obj: &MeshObject) -> Vec<Vec3> {
    let mut sums = vec![Vec3::ZERO; obj.positions.len()];
    for face in &obj.faces {
        let Some(corners) = obj
            .loop_vertices
            .get(face.loop_start..face.loop_start + face.loop_count)
        else {
            continue;
        };
        if corners.len() < 3 || corners.iter().any(|&v| v as usize >= sums.len()) {
            continue;
        }
        let a = obj.positions[corners[0] as usize];
        for i in 1..corners.len() - 1 {
            let b = obj.positions[corners[i] as usize];
            let c = obj.positions[corners[i + 1] as usize];
            // Cross product length is twice the triangle area
            let weighted = (b - a).cross(c - a);
            for v in [corners[0], corners[i], corners[i + 1]] {
                sums[v as usize] += weighted;
            }
        }
    }
    sums.into_iter().map(Vec3::normalize_or_zero).collect()
}

/// Per-corner tangents of one triangle from its UV0 parametrization.
///
/// The tangent is orthogonalized against each corner normal; `w` holds the
/// bitangent handedness.
pub fn corner_tangents(p: [Vec3; 3], uv: [Vec2; 3], n: [Vec3; 3]) -> [Vec4; 3] {
    let e1 = p[1] - p[0];
    let e2 = p[2] - p[0];
    let d1 = uv[1] - uv[0];
    let d2 = uv[2] - uv[0];
    let det = d1.x * d2.y - d2.x * d1.y;
    let (t, b) = if det.abs() > f32::EPSILON {
        let r = 1.0 / det;
        ((e1 * d2.y - e2 * d1.y) * r, (e2 * d1.x - e1 * d2.x) * r)
    } else {
        (Vec3::ZERO, Vec3::ZERO)
    };

    n.map(|normal| {
        let ortho = (t - normal * normal.dot(t)).normalize_or_zero();
        let tangent = if ortho == Vec3::ZERO {
            normal.any_orthonormal_vector()
        } else {
            ortho
        };
        let w = if normal.cross(tangent).dot(b) < 0.0 {
            -1.0
        } else {
            1.0
        };
        tangent.extend(w)
    })
}

/// Influences of every vertex, heaviest first
fn vertex_influences(obj: &MeshObject) -> Vec<Vec<Influence>> {
    obj.weights
        .iter()
        .map(|groups| {
            let mut list: Vec<Influence> = groups
                .iter()
                .filter_map(|&(group, weight)| {
                    obj.vertex_groups.get(group).map(|bone| Influence {
                        bone: bone.clone(),
                        weight,
                    })
                })
                .collect();
            list.sort_by(|a, b| b.weight.total_cmp(&a.weight));
            list
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Armature, MaterialDescriptor};
    use std::sync::Arc;

    /// Unit quad in the XY plane (editor axes), one polygon
    fn quad() -> MeshObject {
        let mut obj = MeshObject::new(
            "Quad",
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
        );
        obj.add_face(&[0, 1, 2, 3], 0);
        obj.uv_layers.push(vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ]);
        obj.materials.push(MaterialDescriptor::textured("road.png"));
        obj
    }

    fn options() -> ExtractOptions<'static> {
        ExtractOptions {
            export_tangent: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_axis_conversion_swaps_y_z() {
        let p = AXIS_CONVERSION.transform_point3(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(p, Vec3::new(1.0, 3.0, 2.0));
    }

    #[test]
    fn test_quad_fan_triangulated_and_reversed() {
        let mut warnings = Vec::new();
        let out = extract_triangles(&quad(), &options(), &mut warnings);
        assert!(warnings.is_empty());
        assert_eq!(out.triangles.len(), 2);
        assert!(out.has_uv0);
        assert!(!out.has_vertex_color);

        // First fan triangle (0, 1, 2) stored as (2, 1, 0), Y/Z swapped
        let tri = &out.triangles[0];
        assert_eq!(tri.vertices[0].position, Vec3::new(1.0, 0.0, 1.0));
        assert_eq!(tri.vertices[2].position, Vec3::ZERO);
        assert_eq!(tri.key, TextureKey::new("road.png", ""));
    }

    #[test]
    fn test_normals_and_uv_flip() {
        let mut warnings = Vec::new();
        let out = extract_triangles(&quad(), &options(), &mut warnings);
        let v = &out.triangles[0].vertices[2];
        // +Z in the editor becomes +Y in the engine
        assert!((v.normal - Vec3::Y).length() < 1e-6);
        // V stored as 1 - v
        assert_eq!(v.uvs[0], 0.0);
        assert_eq!(v.uvs[1], 1.0);
        // Tangent follows +U (editor X)
        assert!((v.tangent.truncate() - Vec3::X).length() < 1e-5);
        assert_eq!(v.tangent.w.abs(), 1.0);
    }

    #[test]
    fn test_world_matrix_and_local_space() {
        let mut obj = quad();
        obj.world_matrix = Mat4::from_translation(Vec3::new(0.0, 0.0, 5.0));
        let mut warnings = Vec::new();
        let world = extract_triangles(&obj, &options(), &mut warnings);
        assert_eq!(world.triangles[0].vertices[2].position, Vec3::new(0.0, 5.0, 0.0));

        let local = ExtractOptions {
            local_space: true,
            ..options()
        };
        let out = extract_triangles(&obj, &local, &mut warnings);
        assert_eq!(out.triangles[0].vertices[2].position, Vec3::ZERO);
    }

    #[test]
    fn test_missing_uv_reported() {
        let mut obj = quad();
        obj.uv_layers.clear();
        let mut warnings = Vec::new();
        let out = extract_triangles(&obj, &options(), &mut warnings);
        assert_eq!(out.triangles.len(), 2);
        assert!(!out.has_uv0);
        assert!(matches!(warnings[0], Warning::MissingUvForTangents { .. }));
        assert_eq!(out.triangles[0].vertices[0].tangent, Vec4::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_empty_objects_skipped() {
        let mut warnings = Vec::new();
        let out = extract_triangles(&MeshObject::new("Nothing", vec![]), &options(), &mut warnings);
        assert!(out.triangles.is_empty());

        let out = extract_triangles(
            &MeshObject::new("Points", vec![Vec3::ZERO]),
            &options(),
            &mut warnings,
        );
        assert!(out.triangles.is_empty());
        assert_eq!(
            warnings,
            vec![
                Warning::ObjectSkipped {
                    object: "Nothing".into(),
                    reason: SkipReason::NoVertices
                },
                Warning::ObjectSkipped {
                    object: "Points".into(),
                    reason: SkipReason::NoFaces
                },
            ]
        );
    }

    #[test]
    fn test_secondary_texture_needs_second_uv_map() {
        let mut obj = quad();
        obj.materials[0].secondary_texture = Some("decal.png".into());
        assert_eq!(texture_key(&obj, &obj.faces[0]).secondary, "");

        let uv = obj.uv_layers[0].clone();
        obj.uv_layers.push(uv);
        assert_eq!(
            texture_key(&obj, &obj.faces[0]),
            TextureKey::new("road.png", "decal.png")
        );
    }

    #[test]
    fn test_material_index_falls_back_to_last_slot() {
        let mut obj = quad();
        obj.materials.push(MaterialDescriptor::textured("grass.png"));
        obj.faces[0].material_index = 7;
        assert_eq!(texture_key(&obj, &obj.faces[0]).primary, "grass.png");
    }

    #[test]
    fn test_vertex_colors_truncated() {
        let mut obj = quad();
        obj.color_layers.push(vec![[0.5, 1.0, 0.0]; 4]);
        let mut warnings = Vec::new();
        let out = extract_triangles(&obj, &options(), &mut warnings);
        assert!(out.has_vertex_color);
        assert_eq!(out.triangles[0].vertices[0].color, [127, 255, 0]);
    }

    #[test]
    fn test_influences_sorted_for_active_armature() {
        let mut obj = quad();
        obj.vertex_groups = vec!["Hip".into(), "Knee".into()];
        obj.weights = vec![vec![(0, 0.2), (1, 0.8)]; 4];
        obj.armature = Some(Arc::new(Armature {
            name: "Rig".into(),
            ..Default::default()
        }));

        let mut warnings = Vec::new();
        let out = extract_triangles(&obj, &options(), &mut warnings);
        assert!(out.triangles[0].armature.is_none());

        let active = vec!["Rig".to_string()];
        let opts = ExtractOptions {
            armatures: &active,
            ..options()
        };
        let out = extract_triangles(&obj, &opts, &mut warnings);
        let tri = &out.triangles[0];
        assert_eq!(tri.armature.as_deref(), Some("Rig"));
        assert_eq!(tri.influences[0][0].bone, "Knee");
        assert_eq!(tri.influences[0][1].weight, 0.2);
    }

    #[test]
    fn test_computed_normals_area_weighted() {
        let obj = quad();
        let normals = compute_vertex_normals(&obj);
        assert!(normals.iter().all(|n| (*n - Vec3::Z).length() < 1e-6));
    }
}
