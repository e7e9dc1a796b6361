//! glTF/GLB loading
//!
//! Every node with a mesh becomes one object. Skins become armatures shared
//! by all objects bound to them; the first animation that drives a skin's
//! joints becomes that armature's action and pose track.

use anyhow::{Context, Result};
use glam::{Mat4, Quat, Vec2, Vec3};
use hashbrown::HashMap;
use std::path::Path;
use std::sync::Arc;

use super::Y_UP_TO_Z_UP;
use crate::armature::safe_inverse;
use crate::scene::{
    Action, AnimationData, Armature, Bone, FCurve, MaterialDescriptor, MeshObject, PoseSample,
    PoseTrack,
};

/// Frame rate used to turn animation times into frame numbers
pub const FRAMES_PER_SECOND: f32 = 24.0;

/// Load every mesh node of a glTF/GLB file
pub fn load_gltf(input: &Path) -> Result<Vec<MeshObject>> {
    let gltf::Gltf { document, blob } =
        gltf::Gltf::open(input).with_context(|| format!("Failed to load glTF: {:?}", input))?;
    let buffers = gltf::import_buffers(&document, input.parent(), blob)
        .with_context(|| format!("Failed to load glTF buffers: {:?}", input))?;

    let parents = node_parents(&document);
    let globals = global_matrices(&document, &parents);

    let mut armatures: HashMap<usize, Arc<Armature>> = HashMap::new();
    let mut objects = Vec::new();
    for node in document.nodes() {
        let Some(mesh) = node.mesh() else {
            continue;
        };
        let mut obj = load_mesh(&node, &mesh, &buffers)?;
        obj.world_matrix = Y_UP_TO_Z_UP * globals[node.index()];

        if let Some(skin) = node.skin() {
            let armature = match armatures.get(&skin.index()) {
                Some(arm) => arm.clone(),
                None => {
                    let arm = Arc::new(load_armature(&document, &skin, &parents, &buffers));
                    armatures.insert(skin.index(), arm.clone());
                    arm
                }
            };
            obj.vertex_groups = armature.bones.iter().map(|b| b.name.clone()).collect();
            obj.armature = Some(armature);
        }
        objects.push(obj);
    }

    if objects.is_empty() {
        anyhow::bail!("No meshes found in glTF");
    }
    tracing::debug!(
        "Loaded glTF {:?}: {} mesh objects, {} armatures",
        input,
        objects.len(),
        armatures.len()
    );
    Ok(objects)
}

fn node_parents(document: &gltf::Document) -> Vec<Option<usize>> {
    let mut parents = vec![None; document.nodes().len()];
    for node in document.nodes() {
        for child in node.children() {
            parents[child.index()] = Some(node.index());
        }
    }
    parents
}

fn local_matrix(node: &gltf::Node) -> Mat4 {
    Mat4::from_cols_array_2d(&node.transform().matrix())
}

fn global_matrices(document: &gltf::Document, parents: &[Option<usize>]) -> Vec<Mat4> {
    let locals: Vec<Mat4> = document.nodes().map(|n| local_matrix(&n)).collect();
    let mut globals: Vec<Option<Mat4>> = vec![None; locals.len()];
    for i in 0..locals.len() {
        resolve_global(i, parents, &locals, &mut globals);
    }
    globals
        .into_iter()
        .map(|m| m.unwrap_or(Mat4::IDENTITY))
        .collect()
}

fn resolve_global(
    i: usize,
    parents: &[Option<usize>],
    locals: &[Mat4],
    globals: &mut [Option<Mat4>],
) -> Mat4 {
    if let Some(m) = globals[i] {
        return m;
    }
    let m = match parents[i] {
        Some(p) => resolve_global(p, parents, locals, globals) * locals[i],
        None => locals[i],
    };
    globals[i] = Some(m);
    m
}

// ============================================================================
// Meshes
// ============================================================================

fn load_mesh(
    node: &gltf::Node,
    mesh: &gltf::Mesh,
    buffers: &[gltf::buffer::Data],
) -> Result<MeshObject> {
    let name = node
        .name()
        .or(mesh.name())
        .map_or_else(|| format!("mesh_{}", node.index()), String::from);
    let mut obj = MeshObject::new(name, Vec::new());

    let mut slots: Vec<Option<usize>> = Vec::new();
    let mut normals: Option<Vec<Vec3>> = Some(Vec::new());
    let mut uv0: Vec<Vec2> = Vec::new();
    let mut uv1: Vec<Vec2> = Vec::new();
    let mut colors: Vec<[f32; 3]> = Vec::new();
    let (mut has_uv0, mut has_uv1, mut has_color) = (false, false, false);

    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            tracing::warn!(
                "Skipping non-triangle primitive {} of mesh '{}'",
                primitive.index(),
                obj.name
            );
            continue;
        }
        let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));
        let positions: Vec<Vec3> = reader
            .read_positions()
            .context("No positions in mesh")?
            .map(Vec3::from)
            .collect();
        let count = positions.len();
        let base = obj.positions.len() as u32;
        obj.positions.extend(positions);

        normals = match (normals.take(), reader.read_normals()) {
            (Some(mut all), Some(iter)) => {
                all.extend(iter.map(Vec3::from));
                Some(all)
            }
            _ => None,
        };

        let read_uv = |set| -> Option<Vec<Vec2>> {
            reader
                .read_tex_coords(set)
                .map(|iter| iter.into_f32().map(|[u, v]| Vec2::new(u, 1.0 - v)).collect())
        };
        let prim_uv0 = read_uv(0);
        let prim_uv1 = read_uv(1);
        let prim_colors: Option<Vec<[f32; 3]>> =
            reader.read_colors(0).map(|iter| iter.into_rgb_f32().collect());
        has_uv0 |= prim_uv0.is_some();
        has_uv1 |= prim_uv1.is_some();
        has_color |= prim_colors.is_some();

        let vertex_weights: Option<Vec<Vec<(usize, f32)>>> =
            match (reader.read_joints(0), reader.read_weights(0)) {
                (Some(joints), Some(weights)) => Some(
                    joints
                        .into_u16()
                        .zip(weights.into_f32())
                        .map(|(j, w)| {
                            j.iter()
                                .zip(w)
                                .filter(|(_, w)| *w > 0.0)
                                .map(|(&j, w)| (j as usize, w))
                                .collect()
                        })
                        .collect(),
                ),
                _ => None,
            };
        obj.weights.resize(base as usize, Vec::new());
        match vertex_weights {
            Some(w) if w.len() == count => obj.weights.extend(w),
            _ => obj.weights.resize(base as usize + count, Vec::new()),
        }

        let indices: Vec<u32> = match reader.read_indices() {
            Some(iter) => iter.into_u32().collect(),
            None => (0..count as u32).collect(),
        };

        let material = primitive.material();
        let slot = match slots.iter().position(|s| *s == material.index()) {
            Some(slot) => slot,
            None => {
                slots.push(material.index());
                obj.materials.push(material_descriptor(&material));
                slots.len() - 1
            }
        };

        let corner = |values: &Option<Vec<Vec2>>, i: u32| {
            values
                .as_ref()
                .and_then(|v| v.get(i as usize).copied())
                .unwrap_or(Vec2::ZERO)
        };
        for tri in indices.chunks_exact(3) {
            if tri.iter().any(|&i| i as usize >= count) {
                anyhow::bail!("Index out of range in mesh '{}'", obj.name);
            }
            obj.add_face(&[base + tri[0], base + tri[1], base + tri[2]], slot);
            for &i in tri {
                uv0.push(corner(&prim_uv0, i));
                uv1.push(corner(&prim_uv1, i));
                colors.push(
                    prim_colors
                        .as_ref()
                        .and_then(|c| c.get(i as usize).copied())
                        .unwrap_or([1.0; 3]),
                );
            }
        }
    }

    if has_uv0 || has_uv1 {
        obj.uv_layers.push(uv0);
    }
    if has_uv1 {
        obj.uv_layers.push(uv1);
    }
    if has_color {
        obj.color_layers.push(colors);
    }
    obj.normals = normals.filter(|n| n.len() == obj.positions.len());
    Ok(obj)
}

fn material_descriptor(material: &gltf::Material) -> MaterialDescriptor {
    let pbr = material.pbr_metallic_roughness();
    MaterialDescriptor {
        primary_texture: pbr.base_color_texture().and_then(|info| texture_name(&info)),
        secondary_texture: None,
    }
}

/// File name of a texture image; embedded images fall back to their name
fn texture_name(info: &gltf::texture::Info) -> Option<String> {
    let image = info.texture().source();
    match image.source() {
        gltf::image::Source::Uri { uri, .. } => Path::new(uri)
            .file_name()
            .and_then(|f| f.to_str())
            .map(String::from),
        gltf::image::Source::View { .. } => image.name().map(String::from),
    }
}

// ============================================================================
// Skins and animation
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct NodePose {
    translation: Vec3,
    rotation: Quat,
    scale: Vec3,
}

impl NodePose {
    fn rest(node: &gltf::Node) -> Self {
        let (t, r, s) = node.transform().decomposed();
        Self {
            translation: Vec3::from(t),
            rotation: Quat::from_array(r),
            scale: Vec3::from(s),
        }
    }

    fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

fn load_armature(
    document: &gltf::Document,
    skin: &gltf::Skin,
    parents: &[Option<usize>],
    buffers: &[gltf::buffer::Data],
) -> Armature {
    let joints: Vec<gltf::Node> = skin.joints().collect();
    let joint_of_node: HashMap<usize, usize> = joints
        .iter()
        .enumerate()
        .map(|(i, j)| (j.index(), i))
        .collect();

    let inverse_binds: Vec<Mat4> = skin
        .reader(|buffer| Some(&buffers[buffer.index()]))
        .read_inverse_bind_matrices()
        .map(|iter| iter.map(|m| Mat4::from_cols_array_2d(&m)).collect())
        .unwrap_or_default();

    let bones: Vec<Bone> = joints
        .iter()
        .enumerate()
        .map(|(i, joint)| {
            // Nearest ancestor that is also a joint of this skin
            let mut parent = parents[joint.index()];
            while let Some(p) = parent {
                if joint_of_node.contains_key(&p) {
                    break;
                }
                parent = parents[p];
            }
            Bone {
                name: joint
                    .name()
                    .map_or_else(|| format!("bone_{}", i), String::from),
                parent: parent.and_then(|p| joint_of_node.get(&p).copied()),
                rest_matrix: inverse_binds
                    .get(i)
                    .map_or(Mat4::IDENTITY, |ibm| safe_inverse(*ibm)),
                constraints: Vec::new(),
            }
        })
        .collect();

    let mut armature = Armature {
        name: skin
            .name()
            .map_or_else(|| format!("armature_{}", skin.index()), String::from),
        world_matrix: Y_UP_TO_Z_UP,
        bones,
        ..Default::default()
    };

    let rest: Vec<NodePose> = joints.iter().map(NodePose::rest).collect();
    let animation = document
        .animations()
        .find(|a| {
            a.channels()
                .any(|c| joint_of_node.contains_key(&c.target().node().index()))
        });
    if let Some(animation) = animation {
        let channels = read_channels(&animation, &joint_of_node, buffers);
        armature.animation = AnimationData {
            action: Some(Action {
                name: animation
                    .name()
                    .map_or_else(|| format!("animation_{}", animation.index()), String::from),
                curves: channels
                    .iter()
                    .map(|c| FCurve {
                        data_path: format!(
                            "pose.bones[\"{}\"].{}",
                            armature.bones[c.bone].name,
                            c.values.path()
                        ),
                        keyframes: c.times.iter().map(|t| time_to_frame(*t)).collect(),
                        modifiers: Vec::new(),
                    })
                    .collect(),
            }),
            nla_tracks: Vec::new(),
        };
        armature.pose = sample_track(&armature.bones, &rest, &channels);
    }
    armature
}

fn time_to_frame(time: f32) -> f32 {
    time * FRAMES_PER_SECOND + 1.0
}

enum ChannelValues {
    Translation(Vec<Vec3>),
    Rotation(Vec<Quat>),
    Scale(Vec<Vec3>),
}

impl ChannelValues {
    fn path(&self) -> &'static str {
        match self {
            Self::Translation(_) => "location",
            Self::Rotation(_) => "rotation_quaternion",
            Self::Scale(_) => "scale",
        }
    }
}

struct Channel {
    bone: usize,
    times: Vec<f32>,
    values: ChannelValues,
}

fn read_channels(
    animation: &gltf::Animation,
    joint_of_node: &HashMap<usize, usize>,
    buffers: &[gltf::buffer::Data],
) -> Vec<Channel> {
    use gltf::animation::util::ReadOutputs;

    let mut channels = Vec::new();
    for channel in animation.channels() {
        let Some(&bone) = joint_of_node.get(&channel.target().node().index()) else {
            continue;
        };
        let reader = channel.reader(|buffer| Some(&buffers[buffer.index()]));
        let (Some(inputs), Some(outputs)) = (reader.read_inputs(), reader.read_outputs()) else {
            continue;
        };
        let times: Vec<f32> = inputs.collect();
        let cubic = matches!(
            channel.sampler().interpolation(),
            gltf::animation::Interpolation::CubicSpline
        );
        let values = match outputs {
            ReadOutputs::Translations(iter) => {
                ChannelValues::Translation(keys(iter.map(Vec3::from), cubic))
            }
            ReadOutputs::Rotations(iter) => {
                ChannelValues::Rotation(keys(iter.into_f32().map(Quat::from_array), cubic))
            }
            ReadOutputs::Scales(iter) => ChannelValues::Scale(keys(iter.map(Vec3::from), cubic)),
            ReadOutputs::MorphTargetWeights(_) => continue,
        };
        channels.push(Channel {
            bone,
            times,
            values,
        });
    }
    channels
}

/// Keyframe values; cubic spline outputs keep only the value of each
/// (in-tangent, value, out-tangent) triple
fn keys<T>(iter: impl Iterator<Item = T>, cubic: bool) -> Vec<T> {
    if cubic {
        iter.skip(1).step_by(3).collect()
    } else {
        iter.collect()
    }
}

/// Bracketing keys and blend factor for `time`, clamped to the ends
fn bracket(times: &[f32], time: f32) -> (usize, usize, f32) {
    let last = times.len().saturating_sub(1);
    if times.is_empty() || time <= times[0] {
        return (0, 0, 0.0);
    }
    if time >= times[last] {
        return (last, last, 0.0);
    }
    let i = times.partition_point(|&t| t <= time).saturating_sub(1);
    let span = times[i + 1] - times[i];
    let factor = if span > 0.0 {
        (time - times[i]) / span
    } else {
        0.0
    };
    (i, i + 1, factor)
}

/// Armature-space pose at every distinct keyframe of the channels
fn sample_track(bones: &[Bone], rest: &[NodePose], channels: &[Channel]) -> PoseTrack {
    let mut frames: Vec<f32> = channels
        .iter()
        .flat_map(|c| c.times.iter().map(|t| time_to_frame(*t).round()))
        .collect();
    frames.sort_by(f32::total_cmp);
    frames.dedup();

    let samples = frames
        .into_iter()
        .map(|frame| {
            let time = (frame - 1.0) / FRAMES_PER_SECOND;
            let mut locals = rest.to_vec();
            for channel in channels {
                let (a, b, t) = bracket(&channel.times, time);
                let pose = &mut locals[channel.bone];
                match &channel.values {
                    ChannelValues::Translation(v) if b < v.len() => {
                        pose.translation = v[a].lerp(v[b], t)
                    }
                    ChannelValues::Rotation(v) if b < v.len() => {
                        pose.rotation = v[a].slerp(v[b], t).normalize()
                    }
                    ChannelValues::Scale(v) if b < v.len() => pose.scale = v[a].lerp(v[b], t),
                    _ => {}
                }
            }

            let mut matrices: Vec<Option<Mat4>> = vec![None; bones.len()];
            for i in 0..bones.len() {
                armature_space(i, bones, &locals, &mut matrices);
            }
            PoseSample {
                frame,
                matrices: matrices
                    .into_iter()
                    .map(|m| m.unwrap_or(Mat4::IDENTITY))
                    .collect(),
            }
        })
        .collect();
    PoseTrack { samples }
}

fn armature_space(
    i: usize,
    bones: &[Bone],
    locals: &[NodePose],
    matrices: &mut [Option<Mat4>],
) -> Mat4 {
    if let Some(m) = matrices[i] {
        return m;
    }
    let local = locals[i].matrix();
    let m = match bones[i].parent {
        Some(p) if p != i => armature_space(p, bones, locals, matrices) * local,
        _ => local,
    };
    matrices[i] = Some(m);
    m
}
