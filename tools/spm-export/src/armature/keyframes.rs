//! Keyframe discovery
//!
//! Collects every frame at which an armature's pose may change: its own
//! action's pose curves, the actions of its NLA strips and the animated
//! targets of bone constraints.

use std::collections::BTreeSet;

use crate::scene::{Action, Armature};

/// Frame number of a key time. Negative times are ignored, frame 0 maps to 1.
fn key_frame(time: f32) -> Option<i32> {
    if time < 0.0 {
        return None;
    }
    Some(match time as i32 {
        0 => 1,
        f => f,
    })
}

fn insert(frames: &mut BTreeSet<i32>, frame: i32) {
    let frame = if frame == 0 { 1 } else { frame };
    if frame > 0 {
        frames.insert(frame);
    }
}

fn action_pose_frames(action: &Action, frames: &mut BTreeSet<i32>) {
    for curve in action.curves.iter().filter(|c| c.data_path.contains("pose")) {
        frames.extend(curve.keyframes.iter().filter_map(|&t| key_frame(t)));
    }
}

fn constraint_frames(action: &Action, frames: &mut BTreeSet<i32>) {
    for curve in &action.curves {
        for modifier in &curve.modifiers {
            if modifier.frame_start > 0.0 && modifier.frame_end > 0.0 {
                for f in modifier.frame_start as i32..=modifier.frame_end as i32 {
                    insert(frames, f);
                }
            }
        }
        frames.extend(curve.keyframes.iter().filter_map(|&t| key_frame(t)));
    }
}

/// Sorted, deduplicated 1-based frames of an armature.
///
/// Empty when nothing is animated. With `keyframes_only == false` the result
/// covers every frame from `frame_start` to the last discovered frame.
pub fn unique_frames(armature: &Armature, keyframes_only: bool, frame_start: i32) -> Vec<i32> {
    let mut frames = BTreeSet::new();
    let animation = &armature.animation;

    if let Some(action) = &animation.action {
        action_pose_frames(action, &mut frames);
    }

    for track in &animation.nla_tracks {
        let Some(last_strip) = track.strips.last() else {
            continue;
        };
        let max_frame = last_strip.frame_end as i32;
        for strip in &track.strips {
            let Some(action) = &strip.action else {
                continue;
            };
            for curve in &action.curves {
                for &time in curve.keyframes.iter().filter(|t| **t >= 0.0) {
                    let mut frame = (strip.frame_start + time) as i32;
                    if frame > max_frame {
                        frame = strip.frame_start as i32;
                    }
                    insert(&mut frames, frame);
                }
            }
        }
    }

    for bone in &armature.bones {
        for constraint in &bone.constraints {
            if let Some(action) = &constraint.target_action {
                constraint_frames(action, &mut frames);
            }
        }
    }

    let Some(&last) = frames.last() else {
        return Vec::new();
    };
    if !keyframes_only {
        let first = frame_start.max(1);
        if first <= last {
            return (first..=last).collect();
        }
    }
    frames.into_iter().collect()
}
