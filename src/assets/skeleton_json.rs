use super::atlas::AtlasDescriptor;
use super::skeletal::{
    load_mesh_attachment, load_region_attachment, resolve_linked_meshes, AnimationData, Attachment, BlendMode,
    BoneData, ConstraintData, ConstraintKind, EventData, LinkedMesh, MeshAttachment, RegionAttachment, RegionRefs,
    Sequence, SkeletonDefinition, Skin, SlotData, TransformMode, VertexData,
};
use anyhow::{anyhow, bail, Context, Result};
use glam::{Vec2, Vec4};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawSkeletonFile {
    skeleton: RawHeader,
    bones: Vec<RawBone>,
    slots: Vec<RawSlot>,
    ik: Vec<RawConstraint>,
    transform: Vec<RawConstraint>,
    path: Vec<RawConstraint>,
    skins: RawSkins,
    events: Map<String, Value>,
    animations: Map<String, Value>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawHeader {
    hash: Option<String>,
    spine: Option<String>,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    fps: Option<f32>,
    images: Option<String>,
    audio: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBone {
    name: String,
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    length: f32,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default)]
    rotation: f32,
    #[serde(default = "one")]
    scale_x: f32,
    #[serde(default = "one")]
    scale_y: f32,
    #[serde(default)]
    shear_x: f32,
    #[serde(default)]
    shear_y: f32,
    #[serde(default)]
    transform: Option<String>,
    #[serde(default)]
    skin: bool,
}

#[derive(Deserialize)]
struct RawSlot {
    name: String,
    bone: String,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    dark: Option<String>,
    #[serde(default)]
    attachment: Option<String>,
    #[serde(default)]
    blend: Option<String>,
}

#[derive(Deserialize)]
struct RawConstraint {
    name: String,
    #[serde(default)]
    order: i32,
    #[serde(default)]
    skin: bool,
    #[serde(default)]
    bones: Vec<String>,
    target: String,
}

/// Spine 3.8+ writes skins as a list; older exports use an object keyed by skin name.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawSkins {
    List(Vec<RawSkin>),
    Legacy(Map<String, Value>),
}

impl Default for RawSkins {
    fn default() -> Self {
        RawSkins::List(Vec::new())
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct RawSkin {
    name: String,
    bones: Vec<String>,
    ik: Vec<String>,
    transform: Vec<String>,
    path: Vec<String>,
    attachments: Map<String, Value>,
}

impl Default for RawSkin {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            bones: Vec::new(),
            ik: Vec::new(),
            transform: Vec::new(),
            path: Vec::new(),
            attachments: Map::new(),
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct RawAttachment {
    #[serde(rename = "type")]
    kind: Option<String>,
    name: Option<String>,
    path: Option<String>,
    x: f32,
    y: f32,
    rotation: f32,
    scale_x: Option<f32>,
    scale_y: Option<f32>,
    width: Option<f32>,
    height: Option<f32>,
    color: Option<String>,
    uvs: Vec<f32>,
    triangles: Vec<u16>,
    vertices: Vec<f32>,
    hull: usize,
    edges: Vec<u16>,
    vertex_count: usize,
    parent: Option<String>,
    skin: Option<String>,
    timelines: Option<bool>,
    deform: Option<bool>,
    closed: bool,
    constant_speed: Option<bool>,
    lengths: Vec<f32>,
    end: Option<String>,
    sequence: Option<RawSequence>,
}

#[derive(Deserialize)]
#[serde(default)]
struct RawSequence {
    count: usize,
    start: i32,
    digits: usize,
    setup: usize,
}

impl Default for RawSequence {
    fn default() -> Self {
        Self { count: 0, start: 1, digits: 0, setup: 0 }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawEvent {
    int: i32,
    float: f32,
    string: Option<String>,
    audio: Option<String>,
    volume: Option<f32>,
    balance: f32,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct RawAnimation {
    slots: Map<String, Value>,
    bones: Map<String, Value>,
    ik: Map<String, Value>,
    transform: Map<String, Value>,
    path: Map<String, Value>,
    attachments: Map<String, Value>,
    deform: Map<String, Value>,
    draw_order: Option<Vec<Value>>,
    #[serde(rename = "draworder")]
    legacy_draw_order: Option<Vec<Value>>,
    events: Option<Vec<Value>>,
}

fn one() -> f32 {
    1.0
}

const SLOT_TIMELINES: &[&str] = &["attachment", "rgba", "rgb", "rgba2", "rgb2", "alpha", "color", "twoColor"];
const BONE_TIMELINES: &[&str] =
    &["rotate", "translate", "translatex", "translatey", "scale", "scalex", "scaley", "shear", "shearx", "sheary"];
const PATH_TIMELINES: &[&str] = &["position", "spacing", "mix"];

/// Decodes a Spine JSON skeleton, resolving region and mesh attachments against `atlas`.
pub fn decode_skeleton_json(text: &str, atlas: &AtlasDescriptor) -> Result<SkeletonDefinition> {
    let value: Value = serde_json::from_str(text.trim_start_matches('\u{feff}')).context("skeleton is not valid JSON")?;
    decode_skeleton_value(value, atlas)
}

/// Decodes an already parsed JSON document.
pub fn decode_skeleton_value(value: Value, atlas: &AtlasDescriptor) -> Result<SkeletonDefinition> {
    if !value.is_object() {
        bail!("skeleton JSON must be an object");
    }
    let raw: RawSkeletonFile = serde_json::from_value(value).context("skeleton JSON has an unexpected shape")?;
    let mut definition = SkeletonDefinition {
        hash: raw.skeleton.hash.map(Arc::from),
        version: raw.skeleton.spine.map(Arc::from),
        x: raw.skeleton.x,
        y: raw.skeleton.y,
        width: raw.skeleton.width,
        height: raw.skeleton.height,
        fps: raw.skeleton.fps.unwrap_or(30.0),
        images_path: raw.skeleton.images.map(Arc::from),
        audio_path: raw.skeleton.audio.map(Arc::from),
        ..SkeletonDefinition::default()
    };

    for bone in &raw.bones {
        let parent = match &bone.parent {
            Some(parent) => Some(
                definition.find_bone(parent).ok_or_else(|| anyhow!("Parent bone not found: {parent}"))?,
            ),
            None => None,
        };
        let mut data = BoneData::new(&bone.name, parent);
        data.length = bone.length;
        data.x = bone.x;
        data.y = bone.y;
        data.rotation = bone.rotation;
        data.scale_x = bone.scale_x;
        data.scale_y = bone.scale_y;
        data.shear_x = bone.shear_x;
        data.shear_y = bone.shear_y;
        data.transform_mode = match &bone.transform {
            Some(mode) => TransformMode::from_name(mode).with_context(|| format!("bone '{}'", bone.name))?,
            None => TransformMode::Normal,
        };
        data.skin_required = bone.skin;
        definition.bones.push(data);
    }

    for slot in &raw.slots {
        let bone = definition.find_bone(&slot.bone).ok_or_else(|| anyhow!("Slot bone not found: {}", slot.bone))?;
        let color = match &slot.color {
            Some(hex) => parse_color(hex).with_context(|| format!("slot '{}' color", slot.name))?,
            None => Vec4::ONE,
        };
        let dark_color = match &slot.dark {
            Some(hex) => Some(parse_color(hex).with_context(|| format!("slot '{}' dark color", slot.name))?),
            None => None,
        };
        let blend_mode = match &slot.blend {
            Some(mode) => BlendMode::from_name(mode).with_context(|| format!("slot '{}'", slot.name))?,
            None => BlendMode::Normal,
        };
        definition.slots.push(SlotData {
            name: Arc::from(slot.name.as_str()),
            bone,
            color,
            dark_color,
            attachment: slot.attachment.as_deref().map(Arc::from),
            blend_mode,
        });
    }

    definition.ik_constraints = decode_constraints(&definition, &raw.ik, ConstraintKind::Ik)?;
    definition.transform_constraints = decode_constraints(&definition, &raw.transform, ConstraintKind::Transform)?;
    definition.path_constraints = decode_constraints(&definition, &raw.path, ConstraintKind::Path)?;

    let raw_skins = match raw.skins {
        RawSkins::List(skins) => skins,
        RawSkins::Legacy(map) => map
            .into_iter()
            .map(|(name, attachments)| match attachments {
                Value::Object(attachments) => Ok(RawSkin { name, attachments, ..RawSkin::default() }),
                _ => Err(anyhow!("skin '{name}' must be an object")),
            })
            .collect::<Result<Vec<_>>>()?,
    };
    let mut links = Vec::new();
    for raw_skin in &raw_skins {
        let skin_index = definition.skins.len();
        let skin = decode_skin(&definition, raw_skin, skin_index, atlas, &mut links)
            .with_context(|| format!("skin '{}'", raw_skin.name))?;
        if &*skin.name == "default" {
            definition.default_skin = Some(skin_index);
        }
        definition.skins.push(skin);
    }
    resolve_linked_meshes(&mut definition.skins, definition.default_skin, &links)?;

    for (name, value) in raw.events {
        let event: RawEvent =
            serde_json::from_value(value).with_context(|| format!("event '{name}' has an unexpected shape"))?;
        definition.events.push(EventData {
            name: Arc::from(name.as_str()),
            int_value: event.int,
            float_value: event.float,
            string_value: event.string.map(Arc::from),
            audio_path: event.audio.map(Arc::from),
            volume: event.volume.unwrap_or(1.0),
            balance: event.balance,
        });
    }

    for (name, value) in raw.animations {
        let animation = decode_animation(&definition, &name, value).with_context(|| format!("animation '{name}'"))?;
        definition.animations.push(animation);
    }

    Ok(definition)
}

fn decode_constraints(
    definition: &SkeletonDefinition,
    raw: &[RawConstraint],
    kind: ConstraintKind,
) -> Result<Vec<ConstraintData>> {
    raw.iter()
        .map(|constraint| -> Result<ConstraintData> {
            let bones = constraint
                .bones
                .iter()
                .map(|bone| {
                    definition
                        .find_bone(bone)
                        .ok_or_else(|| anyhow!("constraint '{}' bone not found: {bone}", constraint.name))
                })
                .collect::<Result<Vec<_>>>()?;
            let target = match kind {
                ConstraintKind::Path => definition.find_slot(&constraint.target),
                ConstraintKind::Ik | ConstraintKind::Transform => definition.find_bone(&constraint.target),
            }
            .ok_or_else(|| anyhow!("constraint '{}' target not found: {}", constraint.name, constraint.target))?;
            Ok(ConstraintData {
                name: Arc::from(constraint.name.as_str()),
                kind,
                order: constraint.order,
                skin_required: constraint.skin,
                bones,
                target,
            })
        })
        .collect()
}

fn decode_skin(
    definition: &SkeletonDefinition,
    raw: &RawSkin,
    skin_index: usize,
    atlas: &AtlasDescriptor,
    links: &mut Vec<LinkedMesh>,
) -> Result<Skin> {
    let mut skin = Skin::new(&raw.name);
    for bone in &raw.bones {
        skin.bones.push(definition.find_bone(bone).ok_or_else(|| anyhow!("Skin bone not found: {bone}"))?);
    }
    for constraint in raw.ik.iter().chain(&raw.transform).chain(&raw.path) {
        if !definition.constraint_names().any(|name| name == constraint.as_str()) {
            bail!("Skin constraint not found: {constraint}");
        }
        skin.constraints.push(Arc::from(constraint.as_str()));
    }
    for (slot_name, attachments) in &raw.attachments {
        let slot = definition.find_slot(slot_name).ok_or_else(|| anyhow!("Slot not found: {slot_name}"))?;
        let Value::Object(attachments) = attachments else {
            bail!("attachments of slot '{slot_name}' must be an object");
        };
        for (key, value) in attachments {
            let raw_attachment: RawAttachment = serde_json::from_value(value.clone())
                .with_context(|| format!("attachment '{key}' in slot '{slot_name}' has an unexpected shape"))?;
            let (attachment, link) = decode_attachment(definition, key, raw_attachment, atlas)
                .with_context(|| format!("attachment '{key}' in slot '{slot_name}'"))?;
            if let Some((parent, parent_skin)) = link {
                links.push(LinkedMesh { skin: skin_index, slot, name: Arc::from(key.as_str()), parent, parent_skin });
            }
            skin.set_attachment(slot, key, attachment);
        }
    }
    Ok(skin)
}

type LinkRequest = Option<(Arc<str>, Option<Arc<str>>)>;

fn decode_attachment(
    definition: &SkeletonDefinition,
    key: &str,
    raw: RawAttachment,
    atlas: &AtlasDescriptor,
) -> Result<(Attachment, LinkRequest)> {
    let name: Arc<str> = Arc::from(raw.name.as_deref().unwrap_or(key));
    let path: Arc<str> = raw.path.as_deref().map(Arc::from).unwrap_or_else(|| Arc::clone(&name));
    let color = match &raw.color {
        Some(hex) => parse_color(hex)?,
        None => Vec4::ONE,
    };
    let sequence = raw.sequence.as_ref().map(|sequence| Sequence {
        count: sequence.count,
        start: sequence.start,
        digits: sequence.digits,
        setup_index: sequence.setup,
    });
    let bone_count = definition.bones.len();
    let kind = raw.kind.as_deref().unwrap_or("region");
    Ok(match kind {
        "region" => {
            let region = RegionAttachment {
                name,
                path,
                x: raw.x,
                y: raw.y,
                rotation: raw.rotation,
                scale_x: raw.scale_x.unwrap_or(1.0),
                scale_y: raw.scale_y.unwrap_or(1.0),
                width: raw.width.unwrap_or(32.0),
                height: raw.height.unwrap_or(32.0),
                color,
                sequence,
                regions: RegionRefs::default(),
                offsets: [Vec2::ZERO; 4],
            };
            (Attachment::Region(load_region_attachment(atlas, region)?), None)
        }
        "mesh" | "linkedmesh" | "skinnedmesh" => {
            let linked = kind == "linkedmesh";
            let uvs: Vec<Vec2> = raw.uvs.chunks_exact(2).map(|pair| Vec2::new(pair[0], pair[1])).collect();
            let vertices = if linked {
                VertexData::Unweighted(Vec::new())
            } else {
                VertexData::from_flat(&raw.vertices, uvs.len(), bone_count)?
            };
            let mesh = MeshAttachment {
                name,
                path,
                color,
                vertices,
                uvs,
                triangles: raw.triangles,
                hull_length: raw.hull,
                width: raw.width.unwrap_or(0.0),
                height: raw.height.unwrap_or(0.0),
                edges: raw.edges,
                sequence,
                regions: RegionRefs::default(),
                parent_mesh: None,
                inherit_timelines: raw.timelines.or(raw.deform).unwrap_or(true),
            };
            let link = if linked {
                let parent = raw.parent.ok_or_else(|| anyhow!("linked mesh has no parent"))?;
                Some((Arc::from(parent.as_str()), raw.skin.as_deref().map(Arc::from)))
            } else {
                None
            };
            (Attachment::Mesh(load_mesh_attachment(atlas, mesh)?), link)
        }
        "boundingbox" => {
            let vertices = VertexData::from_flat(&raw.vertices, raw.vertex_count, bone_count)?;
            (Attachment::BoundingBox { name, vertices, color }, None)
        }
        "path" => {
            let vertices = VertexData::from_flat(&raw.vertices, raw.vertex_count, bone_count)?;
            let attachment = Attachment::Path {
                name,
                closed: raw.closed,
                constant_speed: raw.constant_speed.unwrap_or(true),
                lengths: raw.lengths,
                vertices,
            };
            (attachment, None)
        }
        "point" => (Attachment::Point { name, x: raw.x, y: raw.y, rotation: raw.rotation }, None),
        "clipping" => {
            let end_slot = match &raw.end {
                Some(end) => Some(definition.find_slot(end).ok_or_else(|| anyhow!("Clipping end slot not found: {end}"))?),
                None => None,
            };
            let vertices = VertexData::from_flat(&raw.vertices, raw.vertex_count, bone_count)?;
            (Attachment::Clipping { name, end_slot, vertices }, None)
        }
        other => bail!("unknown attachment type '{other}'"),
    })
}

fn decode_animation(definition: &SkeletonDefinition, name: &str, value: Value) -> Result<AnimationData> {
    let raw: RawAnimation = serde_json::from_value(value).context("unexpected shape")?;
    let mut summary = TimelineSummary::default();

    for (slot, timelines) in &raw.slots {
        definition.find_slot(slot).ok_or_else(|| anyhow!("Slot not found: {slot}"))?;
        for (timeline, frames) in object(timelines, slot)? {
            if !SLOT_TIMELINES.contains(&timeline.as_str()) {
                bail!("Invalid timeline type for a slot: {timeline} ({slot})");
            }
            summary.add(frames)?;
        }
    }
    for (bone, timelines) in &raw.bones {
        definition.find_bone(bone).ok_or_else(|| anyhow!("Bone not found: {bone}"))?;
        for (timeline, frames) in object(timelines, bone)? {
            if !BONE_TIMELINES.contains(&timeline.as_str()) {
                bail!("Invalid timeline type for a bone: {timeline} ({bone})");
            }
            summary.add(frames)?;
        }
    }
    for (constraint, frames) in &raw.ik {
        find_constraint(&definition.ik_constraints, constraint, "IK")?;
        summary.add(frames)?;
    }
    for (constraint, frames) in &raw.transform {
        find_constraint(&definition.transform_constraints, constraint, "Transform")?;
        summary.add(frames)?;
    }
    for (constraint, timelines) in &raw.path {
        find_constraint(&definition.path_constraints, constraint, "Path")?;
        for (timeline, frames) in object(timelines, constraint)? {
            if !PATH_TIMELINES.contains(&timeline.as_str()) {
                bail!("Invalid timeline type for a path constraint: {timeline} ({constraint})");
            }
            summary.add(frames)?;
        }
    }
    for (skin_name, slots) in raw.attachments.iter().chain(&raw.deform) {
        let skin = definition.find_skin(skin_name).ok_or_else(|| anyhow!("Skin not found: {skin_name}"))?;
        for (slot_name, attachments) in object(slots, skin_name)? {
            let slot = definition.find_slot(slot_name).ok_or_else(|| anyhow!("Slot not found: {slot_name}"))?;
            for (attachment, timelines) in object(attachments, slot_name)? {
                if skin.attachment(slot, attachment).is_none() {
                    bail!("Deform attachment not found: {attachment}");
                }
                match timelines {
                    Value::Array(_) => summary.add(timelines)?,
                    Value::Object(map) => {
                        for frames in map.values() {
                            summary.add(frames)?;
                        }
                    }
                    _ => bail!("timelines of attachment '{attachment}' must be a list or an object"),
                }
            }
        }
    }
    if let Some(frames) = raw.draw_order.as_ref().or(raw.legacy_draw_order.as_ref()) {
        for frame in frames {
            for offset in frame.get("offsets").and_then(Value::as_array).into_iter().flatten() {
                let slot = offset.get("slot").and_then(Value::as_str).unwrap_or_default();
                definition.find_slot(slot).ok_or_else(|| anyhow!("Slot not found: {slot}"))?;
            }
        }
        summary.add_frames(frames);
    }
    if let Some(frames) = &raw.events {
        for frame in frames {
            let event = frame.get("name").and_then(Value::as_str).unwrap_or_default();
            definition.find_event(event).ok_or_else(|| anyhow!("Event not found: {event}"))?;
        }
        summary.add_frames(frames);
    }

    Ok(AnimationData { name: Arc::from(name), duration: summary.duration, timeline_count: summary.timelines })
}

#[derive(Default)]
struct TimelineSummary {
    timelines: usize,
    duration: f32,
}

impl TimelineSummary {
    fn add(&mut self, frames: &Value) -> Result<()> {
        let frames = frames.as_array().ok_or_else(|| anyhow!("timeline frames must be a list"))?;
        self.add_frames(frames);
        Ok(())
    }

    fn add_frames(&mut self, frames: &[Value]) {
        self.timelines += 1;
        for frame in frames {
            let time = frame.get("time").and_then(Value::as_f64).unwrap_or(0.0) as f32;
            self.duration = self.duration.max(time);
        }
    }
}

fn object<'a>(value: &'a Value, owner: &str) -> Result<&'a Map<String, Value>> {
    value.as_object().ok_or_else(|| anyhow!("timelines of '{owner}' must be an object"))
}

fn find_constraint<'a>(constraints: &'a [ConstraintData], name: &str, label: &str) -> Result<&'a ConstraintData> {
    constraints
        .iter()
        .find(|constraint| &*constraint.name == name)
        .ok_or_else(|| anyhow!("{label} constraint not found: {name}"))
}

/// Parses `RRGGBBAA` (or `RRGGBB`) hex into normalised RGBA.
pub fn parse_color(hex: &str) -> Result<Vec4> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 8 && hex.len() != 6 {
        bail!("color '{hex}' must have 6 or 8 hex digits");
    }
    let channel = |index: usize| -> Result<f32> {
        let digits = hex.get(index * 2..index * 2 + 2).ok_or_else(|| anyhow!("color '{hex}' is not ASCII"))?;
        let value = u8::from_str_radix(digits, 16).with_context(|| format!("color '{hex}' is not hexadecimal"))?;
        Ok(value as f32 / 255.0)
    };
    let alpha = if hex.len() == 8 { channel(3)? } else { 1.0 };
    Ok(Vec4::new(channel(0)?, channel(1)?, channel(2)?, alpha))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::atlas::parse_atlas;
    use crate::assets::ImageHandle;

    fn no_textures(_: &str) -> Option<ImageHandle> {
        None
    }

    fn atlas() -> AtlasDescriptor {
        parse_atlas("hero.png\nsize: 64, 64\nhead\n  bounds: 0, 0, 32, 16\nbody\n  bounds: 32, 0, 16, 32\n", &no_textures)
            .unwrap()
    }

    const SKELETON: &str = r#"{
        "skeleton": { "hash": "abc", "spine": "4.1.17", "x": -20, "y": -5, "width": 40, "height": 60, "images": "./images/" },
        "bones": [
            { "name": "root" },
            { "name": "torso", "parent": "root", "y": 20, "transform": "noScale" }
        ],
        "slots": [
            { "name": "body", "bone": "torso", "attachment": "body", "color": "ff0000ff" },
            { "name": "head", "bone": "torso", "attachment": "head", "blend": "additive" }
        ],
        "ik": [ { "name": "aim", "bones": ["torso"], "target": "root" } ],
        "skins": [
            {
                "name": "default",
                "attachments": {
                    "body": { "body": { "width": 16, "height": 32 } },
                    "head": {
                        "head": { "width": 32, "height": 16, "y": 30 },
                        "mask": { "type": "clipping", "end": "head", "vertexCount": 3, "vertices": [0, 0, 1, 0, 0, 1] }
                    }
                }
            },
            {
                "name": "alt",
                "attachments": {
                    "head": {
                        "head": { "type": "mesh", "uvs": [0, 0, 1, 0, 1, 1], "triangles": [0, 1, 2],
                                  "vertices": [0, 0, 10, 0, 10, 10], "hull": 3 },
                        "visor": { "type": "linkedmesh", "path": "head", "parent": "head", "skin": "alt" }
                    }
                }
            }
        ],
        "events": { "step": { "int": 2, "string": "left" } },
        "animations": {
            "walk": {
                "bones": { "torso": { "rotate": [ { "time": 0 }, { "time": 0.5, "angle": 10 } ] } },
                "slots": { "head": { "rgba": [ { "time": 0.25, "color": "ffffffff" } ] } },
                "events": [ { "time": 0.75, "name": "step" } ]
            },
            "idle": {
                "bones": { "root": { "translate": [ { "time": 1.5 } ] } }
            }
        }
    }"#;

    #[test]
    fn decodes_structure_and_keeps_animation_order() {
        let definition = decode_skeleton_json(SKELETON, &atlas()).unwrap();
        assert_eq!(definition.version.as_deref(), Some("4.1.17"));
        assert_eq!(definition.bones.len(), 2);
        assert_eq!(definition.bones[1].parent, Some(0));
        assert_eq!(definition.bones[1].transform_mode, TransformMode::NoScale);
        assert_eq!(definition.slots[0].color, Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(definition.slots[1].blend_mode, BlendMode::Additive);
        assert_eq!(definition.ik_constraints.len(), 1);
        assert_eq!(definition.skin_names().iter().map(|name| name.to_string()).collect::<Vec<_>>(), ["default", "alt"]);
        assert_eq!(definition.default_skin, Some(0));
        assert_eq!(definition.animation_names().iter().map(|name| name.to_string()).collect::<Vec<_>>(), ["walk", "idle"]);

        let walk = definition.find_animation("walk").unwrap();
        assert_eq!(walk.timeline_count, 3);
        assert!((walk.duration - 0.75).abs() < 1e-6);
        assert!((definition.find_animation("idle").unwrap().duration - 1.5).abs() < 1e-6);
        assert_eq!(definition.find_event("step").unwrap().int_value, 2);
    }

    #[test]
    fn linked_mesh_copies_parent_geometry() {
        let definition = decode_skeleton_json(SKELETON, &atlas()).unwrap();
        let alt = definition.find_skin("alt").unwrap();
        let head_slot = definition.find_slot("head").unwrap();
        match alt.attachment(head_slot, "visor") {
            Some(Attachment::Mesh(mesh)) => {
                assert_eq!(mesh.vertices.len(), 3);
                assert_eq!(mesh.triangles, vec![0, 1, 2]);
                assert_eq!(mesh.parent_mesh.as_deref(), Some("head"));
            }
            other => panic!("expected a linked mesh, got {other:?}"),
        }
    }

    #[test]
    fn setup_bounds_cover_region_attachments() {
        let definition = decode_skeleton_json(SKELETON, &atlas()).unwrap();
        let bounds = definition.bounds(definition.default_skin(), &definition.setup_attachments());
        assert!(!bounds.is_degenerate());
        assert!((bounds.width() - 32.0).abs() < 1e-3);
        assert!((bounds.min.y - 4.0).abs() < 1e-3);
        assert!((bounds.max.y - 58.0).abs() < 1e-3);
    }

    #[test]
    fn legacy_skin_objects_are_accepted() {
        let text = r#"{ "bones": [ { "name": "root" } ], "slots": [ { "name": "s", "bone": "root" } ],
                       "skins": { "default": { "s": { "head": { "width": 32, "height": 16 } } } } }"#;
        let definition = decode_skeleton_json(text, &atlas()).unwrap();
        assert_eq!(definition.skins.len(), 1);
        assert!(definition.default_skin().unwrap().attachment(0, "head").is_some());
    }

    #[test]
    fn unknown_bone_reference_is_an_error() {
        let text = r#"{ "bones": [ { "name": "root" } ], "slots": [ { "name": "s", "bone": "arm" } ] }"#;
        let err = decode_skeleton_json(text, &atlas()).unwrap_err();
        assert!(format!("{err:#}").contains("Slot bone not found: arm"));
    }

    #[test]
    fn animation_referencing_unknown_bone_is_an_error() {
        let text = r#"{ "bones": [ { "name": "root" } ],
                       "animations": { "wave": { "bones": { "arm": { "rotate": [] } } } } }"#;
        let err = decode_skeleton_json(text, &atlas()).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("animation 'wave'"), "got {message}");
        assert!(message.contains("Bone not found: arm"));
    }

    #[test]
    fn missing_region_is_an_error() {
        let text = r#"{ "bones": [ { "name": "root" } ], "slots": [ { "name": "s", "bone": "root" } ],
                       "skins": [ { "name": "default", "attachments": { "s": { "cape": {} } } } ] }"#;
        let err = decode_skeleton_json(text, &atlas()).unwrap_err();
        assert!(format!("{err:#}").contains("Region not found in atlas: cape"));
    }

    #[test]
    fn oversized_vertex_counts_are_errors() {
        let text = r#"{ "bones": [ { "name": "root" } ], "slots": [ { "name": "s", "bone": "root" } ],
                       "skins": [ { "name": "default", "attachments": { "s": {
                           "clip": { "type": "clipping", "vertexCount": 1, "vertices": [1e20, 0, 0, 0, 0] }
                       } } } ] }"#;
        let err = decode_skeleton_json(text, &atlas()).unwrap_err();
        assert!(format!("{err:#}").contains("invalid bone count"), "got {err:#}");
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(decode_skeleton_json("{ not json", &atlas()).is_err());
        assert!(decode_skeleton_json("[]", &atlas()).is_err());
    }

    #[test]
    fn colors_parse_with_and_without_alpha() {
        assert_eq!(parse_color("ff000080").unwrap().w, 128.0 / 255.0);
        assert_eq!(parse_color("00ff00").unwrap(), Vec4::new(0.0, 1.0, 0.0, 1.0));
        assert!(parse_color("zz").is_err());
    }
}
