use super::atlas::AtlasDescriptor;
use super::skeletal::{
    load_mesh_attachment, load_region_attachment, resolve_linked_meshes, AnimationData, Attachment, BlendMode,
    BoneData, BoneInfluence, ConstraintData, ConstraintKind, EventData, LinkedMesh, MeshAttachment,
    RegionAttachment, RegionRefs, Sequence, SkeletonDefinition, Skin, SlotData, TransformMode, VertexData,
};
use anyhow::{anyhow, bail, Context, Result};
use glam::{Vec2, Vec4};
use std::sync::Arc;

const ATTACHMENT_REGION: i8 = 0;
const ATTACHMENT_BOUNDING_BOX: i8 = 1;
const ATTACHMENT_MESH: i8 = 2;
const ATTACHMENT_LINKED_MESH: i8 = 3;
const ATTACHMENT_PATH: i8 = 4;
const ATTACHMENT_POINT: i8 = 5;
const ATTACHMENT_CLIPPING: i8 = 6;

const SLOT_ATTACHMENT: i8 = 0;
const SLOT_RGBA: i8 = 1;
const SLOT_RGB: i8 = 2;
const SLOT_RGBA2: i8 = 3;
const SLOT_RGB2: i8 = 4;
const SLOT_ALPHA: i8 = 5;

const PATH_POSITION: i8 = 0;
const PATH_SPACING: i8 = 1;
const PATH_MIX: i8 = 2;

const DEFORM_VERTICES: i8 = 0;
const DEFORM_SEQUENCE: i8 = 1;

const CURVE_LINEAR: i8 = 0;
const CURVE_STEPPED: i8 = 1;
const CURVE_BEZIER: i8 = 2;

/// Big-endian cursor over a `.skel` payload with the string table read from the header.
struct BinaryInput<'a> {
    data: &'a [u8],
    position: usize,
    strings: Vec<Arc<str>>,
}

impl<'a> BinaryInput<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0, strings: Vec::new() }
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        let end = self.position.checked_add(count).filter(|end| *end <= self.data.len()).ok_or_else(|| {
            anyhow!("unexpected end of skeleton data at byte {} (needed {count} more)", self.position)
        })?;
        let bytes = &self.data[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    fn read_i16(&mut self) -> Result<i16> {
        let bytes = self.take(2)?;
        Ok(i16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn read_i32(&mut self) -> Result<i32> {
        let bytes = self.take(4)?;
        Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_f32(&mut self) -> Result<f32> {
        let bytes = self.take(4)?;
        Ok(f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Variable-length integer, 7 bits per byte. Without `optimize_positive` the value is
    /// zigzag encoded.
    fn read_varint(&mut self, optimize_positive: bool) -> Result<i32> {
        let mut result: u32 = 0;
        for shift in [0u32, 7, 14, 21] {
            let byte = self.read_u8()?;
            result |= u32::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(finish_varint(result, optimize_positive));
            }
        }
        let byte = self.read_u8()?;
        result |= u32::from(byte) << 28;
        Ok(finish_varint(result, optimize_positive))
    }

    /// A count or index. Counts larger than the bytes left cannot be valid.
    fn read_count(&mut self) -> Result<usize> {
        let value = self.read_varint(true)?;
        let count = usize::try_from(value).map_err(|_| anyhow!("negative count {value} at byte {}", self.position))?;
        if count > self.data.len() {
            bail!("count {count} at byte {} exceeds the payload size", self.position);
        }
        Ok(count)
    }

    fn read_string(&mut self) -> Result<Option<String>> {
        let length = self.read_count()?;
        match length {
            0 => Ok(None),
            1 => Ok(Some(String::new())),
            _ => {
                let bytes = self.take(length - 1)?;
                let text = std::str::from_utf8(bytes).context("string is not valid UTF-8")?;
                Ok(Some(text.to_string()))
            }
        }
    }

    fn read_string_ref(&mut self) -> Result<Option<Arc<str>>> {
        let index = self.read_count()?;
        if index == 0 {
            return Ok(None);
        }
        self.strings
            .get(index - 1)
            .cloned()
            .map(Some)
            .ok_or_else(|| anyhow!("string reference {index} is outside the table of {}", self.strings.len()))
    }

    fn read_floats(&mut self, count: usize) -> Result<Vec<f32>> {
        if count.saturating_mul(4) > self.remaining() {
            bail!("float array of {count} at byte {} runs past the end", self.position);
        }
        (0..count).map(|_| self.read_f32()).collect()
    }

    fn read_shorts(&mut self) -> Result<Vec<u16>> {
        let count = self.read_count()?;
        (0..count).map(|_| self.read_i16().map(|value| value as u16)).collect()
    }

    fn read_color(&mut self) -> Result<Vec4> {
        Ok(rgba8888(self.read_i32()? as u32))
    }
}

fn finish_varint(result: u32, optimize_positive: bool) -> i32 {
    if optimize_positive {
        result as i32
    } else {
        ((result >> 1) as i32) ^ -((result & 1) as i32)
    }
}

fn rgba8888(value: u32) -> Vec4 {
    let channel = |shift: u32| ((value >> shift) & 0xFF) as f32 / 255.0;
    Vec4::new(channel(24), channel(16), channel(8), channel(0))
}

fn rgb888(value: u32) -> Vec4 {
    let channel = |shift: u32| ((value >> shift) & 0xFF) as f32 / 255.0;
    Vec4::new(channel(16), channel(8), channel(0), 1.0)
}

fn checked_index(index: usize, len: usize, what: &str) -> Result<usize> {
    if index < len {
        Ok(index)
    } else {
        bail!("{what} index {index} out of range ({len} defined)")
    }
}

/// Decodes a Spine 4.1 binary skeleton, resolving region and mesh attachments against `atlas`.
pub fn decode_skeleton_binary(bytes: &[u8], atlas: &AtlasDescriptor) -> Result<SkeletonDefinition> {
    let mut input = BinaryInput::new(bytes);
    let mut definition = SkeletonDefinition::default();

    let low_hash = input.read_i32().context("header")?;
    let high_hash = input.read_i32().context("header")?;
    if low_hash != 0 || high_hash != 0 {
        definition.hash = Some(Arc::from(format!("{:x}{:x}", high_hash as u32, low_hash as u32)));
    }
    definition.version = input.read_string().context("header")?.map(Arc::from);
    if let Some(version) = &definition.version {
        if !version.is_empty() && !version.starts_with("4.") {
            bail!("unsupported skeleton binary version {version}; export with Spine 4.x");
        }
    }
    definition.x = input.read_f32()?;
    definition.y = input.read_f32()?;
    definition.width = input.read_f32()?;
    definition.height = input.read_f32()?;
    let nonessential = input.read_bool()?;
    if nonessential {
        definition.fps = input.read_f32()?;
        definition.images_path = input.read_string()?.map(Arc::from);
        definition.audio_path = input.read_string()?.map(Arc::from);
    }

    let string_count = input.read_count().context("string table")?;
    for _ in 0..string_count {
        let text = input.read_string().context("string table")?.unwrap_or_default();
        input.strings.push(Arc::from(text));
    }

    read_bones(&mut input, &mut definition, nonessential).context("bones")?;
    read_slots(&mut input, &mut definition).context("slots")?;
    read_constraints(&mut input, &mut definition).context("constraints")?;

    let mut links = Vec::new();
    if let Some(skin) = read_skin(&mut input, &definition, 0, true, nonessential, atlas, &mut links)
        .context("default skin")?
    {
        definition.default_skin = Some(0);
        definition.skins.push(skin);
    }
    let skin_count = input.read_count().context("skins")?;
    for _ in 0..skin_count {
        let index = definition.skins.len();
        if let Some(skin) = read_skin(&mut input, &definition, index, false, nonessential, atlas, &mut links)
            .with_context(|| format!("skin #{index}"))?
        {
            definition.skins.push(skin);
        }
    }
    resolve_linked_meshes(&mut definition.skins, definition.default_skin, &links)?;

    let event_count = input.read_count().context("events")?;
    for _ in 0..event_count {
        let name = input.read_string_ref()?.ok_or_else(|| anyhow!("event without a name"))?;
        let int_value = input.read_varint(false)?;
        let float_value = input.read_f32()?;
        let string_value = input.read_string()?.map(Arc::from);
        let audio_path: Option<Arc<str>> = input.read_string()?.map(Arc::from);
        let (volume, balance) =
            if audio_path.is_some() { (input.read_f32()?, input.read_f32()?) } else { (1.0, 0.0) };
        definition.events.push(EventData { name, int_value, float_value, string_value, audio_path, volume, balance });
    }

    let animation_count = input.read_count().context("animations")?;
    for _ in 0..animation_count {
        let name = input.read_string()?.unwrap_or_default();
        let animation = read_animation(&mut input, &definition, &name).with_context(|| format!("animation '{name}'"))?;
        definition.animations.push(animation);
    }

    Ok(definition)
}

fn read_bones(input: &mut BinaryInput<'_>, definition: &mut SkeletonDefinition, nonessential: bool) -> Result<()> {
    let count = input.read_count()?;
    for index in 0..count {
        let name = input.read_string()?.unwrap_or_default();
        let parent = if index == 0 { None } else { Some(checked_index(input.read_count()?, index, "parent bone")?) };
        let mut bone = BoneData::new(&name, parent);
        bone.rotation = input.read_f32()?;
        bone.x = input.read_f32()?;
        bone.y = input.read_f32()?;
        bone.scale_x = input.read_f32()?;
        bone.scale_y = input.read_f32()?;
        bone.shear_x = input.read_f32()?;
        bone.shear_y = input.read_f32()?;
        bone.length = input.read_f32()?;
        let mode = input.read_count()?;
        bone.transform_mode = *TransformMode::ALL
            .get(mode)
            .ok_or_else(|| anyhow!("bone '{name}' has unknown transform mode {mode}"))?;
        bone.skin_required = input.read_bool()?;
        if nonessential {
            input.read_i32()?;
        }
        definition.bones.push(bone);
    }
    Ok(())
}

fn read_slots(input: &mut BinaryInput<'_>, definition: &mut SkeletonDefinition) -> Result<()> {
    let count = input.read_count()?;
    for _ in 0..count {
        let name = input.read_string()?.unwrap_or_default();
        let bone = checked_index(input.read_count()?, definition.bones.len(), "slot bone")?;
        let color = input.read_color()?;
        let dark = input.read_i32()?;
        let dark_color = (dark != -1).then(|| rgb888(dark as u32));
        let attachment = input.read_string_ref()?;
        let blend = input.read_count()?;
        let blend_mode =
            *BlendMode::ALL.get(blend).ok_or_else(|| anyhow!("slot '{name}' has unknown blend mode {blend}"))?;
        definition.slots.push(SlotData { name: Arc::from(name), bone, color, dark_color, attachment, blend_mode });
    }
    Ok(())
}

fn read_constraint_header(
    input: &mut BinaryInput<'_>,
    definition: &SkeletonDefinition,
    kind: ConstraintKind,
) -> Result<ConstraintData> {
    let name = input.read_string()?.unwrap_or_default();
    let order = input.read_count()? as i32;
    let skin_required = input.read_bool()?;
    let bone_count = input.read_count()?;
    let bones = (0..bone_count)
        .map(|_| checked_index(input.read_count()?, definition.bones.len(), "constraint bone"))
        .collect::<Result<Vec<_>>>()?;
    let target = input.read_count()?;
    let target = match kind {
        ConstraintKind::Path => checked_index(target, definition.slots.len(), "path target slot")?,
        ConstraintKind::Ik | ConstraintKind::Transform => {
            checked_index(target, definition.bones.len(), "constraint target bone")?
        }
    };
    Ok(ConstraintData { name: Arc::from(name), kind, order, skin_required, bones, target })
}

fn read_constraints(input: &mut BinaryInput<'_>, definition: &mut SkeletonDefinition) -> Result<()> {
    let ik_count = input.read_count()?;
    for _ in 0..ik_count {
        let constraint = read_constraint_header(input, definition, ConstraintKind::Ik)?;
        // mix, softness, bend direction, compress, stretch, uniform
        input.read_f32()?;
        input.read_f32()?;
        input.read_i8()?;
        input.read_bool()?;
        input.read_bool()?;
        input.read_bool()?;
        definition.ik_constraints.push(constraint);
    }

    let transform_count = input.read_count()?;
    for _ in 0..transform_count {
        let constraint = read_constraint_header(input, definition, ConstraintKind::Transform)?;
        // local, relative, six offsets, six mixes
        input.read_bool()?;
        input.read_bool()?;
        input.read_floats(12)?;
        definition.transform_constraints.push(constraint);
    }

    let path_count = input.read_count()?;
    for _ in 0..path_count {
        let constraint = read_constraint_header(input, definition, ConstraintKind::Path)?;
        // position, spacing and rotate modes, then offset rotation, position, spacing, three mixes
        input.read_count()?;
        input.read_count()?;
        input.read_count()?;
        input.read_floats(6)?;
        definition.path_constraints.push(constraint);
    }
    Ok(())
}

fn read_skin(
    input: &mut BinaryInput<'_>,
    definition: &SkeletonDefinition,
    skin_index: usize,
    default_skin: bool,
    nonessential: bool,
    atlas: &AtlasDescriptor,
    links: &mut Vec<LinkedMesh>,
) -> Result<Option<Skin>> {
    let (mut skin, slot_count) = if default_skin {
        let slot_count = input.read_count()?;
        if slot_count == 0 {
            return Ok(None);
        }
        (Skin::new("default"), slot_count)
    } else {
        let name = input.read_string_ref()?.ok_or_else(|| anyhow!("skin without a name"))?;
        let mut skin = Skin::new(&name);
        let bone_count = input.read_count()?;
        for _ in 0..bone_count {
            skin.bones.push(checked_index(input.read_count()?, definition.bones.len(), "skin bone")?);
        }
        let constraint_groups =
            [&definition.ik_constraints, &definition.transform_constraints, &definition.path_constraints];
        for constraints in constraint_groups {
            let count = input.read_count()?;
            for _ in 0..count {
                let index = checked_index(input.read_count()?, constraints.len(), "skin constraint")?;
                skin.constraints.push(Arc::clone(&constraints[index].name));
            }
        }
        (skin, input.read_count()?)
    };

    for _ in 0..slot_count {
        let slot = checked_index(input.read_count()?, definition.slots.len(), "skin slot")?;
        let attachment_count = input.read_count()?;
        for _ in 0..attachment_count {
            let key = input.read_string_ref()?.ok_or_else(|| anyhow!("attachment without a name"))?;
            let (attachment, link) = read_attachment(input, definition, &key, nonessential, atlas)
                .with_context(|| format!("attachment '{key}' in slot '{}'", definition.slots[slot].name))?;
            if let Some((parent, parent_skin)) = link {
                links.push(LinkedMesh { skin: skin_index, slot, name: Arc::clone(&key), parent, parent_skin });
            }
            skin.set_attachment(slot, &key, attachment);
        }
    }
    Ok(Some(skin))
}

type LinkRequest = Option<(Arc<str>, Option<Arc<str>>)>;

fn read_sequence(input: &mut BinaryInput<'_>) -> Result<Option<Sequence>> {
    if !input.read_bool()? {
        return Ok(None);
    }
    let count = input.read_count()?;
    let start = input.read_count()? as i32;
    let digits = input.read_count()?;
    let setup_index = input.read_count()?;
    Ok(Some(Sequence { count, start, digits, setup_index }))
}

fn read_vertices(input: &mut BinaryInput<'_>, vertex_count: usize, bone_count: usize) -> Result<VertexData> {
    if !input.read_bool()? {
        let flat = input.read_floats(vertex_count * 2)?;
        return VertexData::from_flat(&flat, vertex_count, bone_count);
    }
    let mut vertices = Vec::with_capacity(vertex_count.min(input.remaining()));
    for _ in 0..vertex_count {
        let influence_count = input.read_count()?;
        let mut influences = Vec::with_capacity(influence_count.min(input.remaining()));
        for _ in 0..influence_count {
            let bone = checked_index(input.read_count()?, bone_count, "vertex bone")?;
            let offset = Vec2::new(input.read_f32()?, input.read_f32()?);
            let weight = input.read_f32()?;
            influences.push(BoneInfluence { bone, offset, weight });
        }
        vertices.push(influences);
    }
    Ok(VertexData::Weighted(vertices))
}

fn read_attachment(
    input: &mut BinaryInput<'_>,
    definition: &SkeletonDefinition,
    key: &Arc<str>,
    nonessential: bool,
    atlas: &AtlasDescriptor,
) -> Result<(Attachment, LinkRequest)> {
    let name = input.read_string_ref()?.unwrap_or_else(|| Arc::clone(key));
    let bone_count = definition.bones.len();
    let kind = input.read_i8()?;
    Ok(match kind {
        ATTACHMENT_REGION => {
            let path = input.read_string_ref()?.unwrap_or_else(|| Arc::clone(&name));
            let rotation = input.read_f32()?;
            let x = input.read_f32()?;
            let y = input.read_f32()?;
            let scale_x = input.read_f32()?;
            let scale_y = input.read_f32()?;
            let width = input.read_f32()?;
            let height = input.read_f32()?;
            let color = input.read_color()?;
            let sequence = read_sequence(input)?;
            let region = RegionAttachment {
                name,
                path,
                x,
                y,
                rotation,
                scale_x,
                scale_y,
                width,
                height,
                color,
                sequence,
                regions: RegionRefs::default(),
                offsets: [Vec2::ZERO; 4],
            };
            (Attachment::Region(load_region_attachment(atlas, region)?), None)
        }
        ATTACHMENT_BOUNDING_BOX => {
            let vertex_count = input.read_count()?;
            let vertices = read_vertices(input, vertex_count, bone_count)?;
            let color = if nonessential { input.read_color()? } else { Vec4::ZERO };
            (Attachment::BoundingBox { name, vertices, color }, None)
        }
        ATTACHMENT_MESH => {
            let path = input.read_string_ref()?.unwrap_or_else(|| Arc::clone(&name));
            let color = input.read_color()?;
            let vertex_count = input.read_count()?;
            let uvs = input.read_floats(vertex_count * 2)?;
            let triangles = input.read_shorts()?;
            let vertices = read_vertices(input, vertex_count, bone_count)?;
            let hull_length = input.read_count()?;
            let sequence = read_sequence(input)?;
            let (edges, width, height) = if nonessential {
                (input.read_shorts()?, input.read_f32()?, input.read_f32()?)
            } else {
                (Vec::new(), 0.0, 0.0)
            };
            let mesh = MeshAttachment {
                name,
                path,
                color,
                vertices,
                uvs: uvs.chunks_exact(2).map(|pair| Vec2::new(pair[0], pair[1])).collect(),
                triangles,
                hull_length,
                width,
                height,
                edges,
                sequence,
                regions: RegionRefs::default(),
                parent_mesh: None,
                inherit_timelines: true,
            };
            (Attachment::Mesh(load_mesh_attachment(atlas, mesh)?), None)
        }
        ATTACHMENT_LINKED_MESH => {
            let path = input.read_string_ref()?.unwrap_or_else(|| Arc::clone(&name));
            let color = input.read_color()?;
            let parent_skin = input.read_string_ref()?;
            let parent = input.read_string_ref()?.ok_or_else(|| anyhow!("linked mesh has no parent"))?;
            let inherit_timelines = input.read_bool()?;
            let sequence = read_sequence(input)?;
            let (width, height) = if nonessential { (input.read_f32()?, input.read_f32()?) } else { (0.0, 0.0) };
            let mesh = MeshAttachment {
                name,
                path,
                color,
                vertices: VertexData::Unweighted(Vec::new()),
                uvs: Vec::new(),
                triangles: Vec::new(),
                hull_length: 0,
                width,
                height,
                edges: Vec::new(),
                sequence,
                regions: RegionRefs::default(),
                parent_mesh: None,
                inherit_timelines,
            };
            (Attachment::Mesh(load_mesh_attachment(atlas, mesh)?), Some((parent, parent_skin)))
        }
        ATTACHMENT_PATH => {
            let closed = input.read_bool()?;
            let constant_speed = input.read_bool()?;
            let vertex_count = input.read_count()?;
            let vertices = read_vertices(input, vertex_count, bone_count)?;
            let lengths = input.read_floats(vertex_count / 3)?;
            if nonessential {
                input.read_i32()?;
            }
            (Attachment::Path { name, closed, constant_speed, lengths, vertices }, None)
        }
        ATTACHMENT_POINT => {
            let rotation = input.read_f32()?;
            let x = input.read_f32()?;
            let y = input.read_f32()?;
            if nonessential {
                input.read_i32()?;
            }
            (Attachment::Point { name, x, y, rotation }, None)
        }
        ATTACHMENT_CLIPPING => {
            let end_slot = checked_index(input.read_count()?, definition.slots.len(), "clipping end slot")?;
            let vertex_count = input.read_count()?;
            let vertices = read_vertices(input, vertex_count, bone_count)?;
            if nonessential {
                input.read_i32()?;
            }
            (Attachment::Clipping { name, end_slot: Some(end_slot), vertices }, None)
        }
        other => bail!("unknown attachment type {other}"),
    })
}

/// Walks an animation's timelines, validating every reference. Keyframe values are skipped; only
/// the duration and timeline count are kept.
struct AnimationReader<'i, 'a> {
    input: &'i mut BinaryInput<'a>,
    duration: f32,
    timelines: usize,
}

impl AnimationReader<'_, '_> {
    fn time(&mut self) -> Result<f32> {
        let time = self.input.read_f32()?;
        self.duration = self.duration.max(time);
        Ok(time)
    }

    /// A curve timeline: each frame is `time` followed by `channels` values of `value_size` bytes.
    /// Every frame after the first is followed by the curve joining it to its predecessor.
    fn curve_timeline(&mut self, frame_count: usize, channels: usize, value_size: usize) -> Result<()> {
        self.timelines += 1;
        self.time()?;
        self.input.take(channels * value_size)?;
        for _ in 1..frame_count {
            self.time()?;
            self.input.take(channels * value_size)?;
            self.curve(channels)?;
        }
        Ok(())
    }

    fn curve(&mut self, channels: usize) -> Result<()> {
        match self.input.read_i8()? {
            CURVE_LINEAR | CURVE_STEPPED => Ok(()),
            CURVE_BEZIER => self.input.take(channels * 16).map(|_| ()),
            other => bail!("unknown curve type {other}"),
        }
    }
}

fn read_deform_frame(input: &mut BinaryInput<'_>) -> Result<()> {
    let length = input.read_count()?;
    if length != 0 {
        // start offset
        input.read_count()?;
        input.read_floats(length)?;
    }
    Ok(())
}

fn read_animation(input: &mut BinaryInput<'_>, definition: &SkeletonDefinition, name: &str) -> Result<AnimationData> {
    input.read_count()?;
    let mut reader = AnimationReader { input, duration: 0.0, timelines: 0 };

    let slot_count = reader.input.read_count()?;
    for _ in 0..slot_count {
        checked_index(reader.input.read_count()?, definition.slots.len(), "animated slot")?;
        let timeline_count = reader.input.read_count()?;
        for _ in 0..timeline_count {
            let kind = reader.input.read_i8()?;
            let frame_count = reader.input.read_count()?;
            if kind == SLOT_ATTACHMENT {
                reader.timelines += 1;
                for _ in 0..frame_count {
                    reader.time()?;
                    reader.input.read_string_ref()?;
                }
                continue;
            }
            reader.input.read_count()?;
            let channels = match kind {
                SLOT_RGBA => 4,
                SLOT_RGB => 3,
                SLOT_RGBA2 => 7,
                SLOT_RGB2 => 6,
                SLOT_ALPHA => 1,
                other => bail!("unknown slot timeline type {other}"),
            };
            reader.curve_timeline(frame_count, channels, 1)?;
        }
    }

    let bone_count = reader.input.read_count()?;
    for _ in 0..bone_count {
        checked_index(reader.input.read_count()?, definition.bones.len(), "animated bone")?;
        let timeline_count = reader.input.read_count()?;
        for _ in 0..timeline_count {
            let kind = reader.input.read_i8()?;
            let frame_count = reader.input.read_count()?;
            reader.input.read_count()?;
            let channels = match kind {
                0 | 2 | 3 | 5 | 6 | 8 | 9 => 1,
                1 | 4 | 7 => 2,
                other => bail!("unknown bone timeline type {other}"),
            };
            reader.curve_timeline(frame_count, channels, 4)?;
        }
    }

    let ik_count = reader.input.read_count()?;
    for _ in 0..ik_count {
        checked_index(reader.input.read_count()?, definition.ik_constraints.len(), "animated IK constraint")?;
        let frame_count = reader.input.read_count()?;
        reader.input.read_count()?;
        reader.timelines += 1;
        // time, mix, softness; then bend direction, compress, stretch
        reader.time()?;
        reader.input.take(8)?;
        reader.input.take(3)?;
        for _ in 1..frame_count {
            reader.time()?;
            reader.input.take(8)?;
            reader.curve(2)?;
            reader.input.take(3)?;
        }
    }

    let transform_count = reader.input.read_count()?;
    for _ in 0..transform_count {
        checked_index(
            reader.input.read_count()?,
            definition.transform_constraints.len(),
            "animated transform constraint",
        )?;
        let frame_count = reader.input.read_count()?;
        reader.input.read_count()?;
        reader.curve_timeline(frame_count, 6, 4)?;
    }

    let path_count = reader.input.read_count()?;
    for _ in 0..path_count {
        checked_index(reader.input.read_count()?, definition.path_constraints.len(), "animated path constraint")?;
        let timeline_count = reader.input.read_count()?;
        for _ in 0..timeline_count {
            let kind = reader.input.read_i8()?;
            let frame_count = reader.input.read_count()?;
            reader.input.read_count()?;
            let channels = match kind {
                PATH_POSITION | PATH_SPACING => 1,
                PATH_MIX => 3,
                other => bail!("unknown path timeline type {other}"),
            };
            reader.curve_timeline(frame_count, channels, 4)?;
        }
    }

    let deform_skins = reader.input.read_count()?;
    for _ in 0..deform_skins {
        let skin_index = checked_index(reader.input.read_count()?, definition.skins.len(), "animated skin")?;
        let skin = &definition.skins[skin_index];
        let slot_count = reader.input.read_count()?;
        for _ in 0..slot_count {
            let slot = checked_index(reader.input.read_count()?, definition.slots.len(), "animated slot")?;
            let attachment_count = reader.input.read_count()?;
            for _ in 0..attachment_count {
                let attachment = reader.input.read_string_ref()?.unwrap_or_else(|| Arc::from(""));
                if skin.attachment(slot, &attachment).is_none() {
                    bail!("Deform attachment not found: {attachment}");
                }
                let kind = reader.input.read_i8()?;
                let frame_count = reader.input.read_count()?;
                reader.timelines += 1;
                match kind {
                    DEFORM_VERTICES => {
                        reader.input.read_count()?;
                        reader.time()?;
                        read_deform_frame(reader.input)?;
                        for _ in 1..frame_count {
                            reader.time()?;
                            reader.curve(1)?;
                            read_deform_frame(reader.input)?;
                        }
                    }
                    DEFORM_SEQUENCE => {
                        for _ in 0..frame_count {
                            reader.time()?;
                            reader.input.read_i32()?;
                            reader.input.read_f32()?;
                        }
                    }
                    other => bail!("unknown attachment timeline type {other}"),
                }
            }
        }
    }

    let draw_order_count = reader.input.read_count()?;
    if draw_order_count > 0 {
        reader.timelines += 1;
        for _ in 0..draw_order_count {
            reader.time()?;
            let offset_count = reader.input.read_count()?;
            for _ in 0..offset_count {
                checked_index(reader.input.read_count()?, definition.slots.len(), "draw order slot")?;
                reader.input.read_count()?;
            }
        }
    }

    let event_count = reader.input.read_count()?;
    if event_count > 0 {
        reader.timelines += 1;
        for _ in 0..event_count {
            reader.time()?;
            let event = checked_index(reader.input.read_count()?, definition.events.len(), "event")?;
            reader.input.read_varint(false)?;
            reader.input.read_f32()?;
            if reader.input.read_bool()? {
                reader.input.read_string()?;
            }
            if definition.events[event].audio_path.is_some() {
                reader.input.read_f32()?;
                reader.input.read_f32()?;
            }
        }
    }

    Ok(AnimationData { name: Arc::from(name), duration: reader.duration, timeline_count: reader.timelines })
}
