use super::atlas::{AtlasDescriptor, AtlasRegion};
use super::ImageHandle;
use anyhow::{anyhow, bail, Result};
use glam::{Affine2, Mat2, Vec2, Vec4};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransformMode {
    #[default]
    Normal,
    OnlyTranslation,
    NoRotationOrReflection,
    NoScale,
    NoScaleOrReflection,
}

impl TransformMode {
    pub const ALL: [TransformMode; 5] = [
        TransformMode::Normal,
        TransformMode::OnlyTranslation,
        TransformMode::NoRotationOrReflection,
        TransformMode::NoScale,
        TransformMode::NoScaleOrReflection,
    ];

    pub fn from_name(name: &str) -> Result<Self> {
        Ok(match name {
            "normal" => TransformMode::Normal,
            "onlyTranslation" => TransformMode::OnlyTranslation,
            "noRotationOrReflection" => TransformMode::NoRotationOrReflection,
            "noScale" => TransformMode::NoScale,
            "noScaleOrReflection" => TransformMode::NoScaleOrReflection,
            other => bail!("unknown bone transform mode '{other}'"),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    Normal,
    Additive,
    Multiply,
    Screen,
}

impl BlendMode {
    pub const ALL: [BlendMode; 4] = [BlendMode::Normal, BlendMode::Additive, BlendMode::Multiply, BlendMode::Screen];

    pub fn from_name(name: &str) -> Result<Self> {
        Ok(match name {
            "normal" => BlendMode::Normal,
            "additive" => BlendMode::Additive,
            "multiply" => BlendMode::Multiply,
            "screen" => BlendMode::Screen,
            other => bail!("unknown blend mode '{other}'"),
        })
    }
}

#[derive(Debug, Clone)]
pub struct BoneData {
    pub name: Arc<str>,
    pub parent: Option<usize>,
    pub length: f32,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub shear_x: f32,
    pub shear_y: f32,
    pub transform_mode: TransformMode,
    pub skin_required: bool,
}

impl BoneData {
    pub fn new(name: &str, parent: Option<usize>) -> Self {
        Self {
            name: Arc::from(name),
            parent,
            length: 0.0,
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            shear_x: 0.0,
            shear_y: 0.0,
            transform_mode: TransformMode::Normal,
            skin_required: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SlotData {
    pub name: Arc<str>,
    pub bone: usize,
    pub color: Vec4,
    pub dark_color: Option<Vec4>,
    pub attachment: Option<Arc<str>>,
    pub blend_mode: BlendMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Ik,
    Transform,
    Path,
}

/// Constraint header. `target` is a bone index for IK/transform constraints and a slot index for
/// path constraints.
#[derive(Debug, Clone)]
pub struct ConstraintData {
    pub name: Arc<str>,
    pub kind: ConstraintKind,
    pub order: i32,
    pub skin_required: bool,
    pub bones: Vec<usize>,
    pub target: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sequence {
    pub count: usize,
    pub start: i32,
    pub digits: usize,
    pub setup_index: usize,
}

impl Sequence {
    pub fn frame_path(&self, base: &str, index: usize) -> String {
        let frame = self.start + index as i32;
        format!("{base}{frame:0width$}", width = self.digits)
    }
}

/// Atlas regions backing an attachment: one per sequence frame, or exactly one.
#[derive(Debug, Clone, Default)]
pub struct RegionRefs {
    pub regions: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct RegionAttachment {
    pub name: Arc<str>,
    pub path: Arc<str>,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub width: f32,
    pub height: f32,
    pub color: Vec4,
    pub sequence: Option<Sequence>,
    pub regions: RegionRefs,
    /// Corner offsets in bone space: bottom-left, upper-left, upper-right, bottom-right.
    pub offsets: [Vec2; 4],
}

impl RegionAttachment {
    /// Computes corner offsets against `region`, honouring whitespace stripping.
    pub fn update_offsets(&mut self, region: &AtlasRegion) {
        let original_width = region.original_width.max(1) as f32;
        let original_height = region.original_height.max(1) as f32;
        let region_scale_x = self.width / original_width * self.scale_x;
        let region_scale_y = self.height / original_height * self.scale_y;
        let local_x = -self.width / 2.0 * self.scale_x + region.offset_x * region_scale_x;
        let local_y = -self.height / 2.0 * self.scale_y + region.offset_y * region_scale_y;
        let local_x2 = local_x + region.width as f32 * region_scale_x;
        let local_y2 = local_y + region.height as f32 * region_scale_y;
        let (sin, cos) = self.rotation.to_radians().sin_cos();
        let place = |x: f32, y: f32| Vec2::new(x * cos - y * sin + self.x, x * sin + y * cos + self.y);
        self.offsets =
            [place(local_x, local_y), place(local_x, local_y2), place(local_x2, local_y2), place(local_x2, local_y)];
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneInfluence {
    pub bone: usize,
    pub offset: Vec2,
    pub weight: f32,
}

#[derive(Debug, Clone)]
pub enum VertexData {
    Unweighted(Vec<Vec2>),
    Weighted(Vec<Vec<BoneInfluence>>),
}

impl VertexData {
    pub fn len(&self) -> usize {
        match self {
            VertexData::Unweighted(points) => points.len(),
            VertexData::Weighted(vertices) => vertices.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decodes Spine's flat vertex layout. When `flat.len() == vertex_count * 2` the vertices are
    /// unweighted; otherwise each vertex is `count, (bone, x, y, weight) * count`.
    pub fn from_flat(flat: &[f32], vertex_count: usize, bone_count: usize) -> Result<Self> {
        if vertex_count.checked_mul(2) == Some(flat.len()) {
            return Ok(VertexData::Unweighted(flat.chunks_exact(2).map(|pair| Vec2::new(pair[0], pair[1])).collect()));
        }
        if vertex_count > flat.len() {
            bail!("{vertex_count} weighted vertices cannot fit in {} values", flat.len());
        }
        let mut vertices = Vec::with_capacity(vertex_count);
        let mut cursor = 0;
        while cursor < flat.len() {
            let count = flat_index(flat[cursor], flat.len()).ok_or_else(|| {
                anyhow!("weighted vertex {} has an invalid bone count {}", vertices.len(), flat[cursor])
            })?;
            cursor += 1;
            let end = count
                .checked_mul(4)
                .and_then(|values| values.checked_add(cursor))
                .filter(|end| *end <= flat.len())
                .ok_or_else(|| anyhow!("weighted vertex data is truncated"))?;
            let mut influences = Vec::with_capacity(count);
            for chunk in flat[cursor..end].chunks_exact(4) {
                let bone = flat_index(chunk[0], bone_count)
                    .filter(|bone| *bone < bone_count)
                    .ok_or_else(|| anyhow!("weighted vertex references bone {} but the skeleton has {bone_count}", chunk[0]))?;
                influences.push(BoneInfluence { bone, offset: Vec2::new(chunk[1], chunk[2]), weight: chunk[3] });
            }
            vertices.push(influences);
            cursor = end;
        }
        if vertices.len() != vertex_count {
            bail!("expected {vertex_count} weighted vertices, found {}", vertices.len());
        }
        Ok(VertexData::Weighted(vertices))
    }

    /// World positions given bone world transforms. Unweighted vertices use `slot_bone`.
    pub fn world_positions(&self, slot_bone: usize, world: &[Affine2]) -> Vec<Vec2> {
        match self {
            VertexData::Unweighted(points) => {
                let transform = world.get(slot_bone).copied().unwrap_or(Affine2::IDENTITY);
                points.iter().map(|point| transform.transform_point2(*point)).collect()
            }
            VertexData::Weighted(vertices) => vertices
                .iter()
                .map(|influences| {
                    influences.iter().fold(Vec2::ZERO, |sum, influence| {
                        let transform = world.get(influence.bone).copied().unwrap_or(Affine2::IDENTITY);
                        sum + transform.transform_point2(influence.offset) * influence.weight
                    })
                })
                .collect(),
        }
    }
}

/// Whole number in `0..=max` stored as a float in flat vertex data.
fn flat_index(value: f32, max: usize) -> Option<usize> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > max as f32 {
        return None;
    }
    Some(value as usize).filter(|index| *index <= max)
}

#[derive(Debug, Clone)]
pub struct MeshAttachment {
    pub name: Arc<str>,
    pub path: Arc<str>,
    pub color: Vec4,
    pub vertices: VertexData,
    pub uvs: Vec<Vec2>,
    pub triangles: Vec<u16>,
    pub hull_length: usize,
    pub width: f32,
    pub height: f32,
    pub edges: Vec<u16>,
    pub sequence: Option<Sequence>,
    pub regions: RegionRefs,
    /// Set for linked meshes: the mesh whose geometry this one shares.
    pub parent_mesh: Option<Arc<str>>,
    pub inherit_timelines: bool,
}

#[derive(Debug, Clone)]
pub enum Attachment {
    Region(RegionAttachment),
    Mesh(MeshAttachment),
    BoundingBox { name: Arc<str>, vertices: VertexData, color: Vec4 },
    Path { name: Arc<str>, closed: bool, constant_speed: bool, lengths: Vec<f32>, vertices: VertexData },
    Point { name: Arc<str>, x: f32, y: f32, rotation: f32 },
    Clipping { name: Arc<str>, end_slot: Option<usize>, vertices: VertexData },
}

impl Attachment {
    pub fn name(&self) -> &str {
        match self {
            Attachment::Region(region) => region.name.as_ref(),
            Attachment::Mesh(mesh) => mesh.name.as_ref(),
            Attachment::BoundingBox { name, .. }
            | Attachment::Path { name, .. }
            | Attachment::Point { name, .. }
            | Attachment::Clipping { name, .. } => name.as_ref(),
        }
    }

    /// Whether the attachment draws textured geometry.
    pub fn is_visible(&self) -> bool {
        matches!(self, Attachment::Region(_) | Attachment::Mesh(_))
    }
}

#[derive(Debug, Clone)]
pub struct Skin {
    pub name: Arc<str>,
    pub attachments: HashMap<(usize, Arc<str>), Attachment>,
    pub bones: Vec<usize>,
    pub constraints: Vec<Arc<str>>,
}

impl Skin {
    pub fn new(name: &str) -> Self {
        Self { name: Arc::from(name), attachments: HashMap::new(), bones: Vec::new(), constraints: Vec::new() }
    }

    pub fn attachment(&self, slot: usize, name: &str) -> Option<&Attachment> {
        self.attachments.get(&(slot, Arc::from(name)))
    }

    pub fn set_attachment(&mut self, slot: usize, name: &str, attachment: Attachment) {
        self.attachments.insert((slot, Arc::from(name)), attachment);
    }
}

#[derive(Debug, Clone)]
pub struct EventData {
    pub name: Arc<str>,
    pub int_value: i32,
    pub float_value: f32,
    pub string_value: Option<Arc<str>>,
    pub audio_path: Option<Arc<str>>,
    pub volume: f32,
    pub balance: f32,
}

#[derive(Debug, Clone)]
pub struct AnimationData {
    pub name: Arc<str>,
    pub duration: f32,
    pub timeline_count: usize,
}

/// Axis-aligned box in skeleton space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl Bounds {
    pub const EMPTY: Bounds = Bounds { min: Vec2::ZERO, max: Vec2::ZERO };

    pub fn from_points(points: impl IntoIterator<Item = Vec2>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(Bounds { min: first, max: first }, |bounds, point| Bounds {
            min: bounds.min.min(point),
            max: bounds.max.max(point),
        }))
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.width() > 0.0 && self.height() > 0.0)
    }
}

/// Decoded, immutable skeleton data shared by every instance built from it.
#[derive(Debug, Clone)]
pub struct SkeletonDefinition {
    pub name: Arc<str>,
    pub hash: Option<Arc<str>>,
    pub version: Option<Arc<str>>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub fps: f32,
    pub images_path: Option<Arc<str>>,
    pub audio_path: Option<Arc<str>>,
    pub bones: Vec<BoneData>,
    pub slots: Vec<SlotData>,
    pub ik_constraints: Vec<ConstraintData>,
    pub transform_constraints: Vec<ConstraintData>,
    pub path_constraints: Vec<ConstraintData>,
    pub skins: Vec<Skin>,
    pub default_skin: Option<usize>,
    pub events: Vec<EventData>,
    pub animations: Vec<AnimationData>,
    /// Atlas the attachments' region indices point into.
    pub atlas: Arc<AtlasDescriptor>,
}

impl Default for SkeletonDefinition {
    fn default() -> Self {
        Self {
            name: Arc::from("skeleton"),
            hash: None,
            version: None,
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            fps: 30.0,
            images_path: None,
            audio_path: None,
            bones: Vec::new(),
            slots: Vec::new(),
            ik_constraints: Vec::new(),
            transform_constraints: Vec::new(),
            path_constraints: Vec::new(),
            skins: Vec::new(),
            default_skin: None,
            events: Vec::new(),
            animations: Vec::new(),
            atlas: Arc::new(AtlasDescriptor::default()),
        }
    }
}

impl SkeletonDefinition {
    pub fn find_bone(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|bone| &*bone.name == name)
    }

    pub fn find_slot(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|slot| &*slot.name == name)
    }

    pub fn find_skin(&self, name: &str) -> Option<&Skin> {
        self.skins.iter().find(|skin| &*skin.name == name)
    }

    pub fn find_animation(&self, name: &str) -> Option<&AnimationData> {
        self.animations.iter().find(|animation| &*animation.name == name)
    }

    pub fn find_event(&self, name: &str) -> Option<&EventData> {
        self.events.iter().find(|event| &*event.name == name)
    }

    pub fn default_skin(&self) -> Option<&Skin> {
        self.default_skin.and_then(|index| self.skins.get(index))
    }

    pub fn skin_names(&self) -> Vec<Arc<str>> {
        self.skins.iter().map(|skin| Arc::clone(&skin.name)).collect()
    }

    pub fn animation_names(&self) -> Vec<Arc<str>> {
        self.animations.iter().map(|animation| Arc::clone(&animation.name)).collect()
    }

    pub fn constraint_names(&self) -> impl Iterator<Item = &str> {
        self.ik_constraints
            .iter()
            .chain(&self.transform_constraints)
            .chain(&self.path_constraints)
            .map(|constraint| &*constraint.name)
    }

    /// Texture backing atlas region `region`, if its page resolved.
    pub fn region_texture(&self, region: usize) -> Option<ImageHandle> {
        let region = self.atlas.regions.get(region)?;
        self.atlas.page_of(region).and_then(|page| page.texture)
    }

    pub fn uses_texture(&self, handle: ImageHandle) -> bool {
        self.atlas.pages.iter().any(|page| page.texture == Some(handle))
    }

    /// Setup-pose attachment name per slot.
    pub fn setup_attachments(&self) -> Vec<Option<Arc<str>>> {
        self.slots.iter().map(|slot| slot.attachment.clone()).collect()
    }

    /// Resolves an attachment through `skin`, falling back to the default skin.
    pub fn attachment<'a>(&'a self, skin: Option<&'a Skin>, slot: usize, name: &str) -> Option<&'a Attachment> {
        skin.and_then(|skin| skin.attachment(slot, name))
            .or_else(|| self.default_skin().and_then(|default| default.attachment(slot, name)))
    }

    /// World transform of every bone in the setup pose with the skeleton at the origin.
    pub fn setup_world_transforms(&self) -> Vec<Affine2> {
        let mut world: Vec<Affine2> = Vec::with_capacity(self.bones.len());
        for bone in &self.bones {
            let parent = bone.parent.and_then(|index| world.get(index).copied());
            world.push(bone_world_transform(bone, parent));
        }
        world
    }

    /// Bounds of the visible attachments named by `slot_attachments` in the setup pose.
    pub fn bounds(&self, skin: Option<&Skin>, slot_attachments: &[Option<Arc<str>>]) -> Bounds {
        let world = self.setup_world_transforms();
        let mut points = Vec::new();
        for (slot_index, slot) in self.slots.iter().enumerate() {
            let Some(Some(name)) = slot_attachments.get(slot_index) else {
                continue;
            };
            let transform = world.get(slot.bone).copied().unwrap_or(Affine2::IDENTITY);
            match self.attachment(skin, slot_index, name) {
                Some(Attachment::Region(region)) => {
                    points.extend(region.offsets.iter().map(|corner| transform.transform_point2(*corner)));
                }
                Some(Attachment::Mesh(mesh)) => points.extend(mesh.vertices.world_positions(slot.bone, &world)),
                _ => {}
            }
        }
        Bounds::from_points(points).unwrap_or(Bounds::EMPTY)
    }
}

fn bone_world_transform(bone: &BoneData, parent: Option<Affine2>) -> Affine2 {
    let rotation_y = bone.rotation + 90.0 + bone.shear_y;
    let local = |rx: f32, ry: f32| {
        let (sin_x, cos_x) = rx.to_radians().sin_cos();
        let (sin_y, cos_y) = ry.to_radians().sin_cos();
        Mat2::from_cols(
            Vec2::new(cos_x * bone.scale_x, sin_x * bone.scale_x),
            Vec2::new(cos_y * bone.scale_y, sin_y * bone.scale_y),
        )
    };
    let Some(parent) = parent else {
        return Affine2::from_mat2_translation(
            local(bone.rotation + bone.shear_x, rotation_y),
            Vec2::new(bone.x, bone.y),
        );
    };

    let translation = parent.transform_point2(Vec2::new(bone.x, bone.y));
    let [pa, pc] = parent.matrix2.x_axis.to_array();
    let [pb, pd] = parent.matrix2.y_axis.to_array();
    let matrix = match bone.transform_mode {
        TransformMode::Normal => parent.matrix2 * local(bone.rotation + bone.shear_x, rotation_y),
        TransformMode::OnlyTranslation => local(bone.rotation + bone.shear_x, rotation_y),
        TransformMode::NoRotationOrReflection => {
            let s = pa * pa + pc * pc;
            let (pa, pb, pc, pd, prx) = if s > 0.0001 {
                let s = (pa * pd - pb * pc).abs() / s;
                (pa, pc * s, pc, pa * s, pc.atan2(pa).to_degrees())
            } else {
                (0.0, pb, 0.0, pd, 90.0 - pd.atan2(pb).to_degrees())
            };
            let rx = bone.rotation + bone.shear_x - prx;
            let ry = bone.rotation + bone.shear_y - prx + 90.0;
            let l = local(rx, ry);
            let [la, lc] = l.x_axis.to_array();
            let [lb, ld] = l.y_axis.to_array();
            Mat2::from_cols(
                Vec2::new(pa * la - pb * lc, pc * la + pd * lc),
                Vec2::new(pa * lb - pb * ld, pc * lb + pd * ld),
            )
        }
        TransformMode::NoScale | TransformMode::NoScaleOrReflection => {
            let (sin, cos) = bone.rotation.to_radians().sin_cos();
            let mut za = pa * cos + pb * sin;
            let mut zc = pc * cos + pd * sin;
            let mut s = (za * za + zc * zc).sqrt();
            if s > 0.00001 {
                s = 1.0 / s;
            }
            za *= s;
            zc *= s;
            s = (za * za + zc * zc).sqrt();
            if bone.transform_mode == TransformMode::NoScale && pa * pd - pb * pc < 0.0 {
                s = -s;
            }
            let r = std::f32::consts::FRAC_PI_2 + zc.atan2(za);
            let zb = r.cos() * s;
            let zd = r.sin() * s;
            let l = local(bone.shear_x, 90.0 + bone.shear_y);
            Mat2::from_cols(Vec2::new(za, zc), Vec2::new(zb, zd)) * l
        }
    };
    Affine2::from_mat2_translation(matrix, translation)
}

/// Looks up the regions an attachment path needs. A missing region is an error, as the atlas
/// attachment loader of the Spine runtimes treats it.
pub fn find_regions(atlas: &AtlasDescriptor, path: &str, sequence: Option<&Sequence>) -> Result<RegionRefs> {
    let find = |name: &str| {
        atlas
            .regions
            .iter()
            .position(|region| &*region.name == name)
            .ok_or_else(|| anyhow!("Region not found in atlas: {name}"))
    };
    let regions = match sequence {
        Some(sequence) => {
            (0..sequence.count).map(|index| find(&sequence.frame_path(path, index))).collect::<Result<Vec<_>>>()?
        }
        None => vec![find(path)?],
    };
    Ok(RegionRefs { regions })
}

/// Region used for the setup pose of a region or mesh attachment.
pub fn setup_region<'a>(atlas: &'a AtlasDescriptor, refs: &RegionRefs, sequence: Option<&Sequence>) -> Option<&'a AtlasRegion> {
    let index = sequence.map(|sequence| sequence.setup_index).unwrap_or(0);
    refs.regions.get(index).or_else(|| refs.regions.first()).and_then(|region| atlas.regions.get(*region))
}

/// Builds a region attachment and places its corners against the atlas.
pub fn load_region_attachment(atlas: &AtlasDescriptor, mut attachment: RegionAttachment) -> Result<RegionAttachment> {
    attachment.regions = find_regions(atlas, &attachment.path, attachment.sequence.as_ref())?;
    if let Some(region) = setup_region(atlas, &attachment.regions, attachment.sequence.as_ref()) {
        attachment.update_offsets(region);
    }
    Ok(attachment)
}

/// Resolves a mesh's regions and maps its region-space UVs into page space.
pub fn load_mesh_attachment(atlas: &AtlasDescriptor, mut mesh: MeshAttachment) -> Result<MeshAttachment> {
    mesh.regions = find_regions(atlas, &mesh.path, mesh.sequence.as_ref())?;
    if let Some(region) = setup_region(atlas, &mesh.regions, mesh.sequence.as_ref()) {
        mesh.uvs = page_uvs(region, &mesh.uvs);
    }
    Ok(mesh)
}

fn page_uvs(region: &AtlasRegion, region_uvs: &[Vec2]) -> Vec<Vec2> {
    let u = region.u;
    let v = region.v;
    let span = Vec2::new(region.u2 - u, region.v2 - v);
    region_uvs
        .iter()
        .map(|uv| {
            if region.rotated() {
                Vec2::new(u + uv.y * span.x, v + (1.0 - uv.x) * span.y)
            } else {
                Vec2::new(u, v) + *uv * span
            }
        })
        .collect()
}

/// A linked mesh waiting for its parent to be decoded.
#[derive(Debug, Clone)]
pub struct LinkedMesh {
    pub skin: usize,
    pub slot: usize,
    pub name: Arc<str>,
    pub parent: Arc<str>,
    pub parent_skin: Option<Arc<str>>,
}

/// Copies parent geometry into every linked mesh once all skins exist.
pub fn resolve_linked_meshes(
    skins: &mut [Skin],
    default_skin: Option<usize>,
    links: &[LinkedMesh],
) -> Result<()> {
    for link in links {
        let parent_skin = match &link.parent_skin {
            Some(name) => skins
                .iter()
                .position(|skin| skin.name == *name)
                .ok_or_else(|| anyhow!("linked mesh '{}' references unknown skin '{name}'", link.name))?,
            None => default_skin.unwrap_or(link.skin),
        };
        let parent = match skins.get(parent_skin).and_then(|skin| skin.attachment(link.slot, &link.parent)) {
            Some(Attachment::Mesh(parent)) => parent.clone(),
            Some(_) => bail!("linked mesh '{}' parent '{}' is not a mesh", link.name, link.parent),
            None => bail!("Parent mesh not found: {}", link.parent),
        };
        let Some(Attachment::Mesh(mesh)) =
            skins.get_mut(link.skin).and_then(|skin| skin.attachments.get_mut(&(link.slot, Arc::clone(&link.name))))
        else {
            bail!("linked mesh '{}' is missing from its skin", link.name);
        };
        mesh.vertices = parent.vertices.clone();
        mesh.triangles = parent.triangles.clone();
        mesh.hull_length = parent.hull_length;
        mesh.edges = parent.edges.clone();
        if mesh.uvs.is_empty() {
            mesh.uvs = parent.uvs.clone();
        }
        mesh.parent_mesh = Some(Arc::clone(&parent.name));
    }
    Ok(())
}
