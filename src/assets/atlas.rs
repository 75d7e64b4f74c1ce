use super::ImageHandle;
use anyhow::{anyhow, bail, Context, Result};
use std::sync::Arc;

/// Synchronous page-name lookup handed to [`parse_atlas`].
pub trait TextureLookup {
    fn lookup(&self, name: &str) -> Option<ImageHandle>;
}

impl<F> TextureLookup for F
where
    F: Fn(&str) -> Option<ImageHandle>,
{
    fn lookup(&self, name: &str) -> Option<ImageHandle> {
        self(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureFilter {
    #[default]
    Nearest,
    Linear,
    MipMap,
    MipMapNearestNearest,
    MipMapLinearNearest,
    MipMapNearestLinear,
    MipMapLinearLinear,
}

impl TextureFilter {
    fn parse(value: &str) -> Result<Self> {
        Ok(match value {
            "Nearest" => TextureFilter::Nearest,
            "Linear" => TextureFilter::Linear,
            "MipMap" => TextureFilter::MipMap,
            "MipMapNearestNearest" => TextureFilter::MipMapNearestNearest,
            "MipMapLinearNearest" => TextureFilter::MipMapLinearNearest,
            "MipMapNearestLinear" => TextureFilter::MipMapNearestLinear,
            "MipMapLinearLinear" => TextureFilter::MipMapLinearLinear,
            other => bail!("unknown texture filter '{other}'"),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureWrap {
    #[default]
    ClampToEdge,
    Repeat,
}

#[derive(Debug, Clone)]
pub struct AtlasPage {
    pub name: Arc<str>,
    pub texture: Option<ImageHandle>,
    pub width: u32,
    pub height: u32,
    pub format: Arc<str>,
    pub min_filter: TextureFilter,
    pub mag_filter: TextureFilter,
    pub wrap_u: TextureWrap,
    pub wrap_v: TextureWrap,
    pub pma: bool,
}

impl AtlasPage {
    fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            texture: None,
            width: 0,
            height: 0,
            format: Arc::from("RGBA8888"),
            min_filter: TextureFilter::Nearest,
            mag_filter: TextureFilter::Nearest,
            wrap_u: TextureWrap::ClampToEdge,
            wrap_v: TextureWrap::ClampToEdge,
            pma: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AtlasRegion {
    pub name: Arc<str>,
    pub page: usize,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub original_width: u32,
    pub original_height: u32,
    pub degrees: i32,
    pub index: i32,
    pub u: f32,
    pub v: f32,
    pub u2: f32,
    pub v2: f32,
    /// Fields this parser does not interpret (`split`, `pad`, custom keys).
    pub extra: Vec<(Arc<str>, Vec<i32>)>,
}

impl AtlasRegion {
    pub fn rotated(&self) -> bool {
        self.degrees == 90
    }
}

#[derive(Debug, Clone, Default)]
pub struct AtlasDescriptor {
    pub pages: Vec<AtlasPage>,
    pub regions: Vec<AtlasRegion>,
}

impl AtlasDescriptor {
    pub fn find_region(&self, name: &str) -> Option<&AtlasRegion> {
        self.regions.iter().find(|region| &*region.name == name)
    }

    pub fn page_of(&self, region: &AtlasRegion) -> Option<&AtlasPage> {
        self.pages.get(region.page)
    }

    /// Pages whose image could not be resolved.
    pub fn pages_without_texture(&self) -> impl Iterator<Item = &AtlasPage> {
        self.pages.iter().filter(|page| page.texture.is_none())
    }
}

/// Parses the Spine text atlas format. Each page name is passed to `textures`; pages it cannot
/// resolve keep `texture: None`.
pub fn parse_atlas(text: &str, textures: &dyn TextureLookup) -> Result<AtlasDescriptor> {
    let mut lines = text.lines().enumerate().map(|(index, line)| (index + 1, line)).peekable();
    let mut atlas = AtlasDescriptor::default();

    // Optional header entries before the first page.
    while lines.peek().is_some_and(|(_, line)| line.trim().is_empty()) {
        lines.next();
    }
    while let Some((_, line)) = lines.peek() {
        if line.trim().is_empty() || read_entry(line).is_none() {
            break;
        }
        lines.next();
    }

    let mut current_page: Option<usize> = None;
    while let Some((number, line)) = lines.next() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            current_page = None;
            continue;
        }
        match current_page {
            None => {
                let mut page = AtlasPage::new(trimmed);
                while let Some((number, entry)) = next_entry(&mut lines) {
                    apply_page_field(&mut page, &entry)
                        .with_context(|| format!("atlas line {number}: page '{}'", page.name))?;
                }
                page.texture = textures.lookup(&page.name);
                if let Some(texture) = page.texture {
                    if page.width == 0 || page.height == 0 {
                        page.width = texture.width();
                        page.height = texture.height();
                    }
                }
                atlas.pages.push(page);
                current_page = Some(atlas.pages.len() - 1);
            }
            Some(page_index) => {
                let mut region = AtlasRegion {
                    name: Arc::from(trimmed),
                    page: page_index,
                    x: 0,
                    y: 0,
                    width: 0,
                    height: 0,
                    offset_x: 0.0,
                    offset_y: 0.0,
                    original_width: 0,
                    original_height: 0,
                    degrees: 0,
                    index: -1,
                    u: 0.0,
                    v: 0.0,
                    u2: 0.0,
                    v2: 0.0,
                    extra: Vec::new(),
                };
                while let Some((field_line, entry)) = next_entry(&mut lines) {
                    apply_region_field(&mut region, &entry).with_context(|| {
                        format!("atlas line {field_line}: region '{}' (declared on line {number})", region.name)
                    })?;
                }
                if region.original_width == 0 && region.original_height == 0 {
                    region.original_width = region.width;
                    region.original_height = region.height;
                }
                compute_uvs(&mut region, &atlas.pages[page_index]);
                atlas.regions.push(region);
            }
        }
    }

    if atlas.pages.is_empty() {
        bail!("atlas contains no pages");
    }
    Ok(atlas)
}

struct Entry<'a> {
    key: &'a str,
    values: Vec<&'a str>,
}

fn read_entry(line: &str) -> Option<Entry<'_>> {
    let (key, rest) = line.trim().split_once(':')?;
    let values = rest.split(',').map(str::trim).collect();
    Some(Entry { key: key.trim(), values })
}

fn next_entry<'a, I>(lines: &mut std::iter::Peekable<I>) -> Option<(usize, Entry<'a>)>
where
    I: Iterator<Item = (usize, &'a str)>,
{
    let (number, line) = lines.peek().copied()?;
    let entry = read_entry(line)?;
    lines.next();
    Some((number, entry))
}

impl Entry<'_> {
    fn value(&self, index: usize) -> Result<&str> {
        self.values.get(index).copied().ok_or_else(|| anyhow!("'{}' expects at least {} value(s)", self.key, index + 1))
    }

    fn int(&self, index: usize) -> Result<i32> {
        let raw = self.value(index)?;
        raw.parse::<i32>().with_context(|| format!("'{}' value '{raw}' is not an integer", self.key))
    }

    fn uint(&self, index: usize) -> Result<u32> {
        let value = self.int(index)?;
        u32::try_from(value).map_err(|_| anyhow!("'{}' value {value} must not be negative", self.key))
    }
}

fn apply_page_field(page: &mut AtlasPage, entry: &Entry<'_>) -> Result<()> {
    match entry.key {
        "size" => {
            page.width = entry.uint(0)?;
            page.height = entry.uint(1)?;
        }
        "format" => page.format = Arc::from(entry.value(0)?),
        "filter" => {
            page.min_filter = TextureFilter::parse(entry.value(0)?)?;
            page.mag_filter = TextureFilter::parse(entry.value(1)?)?;
        }
        "repeat" => {
            let value = entry.value(0)?;
            if value.contains('x') {
                page.wrap_u = TextureWrap::Repeat;
            }
            if value.contains('y') {
                page.wrap_v = TextureWrap::Repeat;
            }
        }
        "pma" => page.pma = entry.value(0)? == "true",
        _ => {}
    }
    Ok(())
}

fn apply_region_field(region: &mut AtlasRegion, entry: &Entry<'_>) -> Result<()> {
    match entry.key {
        "xy" => {
            region.x = entry.uint(0)?;
            region.y = entry.uint(1)?;
        }
        "size" => {
            region.width = entry.uint(0)?;
            region.height = entry.uint(1)?;
        }
        "bounds" => {
            region.x = entry.uint(0)?;
            region.y = entry.uint(1)?;
            region.width = entry.uint(2)?;
            region.height = entry.uint(3)?;
        }
        "offset" => {
            region.offset_x = entry.int(0)? as f32;
            region.offset_y = entry.int(1)? as f32;
        }
        "orig" => {
            region.original_width = entry.uint(0)?;
            region.original_height = entry.uint(1)?;
        }
        "offsets" => {
            region.offset_x = entry.int(0)? as f32;
            region.offset_y = entry.int(1)? as f32;
            region.original_width = entry.uint(2)?;
            region.original_height = entry.uint(3)?;
        }
        "rotate" => {
            region.degrees = match entry.value(0)? {
                "true" => 90,
                "false" => 0,
                _ => entry.int(0)?,
            }
        }
        "index" => region.index = entry.int(0)?,
        key => {
            let values = (0..entry.values.len()).map(|index| entry.int(index).unwrap_or(0)).collect();
            region.extra.push((Arc::from(key), values));
        }
    }
    Ok(())
}

fn compute_uvs(region: &mut AtlasRegion, page: &AtlasPage) {
    if page.width == 0 || page.height == 0 {
        return;
    }
    let (page_w, page_h) = (page.width as f32, page.height as f32);
    region.u = region.x as f32 / page_w;
    region.v = region.y as f32 / page_h;
    let (span_w, span_h) =
        if region.rotated() { (region.height, region.width) } else { (region.width, region.height) };
    region.u2 = (region.x + span_w) as f32 / page_w;
    region.v2 = (region.y + span_h) as f32 / page_h;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::TextureStore;
    use image::RgbaImage;

    fn no_textures(_: &str) -> Option<ImageHandle> {
        None
    }

    const CURRENT: &str = "\nhero.png\nsize: 64, 32\nfilter: Linear, Linear\npma: true\nhead\n  bounds: 2, 4, 20, 10\n  offsets: 1, 2, 24, 14\n  rotate: 90\nbody\n  bounds: 30, 0, 8, 8\n  split: 1, 2, 3, 4\n";

    const LEGACY: &str = "textures/hero.png\nsize: 64,32\nformat: RGBA8888\nfilter: Nearest,Nearest\nrepeat: none\nhead\n  rotate: false\n  xy: 2, 4\n  size: 20, 10\n  orig: 20, 10\n  offset: 0, 0\n  index: -1\n";

    #[test]
    fn parses_current_region_syntax() {
        let atlas = parse_atlas(CURRENT, &no_textures).unwrap();
        assert_eq!(atlas.pages.len(), 1);
        let page = &atlas.pages[0];
        assert_eq!(&*page.name, "hero.png");
        assert_eq!((page.width, page.height), (64, 32));
        assert_eq!(page.min_filter, TextureFilter::Linear);
        assert!(page.pma);
        assert!(page.texture.is_none());

        let head = atlas.find_region("head").unwrap();
        assert_eq!((head.x, head.y, head.width, head.height), (2, 4, 20, 10));
        assert_eq!((head.offset_x, head.offset_y), (1.0, 2.0));
        assert_eq!((head.original_width, head.original_height), (24, 14));
        assert!(head.rotated());
        assert!((head.u2 - 12.0 / 64.0).abs() < 1e-6);

        let body = atlas.find_region("body").unwrap();
        assert_eq!((body.original_width, body.original_height), (8, 8));
        assert_eq!(body.extra.len(), 1);
        assert_eq!(&*body.extra[0].0, "split");
    }

    #[test]
    fn parses_legacy_region_syntax_and_resolves_pages() {
        let mut store = TextureStore::new();
        let handle = store.register("hero.png", RgbaImage::new(64, 32));
        let lookup = move |name: &str| (name == "textures/hero.png").then_some(handle);
        let atlas = parse_atlas(LEGACY, &lookup).unwrap();
        assert_eq!(atlas.pages[0].texture, Some(handle));
        let head = atlas.find_region("head").unwrap();
        assert_eq!((head.x, head.y, head.width, head.height), (2, 4, 20, 10));
        assert_eq!(head.degrees, 0);
        assert_eq!(head.index, -1);
        assert_eq!(atlas.pages_without_texture().count(), 0);
    }

    #[test]
    fn page_size_falls_back_to_texture_dimensions() {
        let mut store = TextureStore::new();
        let handle = store.register("a.png", RgbaImage::new(16, 8));
        let atlas = parse_atlas("a.png\nbox\n  bounds: 0, 0, 16, 8\n", &move |_: &str| Some(handle)).unwrap();
        assert_eq!((atlas.pages[0].width, atlas.pages[0].height), (16, 8));
        assert!((atlas.regions[0].u2 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn multiple_pages_are_separated_by_blank_lines() {
        let text = "one.png\nsize: 8, 8\na\n  bounds: 0, 0, 1, 1\n\ntwo.png\nsize: 8, 8\nb\n  bounds: 0, 0, 2, 2\n";
        let atlas = parse_atlas(text, &no_textures).unwrap();
        assert_eq!(atlas.pages.len(), 2);
        assert_eq!(atlas.find_region("b").unwrap().page, 1);
    }

    #[test]
    fn malformed_values_report_the_line() {
        let err = parse_atlas("hero.png\nsize: 64, 32\nhead\n  bounds: 2, x, 20, 10\n", &no_textures).unwrap_err();
        let text = format!("{err:#}");
        assert!(text.contains("atlas line 4"), "got {text}");
        assert!(text.contains("head"));
    }

    #[test]
    fn empty_text_is_rejected() {
        assert!(parse_atlas("\n\n", &no_textures).is_err());
    }
}
