use crate::config::{CameraConfig, GridConfig};
use crate::grid::GridOverlay;
use crate::instance::SkeletonInstance;
use glam::{Mat4, Vec2, Vec3};
use log::{debug, info};
use winit::dpi::PhysicalSize;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragState {
    Idle,
    Panning { last: Vec2 },
}

/// Draw order of the viewport's children, bottom first.
#[derive(Clone, Copy)]
pub enum Layer<'a> {
    Grid(&'a GridOverlay),
    Skeleton(&'a SkeletonInstance),
}

/// Pan offset and display scale of the viewer surface.
///
/// The offset is where viewport-local `(0, 0)` lands on screen, in physical pixels with y down.
/// The scale is applied to the displayed skeleton, never to the offset.
#[derive(Debug, Clone)]
pub struct ViewportCamera {
    offset: Vec2,
    scale: f32,
    surface: PhysicalSize<u32>,
    drag: DragState,
    grid: Option<GridOverlay>,
    fitted: bool,
    config: CameraConfig,
    grid_config: GridConfig,
}

impl ViewportCamera {
    pub fn new(surface: PhysicalSize<u32>, config: CameraConfig, grid_config: GridConfig) -> Self {
        let mut camera = Self {
            offset: Vec2::ZERO,
            scale: 1.0,
            surface,
            drag: DragState::Idle,
            grid: None,
            fitted: false,
            config,
            grid_config,
        };
        camera.center();
        camera
    }

    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn surface(&self) -> PhysicalSize<u32> {
        self.surface
    }

    pub fn drag_state(&self) -> DragState {
        self.drag
    }

    pub fn is_panning(&self) -> bool {
        matches!(self.drag, DragState::Panning { .. })
    }

    /// True once a skeleton has been fitted; wheel zoom is ignored before that.
    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    pub fn grid(&self) -> Option<&GridOverlay> {
        self.grid.as_ref()
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn scale_label(&self) -> String {
        format!("Scale: x{:.2}", self.scale)
    }

    pub fn pointer_down(&mut self, position: Vec2) {
        self.drag = DragState::Panning { last: position };
    }

    /// Applies the delta since the previous sample. Returns whether the offset moved.
    pub fn pointer_move(&mut self, position: Vec2) -> bool {
        match self.drag {
            DragState::Idle => false,
            DragState::Panning { last } => {
                self.offset += position - last;
                self.drag = DragState::Panning { last: position };
                position != last
            }
        }
    }

    pub fn pointer_up(&mut self) {
        self.drag = DragState::Idle;
    }

    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        self.surface = size;
    }

    /// Scale that fits `bounds` into `surface`, quantized and clamped.
    ///
    /// `content` is the on-screen extent of what the viewport currently holds (the skeleton at its
    /// present scale). Bounds that fit on screen are padded by four times its smaller side.
    pub fn fit_scale(bounds: Vec2, content: Vec2, surface: Vec2, config: &CameraConfig) -> f32 {
        let padding = if bounds.x > surface.x || bounds.y > surface.y { 0.0 } else { 4.0 * content.x.min(content.y) };
        let fit_x = (surface.x - padding * 2.0) / bounds.x;
        let fit_y = (surface.y - padding * 2.0) / bounds.y;
        let mut scale = fit_x.min(fit_y);
        if !scale.is_finite() || scale <= 0.0 {
            scale = 1.0;
        }
        let quantized = (scale * config.quantize_divisor).ceil() / config.quantize_divisor;
        config.clamp((quantized * 100.0).round() / 100.0)
    }

    /// Resets offset and scale for a newly displayed skeleton.
    pub fn fit_to_view(&mut self, instance: &mut SkeletonInstance) -> f32 {
        let bounds = instance.local_bounds();
        let content = bounds.size() * instance.scale();
        let size = if bounds.is_degenerate() {
            let definition = instance.definition();
            debug!("[camera] '{}' has no visible geometry; using half its declared size", definition.name);
            Vec2::new(definition.width, definition.height) * 0.5
        } else {
            bounds.size()
        };
        let scale = Self::fit_scale(size, content, self.surface_size(), &self.config);
        self.center();
        instance.set_position(Vec2::ZERO);
        self.apply_scale(scale, instance);
        self.fitted = true;
        info!("[camera] fitted '{}' ({:.1}x{:.1}) at x{scale:.2}", instance.definition().name, size.x, size.y);
        scale
    }

    /// `delta_y` follows the browser convention: positive scrolls down and zooms out.
    pub fn apply_wheel(&mut self, delta_y: f32, instance: &mut SkeletonInstance) -> f32 {
        if !self.fitted {
            debug!("[camera] wheel ignored before the first fit");
            return self.scale;
        }
        let direction = if delta_y > 0.0 {
            1.0
        } else if delta_y < 0.0 {
            -1.0
        } else {
            0.0
        };
        let scale = self.config.clamp(self.scale - direction * self.config.zoom_step);
        self.apply_scale(scale, instance);
        scale
    }

    /// Replaces the grid overlay with one built for `scale`.
    pub fn redraw_grid(&mut self, scale: f32) {
        if let Some(previous) = self.grid.take() {
            debug!("[camera] releasing grid built for x{:.2}", previous.scale());
        }
        self.grid = Some(GridOverlay::build(scale, &self.grid_config));
    }

    pub fn layers<'a>(&'a self, instance: Option<&'a SkeletonInstance>) -> Vec<Layer<'a>> {
        let mut layers = Vec::with_capacity(2);
        if let Some(grid) = &self.grid {
            layers.push(Layer::Grid(grid));
        }
        if let Some(instance) = instance {
            layers.push(Layer::Skeleton(instance));
        }
        layers
    }

    /// Maps viewport-local pixels to clip space.
    pub fn view_projection(&self) -> Mat4 {
        let size = self.surface_size();
        let proj = Mat4::orthographic_rh_gl(0.0, size.x.max(1.0), size.y.max(1.0), 0.0, -1.0, 1.0);
        proj * Mat4::from_translation(Vec3::new(self.offset.x, self.offset.y, 0.0))
    }

    pub fn local_to_screen(&self, local: Vec2) -> Vec2 {
        local + self.offset
    }

    pub fn screen_to_local(&self, screen: Vec2) -> Vec2 {
        screen - self.offset
    }

    fn apply_scale(&mut self, scale: f32, instance: &mut SkeletonInstance) {
        self.scale = scale;
        instance.set_scale(scale);
        self.redraw_grid(scale);
    }

    fn center(&mut self) {
        self.offset = self.surface_size() * 0.5;
    }

    fn surface_size(&self) -> Vec2 {
        Vec2::new(self.surface.width as f32, self.surface.height as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::skeletal::{
        Attachment, BoneData, RegionAttachment, RegionRefs, SkeletonDefinition, Skin, SlotData,
    };
    use glam::Vec4;
    use std::sync::Arc;

    fn camera() -> ViewportCamera {
        ViewportCamera::new(PhysicalSize::new(800, 600), CameraConfig::default(), GridConfig::default())
    }

    fn empty_instance(width: f32, height: f32) -> SkeletonInstance {
        let definition = SkeletonDefinition { width, height, ..SkeletonDefinition::default() };
        SkeletonInstance::new("spine-test", Arc::new(definition))
    }

    fn boxed_instance(width: f32, height: f32) -> SkeletonInstance {
        let mut definition = SkeletonDefinition { width, height, ..SkeletonDefinition::default() };
        definition.bones.push(BoneData::new("root", None));
        definition.slots.push(SlotData {
            name: Arc::from("box"),
            bone: 0,
            color: Vec4::ONE,
            dark_color: None,
            attachment: Some(Arc::from("box")),
            blend_mode: Default::default(),
        });
        let mut skin = Skin::new("default");
        let (x, y) = (width / 2.0, height / 2.0);
        let region = RegionAttachment {
            name: Arc::from("box"),
            path: Arc::from("box"),
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            width,
            height,
            color: Vec4::ONE,
            sequence: None,
            regions: RegionRefs::default(),
            offsets: [Vec2::new(-x, -y), Vec2::new(-x, y), Vec2::new(x, y), Vec2::new(x, -y)],
        };
        skin.set_attachment(0, "box", Attachment::Region(region));
        definition.skins.push(skin);
        definition.default_skin = Some(0);
        SkeletonInstance::new("spine-test", Arc::new(definition))
    }

    #[test]
    fn moves_while_idle_are_ignored() {
        let mut camera = camera();
        let start = camera.offset();
        assert!(!camera.pointer_move(Vec2::new(50.0, 50.0)));
        assert_eq!(camera.offset(), start);
    }

    #[test]
    fn each_move_applies_the_fresh_delta() {
        let mut camera = camera();
        let start = camera.offset();
        camera.pointer_down(Vec2::new(10.0, 10.0));
        camera.pointer_move(Vec2::new(15.0, 12.0));
        camera.pointer_move(Vec2::new(25.0, 7.0));
        assert_eq!(camera.offset(), start + Vec2::new(15.0, -3.0));
        camera.pointer_up();
        assert_eq!(camera.drag_state(), DragState::Idle);
        camera.pointer_move(Vec2::new(100.0, 100.0));
        assert_eq!(camera.offset(), start + Vec2::new(15.0, -3.0));
    }

    #[test]
    fn fit_scale_follows_padding_rules() {
        let config = CameraConfig::default();
        let surface = Vec2::new(800.0, 600.0);
        let fit = |w: f32, h: f32| ViewportCamera::fit_scale(Vec2::new(w, h), Vec2::new(w, h), surface, &config);
        // padding 4 x 50 = 200: min(400 / 100, 200 / 50) = 4
        assert_eq!(fit(100.0, 50.0), 4.0);
        assert_eq!(fit(40.0, 60.0), 4.8);
        assert_eq!(fit(32.0, 32.0), 10.0);
        assert_eq!(fit(300.0, 300.0), 1.0, "padding swallows the surface");
        assert_eq!(fit(1000.0, 500.0), 0.8);
        assert_eq!(fit(3000.0, 1000.0), 0.4);
        assert_eq!(fit(10.0, 1200.0), 0.6);
        assert_eq!(fit(1.0e6, 1.0e6), 0.2);
        assert_eq!(fit(0.0, 0.0), 1.0);
        let hd = Vec2::new(1280.0, 720.0);
        assert_eq!(ViewportCamera::fit_scale(Vec2::new(48.0, 96.0), Vec2::new(48.0, 96.0), hd, &config), 3.6);
    }

    #[test]
    fn padding_follows_the_displayed_extent() {
        let config = CameraConfig::default();
        let surface = Vec2::new(800.0, 600.0);
        let bounds = Vec2::new(100.0, 50.0);
        assert_eq!(ViewportCamera::fit_scale(bounds, bounds * 0.5, surface, &config), 6.0);
        assert_eq!(ViewportCamera::fit_scale(bounds, bounds * 2.0, surface, &config), 1.0);
    }

    #[test]
    fn small_skeletons_are_zoomed_in() {
        let mut camera = camera();
        let mut instance = boxed_instance(40.0, 60.0);
        assert_eq!(camera.fit_to_view(&mut instance), 4.8);
        assert_eq!(instance.scale(), 4.8);
        assert_eq!(camera.scale_label(), "Scale: x4.80");
    }

    #[test]
    fn degenerate_bounds_use_half_the_declared_size() {
        let mut camera = camera();
        let mut instance = empty_instance(4000.0, 1000.0);
        let scale = camera.fit_to_view(&mut instance);
        // 2000x500 exceeds 800 wide: min(0.4, 1.2) = 0.4
        assert_eq!(scale, 0.4);
        assert_eq!(instance.scale(), 0.4);
        assert_eq!(instance.position(), Vec2::ZERO);
        assert_eq!(camera.offset(), Vec2::new(400.0, 300.0));
        assert_eq!(camera.grid().map(GridOverlay::scale), Some(0.4));
        assert_eq!(camera.scale_label(), "Scale: x0.40");
    }

    #[test]
    fn fit_recenters_after_panning() {
        let mut camera = camera();
        camera.pointer_down(Vec2::ZERO);
        camera.pointer_move(Vec2::new(120.0, -40.0));
        camera.pointer_up();
        let mut instance = empty_instance(0.0, 0.0);
        assert_eq!(camera.fit_to_view(&mut instance), 1.0);
        assert_eq!(camera.offset(), Vec2::new(400.0, 300.0));
    }

    #[test]
    fn wheel_steps_and_clamps() {
        let mut camera = camera();
        let mut instance = empty_instance(0.0, 0.0);
        assert_eq!(camera.apply_wheel(-100.0, &mut instance), 1.0, "ignored before fit");
        assert!(camera.grid().is_none());

        camera.fit_to_view(&mut instance);
        let zoomed = camera.apply_wheel(-3.0, &mut instance);
        assert!((zoomed - 1.2).abs() < 1e-6);
        assert_eq!(camera.apply_wheel(0.0, &mut instance), zoomed);
        for _ in 0..100 {
            camera.apply_wheel(120.0, &mut instance);
        }
        assert_eq!(camera.scale(), 0.1);
        assert_eq!(instance.scale(), 0.1);
        assert_eq!(camera.grid().map(GridOverlay::spacing), Some(10.0));
    }

    #[test]
    fn grid_is_the_bottom_layer() {
        let mut camera = camera();
        let mut instance = empty_instance(0.0, 0.0);
        assert_eq!(camera.layers(Some(&instance)).len(), 1);
        camera.fit_to_view(&mut instance);
        let layers = camera.layers(Some(&instance));
        assert!(matches!(layers.as_slice(), [Layer::Grid(_), Layer::Skeleton(_)]));
    }

    #[test]
    fn screen_and_local_points_round_trip() {
        let mut camera = camera();
        camera.pointer_down(Vec2::ZERO);
        camera.pointer_move(Vec2::new(-30.0, 12.5));
        let local = Vec2::new(5.0, -7.0);
        let screen = camera.local_to_screen(local);
        assert_eq!(screen, Vec2::new(375.0, 305.5));
        assert_eq!(camera.screen_to_local(screen), local);

        let clip = camera.view_projection() * Vec4::new(local.x, local.y, 0.0, 1.0);
        let expected_x = screen.x / 800.0 * 2.0 - 1.0;
        let expected_y = 1.0 - screen.y / 600.0 * 2.0;
        assert!((clip.x - expected_x).abs() < 1e-5);
        assert!((clip.y - expected_y).abs() < 1e-5);
    }
}
