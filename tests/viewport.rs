use glam::Vec2;
use skeleton_viewer::assets::skeletal::SkeletonDefinition;
use skeleton_viewer::camera::ViewportCamera;
use skeleton_viewer::config::{CameraConfig, GridConfig};
use skeleton_viewer::instance::SkeletonInstance;
use std::sync::Arc;
use winit::dpi::PhysicalSize;

const SURFACES: [(f32, f32); 4] = [(800.0, 600.0), (1280.0, 720.0), (320.0, 480.0), (2560.0, 1440.0)];

fn instance() -> SkeletonInstance {
    SkeletonInstance::new("spine-viewport", Arc::new(SkeletonDefinition::default()))
}

fn fitted_camera() -> (ViewportCamera, SkeletonInstance) {
    let mut camera = ViewportCamera::new(PhysicalSize::new(1024, 768), CameraConfig::default(), GridConfig::default());
    let mut instance = instance();
    camera.fit_to_view(&mut instance);
    (camera, instance)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Padding {
    None,
    Fits,
    Swallowed,
}

/// Which branch of the fit a skeleton displayed at its natural size lands in.
fn padding_regime(bounds: Vec2, surface: Vec2) -> Padding {
    if bounds.x > surface.x || bounds.y > surface.y {
        return Padding::None;
    }
    let padding = 4.0 * bounds.x.min(bounds.y);
    let fit = ((surface.x - 2.0 * padding) / bounds.x).min((surface.y - 2.0 * padding) / bounds.y);
    if fit > 0.0 {
        Padding::Fits
    } else {
        Padding::Swallowed
    }
}

#[test]
fn fit_scale_never_grows_with_the_bounds() {
    let config = CameraConfig::default();
    for (w, h) in SURFACES {
        let surface = Vec2::new(w, h);
        for height in [1.0, 50.0, 400.0, 3000.0] {
            let mut width = 1.0;
            let mut previous: Option<(Padding, f32)> = None;
            while width < 100_000.0 {
                let bounds = Vec2::new(width, height);
                let regime = padding_regime(bounds, surface);
                let scale = ViewportCamera::fit_scale(bounds, bounds, surface, &config);
                if let Some((last_regime, last_scale)) = previous.filter(|(last, _)| *last == regime) {
                    assert!(
                        scale <= last_scale,
                        "scale rose from {last_scale} to {scale} at {width}x{height} in {w}x{h} ({last_regime:?})"
                    );
                }
                previous = Some((regime, scale));
                width *= 2.0;
            }
        }
    }
}

#[test]
fn swallowed_padding_falls_back_to_natural_size() {
    let config = CameraConfig::default();
    let surface = Vec2::new(800.0, 600.0);
    let bounds = Vec2::new(256.0, 400.0);
    assert_eq!(padding_regime(bounds, surface), Padding::Swallowed);
    assert_eq!(ViewportCamera::fit_scale(bounds, bounds, surface, &config), 1.0);
}

#[test]
fn fit_scale_is_quantized_and_clamped() {
    let config = CameraConfig::default();
    for (w, h) in SURFACES {
        let surface = Vec2::new(w, h);
        let mut width = 0.37;
        while width < 500_000.0 {
            for aspect in [0.1, 0.5, 1.0, 3.0] {
                let bounds = Vec2::new(width, width * aspect);
                let scale = ViewportCamera::fit_scale(bounds, bounds, surface, &config);
                assert!((0.1..=10.0).contains(&scale), "{scale} out of range");
                let steps = scale * 5.0;
                assert!((steps - steps.round()).abs() < 1e-4, "{scale} is not a multiple of 0.2");
            }
            width *= 1.7;
        }
    }
}

#[test]
fn wheel_zoom_converges_to_the_limits() {
    let (mut camera, mut instance) = fitted_camera();
    for _ in 0..200 {
        let scale = camera.apply_wheel(-480.0, &mut instance);
        assert!((0.1..=10.0).contains(&scale));
    }
    assert_eq!(camera.scale(), 10.0);
    assert_eq!(instance.scale(), 10.0);

    let pattern = [3.0, -1.0, 250.0, 250.0, -0.01, 1.0e9];
    for delta in pattern.iter().cycle().take(300) {
        let scale = camera.apply_wheel(*delta, &mut instance);
        assert!((0.1..=10.0).contains(&scale));
    }
    for _ in 0..200 {
        camera.apply_wheel(f32::MAX, &mut instance);
    }
    assert_eq!(camera.scale(), 0.1);
    assert_eq!(camera.grid().map(|grid| grid.scale()), Some(0.1));
}

#[test]
fn opposite_drags_restore_the_offset() {
    let (mut camera, _) = fitted_camera();
    let start = camera.offset();
    for delta in [Vec2::new(13.0, -7.5), Vec2::new(-250.0, 31.25), Vec2::new(0.5, 0.0)] {
        let origin = Vec2::new(400.0, 300.0);
        camera.pointer_down(origin);
        camera.pointer_move(origin + delta);
        camera.pointer_up();
        camera.pointer_down(origin + delta);
        camera.pointer_move(origin);
        camera.pointer_up();
        assert_eq!(camera.offset(), start);
    }
}

#[test]
fn grid_follows_every_scale_change() {
    let (mut camera, mut instance) = fitted_camera();
    let grid = camera.grid().expect("grid after fit");
    assert_eq!(grid.spacing(), 100.0);
    camera.apply_wheel(-1.0, &mut instance);
    let grid = camera.grid().expect("grid after zoom");
    assert_eq!(grid.spacing(), 120.0);
    assert_eq!(grid.lines_per_side(), 16);
    assert_eq!(grid.lines().len(), 2 * (2 * 16 + 1));
}
