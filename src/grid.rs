use crate::config::GridConfig;
use glam::{Vec2, Vec4};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSegment {
    pub start: Vec2,
    pub end: Vec2,
}

/// Background grid in viewport-local units, rebuilt whenever the scale changes.
#[derive(Debug, Clone, PartialEq)]
pub struct GridOverlay {
    scale: f32,
    spacing: f32,
    lines_per_side: u32,
    color: u32,
    line_width: f32,
    lines: Vec<LineSegment>,
}

impl GridOverlay {
    pub fn spacing_for(scale: f32, base_spacing: f32) -> f32 {
        (base_spacing * scale).floor().max(1.0)
    }

    pub fn build(scale: f32, config: &GridConfig) -> Self {
        let spacing = Self::spacing_for(scale, config.base_spacing);
        let lines_per_side = (config.extent / spacing).floor().max(0.0) as u32;
        let reach = lines_per_side as f32 * spacing;
        let n = lines_per_side as i64;
        let mut lines = Vec::with_capacity(((2 * n + 1) * 2) as usize);
        for i in -n..=n {
            let x = i as f32 * spacing;
            lines.push(LineSegment { start: Vec2::new(x, -reach), end: Vec2::new(x, reach) });
        }
        for i in -n..=n {
            let y = i as f32 * spacing;
            lines.push(LineSegment { start: Vec2::new(-reach, y), end: Vec2::new(reach, y) });
        }
        Self { scale, spacing, lines_per_side, color: config.color, line_width: config.line_width, lines }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn spacing(&self) -> f32 {
        self.spacing
    }

    pub fn lines_per_side(&self) -> u32 {
        self.lines_per_side
    }

    pub fn lines(&self) -> &[LineSegment] {
        &self.lines
    }

    pub fn line_width(&self) -> f32 {
        self.line_width
    }

    pub fn color(&self) -> u32 {
        self.color
    }

    pub fn color_rgba(&self) -> Vec4 {
        let channel = |shift: u32| ((self.color >> shift) & 0xFF) as f32 / 255.0;
        Vec4::new(channel(16), channel(8), channel(0), 1.0)
    }

    /// Half the side length of the square the grid covers.
    pub fn reach(&self) -> f32 {
        self.lines_per_side as f32 * self.spacing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_scale_draws_symmetric_lines() {
        let grid = GridOverlay::build(1.0, &GridConfig::default());
        assert_eq!(grid.spacing(), 100.0);
        assert_eq!(grid.lines_per_side(), 20);
        assert_eq!(grid.lines().len(), 82);
        assert_eq!(grid.reach(), 2000.0);
        let first = grid.lines()[0];
        assert_eq!(first.start, Vec2::new(-2000.0, -2000.0));
        assert_eq!(first.end, Vec2::new(-2000.0, 2000.0));
        assert!(grid.lines().iter().any(|line| line.start == Vec2::new(-2000.0, 0.0)));
    }

    #[test]
    fn spacing_floors_and_never_reaches_zero() {
        assert_eq!(GridOverlay::spacing_for(1.47, 100.0), 147.0);
        assert_eq!(GridOverlay::spacing_for(0.001, 100.0), 1.0);
        let grid = GridOverlay::build(3.0, &GridConfig::default());
        assert_eq!(grid.spacing(), 300.0);
        assert_eq!(grid.lines_per_side(), 6);
        assert_eq!(grid.reach(), 1800.0);
    }

    #[test]
    fn default_color_matches_the_dark_theme() {
        let grid = GridOverlay::build(1.0, &GridConfig::default());
        assert_eq!(grid.color(), 0x424549);
        let rgba = grid.color_rgba();
        assert!((rgba.x - 0x42 as f32 / 255.0).abs() < 1e-6);
        assert_eq!(rgba.w, 1.0);
    }
}
