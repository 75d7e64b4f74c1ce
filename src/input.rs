use glam::Vec2;
use log::debug;
use std::path::PathBuf;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    CursorPos { x: f32, y: f32 },
    CursorLeft,
    MouseButton { button: MouseButton, pressed: bool },
    /// Positive scrolls down, as browsers report it.
    Wheel { delta_y: f32 },
    FileDropped(PathBuf),
    Other,
}

impl InputEvent {
    pub fn from_window_event(ev: &WindowEvent) -> Self {
        match ev {
            WindowEvent::MouseWheel { delta, .. } => {
                let y = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32,
                };
                InputEvent::Wheel { delta_y: -y }
            }
            WindowEvent::CursorMoved { position, .. } => {
                InputEvent::CursorPos { x: position.x as f32, y: position.y as f32 }
            }
            WindowEvent::CursorLeft { .. } => InputEvent::CursorLeft,
            WindowEvent::MouseInput { state, button, .. } => {
                InputEvent::MouseButton { button: *button, pressed: *state == ElementState::Pressed }
            }
            WindowEvent::DroppedFile(path) => InputEvent::FileDropped(path.clone()),
            _ => InputEvent::Other,
        }
    }
}

/// What the viewport should do in response to an input event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerAction {
    Down(Vec2),
    Move(Vec2),
    Up,
    Wheel(f32),
}

/// Collects the files of one drop gesture. winit reports each file separately, so the batch is
/// flushed once the event loop goes idle.
#[derive(Debug, Default)]
pub struct DropBatcher {
    paths: Vec<PathBuf>,
}

impl DropBatcher {
    pub fn push(&mut self, path: PathBuf) {
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn take(&mut self) -> Option<Vec<PathBuf>> {
        if self.paths.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.paths))
        }
    }
}

#[derive(Debug, Default)]
pub struct Input {
    cursor_pos: Option<Vec2>,
    left_pressed: bool,
    dropped: DropBatcher,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, ev: InputEvent) -> Option<PointerAction> {
        match ev {
            InputEvent::CursorPos { x, y } => {
                let position = Vec2::new(x, y);
                self.cursor_pos = Some(position);
                self.left_pressed.then_some(PointerAction::Move(position))
            }
            InputEvent::CursorLeft => {
                self.cursor_pos = None;
                if self.left_pressed {
                    self.left_pressed = false;
                    Some(PointerAction::Up)
                } else {
                    None
                }
            }
            InputEvent::MouseButton { button: MouseButton::Left, pressed: true } => {
                self.left_pressed = true;
                self.cursor_pos.map(PointerAction::Down)
            }
            InputEvent::MouseButton { button: MouseButton::Left, pressed: false } => {
                let was_pressed = std::mem::replace(&mut self.left_pressed, false);
                was_pressed.then_some(PointerAction::Up)
            }
            InputEvent::Wheel { delta_y } => Some(PointerAction::Wheel(delta_y)),
            InputEvent::FileDropped(path) => {
                debug!("[input] file dropped: {}", path.display());
                self.dropped.push(path);
                None
            }
            InputEvent::MouseButton { .. } | InputEvent::Other => None,
        }
    }

    pub fn cursor_position(&self) -> Option<Vec2> {
        self.cursor_pos
    }

    pub fn left_held(&self) -> bool {
        self.left_pressed
    }

    pub fn take_dropped(&mut self) -> Option<Vec<PathBuf>> {
        self.dropped.take()
    }

    /// Forgets a held button, e.g. when a modal window swallows the release.
    pub fn release_buttons(&mut self) -> Option<PointerAction> {
        std::mem::replace(&mut self.left_pressed, false).then_some(PointerAction::Up)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drag_emits_down_move_up() {
        let mut input = Input::new();
        assert_eq!(input.push(InputEvent::CursorPos { x: 1.0, y: 2.0 }), None);
        assert_eq!(
            input.push(InputEvent::MouseButton { button: MouseButton::Left, pressed: true }),
            Some(PointerAction::Down(Vec2::new(1.0, 2.0)))
        );
        assert_eq!(
            input.push(InputEvent::CursorPos { x: 4.0, y: 6.0 }),
            Some(PointerAction::Move(Vec2::new(4.0, 6.0)))
        );
        assert_eq!(
            input.push(InputEvent::MouseButton { button: MouseButton::Left, pressed: false }),
            Some(PointerAction::Up)
        );
        assert_eq!(input.push(InputEvent::CursorPos { x: 9.0, y: 9.0 }), None);
    }

    #[test]
    fn leaving_the_window_ends_the_drag() {
        let mut input = Input::new();
        input.push(InputEvent::CursorPos { x: 0.0, y: 0.0 });
        input.push(InputEvent::MouseButton { button: MouseButton::Left, pressed: true });
        assert_eq!(input.push(InputEvent::CursorLeft), Some(PointerAction::Up));
        assert!(!input.left_held());
        assert_eq!(input.push(InputEvent::MouseButton { button: MouseButton::Left, pressed: false }), None);
    }

    #[test]
    fn other_buttons_do_not_pan() {
        let mut input = Input::new();
        input.push(InputEvent::CursorPos { x: 0.0, y: 0.0 });
        assert_eq!(input.push(InputEvent::MouseButton { button: MouseButton::Right, pressed: true }), None);
        assert!(!input.left_held());
    }

    #[test]
    fn drops_are_batched_until_taken() {
        let mut input = Input::new();
        assert!(input.take_dropped().is_none());
        input.push(InputEvent::FileDropped(PathBuf::from("hero.atlas")));
        input.push(InputEvent::FileDropped(PathBuf::from("hero.json")));
        input.push(InputEvent::FileDropped(PathBuf::from("hero.atlas")));
        assert_eq!(input.take_dropped(), Some(vec![PathBuf::from("hero.atlas"), PathBuf::from("hero.json")]));
        assert!(input.take_dropped().is_none());
    }
}
