use crate::cli::CliOverrides;
use crate::config::ViewerConfig;
use crate::input::{Input, InputEvent, PointerAction};
use crate::session::{AlertSink, ViewerSession};
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use rfd::{MessageButtons, MessageDialog, MessageLevel};
use std::path::PathBuf;
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Fullscreen, Window, WindowId};

pub fn run(cli: CliOverrides) -> Result<()> {
    let config_path = cli.config_path();
    let mut config = ViewerConfig::load_or_default(&config_path);
    let overrides = cli.config_overrides();
    if !overrides.is_empty() {
        info!("[cli] overriding {} from the command line", overrides.applied_fields().join(", "));
        config.apply_overrides(&overrides);
    }
    let event_loop = EventLoop::new().context("Failed to create winit event loop")?;
    let mut app = App::new(config, cli.initial_paths().to_vec());
    event_loop.run_app(&mut app).context("Event loop execution failed")?;
    Ok(())
}

type Presenter = Box<dyn FnMut(Option<&Window>, &str)>;

/// Collects ingest failures until the app shows them. The latest one also stays in the title
/// until the next successful load.
#[derive(Default)]
struct DialogAlerts {
    queued: Vec<String>,
    latest: Option<String>,
}

impl AlertSink for DialogAlerts {
    fn alert(&mut self, message: &str) {
        error!("[viewer] {message}");
        self.queued.push(message.to_string());
        self.latest = Some(message.to_string());
    }
}

/// Modal error box; the event loop is blocked until it is dismissed.
fn show_error_dialog(window: Option<&Window>, message: &str) {
    let mut dialog = MessageDialog::new()
        .set_level(MessageLevel::Error)
        .set_title("Skeleton load failed")
        .set_description(message)
        .set_buttons(MessageButtons::Ok);
    if let Some(window) = window {
        dialog = dialog.set_parent(window);
    }
    let result = dialog.show();
    debug!("[viewer] alert dismissed ({result:?})");
}

pub struct App {
    config: ViewerConfig,
    window: Option<Window>,
    session: ViewerSession,
    input: Input,
    alerts: DialogAlerts,
    present_alert: Presenter,
    startup_paths: Vec<PathBuf>,
    should_close: bool,
}

impl App {
    pub fn new(config: ViewerConfig, startup_paths: Vec<PathBuf>) -> Self {
        let size = PhysicalSize::new(config.window.width, config.window.height);
        let session = ViewerSession::new(&config, size);
        Self {
            config,
            window: None,
            session,
            input: Input::new(),
            alerts: DialogAlerts::default(),
            present_alert: Box::new(show_error_dialog),
            startup_paths,
            should_close: false,
        }
    }

    pub fn session(&self) -> &ViewerSession {
        &self.session
    }

    fn ingest(&mut self, paths: &[PathBuf]) {
        if self.session.ingest_dropped(paths, &mut self.alerts).is_some() {
            self.alerts.latest = None;
        }
        self.refresh_title();
        for message in std::mem::take(&mut self.alerts.queued) {
            if let Some(action) = self.input.release_buttons() {
                self.handle_pointer(action);
            }
            (self.present_alert)(self.window.as_ref(), &message);
        }
    }

    fn refresh_title(&self) {
        let Some(window) = &self.window else {
            return;
        };
        let mut title = format!("{} - {}", self.config.window.title, self.session.camera().scale_label());
        if let Some(message) = &self.alerts.latest {
            title.push_str(" - ");
            title.push_str(message);
        }
        window.set_title(&title);
    }

    fn handle_pointer(&mut self, action: PointerAction) {
        match action {
            PointerAction::Down(position) => self.session.pointer_down(position),
            PointerAction::Move(position) => {
                self.session.pointer_move(position);
            }
            PointerAction::Up => self.session.pointer_up(),
            PointerAction::Wheel(delta_y) => {
                if self.session.wheel(delta_y).is_some() {
                    self.refresh_title();
                }
            }
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let window_cfg = &self.config.window;
        let mut attributes = Window::default_attributes()
            .with_title(window_cfg.title.clone())
            .with_inner_size(PhysicalSize::new(window_cfg.width, window_cfg.height));
        if window_cfg.fullscreen {
            attributes = attributes.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }
        let window = match event_loop.create_window(attributes) {
            Ok(window) => window,
            Err(err) => {
                error!("[viewer] window creation failed: {err}");
                self.should_close = true;
                return;
            }
        };
        self.session.resize(window.inner_size());
        self.window = Some(window);
        self.refresh_title();

        let startup = std::mem::take(&mut self.startup_paths);
        if !startup.is_empty() {
            info!("[viewer] loading {} path(s) from the command line", startup.len());
            self.ingest(&startup);
        }
    }

    fn window_event(&mut self, _el: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let Some(action) = self.input.push(InputEvent::from_window_event(&event)) {
            self.handle_pointer(action);
        }
        match &event {
            WindowEvent::CloseRequested => self.should_close = true,
            WindowEvent::Resized(size) => self.session.resize(*size),
            WindowEvent::KeyboardInput { event: KeyEvent { logical_key, state, .. }, .. } => {
                if let Key::Named(NamedKey::Escape) = logical_key {
                    if *state == ElementState::Pressed {
                        self.should_close = true;
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_close {
            event_loop.exit();
            return;
        }
        if let Some(paths) = self.input.take_dropped() {
            self.ingest(&paths);
        }
        if let Some(instantiated) = self.session.poll_pending(Instant::now()) {
            info!("[viewer] showing '{}' at x{:.2}", instantiated.key, instantiated.scale);
            if instantiated.animations.is_empty() {
                warn!("[viewer] '{}' has no animations", instantiated.key);
            }
            self.refresh_title();
        }
        match self.session.next_deadline() {
            Some(deadline) => event_loop.set_control_flow(ControlFlow::WaitUntil(deadline)),
            None => event_loop.set_control_flow(ControlFlow::Wait),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::event::MouseButton;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recording_app() -> (App, Rc<RefCell<Vec<String>>>) {
        let shown = Rc::new(RefCell::new(Vec::new()));
        let mut app = App::new(ViewerConfig::default(), Vec::new());
        let sink = Rc::clone(&shown);
        app.present_alert = Box::new(move |_: Option<&Window>, message: &str| sink.borrow_mut().push(message.to_string()));
        (app, shown)
    }

    #[test]
    fn failed_drop_presents_one_dialog() {
        let (mut app, shown) = recording_app();
        app.ingest(&[PathBuf::from("missing/hero.atlas")]);
        assert_eq!(shown.borrow().len(), 1);
        assert!(app.alerts.queued.is_empty());
        assert_eq!(app.alerts.latest.as_deref(), shown.borrow().first().map(String::as_str));
        assert!(app.session().instance().is_none());
    }

    #[test]
    fn alert_ends_an_active_drag() {
        let (mut app, shown) = recording_app();
        let press = [
            InputEvent::CursorPos { x: 10.0, y: 10.0 },
            InputEvent::MouseButton { button: MouseButton::Left, pressed: true },
        ];
        for event in press {
            if let Some(action) = app.input.push(event) {
                app.handle_pointer(action);
            }
        }
        assert!(app.session().camera().is_panning());
        app.ingest(&[PathBuf::from("missing/hero.atlas")]);
        assert_eq!(shown.borrow().len(), 1);
        assert!(!app.session().camera().is_panning());
        assert!(!app.input.left_held());
    }
}
