//! In-memory display server and harness for window manager tests.
//!
//! `FakeDisplay` keeps a window tree, records every request that is
//! interesting to assert on, and serves queued events to the run loop.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::Config;
use crate::launch::Launcher;
use crate::shared::Geometry;
use crate::wm::backend::{
    BackendError, BackendResult, ClientInput, ConfigureRequest, CursorShape, DisplayEvent, DisplayServer, DrawOp,
    GcId, Keycode, Output, PointerEvent, SizeHints, WindowAttributes, WindowId, BUTTON_PRIMARY,
};
use crate::wm::ewmh::{MoveResizeDirection, StateAction, WmState};
use crate::wm::WindowManager;

const ROOT: WindowId = 1;

/// Keycode the fake keyboard maps `keysym` to
pub fn fake_keycode(keysym: u32) -> Keycode {
    ((keysym & 0xff) as u8).wrapping_add(8)
}

#[derive(Debug, Clone)]
pub struct FakeWindow {
    pub parent: WindowId,
    pub rect: Geometry,
    pub mapped: bool,
    pub override_redirect: bool,
    pub hints: Option<SizeHints>,
    pub decorations: Option<bool>,
    pub state: WmState,
    pub normal_type: bool,
    pub title: Option<String>,
    pub cursor: Option<CursorShape>,
    pub input: Option<ClientInput>,
}

impl FakeWindow {
    fn new(parent: WindowId, rect: Geometry) -> Self {
        Self {
            parent,
            rect,
            mapped: false,
            override_redirect: false,
            hints: None,
            decorations: None,
            state: WmState::empty(),
            normal_type: false,
            title: None,
            cursor: None,
            input: None,
        }
    }
}

#[derive(Debug)]
pub struct FakeDisplay {
    desktop: Geometry,
    next_id: WindowId,
    next_gc: GcId,
    pub windows: BTreeMap<WindowId, FakeWindow>,
    pub outputs: Vec<Output>,
    pub events: VecDeque<DisplayEvent>,
    /// Raised once the event queue runs dry
    pub shutdown_when_drained: Option<Arc<AtomicBool>>,

    pub client_lists: Vec<Vec<WindowId>>,
    pub active_window: Option<WindowId>,
    pub focus: Option<WindowId>,
    pub raised: Vec<WindowId>,
    pub grabbed: Option<WindowId>,
    pub gcs: HashSet<GcId>,
    pub draws: Vec<(WindowId, Vec<DrawOp>)>,
    pub key_grabs: Vec<(Keycode, u16)>,
    pub state_changes: Vec<(WindowId, WmState)>,
    pub deleted: Vec<WindowId>,
    /// Timestamps passed to `replay_pointer`
    pub replays: Vec<u32>,
    /// Windows with a click-to-focus button grab
    pub click_grabs: Vec<WindowId>,
    maps: Vec<WindowId>,

    pub fail_gc: bool,
    pub fail_draw: bool,
    pub fail_create_frame: bool,
    pub refuse_grab: bool,
}

impl FakeDisplay {
    pub fn new(width: u32, height: u32) -> Self {
        let desktop = Geometry::new(0, 0, width, height);
        let mut windows = BTreeMap::new();
        windows.insert(ROOT, FakeWindow { mapped: true, ..FakeWindow::new(0, desktop) });

        Self {
            desktop,
            next_id: ROOT + 1,
            next_gc: 1,
            windows,
            outputs: vec![Output { name: "HDMI-1".into(), rect: desktop, primary: true, active: true }],
            events: VecDeque::new(),
            shutdown_when_drained: None,
            client_lists: Vec::new(),
            active_window: None,
            focus: None,
            raised: Vec::new(),
            grabbed: None,
            gcs: HashSet::new(),
            draws: Vec::new(),
            key_grabs: Vec::new(),
            state_changes: Vec::new(),
            deleted: Vec::new(),
            replays: Vec::new(),
            click_grabs: Vec::new(),
            maps: Vec::new(),
            fail_gc: false,
            fail_draw: false,
            fail_create_frame: false,
            refuse_grab: false,
        }
    }

    fn alloc(&mut self, parent: WindowId, rect: Geometry) -> WindowId {
        let id = self.next_id;
        self.next_id += 1;
        self.windows.insert(id, FakeWindow::new(parent, rect));
        id
    }

    /// New unmapped child of the root, as a client would create it
    pub fn add_client(&mut self, rect: Geometry) -> WindowId {
        self.alloc(ROOT, rect)
    }

    pub fn add_output(&mut self, name: &str, rect: Geometry, primary: bool) {
        if primary {
            for output in &mut self.outputs {
                output.primary = false;
            }
        }
        self.outputs.push(Output { name: name.into(), rect, primary, active: true });
    }

    /// Client-side destruction: the window disappears without any request
    /// from the window manager
    pub fn kill(&mut self, window: WindowId) {
        self.remove_tree(window);
    }

    pub fn exists(&self, window: WindowId) -> bool {
        self.windows.contains_key(&window)
    }

    pub fn rect(&self, window: WindowId) -> Geometry {
        self.window(window).rect
    }

    pub fn window(&self, window: WindowId) -> &FakeWindow {
        self.windows.get(&window).unwrap_or_else(|| panic!("no window {window}"))
    }

    pub fn window_mut(&mut self, window: WindowId) -> &mut FakeWindow {
        self.windows.get_mut(&window).unwrap_or_else(|| panic!("no window {window}"))
    }

    /// Windows in the order they were mapped
    pub fn map_order(&self) -> Vec<WindowId> {
        self.maps.clone()
    }

    fn remove_tree(&mut self, window: WindowId) {
        let children: Vec<_> = self
            .windows
            .iter()
            .filter(|(_, w)| w.parent == window)
            .map(|(&id, _)| id)
            .collect();
        for child in children {
            self.remove_tree(child);
        }
        self.windows.remove(&window);
    }
}

impl DisplayServer for FakeDisplay {
    fn root(&self) -> WindowId {
        ROOT
    }

    fn desktop(&self) -> Geometry {
        self.desktop
    }

    fn next_event(&mut self) -> BackendResult<DisplayEvent> {
        let event = self.events.pop_front();
        if self.events.is_empty() {
            if let Some(flag) = &self.shutdown_when_drained {
                flag.store(true, Ordering::SeqCst);
            }
        }
        Ok(event.unwrap_or(DisplayEvent::Other))
    }

    fn flush(&mut self) -> BackendResult<()> {
        Ok(())
    }

    fn window_attributes(&mut self, window: WindowId) -> BackendResult<Option<WindowAttributes>> {
        Ok(self.windows.get(&window).map(|w| WindowAttributes {
            override_redirect: w.override_redirect,
            viewable: w.mapped,
        }))
    }

    fn geometry(&mut self, window: WindowId) -> BackendResult<Option<Geometry>> {
        Ok(self.windows.get(&window).map(|w| w.rect))
    }

    fn size_hints(&mut self, window: WindowId) -> BackendResult<Option<SizeHints>> {
        Ok(self.windows.get(&window).and_then(|w| w.hints))
    }

    fn wants_decorations(&mut self, window: WindowId) -> BackendResult<Option<bool>> {
        Ok(self.windows.get(&window).and_then(|w| w.decorations))
    }

    fn window_state(&mut self, window: WindowId) -> BackendResult<WmState> {
        Ok(self.windows.get(&window).map_or(WmState::empty(), |w| w.state))
    }

    fn is_normal_type(&mut self, window: WindowId) -> BackendResult<bool> {
        Ok(self.windows.get(&window).is_some_and(|w| w.normal_type))
    }

    fn title(&mut self, window: WindowId) -> BackendResult<Option<String>> {
        Ok(self.windows.get(&window).and_then(|w| w.title.clone()))
    }

    fn outputs(&mut self) -> BackendResult<Vec<Output>> {
        Ok(self.outputs.clone())
    }

    fn top_level_windows(&mut self) -> BackendResult<Vec<WindowId>> {
        Ok(self.windows.iter().filter(|(_, w)| w.parent == ROOT).map(|(&id, _)| id).collect())
    }

    fn keycodes_for(&mut self, keysym: u32) -> BackendResult<Vec<Keycode>> {
        Ok(vec![fake_keycode(keysym)])
    }

    fn create_frame(&mut self, rect: Geometry, _border_width: u32, _border_color: u32, _background: u32) -> BackendResult<WindowId> {
        if self.fail_create_frame {
            return Err(BackendError::Protocol("frame creation refused".into()));
        }
        Ok(self.alloc(ROOT, rect))
    }

    fn reparent(&mut self, window: WindowId, parent: WindowId, x: i32, y: i32) -> BackendResult<()> {
        if let Some(w) = self.windows.get_mut(&window) {
            w.parent = parent;
            w.rect.x = x;
            w.rect.y = y;
        }
        Ok(())
    }

    fn map(&mut self, window: WindowId) -> BackendResult<()> {
        if let Some(w) = self.windows.get_mut(&window) {
            w.mapped = true;
            self.maps.push(window);
        }
        Ok(())
    }

    fn unmap(&mut self, window: WindowId) -> BackendResult<()> {
        if let Some(w) = self.windows.get_mut(&window) {
            w.mapped = false;
        }
        Ok(())
    }

    fn destroy(&mut self, window: WindowId) -> BackendResult<()> {
        self.remove_tree(window);
        Ok(())
    }

    fn move_resize(&mut self, window: WindowId, rect: Geometry) -> BackendResult<()> {
        if let Some(w) = self.windows.get_mut(&window) {
            w.rect = rect;
        }
        Ok(())
    }

    fn move_to(&mut self, window: WindowId, x: i32, y: i32) -> BackendResult<()> {
        if let Some(w) = self.windows.get_mut(&window) {
            w.rect = w.rect.with_position(x, y);
        }
        Ok(())
    }

    fn resize(&mut self, window: WindowId, width: u32, height: u32) -> BackendResult<()> {
        if let Some(w) = self.windows.get_mut(&window) {
            w.rect.width = width;
            w.rect.height = height;
        }
        Ok(())
    }

    fn configure(&mut self, request: &ConfigureRequest) -> BackendResult<()> {
        if let Some(w) = self.windows.get_mut(&request.window) {
            w.rect.x = request.x.unwrap_or(w.rect.x);
            w.rect.y = request.y.unwrap_or(w.rect.y);
            w.rect.width = request.width.unwrap_or(w.rect.width);
            w.rect.height = request.height.unwrap_or(w.rect.height);
        }
        Ok(())
    }

    fn raise(&mut self, window: WindowId) -> BackendResult<()> {
        self.raised.push(window);
        Ok(())
    }

    fn set_focus(&mut self, window: WindowId) -> BackendResult<()> {
        self.focus = Some(window);
        Ok(())
    }

    fn select_client_input(&mut self, window: WindowId, input: ClientInput) -> BackendResult<()> {
        if let Some(w) = self.windows.get_mut(&window) {
            w.input = Some(input);
        }
        Ok(())
    }

    fn grab_focus_click(&mut self, window: WindowId) -> BackendResult<()> {
        self.click_grabs.push(window);
        Ok(())
    }

    fn replay_pointer(&mut self, time: u32) -> BackendResult<()> {
        self.replays.push(time);
        Ok(())
    }

    fn grab_key(&mut self, keycode: Keycode, modifiers: u16) -> BackendResult<()> {
        self.key_grabs.push((keycode, modifiers));
        Ok(())
    }

    fn grab_pointer(&mut self, window: WindowId, cursor: CursorShape) -> BackendResult<bool> {
        if self.refuse_grab {
            return Ok(false);
        }
        self.grabbed = Some(window);
        if let Some(w) = self.windows.get_mut(&window) {
            w.cursor = Some(cursor);
        }
        Ok(true)
    }

    fn ungrab_pointer(&mut self) -> BackendResult<()> {
        self.grabbed = None;
        Ok(())
    }

    fn set_cursor(&mut self, window: WindowId, cursor: CursorShape) -> BackendResult<()> {
        if let Some(w) = self.windows.get_mut(&window) {
            w.cursor = Some(cursor);
        }
        Ok(())
    }

    fn publish_client_list(&mut self, windows: &[WindowId]) -> BackendResult<()> {
        self.client_lists.push(windows.to_vec());
        Ok(())
    }

    fn publish_active_window(&mut self, window: Option<WindowId>) -> BackendResult<()> {
        self.active_window = window;
        Ok(())
    }

    fn set_window_state(&mut self, window: WindowId, state: WmState) -> BackendResult<()> {
        self.state_changes.push((window, state));
        if let Some(w) = self.windows.get_mut(&window) {
            w.state = state;
        }
        Ok(())
    }

    fn send_delete(&mut self, window: WindowId) -> BackendResult<()> {
        self.deleted.push(window);
        Ok(())
    }

    fn create_gc(&mut self, _window: WindowId) -> BackendResult<Option<GcId>> {
        if self.fail_gc {
            return Ok(None);
        }
        let gc = self.next_gc;
        self.next_gc += 1;
        self.gcs.insert(gc);
        Ok(Some(gc))
    }

    fn free_gc(&mut self, gc: GcId) -> BackendResult<()> {
        self.gcs.remove(&gc);
        Ok(())
    }

    fn draw(&mut self, window: WindowId, _gc: GcId, _area: Geometry, ops: &[DrawOp]) -> BackendResult<bool> {
        if self.fail_draw {
            return Ok(false);
        }
        self.draws.push((window, ops.to_vec()));
        Ok(true)
    }
}

/// Timestamp carried by pointer events built with `FakeEvent`
pub const EVENT_TIME: u32 = 4242;

/// Event constructors for dispatching in tests
pub struct FakeEvent;

impl FakeEvent {
    pub fn map(window: WindowId) -> DisplayEvent {
        DisplayEvent::MapRequest { window }
    }

    pub fn destroy(window: WindowId) -> DisplayEvent {
        DisplayEvent::DestroyNotify { window }
    }

    /// Unmap reported on the window's own event mask
    pub fn unmap(window: WindowId) -> DisplayEvent {
        DisplayEvent::UnmapNotify { event: window, window }
    }

    pub fn configure(request: ConfigureRequest) -> DisplayEvent {
        DisplayEvent::ConfigureRequest(request)
    }

    pub fn press(window: WindowId, root_x: i32, root_y: i32, x: i32, y: i32) -> DisplayEvent {
        DisplayEvent::ButtonPress(PointerEvent { window, root_x, root_y, x, y, button: BUTTON_PRIMARY, state: 0, time: EVENT_TIME })
    }

    pub fn release(window: WindowId, root_x: i32, root_y: i32) -> DisplayEvent {
        DisplayEvent::ButtonRelease(PointerEvent { window, root_x, root_y, x: 0, y: 0, button: BUTTON_PRIMARY, state: 0, time: EVENT_TIME })
    }

    pub fn motion(window: WindowId, root_x: i32, root_y: i32) -> DisplayEvent {
        DisplayEvent::Motion(PointerEvent { window, root_x, root_y, x: 0, y: 0, button: 0, state: 0, time: EVENT_TIME })
    }

    /// Motion with window-relative coordinates, for hover tests
    pub fn hover(window: WindowId, x: i32, y: i32) -> DisplayEvent {
        DisplayEvent::Motion(PointerEvent { window, root_x: x, root_y: y, x, y, button: 0, state: 0, time: EVENT_TIME })
    }

    pub fn key(keycode: Keycode, state: u16) -> DisplayEvent {
        DisplayEvent::KeyPress { keycode, state }
    }

    pub fn key_release(keycode: Keycode) -> DisplayEvent {
        DisplayEvent::KeyRelease { keycode, state: 0 }
    }

    pub fn expose(window: WindowId) -> DisplayEvent {
        DisplayEvent::Expose { window, count: 0 }
    }

    pub fn title(window: WindowId) -> DisplayEvent {
        DisplayEvent::TitleChanged { window }
    }

    pub fn state(window: WindowId, action: StateAction, states: WmState) -> DisplayEvent {
        DisplayEvent::StateRequest { window, action, states }
    }

    pub fn moveresize(window: WindowId, root_x: i32, root_y: i32, direction: MoveResizeDirection) -> DisplayEvent {
        DisplayEvent::MoveResizeRequest { window, root_x, root_y, direction }
    }
}

#[derive(Debug, Default)]
struct LaunchLog {
    launched: Vec<(String, i32, i32)>,
    locks: usize,
}

/// Launcher that only records what it was asked to do
struct RecordingLauncher(Rc<RefCell<LaunchLog>>);

impl Launcher for RecordingLauncher {
    fn launch(&mut self, command: &str, x: i32, y: i32) {
        self.0.borrow_mut().launched.push((command.to_string(), x, y));
    }

    fn lock(&mut self) {
        self.0.borrow_mut().locks += 1;
    }
}

pub struct Harness {
    pub wm: WindowManager<FakeDisplay>,
    log: Rc<RefCell<LaunchLog>>,
}

impl Harness {
    pub fn frame_of(&self, client: WindowId) -> WindowId {
        self.wm
            .registry
            .by_client(client)
            .map(|f| f.frame)
            .unwrap_or_else(|| panic!("client {client} is not framed"))
    }

    pub fn launched(&self) -> Vec<(String, i32, i32)> {
        self.log.borrow().launched.clone()
    }

    pub fn locks(&self) -> usize {
        self.log.borrow().locks
    }
}

/// Window manager on a single `width` x `height` output with default config
pub fn harness(width: u32, height: u32) -> Harness {
    harness_with(width, height, |_| {})
}

pub fn harness_with(width: u32, height: u32, configure: impl FnOnce(&mut Config)) -> Harness {
    let mut config = Config::default();
    configure(&mut config);
    let log = Rc::new(RefCell::new(LaunchLog::default()));
    let launcher = Box::new(RecordingLauncher(log.clone()));
    let wm = WindowManager::new(FakeDisplay::new(width, height), config, launcher).expect("window manager");
    Harness { wm, log }
}
