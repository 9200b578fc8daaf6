//! X11 backend
//!
//! `DisplayServer` on top of an x11rb `RustConnection`. Requests are sent
//! unchecked; errors for windows that vanished come back asynchronously and
//! are only logged. Queries turn such errors into `Ok(None)`.

use std::collections::HashMap;

use tracing::{debug, info, warn};
use x11rb::connection::Connection;
use x11rb::errors::ReplyError;
use x11rb::protocol::randr::{self, ConnectionExt as _};
use x11rb::protocol::xproto::*;
use x11rb::protocol::{ErrorKind, Event};
use x11rb::rust_connection::RustConnection;

use crate::shared::Geometry;
use crate::wm::backend::{
    BackendError, BackendResult, ClientInput, ConfigureRequest, CursorShape, DisplayEvent, DisplayServer, DrawOp,
    GcId, Keycode, Output, PointerEvent, SizeHints, WindowAttributes, WindowId,
};
use crate::wm::ewmh::{Atoms, MotifWmHints, MoveResizeDirection, StateAction, WmState};

/// Name published through `_NET_SUPPORTING_WM_CHECK`
const WM_NAME: &str = "brook";

fn root_events() -> EventMask {
    EventMask::SUBSTRUCTURE_REDIRECT
        | EventMask::SUBSTRUCTURE_NOTIFY
        | EventMask::STRUCTURE_NOTIFY
        | EventMask::PROPERTY_CHANGE
}

fn frame_events() -> EventMask {
    EventMask::SUBSTRUCTURE_REDIRECT
        | EventMask::EXPOSURE
        | EventMask::BUTTON_PRESS
        | EventMask::BUTTON_RELEASE
        | EventMask::POINTER_MOTION
}

/// Glyph index in the core cursor font (the mask is the next glyph)
fn cursor_glyph(shape: CursorShape) -> u16 {
    match shape {
        CursorShape::Default => 68,      // left_ptr
        CursorShape::Move => 52,         // fleur
        CursorShape::Left => 70,         // left_side
        CursorShape::Right => 96,        // right_side
        CursorShape::Top => 138,         // top_side
        CursorShape::Bottom => 16,       // bottom_side
        CursorShape::TopLeft => 134,     // top_left_corner
        CursorShape::TopRight => 136,    // top_right_corner
        CursorShape::BottomLeft => 12,   // bottom_left_corner
        CursorShape::BottomRight => 14,  // bottom_right_corner
    }
}

/// Split an X error off a reply: the window is gone, not the connection
fn vanished<T>(result: Result<T, ReplyError>) -> BackendResult<Option<T>> {
    match result {
        Ok(reply) => Ok(Some(reply)),
        Err(ReplyError::X11Error(e)) => {
            debug!("Request failed for vanished resource: {:?}", e.error_kind);
            Ok(None)
        }
        Err(ReplyError::ConnectionError(e)) => Err(e.into()),
    }
}

/// Cached server keyboard mapping
struct Keymap {
    min_keycode: u8,
    per_keycode: usize,
    keysyms: Vec<u32>,
}

pub struct X11Backend {
    conn: RustConnection,
    display_name: String,
    root: Window,
    root_depth: u8,
    desktop: Geometry,
    atoms: Atoms,
    /// Title font, if the server has "fixed"
    font: Option<Font>,
    cursor_font: Option<Font>,
    cursors: HashMap<CursorShape, Cursor>,
    keymap: Option<Keymap>,
}

impl X11Backend {
    /// Connect and take over window management on the default screen.
    ///
    /// Fails with `BackendError::AlreadyManaged` when another window manager
    /// owns the screen.
    pub fn connect(display: Option<&str>) -> BackendResult<Self> {
        let (conn, screen_num) = RustConnection::connect(display)?;
        let display_name = display
            .map(str::to_string)
            .or_else(|| std::env::var("DISPLAY").ok())
            .unwrap_or_else(|| ":0".to_string());
        info!("Connected to X server {}, screen {}", display_name, screen_num);

        let screen = &conn.setup().roots[screen_num];
        let root = screen.root;
        let root_depth = screen.root_depth;
        let desktop = Geometry::new(0, 0, screen.width_in_pixels as u32, screen.height_in_pixels as u32);
        info!("Screen size: {}x{}", desktop.width, desktop.height);

        // WM_Sn selection owner first, then the redirect as a second line
        let selection = conn
            .intern_atom(false, format!("WM_S{}", screen_num).as_bytes())?
            .reply()?
            .atom;
        if conn.get_selection_owner(selection)?.reply()?.owner != x11rb::NONE {
            return Err(BackendError::AlreadyManaged(display_name));
        }

        let check = conn.generate_id()?;
        conn.create_window(
            x11rb::COPY_DEPTH_FROM_PARENT,
            check,
            root,
            -1,
            -1,
            1,
            1,
            0,
            WindowClass::INPUT_ONLY,
            x11rb::COPY_FROM_PARENT,
            &CreateWindowAux::new(),
        )?;
        conn.set_selection_owner(check, selection, x11rb::CURRENT_TIME)?;

        match conn
            .change_window_attributes(root, &ChangeWindowAttributesAux::new().event_mask(root_events()))?
            .check()
        {
            Ok(()) => {}
            Err(ReplyError::X11Error(e)) if e.error_kind == ErrorKind::Access => {
                return Err(BackendError::AlreadyManaged(display_name));
            }
            Err(e) => return Err(e.into()),
        }
        info!("Registered as window manager");

        let atoms = Atoms::new(&conn)?;
        atoms.setup_supported(&conn, root)?;
        atoms.setup_supporting_check(&conn, root, check, WM_NAME)?;

        let font = Self::open_font(&conn, b"fixed")?;
        if font.is_none() {
            warn!("Font \"fixed\" unavailable, titles will not be drawn");
        }
        let cursor_font = Self::open_font(&conn, b"cursor")?;

        conn.flush()?;

        Ok(Self {
            conn,
            display_name,
            root,
            root_depth,
            desktop,
            atoms,
            font,
            cursor_font,
            cursors: HashMap::new(),
            keymap: None,
        })
    }

    /// Value for `DISPLAY` in launched children
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    fn open_font(conn: &RustConnection, name: &[u8]) -> BackendResult<Option<Font>> {
        let font = conn.generate_id()?;
        Ok(vanished(conn.open_font(font, name)?.check())?.map(|()| font))
    }

    fn cursor(&mut self, shape: CursorShape) -> BackendResult<Cursor> {
        if let Some(&cursor) = self.cursors.get(&shape) {
            return Ok(cursor);
        }
        let Some(font) = self.cursor_font else {
            return Ok(x11rb::NONE);
        };

        let glyph = cursor_glyph(shape);
        let cursor = self.conn.generate_id()?;
        self.conn.create_glyph_cursor(
            cursor,
            font,
            font,
            glyph,
            glyph + 1,
            0,
            0,
            0,
            0xffff,
            0xffff,
            0xffff,
        )?;
        self.cursors.insert(shape, cursor);
        Ok(cursor)
    }

    fn property32(&self, window: Window, property: Atom, kind: impl Into<Atom>, length: u32) -> BackendResult<Option<Vec<u32>>> {
        let reply = vanished(self.conn.get_property(false, window, property, kind, 0, length)?.reply())?;
        Ok(reply.and_then(|r| r.value32().map(Iterator::collect)))
    }

    fn text_property(&self, window: Window, property: Atom, kind: impl Into<Atom>) -> BackendResult<Option<String>> {
        let reply = vanished(self.conn.get_property(false, window, property, kind, 0, 1024)?.reply())?;
        Ok(reply
            .filter(|r| !r.value.is_empty())
            .map(|r| String::from_utf8_lossy(&r.value).trim_end_matches('\0').to_string()))
    }

    fn load_keymap(&mut self) -> BackendResult<&Keymap> {
        if self.keymap.is_none() {
            let setup = self.conn.setup();
            let (min, max) = (setup.min_keycode, setup.max_keycode);
            let reply = self.conn.get_keyboard_mapping(min, max - min + 1)?.reply()?;
            self.keymap = Some(Keymap {
                min_keycode: min,
                per_keycode: reply.keysyms_per_keycode as usize,
                keysyms: reply.keysyms,
            });
        }
        self.keymap
            .as_ref()
            .ok_or_else(|| BackendError::Protocol("keyboard mapping unavailable".into()))
    }

    fn translate(&self, event: Event) -> DisplayEvent {
        let pointer = |window, root_x: i16, root_y: i16, x: i16, y: i16, button, state: KeyButMask, time| PointerEvent {
            window,
            root_x: root_x as i32,
            root_y: root_y as i32,
            x: x as i32,
            y: y as i32,
            button,
            state: u16::from(state),
            time,
        };

        match event {
            Event::MapRequest(e) => DisplayEvent::MapRequest { window: e.window },
            Event::ConfigureRequest(e) => {
                let has = |flag| e.value_mask.contains(flag);
                DisplayEvent::ConfigureRequest(ConfigureRequest {
                    window: e.window,
                    x: has(ConfigWindow::X).then_some(e.x as i32),
                    y: has(ConfigWindow::Y).then_some(e.y as i32),
                    width: has(ConfigWindow::WIDTH).then_some(e.width as u32),
                    height: has(ConfigWindow::HEIGHT).then_some(e.height as u32),
                    border_width: has(ConfigWindow::BORDER_WIDTH).then_some(e.border_width as u32),
                    sibling: has(ConfigWindow::SIBLING).then_some(e.sibling),
                    stack_mode: has(ConfigWindow::STACK_MODE).then_some(u32::from(e.stack_mode)),
                })
            }
            Event::DestroyNotify(e) => DisplayEvent::DestroyNotify { window: e.window },
            Event::UnmapNotify(e) => DisplayEvent::UnmapNotify { event: e.event, window: e.window },
            Event::KeyPress(e) => DisplayEvent::KeyPress { keycode: e.detail, state: u16::from(e.state) },
            Event::KeyRelease(e) => DisplayEvent::KeyRelease { keycode: e.detail, state: u16::from(e.state) },
            Event::ButtonPress(e) => DisplayEvent::ButtonPress(pointer(
                e.event, e.root_x, e.root_y, e.event_x, e.event_y, e.detail, e.state, e.time,
            )),
            Event::ButtonRelease(e) => DisplayEvent::ButtonRelease(pointer(
                e.event, e.root_x, e.root_y, e.event_x, e.event_y, e.detail, e.state, e.time,
            )),
            Event::MotionNotify(e) => DisplayEvent::Motion(pointer(
                e.event, e.root_x, e.root_y, e.event_x, e.event_y, 0, e.state, e.time,
            )),
            Event::Expose(e) => DisplayEvent::Expose { window: e.window, count: e.count },
            Event::PropertyNotify(e) if e.atom == Atom::from(AtomEnum::WM_NAME) || e.atom == self.atoms.net_wm_name => {
                DisplayEvent::TitleChanged { window: e.window }
            }
            Event::ClientMessage(e) if e.type_ == self.atoms.net_wm_state => {
                let data = e.data.as_data32();
                match StateAction::from_raw(data[0]) {
                    Some(action) => DisplayEvent::StateRequest {
                        window: e.window,
                        action,
                        states: self.atoms.state_flag(data[1]) | self.atoms.state_flag(data[2]),
                    },
                    None => {
                        debug!("Unknown _NET_WM_STATE action {}", data[0]);
                        DisplayEvent::Other
                    }
                }
            }
            Event::ClientMessage(e) if e.type_ == self.atoms.net_wm_moveresize => {
                let data = e.data.as_data32();
                match MoveResizeDirection::from_raw(data[2]) {
                    Some(direction) => DisplayEvent::MoveResizeRequest {
                        window: e.window,
                        root_x: data[0] as i32,
                        root_y: data[1] as i32,
                        direction,
                    },
                    None => DisplayEvent::Other,
                }
            }
            Event::Error(e) => {
                debug!("X11 error: {:?} (request {:?})", e.error_kind, e.request_name);
                DisplayEvent::Other
            }
            _ => DisplayEvent::Other,
        }
    }

    fn set_foreground(&self, gc: Gcontext, color: u32) -> BackendResult<()> {
        self.conn.change_gc(gc, &ChangeGCAux::new().foreground(color))?;
        Ok(())
    }
}

/// Encode `text` as a single-font TEXTITEM8 list
fn text_items(text: &str) -> Vec<u8> {
    let bytes: Vec<u8> = text.chars().map(|c| u8::try_from(c).unwrap_or(b'?')).collect();
    let mut items = Vec::with_capacity(bytes.len() + 2);
    for chunk in bytes.chunks(254) {
        items.push(chunk.len() as u8);
        items.push(0);
        items.extend_from_slice(chunk);
    }
    items
}

fn rectangle(rect: Geometry, dx: i32, dy: i32) -> Rectangle {
    Rectangle {
        x: (rect.x - dx) as i16,
        y: (rect.y - dy) as i16,
        width: rect.width as u16,
        height: rect.height as u16,
    }
}

impl DisplayServer for X11Backend {
    fn root(&self) -> WindowId {
        self.root
    }

    fn desktop(&self) -> Geometry {
        self.desktop
    }

    fn next_event(&mut self) -> BackendResult<DisplayEvent> {
        let event = self.conn.wait_for_event()?;
        Ok(self.translate(event))
    }

    fn flush(&mut self) -> BackendResult<()> {
        self.conn.flush()?;
        Ok(())
    }

    fn window_attributes(&mut self, window: WindowId) -> BackendResult<Option<WindowAttributes>> {
        let reply = vanished(self.conn.get_window_attributes(window)?.reply())?;
        Ok(reply.map(|attrs| WindowAttributes {
            override_redirect: attrs.override_redirect,
            viewable: attrs.map_state == MapState::VIEWABLE,
        }))
    }

    fn geometry(&mut self, window: WindowId) -> BackendResult<Option<Geometry>> {
        let reply = vanished(self.conn.get_geometry(window)?.reply())?;
        Ok(reply.map(|g| Geometry::new(g.x as i32, g.y as i32, g.width as u32, g.height as u32)))
    }

    fn size_hints(&mut self, window: WindowId) -> BackendResult<Option<SizeHints>> {
        let values = self.property32(window, self.atoms.wm_normal_hints, AtomEnum::WM_SIZE_HINTS, 18)?;
        Ok(values.and_then(|v| SizeHints::from_values(&v)))
    }

    fn wants_decorations(&mut self, window: WindowId) -> BackendResult<Option<bool>> {
        let values = self.property32(window, self.atoms.motif_wm_hints, self.atoms.motif_wm_hints, 5)?;
        Ok(values
            .and_then(|v| MotifWmHints::from_values(&v))
            .and_then(|hints| hints.wants_decorations()))
    }

    fn window_state(&mut self, window: WindowId) -> BackendResult<WmState> {
        let atoms = self.property32(window, self.atoms.net_wm_state, AtomEnum::ATOM, 32)?;
        Ok(atoms
            .unwrap_or_default()
            .into_iter()
            .fold(WmState::empty(), |state, atom| state | self.atoms.state_flag(atom)))
    }

    fn is_normal_type(&mut self, window: WindowId) -> BackendResult<bool> {
        let types = self.property32(window, self.atoms.net_wm_window_type, AtomEnum::ATOM, 32)?;
        Ok(types.is_some_and(|t| t.contains(&self.atoms.net_wm_window_type_normal)))
    }

    fn title(&mut self, window: WindowId) -> BackendResult<Option<String>> {
        if let Some(title) = self.text_property(window, self.atoms.net_wm_name, self.atoms.utf8_string)? {
            return Ok(Some(title));
        }
        self.text_property(window, AtomEnum::WM_NAME.into(), AtomEnum::ANY)
    }

    fn outputs(&mut self) -> BackendResult<Vec<Output>> {
        let resources = self.conn.randr_get_screen_resources_current(self.root)?.reply()?;
        let primary = self.conn.randr_get_output_primary(self.root)?.reply()?.output;
        let timestamp = resources.config_timestamp;

        let mut outputs = Vec::with_capacity(resources.outputs.len());
        for &output in &resources.outputs {
            let Some(info) = vanished(self.conn.randr_get_output_info(output, timestamp)?.reply())? else {
                continue;
            };
            let name = String::from_utf8_lossy(&info.name).into_owned();
            let crtc = if info.crtc == x11rb::NONE || info.connection != randr::Connection::CONNECTED {
                None
            } else {
                vanished(self.conn.randr_get_crtc_info(info.crtc, timestamp)?.reply())?
            };

            let (rect, active) = match crtc {
                Some(c) if c.mode != x11rb::NONE && c.width > 0 && c.height > 0 => {
                    (Geometry::new(c.x as i32, c.y as i32, c.width as u32, c.height as u32), true)
                }
                _ => (Geometry::default(), false),
            };
            outputs.push(Output { name, rect, primary: output == primary, active });
        }
        Ok(outputs)
    }

    fn top_level_windows(&mut self) -> BackendResult<Vec<WindowId>> {
        Ok(self.conn.query_tree(self.root)?.reply()?.children)
    }

    fn keycodes_for(&mut self, keysym: u32) -> BackendResult<Vec<Keycode>> {
        let keymap = self.load_keymap()?;
        if keymap.per_keycode == 0 {
            return Ok(Vec::new());
        }
        Ok(keymap
            .keysyms
            .chunks(keymap.per_keycode)
            .enumerate()
            .filter(|(_, syms)| syms.contains(&keysym))
            .map(|(index, _)| keymap.min_keycode + index as u8)
            .collect())
    }

    fn create_frame(&mut self, rect: Geometry, border_width: u32, border_color: u32, background: u32) -> BackendResult<WindowId> {
        let frame = self.conn.generate_id()?;
        self.conn.create_window(
            x11rb::COPY_DEPTH_FROM_PARENT,
            frame,
            self.root,
            rect.x as i16,
            rect.y as i16,
            rect.width as u16,
            rect.height as u16,
            border_width as u16,
            WindowClass::INPUT_OUTPUT,
            x11rb::COPY_FROM_PARENT,
            &CreateWindowAux::new()
                .background_pixel(background)
                .border_pixel(border_color)
                .event_mask(frame_events()),
        )?;
        Ok(frame)
    }

    fn reparent(&mut self, window: WindowId, parent: WindowId, x: i32, y: i32) -> BackendResult<()> {
        self.conn.reparent_window(window, parent, x as i16, y as i16)?;
        Ok(())
    }

    fn map(&mut self, window: WindowId) -> BackendResult<()> {
        self.conn.map_window(window)?;
        Ok(())
    }

    fn unmap(&mut self, window: WindowId) -> BackendResult<()> {
        self.conn.unmap_window(window)?;
        Ok(())
    }

    fn destroy(&mut self, window: WindowId) -> BackendResult<()> {
        self.conn.destroy_window(window)?;
        Ok(())
    }

    fn move_resize(&mut self, window: WindowId, rect: Geometry) -> BackendResult<()> {
        self.conn.configure_window(
            window,
            &ConfigureWindowAux::new()
                .x(rect.x)
                .y(rect.y)
                .width(rect.width.max(1))
                .height(rect.height.max(1)),
        )?;
        Ok(())
    }

    fn move_to(&mut self, window: WindowId, x: i32, y: i32) -> BackendResult<()> {
        self.conn.configure_window(window, &ConfigureWindowAux::new().x(x).y(y))?;
        Ok(())
    }

    fn resize(&mut self, window: WindowId, width: u32, height: u32) -> BackendResult<()> {
        self.conn.configure_window(
            window,
            &ConfigureWindowAux::new().width(width.max(1)).height(height.max(1)),
        )?;
        Ok(())
    }

    fn configure(&mut self, request: &ConfigureRequest) -> BackendResult<()> {
        let mut aux = ConfigureWindowAux::new();
        aux.x = request.x;
        aux.y = request.y;
        aux.width = request.width;
        aux.height = request.height;
        aux.border_width = request.border_width;
        aux.sibling = request.sibling;
        aux.stack_mode = request.stack_mode.map(|mode| StackMode::from(mode as u8));
        self.conn.configure_window(request.window, &aux)?;
        Ok(())
    }

    fn raise(&mut self, window: WindowId) -> BackendResult<()> {
        self.conn
            .configure_window(window, &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE))?;
        Ok(())
    }

    fn set_focus(&mut self, window: WindowId) -> BackendResult<()> {
        self.conn.set_input_focus(InputFocus::POINTER_ROOT, window, x11rb::CURRENT_TIME)?;
        Ok(())
    }

    fn select_client_input(&mut self, window: WindowId, input: ClientInput) -> BackendResult<()> {
        let mask = match input {
            ClientInput::Framed => EventMask::STRUCTURE_NOTIFY | EventMask::PROPERTY_CHANGE,
            ClientInput::Minimal => EventMask::STRUCTURE_NOTIFY,
        };
        self.conn
            .change_window_attributes(window, &ChangeWindowAttributesAux::new().event_mask(mask))?;
        Ok(())
    }

    fn grab_focus_click(&mut self, window: WindowId) -> BackendResult<()> {
        self.conn.grab_button(
            false,
            window,
            EventMask::BUTTON_PRESS,
            GrabMode::SYNC,
            GrabMode::ASYNC,
            x11rb::NONE,
            x11rb::NONE,
            ButtonIndex::M1,
            ModMask::ANY,
        )?;
        Ok(())
    }

    fn replay_pointer(&mut self, time: u32) -> BackendResult<()> {
        self.conn.allow_events(Allow::REPLAY_POINTER, time)?;
        Ok(())
    }

    fn grab_key(&mut self, keycode: Keycode, modifiers: u16) -> BackendResult<()> {
        self.conn.grab_key(
            true,
            self.root,
            ModMask::from(modifiers),
            keycode,
            GrabMode::ASYNC,
            GrabMode::ASYNC,
        )?;
        Ok(())
    }

    fn grab_pointer(&mut self, window: WindowId, cursor: CursorShape) -> BackendResult<bool> {
        let cursor = self.cursor(cursor)?;
        let reply = vanished(
            self.conn
                .grab_pointer(
                    false,
                    window,
                    EventMask::BUTTON_RELEASE | EventMask::POINTER_MOTION,
                    GrabMode::ASYNC,
                    GrabMode::ASYNC,
                    x11rb::NONE,
                    cursor,
                    x11rb::CURRENT_TIME,
                )?
                .reply(),
        )?;
        Ok(reply.is_some_and(|r| r.status == GrabStatus::SUCCESS))
    }

    fn ungrab_pointer(&mut self) -> BackendResult<()> {
        self.conn.ungrab_pointer(x11rb::CURRENT_TIME)?;
        Ok(())
    }

    fn set_cursor(&mut self, window: WindowId, cursor: CursorShape) -> BackendResult<()> {
        let cursor = self.cursor(cursor)?;
        self.conn
            .change_window_attributes(window, &ChangeWindowAttributesAux::new().cursor(cursor))?;
        Ok(())
    }

    fn publish_client_list(&mut self, windows: &[WindowId]) -> BackendResult<()> {
        self.atoms.update_client_list(&self.conn, self.root, windows)
    }

    fn publish_active_window(&mut self, window: Option<WindowId>) -> BackendResult<()> {
        self.atoms.update_active_window(&self.conn, self.root, window)
    }

    fn set_window_state(&mut self, window: WindowId, state: WmState) -> BackendResult<()> {
        self.atoms.set_window_state(&self.conn, window, state)
    }

    fn send_delete(&mut self, window: WindowId) -> BackendResult<()> {
        self.atoms.send_delete_window(&self.conn, window)
    }

    fn create_gc(&mut self, window: WindowId) -> BackendResult<Option<GcId>> {
        let gc = self.conn.generate_id()?;
        let mut aux = CreateGCAux::new().graphics_exposures(0);
        if let Some(font) = self.font {
            aux = aux.font(font);
        }
        Ok(vanished(self.conn.create_gc(gc, window, &aux)?.check())?.map(|()| gc))
    }

    fn free_gc(&mut self, gc: GcId) -> BackendResult<()> {
        self.conn.free_gc(gc)?;
        Ok(())
    }

    fn draw(&mut self, window: WindowId, gc: GcId, area: Geometry, ops: &[DrawOp]) -> BackendResult<bool> {
        if area.width == 0 || area.height == 0 {
            return Ok(true);
        }

        // Paint off-screen, then copy in one request so the band never flickers
        let pixmap = self.conn.generate_id()?;
        let created = self
            .conn
            .create_pixmap(self.root_depth, pixmap, window, area.width as u16, area.height as u16)?
            .check();
        if vanished(created)?.is_none() {
            return Ok(false);
        }

        let (dx, dy) = (area.x, area.y);
        for op in ops {
            match op {
                DrawOp::Fill { rect, color } => {
                    self.set_foreground(gc, *color)?;
                    self.conn.poly_fill_rectangle(pixmap, gc, &[rectangle(*rect, dx, dy)])?;
                }
                DrawOp::Outline { rect, color } => {
                    self.set_foreground(gc, *color)?;
                    // Core outlines cover width+1 pixels
                    let mut r = rectangle(*rect, dx, dy);
                    r.width = r.width.saturating_sub(1);
                    r.height = r.height.saturating_sub(1);
                    self.conn.poly_rectangle(pixmap, gc, &[r])?;
                }
                DrawOp::Line { from, to, color } => {
                    self.set_foreground(gc, *color)?;
                    let segment = Segment {
                        x1: (from.0 - dx) as i16,
                        y1: (from.1 - dy) as i16,
                        x2: (to.0 - dx) as i16,
                        y2: (to.1 - dy) as i16,
                    };
                    self.conn.poly_segment(pixmap, gc, &[segment])?;
                }
                DrawOp::Text { x, y, text, color } => {
                    if self.font.is_none() {
                        continue;
                    }
                    self.set_foreground(gc, *color)?;
                    self.conn
                        .poly_text8(pixmap, gc, (*x - dx) as i16, (*y - dy) as i16, &text_items(text))?;
                }
            }
        }

        self.conn.copy_area(
            pixmap,
            window,
            gc,
            0,
            0,
            area.x as i16,
            area.y as i16,
            area.width as u16,
            area.height as u16,
        )?;
        self.conn.free_pixmap(pixmap)?;
        Ok(true)
    }
}
