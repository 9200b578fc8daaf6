//! Display server seam
//!
//! The window manager core talks to the display server only through the
//! [`DisplayServer`] trait. `X11Backend` implements it on top of x11rb; tests
//! use an in-memory recording fake.

use thiserror::Error;

use crate::shared::Geometry;
use crate::wm::ewmh::{MoveResizeDirection, StateAction, WmState};

pub type WindowId = u32;
pub type GcId = u32;
pub type Keycode = u8;

/// Primary pointer button
pub const BUTTON_PRIMARY: u8 = 1;

/// Errors the display server layer can surface.
///
/// Requests addressed to windows that vanished are not errors: queries
/// answer `Ok(None)` and mutations are silently dropped by the server.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("connection to display server failed: {0}")]
    Connection(#[from] x11rb::errors::ConnectionError),
    #[error("could not connect to display server: {0}")]
    Connect(#[from] x11rb::errors::ConnectError),
    #[error("request failed: {0}")]
    Reply(#[from] x11rb::errors::ReplyError),
    #[error("could not allocate resource id: {0}")]
    Id(#[from] x11rb::errors::ReplyOrIdError),
    #[error("another window manager already owns display {0}")]
    AlreadyManaged(String),
    #[error("{0}")]
    Protocol(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Attributes of a window relevant to management decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowAttributes {
    pub override_redirect: bool,
    pub viewable: bool,
}

/// ICCCM `WM_NORMAL_HINTS` fields brook uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeHints {
    pub flags: u32,
    pub width: u32,
    pub height: u32,
    pub min_width: u32,
    pub min_height: u32,
}

impl SizeHints {
    pub const US_POSITION: u32 = 1 << 0;
    pub const US_SIZE: u32 = 1 << 1;
    pub const P_POSITION: u32 = 1 << 2;
    pub const P_SIZE: u32 = 1 << 3;
    pub const P_MIN_SIZE: u32 = 1 << 4;

    /// Parse the raw 32-bit property words
    pub fn from_values(values: &[u32]) -> Option<Self> {
        if values.len() < 7 {
            return None;
        }
        Some(Self {
            flags: values[0],
            width: values[3],
            height: values[4],
            min_width: values[5],
            min_height: values[6],
        })
    }

    pub fn has_position(&self) -> bool {
        self.flags & (Self::US_POSITION | Self::P_POSITION) != 0
    }

    /// Declared preferred size, if any
    pub fn preferred_size(&self) -> Option<(u32, u32)> {
        (self.flags & (Self::US_SIZE | Self::P_SIZE) != 0 && self.width > 0 && self.height > 0)
            .then_some((self.width, self.height))
    }

    /// Declared minimum size, if any
    pub fn min_size(&self) -> Option<(u32, u32)> {
        (self.flags & Self::P_MIN_SIZE != 0 && self.min_width > 0 && self.min_height > 0)
            .then_some((self.min_width, self.min_height))
    }
}

/// One physical output in the shared virtual coordinate space
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub name: String,
    pub rect: Geometry,
    pub primary: bool,
    /// False for outputs without an active mode (disconnected or disabled)
    pub active: bool,
}

/// Pointer shapes the interaction state machine asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorShape {
    Default,
    Move,
    Left,
    Right,
    Top,
    Bottom,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Which notifications to select on a client window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientInput {
    /// Reparented client: structure and property changes
    Framed,
    /// Undecorated client: structure changes only
    Minimal,
}

/// A single drawing step for frame decorations.
///
/// Coordinates are relative to the frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawOp {
    Fill { rect: Geometry, color: u32 },
    Outline { rect: Geometry, color: u32 },
    Line { from: (i32, i32), to: (i32, i32), color: u32 },
    Text { x: i32, y: i32, text: String, color: u32 },
}

/// Button press/release or motion event fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerEvent {
    /// Window the event was reported on
    pub window: WindowId,
    pub root_x: i32,
    pub root_y: i32,
    /// Position relative to `window`
    pub x: i32,
    pub y: i32,
    /// Button number, 0 for motion
    pub button: u8,
    pub state: u16,
    /// Server timestamp
    pub time: u32,
}

/// Window geometry change request (`ConfigureRequest`)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigureRequest {
    pub window: WindowId,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub border_width: Option<u32>,
    pub sibling: Option<WindowId>,
    pub stack_mode: Option<u32>,
}

/// Display server events the dispatcher recognizes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayEvent {
    MapRequest { window: WindowId },
    ConfigureRequest(ConfigureRequest),
    DestroyNotify { window: WindowId },
    UnmapNotify { event: WindowId, window: WindowId },
    KeyPress { keycode: Keycode, state: u16 },
    KeyRelease { keycode: Keycode, state: u16 },
    ButtonPress(PointerEvent),
    ButtonRelease(PointerEvent),
    Motion(PointerEvent),
    Expose { window: WindowId, count: u16 },
    TitleChanged { window: WindowId },
    /// `_NET_WM_STATE` client message
    StateRequest {
        window: WindowId,
        action: StateAction,
        states: WmState,
    },
    /// `_NET_WM_MOVERESIZE` client message
    MoveResizeRequest {
        window: WindowId,
        root_x: i32,
        root_y: i32,
        direction: MoveResizeDirection,
    },
    /// Anything else; ignored by the dispatcher
    Other,
}

impl DisplayEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MapRequest { .. } => "MapRequest",
            Self::ConfigureRequest(_) => "ConfigureRequest",
            Self::DestroyNotify { .. } => "DestroyNotify",
            Self::UnmapNotify { .. } => "UnmapNotify",
            Self::KeyPress { .. } => "KeyPress",
            Self::KeyRelease { .. } => "KeyRelease",
            Self::ButtonPress(_) => "ButtonPress",
            Self::ButtonRelease(_) => "ButtonRelease",
            Self::Motion(_) => "MotionNotify",
            Self::Expose { .. } => "Expose",
            Self::TitleChanged { .. } => "TitleChanged",
            Self::StateRequest { .. } => "_NET_WM_STATE",
            Self::MoveResizeRequest { .. } => "_NET_WM_MOVERESIZE",
            Self::Other => "Other",
        }
    }
}

/// Everything the window manager core needs from the display server
pub trait DisplayServer {
    fn root(&self) -> WindowId;

    /// Rectangle of the whole virtual desktop, the last-resort monitor
    fn desktop(&self) -> Geometry;

    /// Block until the next event arrives
    fn next_event(&mut self) -> BackendResult<DisplayEvent>;

    fn flush(&mut self) -> BackendResult<()>;

    // Queries. `Ok(None)` means the window no longer exists.

    fn window_attributes(&mut self, window: WindowId) -> BackendResult<Option<WindowAttributes>>;

    /// Geometry relative to the window's parent
    fn geometry(&mut self, window: WindowId) -> BackendResult<Option<Geometry>>;

    fn size_hints(&mut self, window: WindowId) -> BackendResult<Option<SizeHints>>;

    /// Decoration preference from `_MOTIF_WM_HINTS`
    fn wants_decorations(&mut self, window: WindowId) -> BackendResult<Option<bool>>;

    /// Current `_NET_WM_STATE` flags as published on the window
    fn window_state(&mut self, window: WindowId) -> BackendResult<WmState>;

    /// Whether `_NET_WM_WINDOW_TYPE` lists `_NET_WM_WINDOW_TYPE_NORMAL`
    fn is_normal_type(&mut self, window: WindowId) -> BackendResult<bool>;

    fn title(&mut self, window: WindowId) -> BackendResult<Option<String>>;

    /// Fresh snapshot of the output topology
    fn outputs(&mut self) -> BackendResult<Vec<Output>>;

    /// Children of the root window, bottom to top
    fn top_level_windows(&mut self) -> BackendResult<Vec<WindowId>>;

    fn keycodes_for(&mut self, keysym: u32) -> BackendResult<Vec<Keycode>>;

    // Mutations

    /// Create an unmapped frame window at `rect` on the root window
    fn create_frame(&mut self, rect: Geometry, border_width: u32, border_color: u32, background: u32) -> BackendResult<WindowId>;

    fn reparent(&mut self, window: WindowId, parent: WindowId, x: i32, y: i32) -> BackendResult<()>;
    fn map(&mut self, window: WindowId) -> BackendResult<()>;
    fn unmap(&mut self, window: WindowId) -> BackendResult<()>;
    fn destroy(&mut self, window: WindowId) -> BackendResult<()>;
    fn move_resize(&mut self, window: WindowId, rect: Geometry) -> BackendResult<()>;
    fn move_to(&mut self, window: WindowId, x: i32, y: i32) -> BackendResult<()>;
    fn resize(&mut self, window: WindowId, width: u32, height: u32) -> BackendResult<()>;
    /// Grant a geometry request verbatim
    fn configure(&mut self, request: &ConfigureRequest) -> BackendResult<()>;
    fn raise(&mut self, window: WindowId) -> BackendResult<()>;
    fn set_focus(&mut self, window: WindowId) -> BackendResult<()>;
    fn select_client_input(&mut self, window: WindowId, input: ClientInput) -> BackendResult<()>;

    /// Synchronous primary-button grab used for click-to-focus
    fn grab_focus_click(&mut self, window: WindowId) -> BackendResult<()>;
    /// Let a frozen click-to-focus press through to the client
    fn replay_pointer(&mut self, time: u32) -> BackendResult<()>;
    fn grab_key(&mut self, keycode: Keycode, modifiers: u16) -> BackendResult<()>;

    /// Capture pointer motion and release for `window`. False if refused.
    fn grab_pointer(&mut self, window: WindowId, cursor: CursorShape) -> BackendResult<bool>;
    fn ungrab_pointer(&mut self) -> BackendResult<()>;
    fn set_cursor(&mut self, window: WindowId, cursor: CursorShape) -> BackendResult<()>;

    fn publish_client_list(&mut self, windows: &[WindowId]) -> BackendResult<()>;
    fn publish_active_window(&mut self, window: Option<WindowId>) -> BackendResult<()>;
    fn set_window_state(&mut self, window: WindowId, state: WmState) -> BackendResult<()>;
    fn send_delete(&mut self, window: WindowId) -> BackendResult<()>;

    /// `Ok(None)` when the server could not allocate a context
    fn create_gc(&mut self, window: WindowId) -> BackendResult<Option<GcId>>;
    fn free_gc(&mut self, gc: GcId) -> BackendResult<()>;

    /// Paint `ops` into `area` of `window`. Returns false when the
    /// off-screen buffer could not be allocated and nothing was drawn.
    fn draw(&mut self, window: WindowId, gc: GcId, area: Geometry, ops: &[DrawOp]) -> BackendResult<bool>;
}
