//! EWMH (Extended Window Manager Hints) implementation
//!
//! Atom interning, the root-window properties brook publishes, and the
//! decoding of the two client messages the core consumes
//! (`_NET_WM_STATE` and `_NET_WM_MOVERESIZE`).

use bitflags::bitflags;
use tracing::debug;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{ClientMessageEvent, *};
use x11rb::wrapper::ConnectionExt as _;

use crate::wm::backend::{BackendResult, WindowId};

/// Holds all interned atoms
#[derive(Debug)]
pub struct Atoms {
    pub net_supported: Atom,
    pub net_client_list: Atom,
    pub net_active_window: Atom,
    pub net_wm_name: Atom,
    pub net_wm_window_type: Atom,
    pub net_wm_window_type_normal: Atom,
    pub net_wm_state: Atom,
    pub net_wm_state_fullscreen: Atom,
    pub net_wm_state_maximized_vert: Atom,
    pub net_wm_state_maximized_horz: Atom,
    pub net_wm_moveresize: Atom,
    pub net_supporting_wm_check: Atom,
    pub wm_protocols: Atom,
    pub wm_delete_window: Atom,
    pub wm_normal_hints: Atom,
    pub utf8_string: Atom,
    pub motif_wm_hints: Atom,
}

impl Atoms {
    /// Intern all required atoms
    pub fn new<C: Connection>(conn: &C) -> BackendResult<Self> {
        let intern = |name: &str| -> BackendResult<Atom> {
            Ok(conn.intern_atom(false, name.as_bytes())?.reply()?.atom)
        };

        Ok(Self {
            net_supported: intern("_NET_SUPPORTED")?,
            net_client_list: intern("_NET_CLIENT_LIST")?,
            net_active_window: intern("_NET_ACTIVE_WINDOW")?,
            net_wm_name: intern("_NET_WM_NAME")?,
            net_wm_window_type: intern("_NET_WM_WINDOW_TYPE")?,
            net_wm_window_type_normal: intern("_NET_WM_WINDOW_TYPE_NORMAL")?,
            net_wm_state: intern("_NET_WM_STATE")?,
            net_wm_state_fullscreen: intern("_NET_WM_STATE_FULLSCREEN")?,
            net_wm_state_maximized_vert: intern("_NET_WM_STATE_MAXIMIZED_VERT")?,
            net_wm_state_maximized_horz: intern("_NET_WM_STATE_MAXIMIZED_HORZ")?,
            net_wm_moveresize: intern("_NET_WM_MOVERESIZE")?,
            net_supporting_wm_check: intern("_NET_SUPPORTING_WM_CHECK")?,
            wm_protocols: intern("WM_PROTOCOLS")?,
            wm_delete_window: intern("WM_DELETE_WINDOW")?,
            wm_normal_hints: intern("WM_NORMAL_HINTS")?,
            utf8_string: intern("UTF8_STRING")?,
            motif_wm_hints: intern("_MOTIF_WM_HINTS")?,
        })
    }

    /// Set up _NET_SUPPORTED on root window
    pub fn setup_supported<C: Connection>(&self, conn: &C, root: Window) -> BackendResult<()> {
        let supported = [
            self.net_supported,
            self.net_client_list,
            self.net_active_window,
            self.net_wm_name,
            self.net_wm_window_type,
            self.net_wm_window_type_normal,
            self.net_wm_state,
            self.net_wm_state_fullscreen,
            self.net_wm_state_maximized_vert,
            self.net_wm_state_maximized_horz,
            self.net_wm_moveresize,
            self.net_supporting_wm_check,
        ];

        conn.change_property32(
            PropMode::REPLACE,
            root,
            self.net_supported,
            AtomEnum::ATOM,
            &supported,
        )?;

        Ok(())
    }

    /// Point `_NET_SUPPORTING_WM_CHECK` at `check` from both the root and the
    /// check window itself, and name the manager.
    pub fn setup_supporting_check<C: Connection>(
        &self,
        conn: &C,
        root: Window,
        check: Window,
        name: &str,
    ) -> BackendResult<()> {
        for window in [root, check] {
            conn.change_property32(
                PropMode::REPLACE,
                window,
                self.net_supporting_wm_check,
                AtomEnum::WINDOW,
                &[check],
            )?;
        }
        conn.change_property8(
            PropMode::REPLACE,
            check,
            self.net_wm_name,
            self.utf8_string,
            name.as_bytes(),
        )?;
        Ok(())
    }

    /// Update _NET_ACTIVE_WINDOW
    pub fn update_active_window<C: Connection>(
        &self,
        conn: &C,
        root: Window,
        window: Option<WindowId>,
    ) -> BackendResult<()> {
        conn.change_property32(
            PropMode::REPLACE,
            root,
            self.net_active_window,
            AtomEnum::WINDOW,
            &[window.unwrap_or(x11rb::NONE)],
        )?;
        Ok(())
    }

    /// Update _NET_CLIENT_LIST root property with list of managed windows
    pub fn update_client_list<C: Connection>(
        &self,
        conn: &C,
        root: Window,
        windows: &[WindowId],
    ) -> BackendResult<()> {
        conn.change_property32(
            PropMode::REPLACE,
            root,
            self.net_client_list,
            AtomEnum::WINDOW,
            windows,
        )?;
        Ok(())
    }

    /// Replace `_NET_WM_STATE` on `window`. An empty set deletes the property.
    pub fn set_window_state<C: Connection>(
        &self,
        conn: &C,
        window: Window,
        state: WmState,
    ) -> BackendResult<()> {
        let atoms = self.state_atoms(state);
        if atoms.is_empty() {
            conn.delete_property(window, self.net_wm_state)?;
        } else {
            conn.change_property32(
                PropMode::REPLACE,
                window,
                self.net_wm_state,
                AtomEnum::ATOM,
                &atoms,
            )?;
        }
        Ok(())
    }

    /// Send WM_DELETE_WINDOW message to close a window gracefully
    pub fn send_delete_window<C: Connection>(&self, conn: &C, window: Window) -> BackendResult<()> {
        let event = ClientMessageEvent::new(
            32,
            window,
            self.wm_protocols,
            [self.wm_delete_window, x11rb::CURRENT_TIME, 0, 0, 0],
        );

        if let Err(e) = conn.send_event(false, window, EventMask::NO_EVENT, event) {
            debug!("Failed to send WM_DELETE_WINDOW to window {} (may already be destroyed): {}", window, e);
        }

        Ok(())
    }

    /// Map a state atom to its flag, ignoring states brook does not handle
    pub fn state_flag(&self, atom: Atom) -> WmState {
        if atom == self.net_wm_state_fullscreen {
            WmState::FULLSCREEN
        } else if atom == self.net_wm_state_maximized_vert {
            WmState::MAXIMIZED_VERT
        } else if atom == self.net_wm_state_maximized_horz {
            WmState::MAXIMIZED_HORZ
        } else {
            WmState::empty()
        }
    }

    /// Atoms for a state set, in `_NET_WM_STATE` publication order
    pub fn state_atoms(&self, state: WmState) -> Vec<Atom> {
        let mut atoms = Vec::with_capacity(3);
        if state.contains(WmState::FULLSCREEN) {
            atoms.push(self.net_wm_state_fullscreen);
        }
        if state.contains(WmState::MAXIMIZED_VERT) {
            atoms.push(self.net_wm_state_maximized_vert);
        }
        if state.contains(WmState::MAXIMIZED_HORZ) {
            atoms.push(self.net_wm_state_maximized_horz);
        }
        atoms
    }
}

bitflags! {
    /// The subset of `_NET_WM_STATE` brook understands
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct WmState: u8 {
        const FULLSCREEN     = 1 << 0;
        const MAXIMIZED_VERT = 1 << 1;
        const MAXIMIZED_HORZ = 1 << 2;
    }
}

impl WmState {
    pub const MAXIMIZED: WmState = WmState::MAXIMIZED_VERT.union(WmState::MAXIMIZED_HORZ);
}

/// `_NET_WM_STATE` client message action (data.l[0])
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateAction {
    Remove,
    Add,
    Toggle,
}

impl StateAction {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Remove),
            1 => Some(Self::Add),
            2 => Some(Self::Toggle),
            _ => None,
        }
    }

    /// Whether this action turns the state on, given whether it is active now
    pub fn enables(self, active: bool) -> bool {
        match self {
            Self::Add => true,
            Self::Remove => false,
            Self::Toggle => !active,
        }
    }
}

/// `_NET_WM_MOVERESIZE` direction (data.l[2])
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveResizeDirection {
    SizeTopLeft,
    SizeTop,
    SizeTopRight,
    SizeRight,
    SizeBottomRight,
    SizeBottom,
    SizeBottomLeft,
    SizeLeft,
    Move,
    SizeKeyboard,
    MoveKeyboard,
    Cancel,
}

impl MoveResizeDirection {
    pub fn from_raw(raw: u32) -> Option<Self> {
        use MoveResizeDirection::*;
        Some(match raw {
            0 => SizeTopLeft,
            1 => SizeTop,
            2 => SizeTopRight,
            3 => SizeRight,
            4 => SizeBottomRight,
            5 => SizeBottom,
            6 => SizeBottomLeft,
            7 => SizeLeft,
            8 => Move,
            9 => SizeKeyboard,
            10 => MoveKeyboard,
            11 => Cancel,
            _ => return None,
        })
    }
}

/// MOTIF WM Hints structure (first three fields)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotifWmHints {
    pub flags: u32,
    pub functions: u32,
    pub decorations: u32,
}

impl MotifWmHints {
    pub const MWM_HINTS_DECORATIONS: u32 = 1 << 1;

    pub fn from_values(values: &[u32]) -> Option<Self> {
        match values {
            [flags, functions, decorations, ..] => Some(Self {
                flags: *flags,
                functions: *functions,
                decorations: *decorations,
            }),
            _ => None,
        }
    }

    /// `Some(false)` when the client explicitly asks for no decorations,
    /// `None` when the hints say nothing about decorations.
    pub fn wants_decorations(&self) -> Option<bool> {
        if self.flags & Self::MWM_HINTS_DECORATIONS == 0 {
            return None;
        }
        Some(self.decorations != 0)
    }
}
