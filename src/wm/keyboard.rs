//! Keyboard Module
//!
//! Key binding table and key actions. Bindings come from the `[keybindings]`
//! config table as `"Mod4+Shift+Left" = "move_left"`; any value that is not
//! a known action is a command to launch.

use anyhow::Result;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

use crate::wm::backend::{DisplayServer, Keycode, WindowId};
use crate::wm::ewmh::{StateAction, WmState};
use crate::wm::{screen, WindowManager};

/// Modifier bits of the core protocol key state
pub mod modifiers {
    pub const SHIFT: u16 = 1 << 0;
    pub const LOCK: u16 = 1 << 1;
    pub const CONTROL: u16 = 1 << 2;
    pub const MOD1: u16 = 1 << 3;
    pub const MOD2: u16 = 1 << 4;
    pub const MOD4: u16 = 1 << 6;

    /// Caps Lock and Num Lock never take part in matching
    pub const IGNORED: [u16; 4] = [0, LOCK, MOD2, LOCK | MOD2];
    pub const RELEVANT: u16 = SHIFT | CONTROL | MOD1 | MOD4;
}

pub mod keysyms {
    pub const LEFT: u32 = 0xff51;
    pub const UP: u32 = 0xff52;
    pub const RIGHT: u32 = 0xff53;
    pub const DOWN: u32 = 0xff54;
    pub const LOWER_R: u32 = 0x0072;
}

/// Keysym for a key name as written in the config
pub fn keysym_from_name(name: &str) -> Option<u32> {
    let keysym = match name {
        "Left" => keysyms::LEFT,
        "Up" => keysyms::UP,
        "Right" => keysyms::RIGHT,
        "Down" => keysyms::DOWN,
        "Return" | "Enter" => 0xff0d,
        "Escape" => 0xff1b,
        "Tab" => 0xff09,
        "BackSpace" => 0xff08,
        "Delete" => 0xffff,
        "Home" => 0xff50,
        "End" => 0xff57,
        "Print" => 0xff61,
        "space" | "Space" => 0x0020,
        _ => {
            if let Some(n) = name.strip_prefix('F').and_then(|n| n.parse::<u32>().ok()) {
                return (1..=12).contains(&n).then(|| 0xffbe + n - 1);
            }
            let mut chars = name.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_alphanumeric() => c.to_ascii_lowercase() as u32,
                _ => return None,
            }
        }
    };
    Some(keysym)
}

/// A parsed `Mod4+Shift+Left` key description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySpec {
    pub modifiers: u16,
    pub keysym: u32,
}

impl KeySpec {
    pub fn parse(spec: &str) -> Option<KeySpec> {
        let mut parts: Vec<&str> = spec.split('+').map(str::trim).collect();
        let key = parts.pop()?;
        let mut mods = 0;
        for part in parts {
            mods |= match part.to_ascii_lowercase().as_str() {
                "shift" => modifiers::SHIFT,
                "control" | "ctrl" => modifiers::CONTROL,
                "mod1" | "alt" => modifiers::MOD1,
                "mod4" | "super" | "win" => modifiers::MOD4,
                _ => return None,
            };
        }
        Some(KeySpec { modifiers: mods, keysym: keysym_from_name(key)? })
    }
}

/// What a binding does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    MoveLeft,
    MoveRight,
    MoveUp,
    MoveDown,
    Fullscreen,
    Maximize,
    Close,
    ResizeMode,
    Lock,
    Spawn(String),
}

impl KeyAction {
    pub fn parse(token: &str) -> KeyAction {
        match token.trim() {
            "move_left" => Self::MoveLeft,
            "move_right" => Self::MoveRight,
            "move_up" => Self::MoveUp,
            "move_down" => Self::MoveDown,
            "fullscreen" => Self::Fullscreen,
            "maximize" => Self::Maximize,
            "close" => Self::Close,
            "resize_mode" => Self::ResizeMode,
            "lock" => Self::Lock,
            command => Self::Spawn(command.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arrow {
    Left,
    Right,
    Up,
    Down,
}

/// (keycode, modifier mask) to action lookups
#[derive(Debug, Default)]
pub struct KeyBindings {
    actions: HashMap<(Keycode, u16), KeyAction>,
    arrows: HashMap<Keycode, Arrow>,
    resize_exit: Vec<Keycode>,
}

impl KeyBindings {
    /// Resolve config entries against the server's keyboard mapping and
    /// grab every resulting key on the root window.
    pub fn grab<D: DisplayServer>(display: &mut D, config: &BTreeMap<String, String>) -> Result<Self> {
        let mut bindings = KeyBindings::default();

        for (spec, action) in config {
            let Some(key) = KeySpec::parse(spec) else {
                warn!("Ignoring unparseable key binding {:?}", spec);
                continue;
            };
            let keycodes = display.keycodes_for(key.keysym)?;
            if keycodes.is_empty() {
                warn!("No keycode for binding {:?}", spec);
            }
            for keycode in keycodes {
                grab_all_locks(display, keycode, key.modifiers)?;
                bindings.actions.insert((keycode, key.modifiers), KeyAction::parse(action));
            }
        }

        // Resize mode arrows
        for (keysym, arrow) in [
            (keysyms::LEFT, Arrow::Left),
            (keysyms::RIGHT, Arrow::Right),
            (keysyms::UP, Arrow::Up),
            (keysyms::DOWN, Arrow::Down),
        ] {
            for keycode in display.keycodes_for(keysym)? {
                grab_all_locks(display, keycode, modifiers::MOD4 | modifiers::SHIFT)?;
                bindings.arrows.insert(keycode, arrow);
            }
        }
        bindings.resize_exit = display.keycodes_for(keysyms::LOWER_R)?;

        debug!("Grabbed {} key bindings", bindings.actions.len());
        Ok(bindings)
    }

    pub fn lookup(&self, keycode: Keycode, state: u16) -> Option<&KeyAction> {
        self.actions.get(&(keycode, state & modifiers::RELEVANT))
    }

    fn arrow(&self, keycode: Keycode) -> Option<Arrow> {
        self.arrows.get(&keycode).copied()
    }

    fn ends_resize_mode(&self, keycode: Keycode) -> bool {
        self.resize_exit.contains(&keycode)
    }
}

fn grab_all_locks<D: DisplayServer>(display: &mut D, keycode: Keycode, mods: u16) -> Result<()> {
    for extra in modifiers::IGNORED {
        display.grab_key(keycode, mods | extra)?;
    }
    Ok(())
}

impl<D: DisplayServer> WindowManager<D> {
    pub(crate) fn on_key_press(&mut self, keycode: Keycode, state: u16) -> Result<()> {
        let resize_chord = (state & modifiers::RELEVANT) == (modifiers::MOD4 | modifiers::SHIFT);
        if self.resize_mode && resize_chord {
            if let Some(arrow) = self.bindings.arrow(keycode) {
                return self.resize_focused(arrow);
            }
        }

        let Some(action) = self.bindings.lookup(keycode, state).cloned() else {
            return Ok(());
        };
        debug!("Key action {:?}", action);
        let step = self.config.window_manager.behavior.keyboard_step as i32;

        match action {
            KeyAction::MoveLeft => self.nudge_focused(-step, 0),
            KeyAction::MoveRight => self.nudge_focused(step, 0),
            KeyAction::MoveUp => self.nudge_focused(0, -step),
            KeyAction::MoveDown => self.nudge_focused(0, step),
            KeyAction::Fullscreen => self.toggle_focused(WmState::FULLSCREEN),
            KeyAction::Maximize => self.toggle_focused(WmState::MAXIMIZED),
            KeyAction::Close => {
                if let Some(client) = self.focused {
                    info!("Closing window {}", client);
                    self.display.send_delete(client)?;
                }
                Ok(())
            }
            KeyAction::ResizeMode => {
                debug!("Entering resize mode");
                self.resize_mode = true;
                Ok(())
            }
            KeyAction::Lock => {
                info!("Locking screen");
                self.launcher.lock();
                Ok(())
            }
            KeyAction::Spawn(command) => {
                let monitor = screen::primary_monitor(&mut self.display);
                self.launcher.launch(&command, monitor.x, monitor.y);
                Ok(())
            }
        }
    }

    pub(crate) fn on_key_release(&mut self, keycode: Keycode) -> Result<()> {
        if self.resize_mode && self.bindings.ends_resize_mode(keycode) {
            debug!("Leaving resize mode");
            self.resize_mode = false;
        }
        Ok(())
    }

    fn focused_top_level(&self) -> Option<(WindowId, WindowId)> {
        self.focused.and_then(|client| self.top_level(client))
    }

    fn nudge_focused(&mut self, dx: i32, dy: i32) -> Result<()> {
        let Some((top, _)) = self.focused_top_level() else {
            return Ok(());
        };
        if let Some(geom) = self.display.geometry(top)? {
            self.display.move_to(top, geom.x + dx, geom.y + dy)?;
        }
        Ok(())
    }

    fn toggle_focused(&mut self, state: WmState) -> Result<()> {
        match self.focused {
            Some(client) => self.handle_state_request(client, StateAction::Toggle, state),
            None => Ok(()),
        }
    }

    fn resize_focused(&mut self, arrow: Arrow) -> Result<()> {
        let Some((top, _)) = self.focused_top_level() else {
            return Ok(());
        };
        let Some(mut geom) = self.display.geometry(top)? else {
            return Ok(());
        };
        let step = self.config.window_manager.behavior.keyboard_step;
        let (min_w, min_h) = self.min_size();
        match arrow {
            Arrow::Left => geom.width = geom.width.saturating_sub(step).max(min_w),
            Arrow::Right => geom.width += step,
            Arrow::Up => geom.height = geom.height.saturating_sub(step).max(min_h),
            Arrow::Down => geom.height += step,
        }
        self.place(top, geom)?;
        if self.registry.is_frame(top) {
            self.paint_frame(top)?;
        }
        Ok(())
    }
}
