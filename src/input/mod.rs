//! Keyboard input pipeline
//!
//! The seat advertises its capabilities after it is bound; only then is a
//! keyboard created, together with its xkb context and repeat state. Key
//! codes are translated through the compositor's keymap and forwarded to
//! the session as menu keys. A held key repeats through a calloop timer
//! source that exists only while a key is armed.

pub mod repeat;

use std::os::fd::OwnedFd;
use std::time::Duration;

use calloop::timer::{TimeoutAction, Timer};
use calloop::RegistrationToken;
use log::{debug, error, info, warn};
use memmap2::MmapOptions;
use wayland_client::protocol::wl_keyboard::{self, KeyState, KeymapFormat, WlKeyboard};
use wayland_client::protocol::wl_seat::{self, WlSeat};
use wayland_client::{Connection, Dispatch, Proxy, QueueHandle, WEnum};
use xkbcommon::xkb;

use crate::error::{Result, RingError};
use crate::menu::{MenuAction, MenuKey, MenuState};
use crate::session::Session;
use repeat::{RepeatState, TimerCommand};

/// Wayland key codes are evdev codes; xkb numbers them 8 higher
pub const EVDEV_OFFSET: u32 = 8;

/// xkb keycode for a raw Wayland key code, `None` when it cannot exist
pub fn xkb_keycode(raw_code: u32) -> Option<xkb::Keycode> {
    raw_code.checked_add(EVDEV_OFFSET).map(xkb::Keycode::from)
}

/// Map a translated keysym onto the keys the menu understands
#[allow(non_upper_case_globals)]
pub fn menu_key(sym: xkb::Keysym) -> MenuKey {
    use xkbcommon::xkb::keysyms::*;
    match u32::from(sym) {
        KEY_j | KEY_Down => MenuKey::Down,
        KEY_k | KEY_Up => MenuKey::Up,
        KEY_Return | KEY_KP_Enter => MenuKey::Confirm,
        KEY_Escape => MenuKey::Cancel,
        _ => MenuKey::Other,
    }
}

/// Run a key event through the repeat schedule and the menu
pub fn dispatch_key(
    menu: &mut MenuState,
    repeat: &mut RepeatState,
    sym: xkb::Keysym,
    pressed: bool,
) -> (MenuAction, TimerCommand) {
    let command = repeat.on_key(sym, pressed);
    let action = if pressed {
        menu.apply(menu_key(sym))
    } else {
        MenuAction::None
    };
    (action, command)
}

/// Replay the armed key as a fresh press; `None` when nothing is armed
pub fn dispatch_repeat(
    menu: &mut MenuState,
    repeat: &mut RepeatState,
) -> Option<(MenuAction, Duration)> {
    let (sym, period) = repeat.on_fire()?;
    Some((menu.apply(menu_key(sym)), period))
}

/// Modifier state last reported by the compositor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierMask {
    pub depressed: u32,
    pub latched: u32,
    pub locked: u32,
    pub group: u32,
}

/// A bound keyboard and everything created along with it
pub struct Keyboard {
    wl_keyboard: WlKeyboard,
    xkb_context: xkb::Context,
    xkb_state: Option<xkb::State>,
    modifiers: ModifierMask,
    repeat: RepeatState,
    /// Timer source of the armed key
    repeat_token: Option<RegistrationToken>,
}

impl Keyboard {
    pub fn modifiers(&self) -> ModifierMask {
        self.modifiers
    }
}

/// Map the keymap descriptor, compile it and drop the mapping again.
fn compile_keymap(context: &xkb::Context, fd: OwnedFd, size: u32) -> Result<xkb::Keymap> {
    let map = unsafe { MmapOptions::new().len(size as usize).map_copy_read_only(&fd) }
        .map_err(|err| RingError::Keymap(format!("cannot map keymap: {err}")))?;

    let text = std::str::from_utf8(&map)
        .map_err(|err| RingError::Keymap(format!("keymap is not UTF-8: {err}")))?
        .trim_end_matches('\0');

    xkb::Keymap::new_from_string(
        context,
        text.to_string(),
        xkb::KEYMAP_FORMAT_TEXT_V1,
        xkb::KEYMAP_COMPILE_NO_FLAGS,
    )
    .ok_or_else(|| RingError::Keymap("xkbcommon rejected the keymap".to_string()))
}

impl Session {
    pub(crate) fn on_seat_capabilities(&mut self, seat: &WlSeat, caps: wl_seat::Capability) {
        let has_keyboard = caps.contains(wl_seat::Capability::Keyboard);

        if has_keyboard && self.keyboard.is_none() {
            info!("⌨️ Keyboard attached");
            self.keyboard = Some(Keyboard {
                wl_keyboard: seat.get_keyboard(&self.qh, ()),
                xkb_context: xkb::Context::new(xkb::CONTEXT_NO_FLAGS),
                xkb_state: None,
                modifiers: ModifierMask::default(),
                repeat: RepeatState::new(),
                repeat_token: None,
            });
        } else if !has_keyboard {
            if let Some(keyboard) = self.keyboard.take() {
                info!("⌨️ Keyboard capability removed");
                self.detach_keyboard(keyboard);
            }
        }
    }

    fn detach_keyboard(&mut self, keyboard: Keyboard) {
        if let Some(token) = keyboard.repeat_token {
            self.loop_handle.remove(token);
        }
        if keyboard.wl_keyboard.version() >= 3 {
            keyboard.wl_keyboard.release();
        }
    }

    pub(crate) fn on_keymap(&mut self, format: WEnum<KeymapFormat>, fd: OwnedFd, size: u32) {
        let Some(keyboard) = self.keyboard.as_mut() else {
            return;
        };
        if format != WEnum::Value(KeymapFormat::XkbV1) {
            warn!("Ignoring keymap in unsupported format {:?}", format);
            return;
        }

        match compile_keymap(&keyboard.xkb_context, fd, size) {
            Ok(keymap) => {
                debug!("Compiled {} byte keymap", size);
                keyboard.xkb_state = Some(xkb::State::new(&keymap));
            }
            Err(err) => {
                error!("{}", err);
                self.fail(err);
            }
        }
    }

    pub(crate) fn on_modifiers(&mut self, modifiers: ModifierMask) {
        let Some(keyboard) = self.keyboard.as_mut() else {
            return;
        };
        keyboard.modifiers = modifiers;
        if let Some(state) = keyboard.xkb_state.as_mut() {
            state.update_mask(
                modifiers.depressed,
                modifiers.latched,
                modifiers.locked,
                0,
                0,
                modifiers.group,
            );
        }
    }

    pub(crate) fn on_key(&mut self, raw_code: u32, pressed: bool) {
        if !self.is_running() {
            return;
        }
        let Some(keyboard) = self.keyboard.as_mut() else {
            return;
        };
        let Some(state) = keyboard.xkb_state.as_ref() else {
            warn!("Key {} arrived before a keymap, ignoring", raw_code);
            return;
        };
        let Some(keycode) = xkb_keycode(raw_code) else {
            warn!("Key code {} out of range, ignoring", raw_code);
            return;
        };

        let sym = state.key_get_one_sym(keycode);
        let (redraw, command) = self.run.key(&mut self.menu, &mut keyboard.repeat, sym, pressed);

        if redraw {
            self.repaint();
        }
        self.apply_repeat(command);
    }

    pub(crate) fn on_repeat_rate(&mut self, rate: i32, delay: i32) {
        if let Some(keyboard) = self.keyboard.as_mut() {
            debug!("Key repeat: rate={} delay={}ms", rate, delay);
            let command = keyboard.repeat.set_rate(rate, delay);
            self.apply_repeat(command);
        }
    }

    pub(crate) fn on_keyboard_leave(&mut self) {
        if let Some(keyboard) = self.keyboard.as_mut() {
            let command = keyboard.repeat.cancel();
            self.apply_repeat(command);
        }
    }

    /// Arm, rearm or cancel the repeat timer source. Arming always replaces
    /// the previous source; cancelling twice is harmless.
    fn apply_repeat(&mut self, command: TimerCommand) {
        let Some(keyboard) = self.keyboard.as_mut() else {
            return;
        };
        if command == TimerCommand::Keep {
            return;
        }
        if let Some(token) = keyboard.repeat_token.take() {
            self.loop_handle.remove(token);
        }
        let TimerCommand::Arm(delay) = command else {
            return;
        };

        let inserted = self.loop_handle.insert_source(
            Timer::from_duration(delay),
            |_deadline, _, session: &mut Session| session.fire_repeat(),
        );
        match inserted {
            Ok(token) => keyboard.repeat_token = Some(token),
            Err(err) => warn!("Failed to arm key repeat: {}", err.error),
        }
    }

    /// Replay the armed key and schedule the next repeat after the period
    pub(crate) fn fire_repeat(&mut self) -> TimeoutAction {
        let Some(keyboard) = self.keyboard.as_mut() else {
            return TimeoutAction::Drop;
        };
        match self.run.repeat(&mut self.menu, &mut keyboard.repeat) {
            Some((redraw, period)) => {
                if redraw {
                    self.repaint();
                }
                TimeoutAction::ToDuration(period)
            }
            None => {
                keyboard.repeat_token = None;
                TimeoutAction::Drop
            }
        }
    }
}

impl Dispatch<WlSeat, ()> for Session {
    fn event(
        session: &mut Self,
        seat: &WlSeat,
        event: wl_seat::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_seat::Event::Capabilities {
                capabilities: WEnum::Value(caps),
            } => session.on_seat_capabilities(seat, caps),
            wl_seat::Event::Name { name } => debug!("Seat name: {}", name),
            _ => {}
        }
    }
}

impl Dispatch<WlKeyboard, ()> for Session {
    fn event(
        session: &mut Self,
        _keyboard: &WlKeyboard,
        event: wl_keyboard::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_keyboard::Event::Keymap { format, fd, size } => session.on_keymap(format, fd, size),
            wl_keyboard::Event::Enter { .. } => debug!("Keyboard focus entered"),
            wl_keyboard::Event::Leave { .. } => {
                debug!("Keyboard focus left");
                session.on_keyboard_leave();
            }
            wl_keyboard::Event::Key { key, state, .. } => {
                session.on_key(key, state == WEnum::Value(KeyState::Pressed));
            }
            wl_keyboard::Event::Modifiers {
                mods_depressed,
                mods_latched,
                mods_locked,
                group,
                ..
            } => session.on_modifiers(ModifierMask {
                depressed: mods_depressed,
                latched: mods_latched,
                locked: mods_locked,
                group,
            }),
            wl_keyboard::Event::RepeatInfo { rate, delay } => session.on_repeat_rate(rate, delay),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xkbcommon::xkb::keysyms;

    #[test]
    fn test_menu_key_mapping() {
        let key = |raw| menu_key(xkb::Keysym::from(raw));
        assert_eq!(key(keysyms::KEY_j), MenuKey::Down);
        assert_eq!(key(keysyms::KEY_Down), MenuKey::Down);
        assert_eq!(key(keysyms::KEY_k), MenuKey::Up);
        assert_eq!(key(keysyms::KEY_Up), MenuKey::Up);
        assert_eq!(key(keysyms::KEY_Return), MenuKey::Confirm);
        assert_eq!(key(keysyms::KEY_KP_Enter), MenuKey::Confirm);
        assert_eq!(key(keysyms::KEY_Escape), MenuKey::Cancel);
        assert_eq!(key(keysyms::KEY_J), MenuKey::Other);
        assert_eq!(key(keysyms::KEY_space), MenuKey::Other);
    }

    #[test]
    fn test_keycode_offset_never_overflows() {
        assert_eq!(xkb_keycode(36), Some(xkb::Keycode::from(44u32)));
        assert_eq!(xkb_keycode(u32::MAX - EVDEV_OFFSET), Some(xkb::Keycode::from(u32::MAX)));
        assert_eq!(xkb_keycode(u32::MAX - 7 + 1), None);
        assert_eq!(xkb_keycode(u32::MAX), None);
    }

    #[test]
    fn test_dispatch_release_only_touches_the_schedule() {
        let mut menu = MenuState::new(vec!["a".to_string(), "b".to_string()]).unwrap();
        let mut repeat = RepeatState::new();
        let down = xkb::Keysym::from(keysyms::KEY_Down);

        let (action, command) = dispatch_key(&mut menu, &mut repeat, down, true);
        assert_eq!(action, MenuAction::Redraw);
        assert!(matches!(command, TimerCommand::Arm(_)));

        let (action, command) = dispatch_key(&mut menu, &mut repeat, down, false);
        assert_eq!(action, MenuAction::None);
        assert_eq!(command, TimerCommand::Disarm);
        assert_eq!(menu.selected(), 1);
        assert_eq!(dispatch_repeat(&mut menu, &mut repeat), None);
    }

    #[test]
    fn test_keymap_compiles_from_descriptor() {
        use std::io::Write;

        let context = xkb::Context::new(xkb::CONTEXT_NO_FLAGS);
        let Some(reference) = xkb::Keymap::new_from_names(
            &context,
            "",
            "",
            "us",
            "",
            None,
            xkb::KEYMAP_COMPILE_NO_FLAGS,
        ) else {
            // No xkeyboard-config data on this machine
            return;
        };

        let text = reference.get_as_string(xkb::KEYMAP_FORMAT_TEXT_V1);
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file.write_all(b"\0").unwrap();
        let size = text.len() as u32 + 1;

        let keymap = compile_keymap(&context, OwnedFd::from(file), size).unwrap();
        let state = xkb::State::new(&keymap);
        // evdev KEY_J is 36
        let sym = state.key_get_one_sym(xkb_keycode(36).unwrap());
        assert_eq!(menu_key(sym), MenuKey::Down);
    }

    #[test]
    fn test_garbage_keymap_is_rejected() {
        use std::io::Write;

        let context = xkb::Context::new(xkb::CONTEXT_NO_FLAGS);
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"this is not a keymap\0").unwrap();

        let result = compile_keymap(&context, OwnedFd::from(file), 21);
        assert!(matches!(result, Err(RingError::Keymap(_))));
    }
}
