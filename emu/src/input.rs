//! Host keyboard and mouse events, normalized for the guest's input devices.
//!
//! This sits between a windowing library and the machine. It owns the
//! pressed-key table so that a lost key-up (e.g. when the host switches
//! desktops) can be repaired by releasing everything still held.

use bitflags::bitflags;
use log::debug;

pub const KEYCODE_MAX: u16 = 127;

/// Absolute pointer coordinates are scaled to `0..ABS_SCALE`.
pub const ABS_SCALE: i32 = 32768;

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct MouseButtons: u8 {
        const LEFT = 1 << 0;
        const RIGHT = 1 << 1;
        const MIDDLE = 1 << 2;
    }
}

/// Receives normalized events on behalf of the machine.
pub trait InputSink {
    fn key_event(&mut self, pressed: bool, keycode: u16);
    fn mouse_event(&mut self, x: i32, y: i32, dz: i32, buttons: MouseButtons);
    fn mouse_is_absolute(&self) -> bool;
}

/// Maps an X11 (evdev-based) scancode to a Linux input keycode.
pub fn x11_keycode(scancode: u32) -> Option<u16> {
    match scancode {
        9..=134 => Some((scancode - 8) as u16),
        _ => None,
    }
}

pub struct Keyboard {
    pressed: [bool; KEYCODE_MAX as usize + 1],
}

impl Default for Keyboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Keyboard {
    pub fn new() -> Self {
        Self {
            pressed: [false; KEYCODE_MAX as usize + 1],
        }
    }

    pub fn is_pressed(&self, keycode: u16) -> bool {
        self.pressed.get(keycode as usize).copied().unwrap_or(false)
    }

    pub fn handle_key(&mut self, scancode: u32, down: bool, sink: &mut dyn InputSink) {
        match x11_keycode(scancode) {
            Some(keycode) => {
                if let Some(slot) = self.pressed.get_mut(keycode as usize) {
                    *slot = down;
                }
                sink.key_event(down, keycode);
            }
            // an unknown key-up usually means the host stole the focus
            None if !down => self.reset(sink),
            None => {}
        }
    }

    /// Releases every key still held.
    pub fn reset(&mut self, sink: &mut dyn InputSink) {
        for keycode in 1..=KEYCODE_MAX {
            let slot = &mut self.pressed[keycode as usize];
            if *slot {
                debug!("input: releasing stuck key {keycode}");
                sink.key_event(false, keycode);
                *slot = false;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Left,
    Right,
    Middle,
    WheelUp,
    WheelDown,
}

impl Button {
    fn mask(self) -> MouseButtons {
        match self {
            Button::Left => MouseButtons::LEFT,
            Button::Right => MouseButtons::RIGHT,
            Button::Middle => MouseButtons::MIDDLE,
            Button::WheelUp | Button::WheelDown => MouseButtons::empty(),
        }
    }
}

/// Pointer state for a window of a fixed size.
pub struct Pointer {
    width: i32,
    height: i32,
}

impl Pointer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1) as i32,
            height: height.max(1) as i32,
        }
    }

    /// Motion at window position `(x, y)`, `(xrel, yrel)` from the last one.
    pub fn motion(
        &self,
        (x, y): (i32, i32),
        (xrel, yrel): (i32, i32),
        held: MouseButtons,
        sink: &mut dyn InputSink,
    ) {
        if sink.mouse_is_absolute() {
            self.send(x, y, 0, held, true, sink);
        } else {
            self.send(xrel, yrel, 0, held, false, sink);
        }
    }

    /// A button changed state at window position `(x, y)`. `held` is the
    /// button state the host reports, which may lag behind this event.
    pub fn button(
        &self,
        (x, y): (i32, i32),
        button: Button,
        down: bool,
        held: MouseButtons,
        sink: &mut dyn InputSink,
    ) {
        let dz = match (down, button) {
            (true, Button::WheelUp) => 1,
            (true, Button::WheelDown) => -1,
            _ => 0,
        };

        let mut buttons = held;
        buttons.set(button.mask(), down);

        if sink.mouse_is_absolute() {
            self.send(x, y, dz, buttons, true, sink);
        } else {
            self.send(0, 0, dz, buttons, false, sink);
        }
    }

    fn send(
        &self,
        x: i32,
        y: i32,
        dz: i32,
        buttons: MouseButtons,
        absolute: bool,
        sink: &mut dyn InputSink,
    ) {
        let (x, y) = if absolute {
            (x * ABS_SCALE / self.width, y * ABS_SCALE / self.height)
        } else {
            (x, y)
        };
        sink.mouse_event(x, y, dz, buttons);
    }
}
