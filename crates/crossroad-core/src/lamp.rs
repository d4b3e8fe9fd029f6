//! Lamp actuation interface
//!
//! The signal head is hardware; the protocol only ever asks for a colour to
//! be switched off, on, or blinking.

use crate::Light;

/// Physical lamp colour
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Color {
    Red,
    Green,
    Yellow,
}

impl Color {
    pub const ALL: [Color; 3] = [Color::Red, Color::Green, Color::Yellow];

    #[inline]
    fn index(self) -> usize {
        match self {
            Color::Red => 0,
            Color::Green => 1,
            Color::Yellow => 2,
        }
    }
}

/// Drive mode for a single lamp
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum LightMode {
    #[default]
    Off,
    On,
    Blink,
}

/// Hardware output collaborator
pub trait LightPanel: Send {
    /// Set one lamp
    fn set_light(&mut self, color: Color, mode: LightMode);

    /// Extinguish every lamp
    fn all_off(&mut self) {
        for color in Color::ALL {
            self.set_light(color, LightMode::Off);
        }
    }

    /// Show exactly one steady colour (or nothing for `Light::Unset`)
    fn show(&mut self, light: Light) {
        self.all_off();
        match light {
            Light::Red => self.set_light(Color::Red, LightMode::On),
            Light::Green => self.set_light(Color::Green, LightMode::On),
            Light::Unset => {}
        }
    }

    /// Blinking red on all approaches
    fn four_way_stop(&mut self) {
        self.all_off();
        self.set_light(Color::Red, LightMode::Blink);
    }
}

/// In-memory lamp bank that remembers the last mode of every lamp
#[derive(Clone, Debug, Default)]
pub struct LampBank {
    modes: [LightMode; 3],
}

impl LampBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current mode of a lamp
    pub fn mode(&self, color: Color) -> LightMode {
        self.modes[color.index()]
    }

    /// True when the red lamp is blinking and nothing else is lit
    pub fn is_four_way_stop(&self) -> bool {
        self.mode(Color::Red) == LightMode::Blink
            && self.mode(Color::Green) == LightMode::Off
            && self.mode(Color::Yellow) == LightMode::Off
    }
}

impl LightPanel for LampBank {
    fn set_light(&mut self, color: Color, mode: LightMode) {
        self.modes[color.index()] = mode;
    }
}
