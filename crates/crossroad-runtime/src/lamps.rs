//! Lamp bank shared between the controller and an observer

use std::sync::Arc;

use parking_lot::Mutex;

use crossroad_core::{Color, LampBank, LightMode, LightPanel};

/// Cloneable handle to a `LampBank`
///
/// One clone drives the lamps inside the controller; another lets a test or
/// a simulator look at what is lit.
#[derive(Clone, Debug, Default)]
pub struct SharedLamps(Arc<Mutex<LampBank>>);

impl SharedLamps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self, color: Color) -> LightMode {
        self.0.lock().mode(color)
    }

    pub fn is_four_way_stop(&self) -> bool {
        self.0.lock().is_four_way_stop()
    }
}

impl LightPanel for SharedLamps {
    fn set_light(&mut self, color: Color, mode: LightMode) {
        tracing::trace!(?color, ?mode, "lamp");
        self.0.lock().set_light(color, mode);
    }
}
