use std::sync::{Arc, Mutex};

/// Sink for the wheel animation. Nothing flows back into the engine.
pub trait RenderSurface: Send + Sync + 'static {
    /// Called once per animation frame with the current rotation in degrees.
    fn draw_frame(&self, rotation_deg: f64);

    /// Called once when the wheel has stopped.
    fn show_outcome(&self, label: &str, stop_angle: f64);
}

/// Writes frames to the log at trace level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSurface;

impl RenderSurface for LogSurface {
    fn draw_frame(&self, rotation_deg: f64) {
        log::trace!("wheel frame: {rotation_deg:.2}°");
    }

    fn show_outcome(&self, label: &str, stop_angle: f64) {
        log::info!("Wheel stopped on {label} at {:.2}°", stop_angle % 360.0);
    }
}

/// Keeps every frame and outcome in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    frames: Arc<Mutex<Vec<f64>>>,
    outcomes: Arc<Mutex<Vec<String>>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<f64> {
        self.frames.lock().map(|f| f.clone()).unwrap_or_default()
    }

    pub fn outcomes(&self) -> Vec<String> {
        self.outcomes.lock().map(|o| o.clone()).unwrap_or_default()
    }
}

impl RenderSurface for RecordingSurface {
    fn draw_frame(&self, rotation_deg: f64) {
        if let Ok(mut frames) = self.frames.lock() {
            frames.push(rotation_deg);
        }
    }

    fn show_outcome(&self, label: &str, _stop_angle: f64) {
        if let Ok(mut outcomes) = self.outcomes.lock() {
            outcomes.push(label.to_string());
        }
    }
}
