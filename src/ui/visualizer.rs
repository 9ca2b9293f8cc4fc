//! Synthetic heartbeat line shown while a recording is in progress.
//!
//! The trace is decorative. It does not reflect captured audio.

use ratatui::{
    prelude::*,
    symbols::Marker,
    widgets::{Axis, Chart, Dataset, GraphType},
};
use std::time::{Duration, Instant};

pub const POINTS: usize = 20;
pub const REFRESH: Duration = Duration::from_millis(50);
const AMPLITUDE: f64 = 0.8;
const LINE: Color = Color::Rgb(255, 123, 0);

/// Samples the wave at `t_ms` milliseconds since activation.
pub fn wave(t_ms: f64) -> Vec<f64> {
    (0..POINTS)
        .map(|i| (t_ms / 200.0 + i as f64 * 0.5).sin() * AMPLITUDE)
        .collect()
}

pub struct HeartbeatVisualizer {
    data: Vec<(f64, f64)>,
    active: bool,
    started: Instant,
    last_refresh: Option<Instant>,
}

impl HeartbeatVisualizer {
    pub fn new() -> Self {
        Self {
            data: (0..POINTS).map(|i| (i as f64, 0.0)).collect(),
            active: false,
            started: Instant::now(),
            last_refresh: None,
        }
    }

    /// Activating restarts the wave clock. Deactivating freezes the last frame.
    pub fn set_active(&mut self, active: bool) {
        if active && !self.active {
            self.started = Instant::now();
            self.last_refresh = None;
        }
        self.active = active;
    }

    /// Recomputes the trace when active and at least one refresh period has passed.
    pub fn tick(&mut self, now: Instant) {
        if !self.active {
            return;
        }
        if self
            .last_refresh
            .is_some_and(|last| now.saturating_duration_since(last) < REFRESH)
        {
            return;
        }

        let t_ms = now.saturating_duration_since(self.started).as_secs_f64() * 1000.0;
        self.data = wave(t_ms)
            .into_iter()
            .enumerate()
            .map(|(i, y)| (i as f64, y))
            .collect();
        self.last_refresh = Some(now);
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let dataset = Dataset::default()
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(LINE))
            .data(&self.data);

        let chart = Chart::new(vec![dataset])
            .x_axis(Axis::default().bounds([0.0, (POINTS - 1) as f64]))
            .y_axis(Axis::default().bounds([-1.0, 1.0]));

        frame.render_widget(chart, area);
    }
}

impl Default for HeartbeatVisualizer {
    fn default() -> Self {
        Self::new()
    }
}
