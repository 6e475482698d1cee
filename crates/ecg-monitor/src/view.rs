//! Console presentation: trace rendering, zoom and metric labels

use ecg_core::{MetricsSnapshot, RawSample, SampleRange};
use ecg_processing::ControlAction;

/// Multiplier applied per zoom step
const ZOOM_STEP: f64 = 1.2;

const LEVELS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Vertical zoom of the trace around the range midpoint
///
/// Purely presentational; it never touches the sample buffers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YAxisZoom {
    range: SampleRange,
    factor: f64,
}

impl YAxisZoom {
    pub fn new(range: SampleRange) -> Self {
        YAxisZoom { range, factor: 1.0 }
    }

    pub fn zoom_in(&mut self) {
        self.factor *= ZOOM_STEP;
    }

    /// Zooming out stops once the full range is visible
    pub fn zoom_out(&mut self) {
        self.factor = (self.factor / ZOOM_STEP).max(1.0);
    }

    pub fn reset(&mut self) {
        self.factor = 1.0;
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Visible value range, clamped to the device range
    pub fn visible_range(&self) -> (f64, f64) {
        let mid = f64::from(self.range.midpoint());
        let half = (f64::from(self.range.span()) + 1.0) / 2.0;
        let lo = (mid - half / self.factor).max(f64::from(self.range.min));
        let hi = (mid + half / self.factor).min(f64::from(self.range.max));
        (lo, hi)
    }
}

/// Render a trace as a one-line sparkline of at most `width` columns
///
/// Each column shows the largest sample of its bucket so R waves stay visible.
pub fn render_trace(trace: &[RawSample], zoom: &YAxisZoom, width: usize) -> String {
    if trace.is_empty() || width == 0 {
        return String::new();
    }

    let columns = width.min(trace.len());
    let (lo, hi) = zoom.visible_range();
    let top = (LEVELS.len() - 1) as f64;

    (0..columns)
        .map(|col| {
            let start = col * trace.len() / columns;
            let end = ((col + 1) * trace.len() / columns).max(start + 1);
            let peak = trace[start..end].iter().copied().max().unwrap_or(trace[start]);

            let level = ((f64::from(peak) - lo) / (hi - lo) * top).round().clamp(0.0, top);
            LEVELS[level as usize]
        })
        .collect()
}

/// Trace line with the current zoom factor appended
pub fn format_trace(trace: &[RawSample], zoom: &YAxisZoom, width: usize) -> String {
    format!("|{}| x{:.2}", render_trace(trace, zoom, width), zoom.factor())
}

pub fn format_bpm(metrics: &MetricsSnapshot) -> String {
    format!("{} BPM", metrics.heart_rate_bpm)
}

pub fn format_amplitude(metrics: &MetricsSnapshot) -> String {
    format!("{} units", metrics.amplitude)
}

/// One status line for a published snapshot
pub fn format_metrics(metrics: &MetricsSnapshot) -> String {
    let mut line = format!(
        "{} | {} | {}",
        format_bpm(metrics),
        format_amplitude(metrics),
        metrics.quality.label()
    );
    if let Some(at) = metrics.published_at {
        line = format!("[{}] {}", at.format("%H:%M:%S"), line);
    }
    line
}

/// Keyboard commands read from stdin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Control(ControlAction),
    ZoomIn,
    ZoomOut,
    ZoomReset,
    Quit,
}

pub fn parse_command(line: &str) -> Option<ConsoleCommand> {
    match line.trim().to_ascii_lowercase().as_str() {
        "p" | "pause" | "resume" => Some(ConsoleCommand::Control(ControlAction::TogglePause)),
        "r" | "reset" => Some(ConsoleCommand::Control(ControlAction::Reset)),
        "d" | "disconnect" => Some(ConsoleCommand::Control(ControlAction::Disconnect)),
        "+" => Some(ConsoleCommand::ZoomIn),
        "-" => Some(ConsoleCommand::ZoomOut),
        "=" => Some(ConsoleCommand::ZoomReset),
        "q" | "quit" | "exit" => Some(ConsoleCommand::Quit),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono::Utc;
    use ecg_core::SignalQuality;

    fn snapshot() -> MetricsSnapshot {
        MetricsSnapshot {
            amplitude: 210,
            heart_rate_bpm: 72,
            quality: SignalQuality::Good,
            peaks: 6,
            window_len: 100,
            published_at: None,
        }
    }

    #[test]
    fn test_full_range_at_unit_zoom() {
        let zoom = YAxisZoom::new(SampleRange::TEN_BIT);
        assert_eq!(zoom.visible_range(), (0.0, 1023.0));
    }

    #[test]
    fn test_zoom_in_narrows_around_midpoint() {
        let mut zoom = YAxisZoom::new(SampleRange::TEN_BIT);
        zoom.zoom_in();
        let (lo, hi) = zoom.visible_range();
        assert!((lo - (512.0 - 512.0 / 1.2)).abs() < 1e-9);
        assert!((hi - (512.0 + 512.0 / 1.2)).abs() < 1e-9);

        zoom.zoom_out();
        assert_eq!(zoom.visible_range(), (0.0, 1023.0));
    }

    #[test]
    fn test_zoom_out_stops_at_full_range() {
        let mut zoom = YAxisZoom::new(SampleRange::TEN_BIT);
        zoom.zoom_out();
        zoom.zoom_out();
        assert_eq!(zoom.factor(), 1.0);

        zoom.zoom_in();
        zoom.zoom_in();
        zoom.reset();
        assert_eq!(zoom.factor(), 1.0);
    }

    #[test]
    fn test_full_width_range_zoom() {
        let mut zoom = YAxisZoom::new(SampleRange::new(i32::MIN, i32::MAX, 0).unwrap());
        assert_eq!(zoom.visible_range(), (f64::from(i32::MIN), f64::from(i32::MAX)));
        zoom.zoom_in();
        let (lo, hi) = zoom.visible_range();
        assert!(lo > f64::from(i32::MIN) && hi < f64::from(i32::MAX));
    }

    #[test]
    fn test_render_trace_levels() {
        let zoom = YAxisZoom::new(SampleRange::TEN_BIT);
        assert_eq!(render_trace(&[0, 1023], &zoom, 80), " █");
        assert_eq!(render_trace(&[], &zoom, 80), "");
    }

    #[test]
    fn test_render_trace_keeps_peaks_when_downsampling() {
        let zoom = YAxisZoom::new(SampleRange::TEN_BIT);
        let mut trace = vec![0; 250];
        trace[3] = 1023;
        let line = render_trace(&trace, &zoom, 50);
        assert_eq!(line.chars().count(), 50);
        assert_eq!(line.chars().next(), Some('█'));
    }

    #[test]
    fn test_zoomed_trace_clips() {
        let mut zoom = YAxisZoom::new(SampleRange::TEN_BIT);
        for _ in 0..5 {
            zoom.zoom_in();
        }
        assert_eq!(render_trace(&[0, 512, 1023], &zoom, 3), " ▄█");
    }

    #[test]
    fn test_format_trace_shows_zoom() {
        let mut zoom = YAxisZoom::new(SampleRange::TEN_BIT);
        assert_eq!(format_trace(&[0, 1023], &zoom, 80), "| █| x1.00");
        zoom.zoom_in();
        assert!(format_trace(&[512], &zoom, 80).ends_with("| x1.20"));
    }

    #[test]
    fn test_format_metrics() {
        let metrics = snapshot();
        assert_eq!(format_bpm(&metrics), "72 BPM");
        assert_eq!(format_amplitude(&metrics), "210 units");
        assert_eq!(format_metrics(&metrics), "72 BPM | 210 units | Good");

        let stamped = metrics.stamped(Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 5).unwrap());
        assert_eq!(format_metrics(&stamped), "[09:30:05] 72 BPM | 210 units | Good");
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(
            parse_command(" P \n"),
            Some(ConsoleCommand::Control(ControlAction::TogglePause))
        );
        assert_eq!(parse_command("reset"), Some(ConsoleCommand::Control(ControlAction::Reset)));
        assert_eq!(
            parse_command("d"),
            Some(ConsoleCommand::Control(ControlAction::Disconnect))
        );
        assert_eq!(parse_command("+"), Some(ConsoleCommand::ZoomIn));
        assert_eq!(parse_command("="), Some(ConsoleCommand::ZoomReset));
        assert_eq!(parse_command("q"), Some(ConsoleCommand::Quit));
        assert_eq!(parse_command("hello"), None);
    }
}
