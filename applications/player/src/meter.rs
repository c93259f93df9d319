//! Terminal level meter

use std::fmt::Write;

const BLOCKS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Render one block glyph per band, picked by level in `0.0..=1.0`
pub fn render_bars(levels: &[f32]) -> String {
    levels
        .iter()
        .map(|level| {
            let index = (level.clamp(0.0, 1.0) * (BLOCKS.len() - 1) as f32).round() as usize;
            BLOCKS[index.min(BLOCKS.len() - 1)]
        })
        .collect()
}

/// Format seconds as `m:ss`
pub fn format_time(secs: f64) -> String {
    let total = if secs.is_finite() { secs.max(0.0) as u64 } else { 0 };
    format!("{}:{:02}", total / 60, total % 60)
}

/// One status line: bars, position and title
pub fn status_line(levels: &[f32], current_time: f64, duration: f64, title: &str) -> String {
    let mut line = String::new();
    let _ = write!(
        line,
        "[{}] {} / {}  {}",
        render_bars(levels),
        format_time(current_time),
        format_time(duration),
        title
    );
    line
}
