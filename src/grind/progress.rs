//! Cosmetic Progress
//!
//! The search tool reports no intermediate count, so progress is a cycling
//! indicator driven by wall time only.

use std::time::Duration;

/// Wall time for the indicator to sweep from empty to full
pub const CYCLE: Duration = Duration::from_secs(150);

/// Number of cells in the rendered bar
pub const CELLS: u32 = 10;

/// Fraction in `[0, 0.9]` for the given elapsed time
pub fn cosmetic_fraction(elapsed: Duration) -> f64 {
    let cycle = CYCLE.as_secs_f64();
    let cell = cycle / CELLS as f64;
    let filled = ((elapsed.as_secs_f64() % cycle) / cell).floor();
    filled / CELLS as f64
}

/// Render a fraction as the filled/empty cell bar
pub fn render_bar(fraction: f64) -> String {
    let filled = ((fraction.clamp(0.0, 1.0) * CELLS as f64).round() as u32).min(CELLS);
    let mut bar = "▓".repeat(filled as usize);
    bar.push_str(&"░".repeat((CELLS - filled) as usize));
    bar
}
