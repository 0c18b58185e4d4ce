//! Shared formatting utilities for metric values and console output

use console::Emoji;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::results::Unit;

static EMOJI_DISABLED: AtomicBool = AtomicBool::new(false);

/// Switch every [`icon`] to its plain-text fallback (`--no-emoji`)
pub fn disable_emoji() {
    EMOJI_DISABLED.store(true, Ordering::Relaxed);
}

/// Render an emoji, or its fallback when emoji output is disabled or the
/// terminal cannot show it
pub fn icon(emoji: Emoji<'_, '_>) -> String {
    if EMOJI_DISABLED.load(Ordering::Relaxed) {
        emoji.1.to_string()
    } else {
        emoji.to_string()
    }
}

/// Rocket emoji for launch/start operations
pub const ROCKET: Emoji = Emoji("🚀 ", "");

/// Checkmark emoji for success
pub const CHECKMARK: Emoji = Emoji("✅ ", "[OK] ");

/// Crossmark emoji for failure
pub const CROSSMARK: Emoji = Emoji("❌ ", "[FAIL] ");

/// Sparkles emoji for completion/success
pub const SPARKLES: Emoji = Emoji("✨ ", "");

/// Chart emoji for metrics/statistics
pub const CHART: Emoji = Emoji("📊 ", "");

/// Warning emoji for caution/alerts
pub const WARNING: Emoji = Emoji("⚠️  ", "! ");

/// Format bytes as human-readable size string
///
/// # Examples
///
/// ```
/// use mobperf::fmt::format_bytes;
///
/// assert_eq!(format_bytes(512), "512 B");
/// assert_eq!(format_bytes(1024), "1.00 KB");
/// assert_eq!(format_bytes(1_048_576), "1.00 MB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format milliseconds, switching to seconds above 10s
pub fn format_ms(ms: f64) -> String {
    if ms.abs() >= 10_000.0 {
        format!("{:.2} s", ms / 1000.0)
    } else {
        format!("{:.1} ms", ms)
    }
}

/// Format a metric value with its unit.
///
/// Statistics such as means are fractional even for integral units, so
/// every unit keeps one or two decimals.
pub fn format_value(value: f64, unit: Unit) -> String {
    match unit {
        Unit::Ms => format_ms(value),
        Unit::Bytes if value >= 0.0 => format_bytes(value.round() as u64),
        Unit::Bytes => format!("-{}", format_bytes((-value).round() as u64)),
        Unit::Count => format!("{:.1}", value),
    }
}

/// Format a signed percentage (`+12.3%`, `-4.0%`)
pub fn format_percent(percent: f64) -> String {
    format!("{:+.1}%", percent)
}
