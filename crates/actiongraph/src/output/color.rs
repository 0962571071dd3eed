//! Color and styling helpers for CLI output.
//!
//! Semantic Color Theme:
//!   - Success/Done:    green  (done actions, confirmations)
//!   - Warning/Pending: yellow (blocked actions, skipped repairs)
//!   - Error:           red
//!   - Info/Reference:  cyan   (action IDs, arrows)
//!   - Muted:           dimmed (field labels, connectors)
//!   - Emphasis:        bold   (section headers)

use colored::Colorize;

use super::OutputConfig;

/// Apply semantic "success" color (green) to text.
pub fn success(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.green().to_string()
}

/// Apply semantic "error" color (red) to text.
pub fn error(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.red().to_string()
}

/// Apply semantic "warning" color (yellow) to text.
pub fn warning(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.yellow().to_string()
}

/// Colorize an action ID (cyan).
pub(crate) fn colorize_id(id: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return id.to_string();
    }
    id.cyan().to_string()
}

/// Completion icon, with ASCII fallback.
pub(crate) fn done_icon(done: bool, config: &OutputConfig) -> String {
    let icon = match (done, config.use_ascii) {
        (true, true) => "+",
        (false, true) => "o",
        (true, false) => "✓",
        (false, false) => "○",
    };

    if !config.use_colors {
        return icon.to_string();
    }
    if done {
        icon.green().to_string()
    } else {
        icon.white().to_string()
    }
}

/// Apply dimmed style to text (for labels/field names).
pub(crate) fn dimmed(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.dimmed().to_string()
}

/// Apply bold style to text (for section headers).
pub(crate) fn bold(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.bold().to_string()
}

/// Apply cyan color to text (for arrows/connectors).
pub(crate) fn cyan(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.cyan().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn plain(use_ascii: bool) -> OutputConfig {
        OutputConfig::new(80, use_ascii, false)
    }

    #[rstest]
    #[case(true, true, "+")]
    #[case(false, true, "o")]
    #[case(true, false, "✓")]
    #[case(false, false, "○")]
    fn test_done_icon(#[case] done: bool, #[case] ascii: bool, #[case] expected: &str) {
        assert_eq!(done_icon(done, &plain(ascii)), expected);
    }

    #[test]
    fn test_no_color_passthrough() {
        let config = plain(false);
        assert_eq!(success("ok", &config), "ok");
        assert_eq!(error("bad", &config), "bad");
        assert_eq!(warning("hm", &config), "hm");
        assert_eq!(colorize_id("act-1", &config), "act-1");
    }
}
