//! Removal of terminal UI artifacts from captured runner output.
//!
//! Runners that draw progress spinners interleave ANSI control sequences and
//! braille spinner frames with the generated text. Both are stripped here
//! before anything downstream counts tokens.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::throughput::is_separator;

/// ANSI CSI sequence: `ESC [`, parameter bytes, intermediate bytes, one final byte.
static ANSI_CSI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1B\[[0-?]*[ -/]*[@-~]").expect("valid CSI pattern"));

/// Braille frames used by the runner's progress spinner.
pub const SPINNER_GLYPHS: &[char] = &['⠙', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏', '⠹'];

static SPINNER_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[⠙⠸⠼⠴⠦⠧⠇⠏⠹]+").expect("valid spinner pattern"));

/// Strip ANSI CSI sequences and spinner glyph runs, then trim surrounding whitespace.
///
/// Removal repeats until nothing matches, so a sequence that only forms once an
/// inner one is gone (`ESC ⠙ [31m`, `ESC ESC[0m [1m`) is removed as well and
/// the result is a fixed point: `sanitize(&sanitize(s)) == sanitize(s)`.
pub fn sanitize(raw: &str) -> String {
    let mut text = raw.to_string();
    loop {
        let stripped = ANSI_CSI.replace_all(&text, "");
        let stripped = SPINNER_RUN.replace_all(&stripped, "").into_owned();
        if stripped.len() == text.len() {
            break;
        }
        text = stripped;
    }
    text.trim_matches(is_separator).to_string()
}
