//! Whitespace-level normalization for encoder-decoder families.

use super::Preprocessor;

/// Light normalization that keeps code structure intact.
///
/// Strips a BOM and control characters other than tab and newline,
/// normalizes line endings to `\n`, trims trailing whitespace, collapses
/// runs of blank lines and trims blank lines at both ends.
#[derive(Debug, Clone, Default)]
pub struct BasePreprocessor;

impl BasePreprocessor {
    pub fn new() -> Self {
        Self
    }
}

impl Preprocessor for BasePreprocessor {
    fn name(&self) -> &'static str {
        "base"
    }

    fn process(&self, code: &str) -> String {
        let unified = code.replace("\r\n", "\n").replace('\r', "\n");
        let cleaned: String = unified
            .chars()
            .filter(|&c| c != '\u{feff}' && (c == '\n' || c == '\t' || !c.is_control()))
            .collect();

        let mut lines: Vec<&str> = Vec::new();
        let mut previous_blank = true;
        for line in cleaned.split('\n').map(str::trim_end) {
            let blank = line.is_empty();
            if blank && previous_blank {
                continue;
            }
            lines.push(line);
            previous_blank = blank;
        }
        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }
        lines.join("\n")
    }
}
