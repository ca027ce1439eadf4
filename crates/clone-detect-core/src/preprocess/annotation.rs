//! Comment and docstring removal.

use super::Preprocessor;

/// Strips `#` comments and standalone string statements (docstrings).
///
/// The scanner tracks string literals so a `#` inside a string is kept.
/// A string only counts as a statement outside brackets and off a
/// backslash continuation, so arguments and list items survive.
/// Lines left blank are dropped and trailing whitespace is trimmed. Input
/// with an unterminated string literal is returned unchanged.
#[derive(Debug, Clone, Default)]
pub struct AnnotationPreprocessor;

impl AnnotationPreprocessor {
    pub fn new() -> Self {
        Self
    }
}

impl Preprocessor for AnnotationPreprocessor {
    fn name(&self) -> &'static str {
        "annotation"
    }

    fn process(&self, code: &str) -> String {
        match strip_annotations(code) {
            Some(stripped) => stripped
                .lines()
                .map(str::trim_end)
                .filter(|l| !l.is_empty())
                .collect::<Vec<_>>()
                .join("\n"),
            None => code.to_string(),
        }
    }
}

const STRING_PREFIX: &[char] = &['r', 'R', 'b', 'B', 'u', 'U', 'f', 'F'];

/// Remove comments and statement strings. `None` on an unterminated literal.
fn strip_annotations(code: &str) -> Option<String> {
    let chars: Vec<char> = code.chars().collect();
    let mut out = String::with_capacity(code.len());
    let mut line_start = 0usize;
    let mut depth = 0usize;
    let mut continued = false;
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\n' => {
                continued = out.ends_with('\\');
                out.push(c);
                line_start = out.len();
                i += 1;
            }
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '\'' | '"' => {
                let statement_start = if depth == 0 && !continued {
                    statement_string_start(&out, line_start)
                } else {
                    None
                };
                let triple = i + 2 < chars.len() && chars[i + 1] == c && chars[i + 2] == c;
                let end = scan_string(&chars, i, c, triple)?;
                out.extend(&chars[i..end]);
                i = end;

                if let Some(start) = statement_start {
                    if rest_of_line_is_blank(&chars, i) {
                        out.truncate(start);
                    }
                }
            }
            '(' | '[' | '{' => {
                depth += 1;
                out.push(c);
                i += 1;
            }
            ')' | ']' | '}' => {
                depth = depth.saturating_sub(1);
                out.push(c);
                i += 1;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    Some(out)
}

/// Output offset where a string literal opened at the current position would
/// start, when nothing but indentation and a literal prefix precede it on
/// the line.
fn statement_string_start(out: &str, line_start: usize) -> Option<usize> {
    let line = &out[line_start..];
    let without_prefix = line.trim_end_matches(STRING_PREFIX);
    if line.len() - without_prefix.len() > 2 {
        return None;
    }
    if without_prefix.trim().is_empty() {
        Some(line_start + without_prefix.len())
    } else {
        None
    }
}

/// Index one past the closing quote, or `None` when the literal never closes.
fn scan_string(chars: &[char], open: usize, quote: char, triple: bool) -> Option<usize> {
    let mut j = open + if triple { 3 } else { 1 };
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 2,
            '\n' if !triple => return None,
            ch if ch == quote => {
                if !triple {
                    return Some(j + 1);
                }
                if j + 2 < chars.len() && chars[j + 1] == quote && chars[j + 2] == quote {
                    return Some(j + 3);
                }
                j += 1;
            }
            _ => j += 1,
        }
    }
    None
}

fn rest_of_line_is_blank(chars: &[char], from: usize) -> bool {
    for &c in &chars[from..] {
        match c {
            '\n' | '#' => return true,
            c if c.is_whitespace() => continue,
            _ => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(code: &str) -> String {
        AnnotationPreprocessor::new().process(code)
    }

    #[test]
    fn test_strips_comments() {
        assert_eq!(run("x = 1  # set x\n# full line\ny = 2"), "x = 1\ny = 2");
    }

    #[test]
    fn test_hash_inside_string_kept() {
        assert_eq!(run("s = '#not a comment'  # real"), "s = '#not a comment'");
        assert_eq!(run(r##"t = "a\"#b""##), r##"t = "a\"#b""##);
    }

    #[test]
    fn test_strips_docstrings() {
        let code = "def f(x):\n    \"\"\"Add one.\n\n    Longer text.\n    \"\"\"\n    return x + 1\n";
        assert_eq!(run(code), "def f(x):\n    return x + 1");
    }

    #[test]
    fn test_assigned_strings_kept() {
        let code = "doc = \"\"\"keep\nme\"\"\"\nr'raw'";
        assert_eq!(run(code), "doc = \"\"\"keep\nme\"\"\"");
    }

    #[test]
    fn test_bracketed_strings_kept() {
        assert_eq!(run("print(\n    \"hello\"\n)"), "print(\n    \"hello\"\n)");
        let code = "names = [\n    'a',\n    'b'\n]\ncall(x,\n     '''doc'''  # c\n)";
        assert_eq!(run(code), "names = [\n    'a',\n    'b'\n]\ncall(x,\n     '''doc'''\n)");
    }

    #[test]
    fn test_continuation_string_kept() {
        assert_eq!(run("x = 1 + \\\n    len('abc')"), "x = 1 + \\\n    len('abc')");
        assert_eq!(run("y = \\\n    'tail'"), "y = \\\n    'tail'");
    }

    #[test]
    fn test_docstring_after_closed_brackets_removed() {
        let code = "def f(a, b):\n    'doc'\n    return [a, b]";
        assert_eq!(run(code), "def f(a, b):\n    return [a, b]");
    }

    #[test]
    fn test_unterminated_string_passes_through() {
        let code = "x = 'oops\ny = 2  # c";
        assert_eq!(run(code), code);
        let code = "s = \"\"\"never closed";
        assert_eq!(run(code), code);
    }

    #[test]
    fn test_empty_and_plain() {
        assert_eq!(run(""), "");
        assert_eq!(run("def f(x): return x+1"), "def f(x): return x+1");
    }
}
