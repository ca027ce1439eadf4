//! Top-level function extraction and name canonicalization.

use std::collections::HashMap;
use std::ops::Range;

use regex::Regex;

use super::Preprocessor;

/// Canonicalizes user-defined top-level functions.
///
/// 1. When the snippet has top-level statements besides definitions, any
///    definition whose name never appears outside its own block is dropped.
/// 2. Remaining functions are renamed `func0`, `func1`, ... in definition
///    order, rewriting every whole-word occurrence that is not an
///    attribute access (`s.split` stays as is when `split` is user-defined).
///
/// Snippets without a recognizable `def` pass through unchanged.
#[derive(Debug, Clone, Default)]
pub struct FunctionPreprocessor;

#[derive(Debug)]
struct FunctionBlock {
    name: String,
    lines: Range<usize>,
}

impl FunctionPreprocessor {
    pub fn new() -> Self {
        Self
    }
}

impl Preprocessor for FunctionPreprocessor {
    fn name(&self) -> &'static str {
        "function"
    }

    fn process(&self, code: &str) -> String {
        let lines: Vec<&str> = code.split('\n').collect();
        let (blocks, has_statements) = scan_blocks(&lines);
        if blocks.is_empty() {
            return code.to_string();
        }

        let mut dropped = vec![false; blocks.len()];
        if has_statements {
            for (k, block) in blocks.iter().enumerate() {
                let outside: Vec<&str> = lines
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| !block.lines.contains(i))
                    .map(|(_, l)| *l)
                    .collect();
                match word_regex(std::slice::from_ref(&block.name)) {
                    Some(re) => {
                        let outside = outside.join("\n");
                        dropped[k] = !re.find_iter(&outside).any(|m| !is_attribute(&outside, m.start()));
                    }
                    None => return code.to_string(),
                }
            }
        }

        let kept_lines: Vec<&str> = lines
            .iter()
            .enumerate()
            .filter(|(i, _)| {
                !blocks
                    .iter()
                    .zip(&dropped)
                    .any(|(b, &d)| d && b.lines.contains(i))
            })
            .map(|(_, l)| *l)
            .collect();
        let kept_text = kept_lines.join("\n");

        let mut canonical: HashMap<String, String> = HashMap::new();
        let mut order = Vec::new();
        for (block, _) in blocks.iter().zip(&dropped).filter(|(_, &d)| !d) {
            if !canonical.contains_key(&block.name) {
                canonical.insert(block.name.clone(), format!("func{}", order.len()));
                order.push(block.name.clone());
            }
        }
        if order.is_empty() {
            return kept_text;
        }

        match word_regex(&order) {
            Some(re) => re
                .replace_all(&kept_text, |caps: &regex::Captures<'_>| {
                    let whole = caps.get(0).map_or(0, |m| m.start());
                    if is_attribute(&kept_text, whole) {
                        return caps[0].to_string();
                    }
                    canonical
                        .get(&caps[0])
                        .cloned()
                        .unwrap_or_else(|| caps[0].to_string())
                })
                .into_owned(),
            None => kept_text,
        }
    }
}

/// Whole-word alternation over identifiers.
fn word_regex(names: &[String]) -> Option<Regex> {
    let alternation = names
        .iter()
        .map(|n| regex::escape(n))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"\b(?:{})\b", alternation)).ok()
}

/// Whether the identifier at byte `start` follows a `.`.
fn is_attribute(text: &str, start: usize) -> bool {
    text[..start].ends_with('.')
}

/// Split lines into top-level function blocks; also report whether any
/// other top-level statement exists.
fn scan_blocks(lines: &[&str]) -> (Vec<FunctionBlock>, bool) {
    let mut blocks = Vec::new();
    let mut has_statements = false;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        if !is_top_level(line) {
            i += 1;
            continue;
        }

        let mut header = i;
        while header < lines.len() && lines[header].starts_with('@') {
            header += 1;
        }

        match lines.get(header).and_then(|l| def_name(l)) {
            Some(name) => {
                let mut end = header + 1;
                while end < lines.len() && is_continuation(lines[end]) {
                    end += 1;
                }
                blocks.push(FunctionBlock {
                    name: name.to_string(),
                    lines: i..end,
                });
                i = end;
            }
            None => {
                if !line.starts_with('#') {
                    has_statements = true;
                }
                i += 1;
            }
        }
    }

    (blocks, has_statements)
}

fn is_top_level(line: &str) -> bool {
    line.chars().next().is_some_and(|c| !c.is_whitespace())
}

/// Lines belonging to the block opened by the previous top-level line:
/// blanks, indented lines, and a closing paren of a wrapped signature.
fn is_continuation(line: &str) -> bool {
    line.trim().is_empty() || line.starts_with(char::is_whitespace) || line.starts_with(')')
}

/// Name declared by a `def` / `async def` header, if the line is one.
fn def_name(line: &str) -> Option<&str> {
    let rest = match line.strip_prefix("async") {
        Some(after) if after.starts_with(char::is_whitespace) => after.trim_start(),
        _ => line,
    };
    let rest = rest.strip_prefix("def")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim_start();
    let end = rest
        .char_indices()
        .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(rest.len());
    let (name, tail) = rest.split_at(end);
    let starts_ok = name.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_');
    if starts_ok && tail.trim_start().starts_with('(') {
        Some(name)
    } else {
        None
    }
}
