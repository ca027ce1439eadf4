//! In-memory tokenizers and sample code pairs.
//!
//! | Fixture | Specials (id order)                              | Pair template             |
//! |---------|--------------------------------------------------|---------------------------|
//! | BERT    | `[PAD] [UNK] [CLS] [SEP] [MASK]`                 | `[CLS] A [SEP] B [SEP]`   |
//! | T5      | `<pad> </s> <unk>`                               | `A </s> B </s>`           |
//! | BART    | `<s> <pad> </s> <unk>`                           | `<s> A </s> </s> B </s>`  |

use std::str::FromStr;

use serde_json::{json, Map, Value};
use tokenizers::Tokenizer;

/// Code-ish words known to every fixture vocabulary. The whitespace
/// pre-tokenizer splits runs of word characters from runs of punctuation.
const WORDS: &[&str] = &[
    "def", "return", "print", "if", "else", "elif", "for", "in", "range", "while", "import",
    "class", "self", "async", "await", "pass", "lambda", "None", "True", "False", "x", "y", "z",
    "a", "b", "c", "n", "i", "j", "f", "g", "s", "func0", "func1", "func2", "helper", "result",
    "value", "total", "len", "sum", "int", "str", "list", "main", "code1", "code2", "clone",
    "detection", "0", "1", "2", "3", "10", "100", "=", "+", "-", "*", "/", "%", "(", ")", "):",
    "()", "():", ",", ":", "[", "]", "{", "}", ";", "==", "<", ">", "<=", ">=", "+=", ".", "'",
    "\"",
];

fn special(id: &str, type_id: u32) -> Value {
    json!({ "SpecialToken": { "id": id, "type_id": type_id } })
}

fn sequence(id: &str, type_id: u32) -> Value {
    json!({ "Sequence": { "id": id, "type_id": type_id } })
}

/// Serialize a word-level tokenizer with the given special tokens (ids are
/// assigned in order) and template post-processor.
fn word_level_json(specials: &[&str], unk: &str, single: Value, pair: Value) -> String {
    let mut vocab = Map::new();
    let mut added = Vec::new();
    for (id, token) in specials.iter().enumerate() {
        vocab.insert((*token).to_string(), json!(id));
        added.push(json!({
            "id": id,
            "content": token,
            "single_word": false,
            "lstrip": false,
            "rstrip": false,
            "normalized": false,
            "special": true
        }));
    }
    for word in WORDS {
        let next = vocab.len();
        vocab.entry((*word).to_string()).or_insert(json!(next));
    }

    let mut special_tokens = Map::new();
    for token in specials {
        let id = vocab[*token].clone();
        special_tokens.insert(
            (*token).to_string(),
            json!({ "id": token, "ids": [id], "tokens": [token] }),
        );
    }

    json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": added,
        "normalizer": null,
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": {
            "type": "TemplateProcessing",
            "single": single,
            "pair": pair,
            "special_tokens": special_tokens
        },
        "decoder": null,
        "model": { "type": "WordLevel", "vocab": vocab, "unk_token": unk }
    })
    .to_string()
}

fn parse(json: &str) -> Tokenizer {
    Tokenizer::from_str(json).expect("fixture tokenizer JSON must parse")
}

/// JSON for the BERT-convention fixture.
pub fn bert_tokenizer_json() -> String {
    word_level_json(
        &["[PAD]", "[UNK]", "[CLS]", "[SEP]", "[MASK]"],
        "[UNK]",
        json!([special("[CLS]", 0), sequence("A", 0), special("[SEP]", 0)]),
        json!([
            special("[CLS]", 0),
            sequence("A", 0),
            special("[SEP]", 0),
            sequence("B", 1),
            special("[SEP]", 1)
        ]),
    )
}

/// `[CLS] A [SEP] B [SEP]`, segment ids 0/1.
pub fn bert_tokenizer() -> Tokenizer {
    parse(&bert_tokenizer_json())
}

/// JSON for the T5-convention fixture.
pub fn t5_tokenizer_json() -> String {
    word_level_json(
        &["<pad>", "</s>", "<unk>"],
        "<unk>",
        json!([sequence("A", 0), special("</s>", 0)]),
        json!([
            sequence("A", 0),
            special("</s>", 0),
            sequence("B", 0),
            special("</s>", 0)
        ]),
    )
}

/// `A </s> B </s>`.
pub fn t5_tokenizer() -> Tokenizer {
    parse(&t5_tokenizer_json())
}

/// JSON for the BART-convention fixture.
pub fn bart_tokenizer_json() -> String {
    word_level_json(
        &["<s>", "<pad>", "</s>", "<unk>"],
        "<unk>",
        json!([special("<s>", 0), sequence("A", 0), special("</s>", 0)]),
        json!([
            special("<s>", 0),
            sequence("A", 0),
            special("</s>", 0),
            special("</s>", 0),
            sequence("B", 0),
            special("</s>", 0)
        ]),
    )
}

/// `<s> A </s> </s> B </s>`.
pub fn bart_tokenizer() -> Tokenizer {
    parse(&bart_tokenizer_json())
}

/// Labeled `(code1, code2, label)` triples: clones with renamed variables
/// and unrelated pairs, with comments and docstrings mixed in.
pub fn sample_code_pairs() -> Vec<(String, String, u8)> {
    let pairs: &[(&str, &str, u8)] = &[
        ("def f(x): return x+1", "def f(y): return y + 1", 1),
        (
            "def total(a):\n    \"\"\"Sum a list.\"\"\"\n    return sum(a)\n\nprint(total([1, 2]))",
            "def helper(b):\n    result = 0\n    for i in b:\n        result += i  # accumulate\n    return result\n\nprint(helper([1, 2]))",
            1,
        ),
        (
            "def f(n):\n    return n * 2",
            "class A:\n    def g(self):\n        print('hi')",
            0,
        ),
        (
            "x = int(input())\nprint(x % 2)",
            "def main():\n    for i in range(10):\n        print(i)\n\nmain()",
            0,
        ),
        (
            "def g(a, b):\n    # compare\n    return a if a > b else b",
            "def f(x, y):\n    return max(x, y)",
            1,
        ),
        (
            "n = 3\nwhile n > 0:\n    n -= 1",
            "import sys\nprint(sys.argv)",
            0,
        ),
    ];
    pairs
        .iter()
        .map(|(a, b, l)| ((*a).to_string(), (*b).to_string(), *l))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_templates() {
        let bert = bert_tokenizer();
        let enc = bert.encode(("x", "y"), true).unwrap();
        assert_eq!(enc.get_tokens(), &["[CLS]", "x", "[SEP]", "y", "[SEP]"]);
        assert_eq!(enc.get_type_ids(), &[0, 0, 0, 1, 1]);

        let t5 = t5_tokenizer();
        let enc = t5.encode(("x", "y"), true).unwrap();
        assert_eq!(enc.get_tokens(), &["x", "</s>", "y", "</s>"]);

        let bart = bart_tokenizer();
        let enc = bart.encode(("x", "y"), true).unwrap();
        assert_eq!(enc.get_tokens(), &["<s>", "x", "</s>", "</s>", "y", "</s>"]);
    }

    #[test]
    fn test_unknown_words_map_to_unk() {
        let bert = bert_tokenizer();
        let enc = bert.encode("zzz_unknown", true).unwrap();
        assert_eq!(enc.get_tokens(), &["[CLS]", "[UNK]", "[SEP]"]);
    }

    #[test]
    fn test_sample_pairs_are_binary() {
        let pairs = sample_code_pairs();
        assert!(pairs.len() >= 4);
        assert!(pairs.iter().all(|(_, _, l)| *l <= 1));
        assert!(pairs.iter().any(|(_, _, l)| *l == 0));
        assert!(pairs.iter().any(|(_, _, l)| *l == 1));
    }
}
