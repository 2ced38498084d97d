//! Row tokenizer for the tool table file
//!
//! A tool row is a data segment optionally followed by `;` and a comment:
//!
//! ```text
//! row      := data [ ';' comment ]
//! data     := { token | ignored }        whitespace is removed first
//! token    := prefix value
//! prefix   := 'A'..'Z' { 'A'..'Z' }      the first letter is the descriptor
//! value    := vchar { vchar }
//! vchar    := '0'..'9' | '.' | '+' | '-'
//! comment  := { meta } [ '[]' ] remark
//! meta     := '[' ( '#' hex | model ) ']'
//! model    := path '.' ( stl | obj | step | stp | 3mf | ply | igs | iges )
//! ```
//!
//! An empty `[]` ends the metadata, so a remark that itself starts with a
//! metadata-like token is written behind one.
//!
//! Characters that cannot start or continue a token are skipped, as are
//! letter runs not followed by a value. Value text is not validated here;
//! numeric coercion happens in the parser.

/// A `<prefix><value>` pair from the data segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Uppercase letter run
    pub prefix: String,
    /// Raw value text
    pub value: String,
}

impl Token {
    /// Descriptor letter (first letter of the prefix)
    pub fn descriptor(&self) -> char {
        self.prefix.chars().next().unwrap_or_default()
    }
}

/// Split a row on its first `;` into (data, comment)
pub fn split_row(line: &str) -> (&str, Option<&str>) {
    match line.split_once(';') {
        Some((data, comment)) => (data, Some(comment)),
        None => (line, None),
    }
}

fn is_value_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '.' | '+' | '-')
}

/// Tokenize a data segment
pub fn tokenize(data: &str) -> Vec<Token> {
    let compact: Vec<char> = data.chars().filter(|c| !c.is_whitespace()).collect();

    let mut tokens = Vec::new();
    let mut i = 0;
    while i < compact.len() {
        if !compact[i].is_ascii_uppercase() {
            i += 1;
            continue;
        }

        let prefix_start = i;
        while i < compact.len() && compact[i].is_ascii_uppercase() {
            i += 1;
        }
        let value_start = i;
        while i < compact.len() && is_value_char(compact[i]) {
            i += 1;
        }
        if value_start == i {
            continue;
        }

        tokens.push(Token {
            prefix: compact[prefix_start..value_start].iter().collect(),
            value: compact[value_start..i].iter().collect(),
        });
    }
    tokens
}

/// Bracketed metadata and remark extracted from a row comment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentParts {
    /// Model path from a `[path]` token
    pub model_path: Option<String>,
    /// Color from a `[#RRGGBB]` token, uppercased
    pub path_color: Option<String>,
    /// Remaining comment text, trimmed
    pub remark: String,
}

fn is_color_token(text: &str) -> bool {
    text.strip_prefix('#')
        .is_some_and(|hex| !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

/// File extensions accepted for a `[path]` model token
pub const MODEL_EXTENSIONS: &[&str] = &["stl", "obj", "step", "stp", "3mf", "ply", "igs", "iges"];

fn is_model_token(text: &str) -> bool {
    text.rsplit_once('.').is_some_and(|(stem, ext)| {
        !stem.is_empty() && MODEL_EXTENSIONS.iter().any(|m| ext.eq_ignore_ascii_case(m))
    })
}

/// Split leading `[...]` metadata tokens off a comment.
///
/// A `#`-prefixed hex token is the path color and a token naming a model
/// file is the model path. Scanning stops at the first text that is not
/// one of those, at a repeated kind, or after an empty `[]` token, which
/// is consumed. Everything from there on is the remark.
pub fn split_comment(comment: &str) -> CommentParts {
    let mut parts = CommentParts::default();
    let mut rest = comment.trim_start();

    while let Some(inner) = rest.strip_prefix('[') {
        let Some(close) = inner.find(']') else {
            break;
        };
        let text = inner[..close].trim();
        let after = inner[close + 1..].trim_start();
        if text.is_empty() {
            rest = after;
            break;
        } else if is_color_token(text) && parts.path_color.is_none() {
            parts.path_color = Some(text.to_ascii_uppercase());
        } else if is_model_token(text) && parts.model_path.is_none() {
            parts.model_path = Some(text.to_string());
        } else {
            break;
        }
        rest = after;
    }

    parts.remark = rest.trim().to_string();
    parts
}

/// Whether `remark` would lose leading text to metadata parsing when
/// written as the start of a comment
pub fn remark_needs_guard(remark: &str) -> bool {
    split_comment(remark).remark != remark.trim()
}
