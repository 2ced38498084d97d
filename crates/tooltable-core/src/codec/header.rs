//! File header handling
//!
//! User comments above the tool rows are kept verbatim across rewrites.
//! An optional header template adds generated lines (version, timestamp)
//! below a `---` separator.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Separator between user comments and generated header lines
pub const HEADER_SEPARATOR: &str = "---";

/// Prefix of the column title row written by the encoder
pub const TITLE_ROW_PREFIX: &str = ";Tool";

const DEFAULT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Raw header lines preceding the tool rows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderBlock {
    lines: Vec<String>,
}

impl HeaderBlock {
    /// Create a header from lines
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// Keep the leading lines up to (excluding) the first `---` separator
    /// or column title row
    pub fn from_raw<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let lines = raw
            .into_iter()
            .map(|l| l.as_ref().to_string())
            .take_while(|l| l.trim() != HEADER_SEPARATOR && !l.starts_with(TITLE_ROW_PREFIX))
            .collect();
        Self { lines }
    }

    /// Header lines
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Check if the header has no lines
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Errors rendering a header template
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// `{` without a matching `}` or a stray `}`
    #[error("Unbalanced brace at offset {0}")]
    UnbalancedBrace(usize),
    /// Placeholder name not recognised
    #[error("Unknown placeholder '{0}'")]
    UnknownField(String),
    /// Invalid strftime specification
    #[error("Invalid datetime format '{0}'")]
    InvalidFormat(String),
}

/// Header template with `{version}` and `{datetime[:format]}` placeholders.
///
/// `{{` and `}}` produce literal braces. The datetime format uses strftime
/// syntax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeaderTemplate(String);

impl HeaderTemplate {
    /// Create a template from text
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Template source text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Render to header lines: leading whitespace removed, one trailing
    /// blank line added before the table.
    pub fn render(
        &self,
        version: &str,
        now: &DateTime<Local>,
    ) -> Result<Vec<String>, TemplateError> {
        let text = self.substitute(version, now)?;
        let mut lines: Vec<String> = text.trim_start().lines().map(str::to_string).collect();
        lines.push(String::new());
        Ok(lines)
    }

    fn substitute(&self, version: &str, now: &DateTime<Local>) -> Result<String, TemplateError> {
        let src = &self.0;
        let mut out = String::with_capacity(src.len());
        let mut chars = src.char_indices().peekable();

        while let Some((offset, c)) = chars.next() {
            match c {
                '{' if chars.peek().is_some_and(|(_, n)| *n == '{') => {
                    chars.next();
                    out.push('{');
                }
                '}' if chars.peek().is_some_and(|(_, n)| *n == '}') => {
                    chars.next();
                    out.push('}');
                }
                '}' => return Err(TemplateError::UnbalancedBrace(offset)),
                '{' => {
                    let mut field = String::new();
                    let mut closed = false;
                    for (_, f) in chars.by_ref() {
                        if f == '}' {
                            closed = true;
                            break;
                        }
                        field.push(f);
                    }
                    if !closed {
                        return Err(TemplateError::UnbalancedBrace(offset));
                    }
                    render_field(&mut out, &field, version, now)?;
                }
                _ => out.push(c),
            }
        }
        Ok(out)
    }
}

fn render_field(
    out: &mut String,
    field: &str,
    version: &str,
    now: &DateTime<Local>,
) -> Result<(), TemplateError> {
    let (name, spec) = match field.split_once(':') {
        Some((name, spec)) => (name.trim(), Some(spec)),
        None => (field.trim(), None),
    };
    match name {
        "version" => out.push_str(version),
        "datetime" => {
            let spec = spec.unwrap_or(DEFAULT_DATETIME_FORMAT);
            let items: Vec<Item<'_>> = StrftimeItems::new(spec).collect();
            if items.iter().any(|i| matches!(i, Item::Error)) {
                return Err(TemplateError::InvalidFormat(spec.to_string()));
            }
            write!(out, "{}", now.format_with_items(items.into_iter()))
                .map_err(|_| TemplateError::InvalidFormat(spec.to_string()))?;
        }
        other => return Err(TemplateError::UnknownField(other.to_string())),
    }
    Ok(())
}

/// Combine the preserved header with a rendered template.
///
/// With a preserved header, only the template part from its `---` line
/// onward is appended (nothing if it has none). Without one, the whole
/// template is used.
pub fn compose_header(preserved: &HeaderBlock, template: Option<Vec<String>>) -> Vec<String> {
    let template = template.unwrap_or_default();
    if preserved.is_empty() {
        return template;
    }

    let mut lines = preserved.lines().to_vec();
    if let Some(start) = template.iter().position(|l| l == HEADER_SEPARATOR) {
        lines.extend(template[start..].iter().cloned());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap()
    }

    #[test]
    fn test_from_raw_stops_at_separator() {
        let header = HeaderBlock::from_raw(["My shop", "tools", "---", "Generated by"]);
        assert_eq!(header.lines(), ["My shop", "tools"]);
    }

    #[test]
    fn test_from_raw_stops_at_title_row() {
        let header = HeaderBlock::from_raw(["note", ";Tool  Pocket"]);
        assert_eq!(header.lines(), ["note"]);
    }

    #[test]
    fn test_render_placeholders() {
        let template = HeaderTemplate::new(
            "\n\nLinuxCNC Tool Table\n---\nGenerated by: ({version})\nOn: {datetime:%Y/%m/%d %H:%M}\n",
        );
        let lines = template.render("1.2.3", &fixed_time()).unwrap();
        assert_eq!(
            lines,
            vec![
                "LinuxCNC Tool Table",
                "---",
                "Generated by: (1.2.3)",
                "On: 2024/03/05 14:07",
                "",
            ]
        );
    }

    #[test]
    fn test_render_default_datetime_and_escapes() {
        let template = HeaderTemplate::new("{{literal}} {datetime}");
        let lines = template.render("0", &fixed_time()).unwrap();
        assert_eq!(lines[0], "{literal} 2024-03-05 14:07:09");
    }

    #[test]
    fn test_render_errors() {
        let t = fixed_time();
        assert_eq!(
            HeaderTemplate::new("{nope}").render("0", &t),
            Err(TemplateError::UnknownField("nope".to_string()))
        );
        assert!(matches!(
            HeaderTemplate::new("{version").render("0", &t),
            Err(TemplateError::UnbalancedBrace(0))
        ));
        assert!(matches!(
            HeaderTemplate::new("oops }").render("0", &t),
            Err(TemplateError::UnbalancedBrace(5))
        ));
    }

    #[test]
    fn test_compose_header() {
        let template = vec![
            "Title".to_string(),
            "---".to_string(),
            "Generated".to_string(),
            String::new(),
        ];
        let preserved = HeaderBlock::new(vec!["user note".to_string()]);
        assert_eq!(
            compose_header(&preserved, Some(template.clone())),
            vec!["user note", "---", "Generated", ""]
        );
        assert_eq!(
            compose_header(&HeaderBlock::default(), Some(template.clone())),
            template
        );
        assert_eq!(
            compose_header(&preserved, Some(vec!["no separator".to_string()])),
            vec!["user note"]
        );
        assert!(compose_header(&HeaderBlock::default(), None).is_empty());
    }
}
