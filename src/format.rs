//! Template mini-language for rendering player snapshots.
//!
//! Syntax:
//! - literal text is preserved as-is
//! - `$name` / `${name}` substitute a variable ("" when unset)
//! - `{ ... }` is a group; it may end in a function pipeline:
//!   `{ ... | @Func 'arg' @Other }` applies each function to the rendered
//!   group content, left to right
//! - `$$name`, `$${name}`, `{{`, `}}` render the special forms literally;
//!   `@@` renders a single `@`
//!
//! Built-in functions: `@IfNotNone 'var'` discards the group's output when
//! `var` is unset, `@Truncate 'n'` keeps the first n characters.

use std::collections::HashMap;
use std::iter::Peekable;
use std::str::Chars;

/// Variable bindings for one render. `None` means "unset": the variable
/// substitutes as "" and `@IfNotNone` treats it as missing.
pub type Variables = HashMap<&'static str, Option<String>>;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("unterminated group in format string")]
    UnterminatedGroup,

    #[error("empty group in format string")]
    EmptyGroup,

    #[error("unmatched '}}' in format string")]
    UnmatchedClose,

    #[error("'${{' must be followed by a variable name and '}}'")]
    BadBracedVariable,

    #[error("'|' must be followed by @-functions")]
    MissingFunction,

    #[error("function arguments must be quoted in single quotes")]
    UnterminatedArgument,

    #[error("undefined function: @{0}")]
    UndefinedFunction(String),

    #[error("@{0} expects {1}")]
    BadArgument(&'static str, &'static str),
}

#[derive(Debug, Clone)]
enum Segment {
    Text(String),
    Var(String),
    Group(Vec<Segment>, Vec<FuncCall>),
}

#[derive(Debug, Clone)]
struct FuncCall {
    name: String,
    args: Vec<String>,
}

/// A parsed format string, reusable across renders.
#[derive(Debug, Clone)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(input: &str) -> Result<Self, FormatError> {
        let mut chars = input.chars().peekable();
        let (segments, _) = parse_sequence(&mut chars, false)?;
        Ok(Self { segments })
    }

    pub fn render(&self, variables: &Variables) -> Result<String, FormatError> {
        render_segments(&self.segments, variables)
    }
}

fn parse_sequence(
    chars: &mut Peekable<Chars>,
    in_group: bool,
) -> Result<(Vec<Segment>, Vec<FuncCall>), FormatError> {
    let mut segments = Vec::new();
    let mut text = String::new();

    loop {
        match chars.peek().copied() {
            None => {
                if in_group {
                    return Err(FormatError::UnterminatedGroup);
                }
                flush_text(&mut segments, &mut text);
                return Ok((segments, Vec::new()));
            }

            Some('{') => {
                chars.next();
                if chars.peek() == Some(&'{') {
                    chars.next();
                    text.push('{');
                } else {
                    flush_text(&mut segments, &mut text);
                    let (inner, pipeline) = parse_sequence(chars, true)?;
                    if inner.is_empty() {
                        return Err(FormatError::EmptyGroup);
                    }
                    segments.push(Segment::Group(inner, pipeline));
                }
            }

            Some('}') => {
                chars.next();
                if in_group {
                    flush_text(&mut segments, &mut text);
                    return Ok((segments, Vec::new()));
                }
                if chars.peek() == Some(&'}') {
                    chars.next();
                    text.push('}');
                } else {
                    return Err(FormatError::UnmatchedClose);
                }
            }

            Some('|') if in_group => {
                chars.next();
                flush_text(&mut segments, &mut text);
                if segments.is_empty() {
                    return Err(FormatError::EmptyGroup);
                }
                let pipeline = parse_pipeline(chars)?;
                return Ok((segments, pipeline));
            }

            Some('$') => {
                chars.next();
                match chars.peek().copied() {
                    // "$$name" / "$${name}" render the variable form
                    // literally.
                    Some('$') => {
                        chars.next();
                        text.push('$');
                        if chars.peek() == Some(&'{') {
                            loop {
                                match chars.next() {
                                    Some('}') => {
                                        text.push('}');
                                        break;
                                    }
                                    Some(c) => text.push(c),
                                    None => return Err(FormatError::BadBracedVariable),
                                }
                            }
                        }
                    }
                    Some('{') => {
                        chars.next();
                        let name = read_name(chars);
                        if name.is_empty() || chars.next() != Some('}') {
                            return Err(FormatError::BadBracedVariable);
                        }
                        flush_text(&mut segments, &mut text);
                        segments.push(Segment::Var(name));
                    }
                    Some(c) if is_name_char(c) => {
                        let name = read_name(chars);
                        flush_text(&mut segments, &mut text);
                        segments.push(Segment::Var(name));
                    }
                    // A lone '$' is just text.
                    _ => text.push('$'),
                }
            }

            Some('@') => {
                chars.next();
                if chars.peek() == Some(&'@') {
                    chars.next();
                }
                text.push('@');
            }

            Some(c) => {
                chars.next();
                text.push(c);
            }
        }
    }
}

/// Parse the function pipeline after a group's '|', consuming the closing
/// '}'.
fn parse_pipeline(chars: &mut Peekable<Chars>) -> Result<Vec<FuncCall>, FormatError> {
    let mut calls = Vec::new();

    loop {
        skip_spaces(chars);
        match chars.peek().copied() {
            Some('@') => {
                chars.next();
                let name = read_name(chars);
                if name.is_empty() {
                    return Err(FormatError::MissingFunction);
                }

                let mut args = Vec::new();
                loop {
                    skip_spaces(chars);
                    if chars.peek() != Some(&'\'') {
                        break;
                    }
                    chars.next();
                    let mut arg = String::new();
                    loop {
                        match chars.next() {
                            Some('\'') => break,
                            Some(c) => arg.push(c),
                            None => return Err(FormatError::UnterminatedArgument),
                        }
                    }
                    args.push(arg);
                }

                calls.push(FuncCall { name, args });
            }
            Some('}') => {
                chars.next();
                if calls.is_empty() {
                    return Err(FormatError::MissingFunction);
                }
                return Ok(calls);
            }
            None => return Err(FormatError::UnterminatedGroup),
            Some(_) => return Err(FormatError::MissingFunction),
        }
    }
}

fn render_segments(segments: &[Segment], variables: &Variables) -> Result<String, FormatError> {
    let mut result = String::new();
    for segment in segments {
        match segment {
            Segment::Text(text) => result.push_str(text),
            Segment::Var(name) => {
                if let Some(Some(value)) = variables.get(name.as_str()) {
                    result.push_str(value);
                }
            }
            Segment::Group(inner, pipeline) => {
                let mut rendered = render_segments(inner, variables)?;
                for call in pipeline {
                    rendered = apply_function(call, rendered, variables)?;
                }
                result.push_str(&rendered);
            }
        }
    }
    Ok(result)
}

fn apply_function(
    call: &FuncCall,
    content: String,
    variables: &Variables,
) -> Result<String, FormatError> {
    match call.name.as_str() {
        "IfNotNone" => {
            let var = call
                .args
                .first()
                .ok_or(FormatError::BadArgument("IfNotNone", "a variable name"))?;
            let set = matches!(variables.get(var.as_str()), Some(Some(_)));
            Ok(if set { content } else { String::new() })
        }
        "Truncate" => {
            let count: usize = call
                .args
                .first()
                .and_then(|arg| arg.parse().ok())
                .ok_or(FormatError::BadArgument("Truncate", "a character count"))?;
            Ok(content.chars().take(count).collect())
        }
        other => Err(FormatError::UndefinedFunction(other.to_string())),
    }
}

fn flush_text(segments: &mut Vec<Segment>, text: &mut String) {
    if !text.is_empty() {
        segments.push(Segment::Text(std::mem::take(text)));
    }
}

fn skip_spaces(chars: &mut Peekable<Chars>) {
    while chars.peek() == Some(&' ') {
        chars.next();
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn read_name(chars: &mut Peekable<Chars>) -> String {
    let mut name = String::new();
    while let Some(&c) = chars.peek() {
        if !is_name_char(c) {
            break;
        }
        name.push(c);
        chars.next();
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variables(volume: Option<&str>) -> Variables {
        Variables::from([
            ("artist", Some("Radiohead".to_string())),
            ("title", Some("Karma Police".to_string())),
            ("clean_title", Some("Karma Police".to_string())),
            ("icon", Some("\u{e099}".to_string())),
            ("volume", volume.map(str::to_string)),
        ])
    }

    #[test]
    fn default_format_renders() {
        let template =
            Template::parse("$icon $artist — $clean_title{ // ${volume}%| @IfNotNone 'volume'}")
                .unwrap();
        assert_eq!(
            template.render(&variables(Some("54"))).unwrap(),
            "\u{e099} Radiohead — Karma Police // 54%"
        );
    }

    #[test]
    fn if_not_none_hides_the_group() {
        let template =
            Template::parse("$artist{ // ${volume}%| @IfNotNone 'volume'}").unwrap();
        assert_eq!(template.render(&variables(None)).unwrap(), "Radiohead");
    }

    #[test]
    fn unset_variables_render_empty() {
        let template = Template::parse("<$artist|$nonexistent|$volume>").unwrap();
        assert_eq!(template.render(&variables(None)).unwrap(), "<Radiohead||>");
    }

    #[test]
    fn groups_without_pipelines_render_inline() {
        let template = Template::parse("{$artist!}").unwrap();
        assert_eq!(template.render(&variables(None)).unwrap(), "Radiohead!");
    }

    #[test]
    fn nested_groups_render_inside_out() {
        let template =
            Template::parse("{$artist{ (${volume})| @IfNotNone 'volume'}}").unwrap();
        assert_eq!(
            template.render(&variables(Some("30"))).unwrap(),
            "Radiohead (30)"
        );
        assert_eq!(template.render(&variables(None)).unwrap(), "Radiohead");
    }

    #[test]
    fn truncate_counts_characters_not_bytes() {
        let vars = Variables::from([("title", Some("Пыль и свет".to_string()))]);
        let template = Template::parse("{$title| @Truncate '4'}").unwrap();
        assert_eq!(template.render(&vars).unwrap(), "Пыль");
    }

    #[test]
    fn escapes_render_literally() {
        let template = Template::parse("{{$artist}} $$artist $${volume} @@Func").unwrap();
        assert_eq!(
            template.render(&variables(None)).unwrap(),
            "{Radiohead} $artist ${volume} @Func"
        );
    }

    #[test]
    fn parse_errors_are_reported() {
        assert_eq!(
            Template::parse("{oops").unwrap_err(),
            FormatError::UnterminatedGroup
        );
        assert_eq!(Template::parse("{}").unwrap_err(), FormatError::EmptyGroup);
        assert_eq!(
            Template::parse("closed}").unwrap_err(),
            FormatError::UnmatchedClose
        );
        assert_eq!(
            Template::parse("{x| nope}").unwrap_err(),
            FormatError::MissingFunction
        );
        assert_eq!(
            Template::parse("{x| @Truncate '3}").unwrap_err(),
            FormatError::UnterminatedArgument
        );
    }

    #[test]
    fn unknown_functions_fail_at_render() {
        let template = Template::parse("{$artist| @Reverse}").unwrap();
        assert_eq!(
            template.render(&variables(None)).unwrap_err(),
            FormatError::UndefinedFunction("Reverse".to_string())
        );
    }
}
