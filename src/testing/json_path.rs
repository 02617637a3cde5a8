use std::fmt::{self, Display};

use serde_json::Value as JsonValue;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// Dotted path into a JSON value: `$`, `page`, `data.id`, `$.data[0].email`,
/// `headers["content-type"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    segments: Vec<Segment>,
}

impl JsonPath {
    pub fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn parse(input: &str) -> Result<Self, String> {
        let input = input.trim();
        if input.is_empty() {
            return Err("JSON path is empty".to_string());
        }

        let mut rest = input.strip_prefix('$').unwrap_or(input);
        let mut segments = Vec::new();
        let mut expect_key = !input.starts_with('$');

        while !rest.is_empty() || expect_key {
            if expect_key {
                let end = rest.find(['.', '[']).unwrap_or(rest.len());
                let key = &rest[..end];
                if key.is_empty() {
                    return Err(format!("empty key in JSON path `{input}`"));
                }
                segments.push(Segment::Key(key.to_string()));
                rest = &rest[end..];
                expect_key = false;
                continue;
            }

            if let Some(after_dot) = rest.strip_prefix('.') {
                rest = after_dot;
                expect_key = true;
            } else if let Some(after_bracket) = rest.strip_prefix('[') {
                let close = after_bracket
                    .find(']')
                    .ok_or_else(|| format!("unclosed `[` in JSON path `{input}`"))?;
                let inner = after_bracket[..close].trim();
                segments.push(parse_bracket(inner, input)?);
                rest = &after_bracket[close + 1..];
            } else {
                return Err(format!("unexpected `{rest}` in JSON path `{input}`"));
            }
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn lookup<'a>(&self, value: &'a JsonValue) -> Option<&'a JsonValue> {
        self.segments
            .iter()
            .try_fold(value, |current, segment| match segment {
                Segment::Key(key) => current.as_object()?.get(key),
                Segment::Index(index) => current.as_array()?.get(*index),
            })
    }
}

fn parse_bracket(inner: &str, input: &str) -> Result<Segment, String> {
    if let Ok(index) = inner.parse::<usize>() {
        return Ok(Segment::Index(index));
    }

    let quoted = inner
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| inner.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')));
    match quoted {
        Some(key) if !key.is_empty() => Ok(Segment::Key(key.to_string())),
        _ => Err(format!("invalid bracket segment `[{inner}]` in JSON path `{input}`")),
    }
}

impl Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "$");
        }
        for (idx, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Key(key) if key.contains(['.', '[', ']']) => write!(f, "[\"{key}\"]")?,
                Segment::Key(key) if idx == 0 => write!(f, "{key}")?,
                Segment::Key(key) => write!(f, ".{key}")?,
                Segment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}
