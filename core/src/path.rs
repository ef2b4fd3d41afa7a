//! Request path templates such as `/servers/{id}/stop`.
//!
//! Templates are segment lists. Child paths are composed with `join` so that
//! an action path is always expressed relative to its parent resource.

use std::fmt;

use crate::error::PathError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

impl Segment {
    fn parse(raw: &str) -> Self {
        match raw.strip_prefix('{').and_then(|rest| rest.strip_suffix('}')) {
            Some(name) if !name.is_empty() => Segment::Placeholder(name.to_string()),
            _ => Segment::Literal(raw.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    segments: Vec<Segment>,
}

impl PathTemplate {
    pub fn new(template: &str) -> Self {
        Self {
            segments: template
                .split('/')
                .filter(|segment| !segment.is_empty())
                .map(Segment::parse)
                .collect(),
        }
    }

    /// A new template with `child` appended below this one.
    pub fn join(&self, child: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(Self::new(child).segments);
        Self { segments }
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Substitutes every placeholder. Each supplied parameter must match a
    /// placeholder and each placeholder needs a non-empty value other than `.`
    /// or `..`. Values are percent-encoded as single path segments.
    pub fn bind(&self, params: &[(&str, &str)]) -> Result<String, PathError> {
        if let Some((unknown, _)) = params
            .iter()
            .find(|(name, _)| !self.placeholders().any(|placeholder| placeholder == *name))
        {
            return Err(PathError::UnknownParameter {
                template: self.to_string(),
                parameter: unknown.to_string(),
            });
        }

        let mut path = String::new();
        for segment in &self.segments {
            path.push('/');
            match segment {
                Segment::Literal(literal) => path.push_str(literal),
                Segment::Placeholder(name) => {
                    let value = params
                        .iter()
                        .find(|(param, _)| param == name)
                        .map(|(_, value)| *value)
                        .filter(|value| !value.is_empty())
                        .ok_or_else(|| PathError::UnboundPlaceholder {
                            template: self.to_string(),
                            placeholder: name.clone(),
                        })?;
                    if value == "." || value == ".." {
                        return Err(PathError::DotSegment {
                            template: self.to_string(),
                            placeholder: name.clone(),
                            value: value.to_string(),
                        });
                    }
                    path.push_str(&urlencoding::encode(value));
                }
            }
        }
        if path.is_empty() {
            path.push('/');
        }
        Ok(path)
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            match segment {
                Segment::Literal(literal) => write!(f, "/{literal}")?,
                Segment::Placeholder(name) => write!(f, "/{{{name}}}")?,
            }
        }
        Ok(())
    }
}
