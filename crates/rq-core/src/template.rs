//! Prompt templates with named `{placeholders}`
//!
//! A template declares the variables it accepts up front. Construction
//! rejects templates whose placeholders are not declared, and rendering
//! rejects calls that leave a declared variable unbound. `{{` and `}}`
//! render as literal braces.

use std::collections::HashMap;
use thiserror::Error;

/// Template construction and rendering errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("Missing value for input variable `{0}`")]
    MissingVariable(String),

    #[error("Placeholder `{0}` is not a declared input variable")]
    UnknownPlaceholder(String),

    #[error("Unbalanced brace at byte {0}")]
    UnbalancedBrace(usize),

    #[error("Empty placeholder at byte {0}")]
    EmptyPlaceholder(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// A parsed prompt template
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
    input_variables: Vec<String>,
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// Parse `template` and check its placeholders against `input_variables`
    pub fn new<I, S>(template: impl Into<String>, input_variables: I) -> Result<Self, TemplateError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let template = template.into();
        let input_variables: Vec<String> = input_variables.into_iter().map(Into::into).collect();
        let segments = parse(&template)?;

        for segment in &segments {
            if let Segment::Variable(name) = segment {
                if !input_variables.contains(name) {
                    return Err(TemplateError::UnknownPlaceholder(name.clone()));
                }
            }
        }

        Ok(Self {
            template,
            input_variables,
            segments,
        })
    }

    /// Raw template text
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Declared input variables
    pub fn input_variables(&self) -> &[String] {
        &self.input_variables
    }

    /// Render the template; every declared variable must be bound
    pub fn format(&self, values: &HashMap<&str, &str>) -> Result<String, TemplateError> {
        if let Some(missing) = self
            .input_variables
            .iter()
            .find(|name| !values.contains_key(name.as_str()))
        {
            return Err(TemplateError::MissingVariable(missing.clone()));
        }

        let mut out = String::with_capacity(self.template.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Variable(name) => out.push_str(values[name.as_str()]),
            }
        }
        Ok(out)
    }
}

fn parse(template: &str) -> Result<Vec<Segment>, TemplateError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                literal.push('{');
            }
            '}' if matches!(chars.peek(), Some((_, '}'))) => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for (_, inner) in chars.by_ref() {
                    match inner {
                        '}' => {
                            closed = true;
                            break;
                        }
                        '{' => return Err(TemplateError::UnbalancedBrace(pos)),
                        other => name.push(other),
                    }
                }
                if !closed {
                    return Err(TemplateError::UnbalancedBrace(pos));
                }
                let name = name.trim();
                if name.is_empty() {
                    return Err(TemplateError::EmptyPlaceholder(pos));
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Variable(name.to_string()));
            }
            '}' => return Err(TemplateError::UnbalancedBrace(pos)),
            other => literal.push(other),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}
