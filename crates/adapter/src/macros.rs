//! Endpoint URL templates.
//!
//! Host configuration writes endpoint templates with `{{.Field}}` references
//! and `{{if .Field}}...{{else}}...{{end}}` blocks. [`EndpointTemplate::parse`]
//! accepts exactly that dialect and compiles it into a Handlebars template;
//! [`resolve_macros`] renders it for a single request.

use error_stack::{bail, Report, ResultExt};
use handlebars::Handlebars;
use serde::Serialize;

use crate::error::AdapterError;

const TEMPLATE_NAME: &str = "endpointTemplate";
const ACTION_OPEN: &str = "{{";
const ACTION_CLOSE: &str = "}}";

/// Values available to endpoint templates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EndpointTemplateParams {
    #[serde(rename = "NetworkId")]
    pub network_id: String,
    #[serde(rename = "Domain")]
    pub domain: String,
    #[serde(rename = "Bundle")]
    pub bundle: String,
}

/// A parsed, immutable endpoint template.
pub struct EndpointTemplate {
    source: String,
    registry: Handlebars<'static>,
}

impl std::fmt::Debug for EndpointTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointTemplate")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Block {
    If,
    IfElse,
}

impl EndpointTemplate {
    /// Parse an endpoint template.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Template`] for unknown actions, unbalanced
    /// `if`/`end` blocks, or an unterminated `{{`.
    pub fn parse(source: &str) -> Result<Self, Report<AdapterError>> {
        let translated = translate(source)?;

        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(handlebars::no_escape);
        registry
            .register_template_string(TEMPLATE_NAME, translated)
            .change_context(AdapterError::Template {
                message: format!("unable to parse endpoint url template: {source}"),
            })?;

        Ok(Self {
            source: source.to_string(),
            registry,
        })
    }

    /// The template as it was configured.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Render `template` with the given macro values.
///
/// # Errors
///
/// Returns [`AdapterError::Template`] when the template references a field
/// that is not part of [`EndpointTemplateParams`].
pub fn resolve_macros(
    template: &EndpointTemplate,
    params: &EndpointTemplateParams,
) -> Result<String, Report<AdapterError>> {
    template
        .registry
        .render(TEMPLATE_NAME, params)
        .change_context(AdapterError::Template {
            message: format!("unable to resolve endpoint macros in {}", template.source),
        })
}

fn template_error(message: String) -> AdapterError {
    AdapterError::Template { message }
}

/// Rewrite the `{{.Field}}` dialect into Handlebars syntax.
fn translate(source: &str) -> Result<String, Report<AdapterError>> {
    let mut out = String::with_capacity(source.len());
    let mut blocks: Vec<Block> = Vec::new();
    let mut rest = source;
    let mut offset = 0;

    while let Some(start) = rest.find(ACTION_OPEN) {
        let literal = &rest[..start];
        if literal.ends_with('\\') {
            bail!(template_error(format!(
                "backslash before action at offset {} is not supported",
                offset + start
            )));
        }
        out.push_str(literal);

        let after_open = &rest[start + ACTION_OPEN.len()..];
        let Some(end) = after_open.find(ACTION_CLOSE) else {
            bail!(template_error(format!(
                "unclosed action at offset {}",
                offset + start
            )));
        };
        let action = after_open[..end].trim();

        if action.starts_with("/*") && action.ends_with("*/") {
            // comment
        } else if let Some(field) = action.strip_prefix('.') {
            out.push_str(&format!("{{{{{}}}}}", field_name(field, action)?));
        } else if let Some(condition) = action.strip_prefix("if ") {
            let field = condition
                .trim()
                .strip_prefix('.')
                .ok_or_else(|| {
                    template_error(format!("unsupported condition in {{{{{action}}}}}"))
                })?;
            out.push_str(&format!("{{{{#if {}}}}}", field_name(field, action)?));
            blocks.push(Block::If);
        } else if action == "else" {
            match blocks.last_mut() {
                Some(block @ Block::If) => *block = Block::IfElse,
                _ => bail!(template_error(format!(
                    "unexpected {{{{else}}}} at offset {}",
                    offset + start
                ))),
            }
            out.push_str("{{else}}");
        } else if action == "end" {
            if blocks.pop().is_none() {
                bail!(template_error(format!(
                    "unexpected {{{{end}}}} at offset {}",
                    offset + start
                )));
            }
            out.push_str("{{/if}}");
        } else {
            bail!(template_error(format!(
                "unsupported action {{{{{action}}}}} at offset {}",
                offset + start
            )));
        }

        let consumed = start + ACTION_OPEN.len() + end + ACTION_CLOSE.len();
        offset += consumed;
        rest = &rest[consumed..];
    }

    if !blocks.is_empty() {
        bail!(template_error(
            "unexpected end of template, missing {{end}}".to_string()
        ));
    }

    out.push_str(rest);
    Ok(out)
}

fn field_name<'a>(field: &'a str, action: &str) -> Result<&'a str, AdapterError> {
    let mut chars = field.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(field)
    } else {
        Err(template_error(format!(
            "invalid field reference in {{{{{action}}}}}"
        )))
    }
}
