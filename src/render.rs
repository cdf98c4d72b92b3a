//! Stored-template rendering.
//!
//! Templates live in the store as plain text with two constructs:
//!
//! - `{{ name }}` substitutes a context value. A placeholder whose key is
//!   absent from the context fails the render with
//!   [`NotifyError::MissingVariable`]; nothing half-rendered ever ships.
//! - `{% if name %} … {% else %} … {% endif %}` gates a block on a key's
//!   truthiness. Here an absent key simply reads as false, so templates can
//!   gate optional blocks (`{% if flight_number %}`) without erroring.
//!   The untaken branch is skipped, not evaluated.
//!
//! Blocks nest. There are no loops, filters, or expressions; anything
//! outside the grammar is a [`NotifyError::TemplateSyntax`] error.
//! Rendering is pure: output depends only on the template and the context.

use serde::{Deserialize, Serialize};

use crate::context::TemplateContext;
use crate::error::NotifyError;
use crate::template::NotificationTemplate;

/// A fully rendered subject and body, ready to address and send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedMessage {
    pub subject: String,
    pub body: String,
}

/// Render a stored template's subject and body against one context.
///
/// The subject renders first; its errors surface before the body's.
pub fn render(
    template: &NotificationTemplate,
    ctx: &TemplateContext,
) -> Result<RenderedMessage, NotifyError> {
    Ok(RenderedMessage {
        subject: render_str(&template.subject, ctx)?,
        body: render_str(&template.body, ctx)?,
    })
}

/// Render one template string against a context.
///
/// ```
/// use bellhop::render::render_str;
/// use bellhop::context::TemplateContext;
///
/// let ctx = TemplateContext::new()
///     .with("passenger_name", "Amy")
///     .with_flag("has_driver", false);
///
/// let out = render_str(
///     "Hi {{ passenger_name }},{% if has_driver %} your driver is set.{% else %} driver to follow.{% endif %}",
///     &ctx,
/// )?;
/// assert_eq!(out, "Hi Amy, driver to follow.");
/// # Ok::<(), bellhop::NotifyError>(())
/// ```
pub fn render_str(template: &str, ctx: &TemplateContext) -> Result<String, NotifyError> {
    let mut scanner = Scanner::new(template, ctx);
    let mut out = String::with_capacity(template.len());
    match scanner.render_section(&mut out, true)? {
        Stop::Eof => Ok(out),
        Stop::Else => Err(NotifyError::TemplateSyntax(
            "{% else %} outside of an {% if %} block".into(),
        )),
        Stop::Endif => Err(NotifyError::TemplateSyntax(
            "{% endif %} without a matching {% if %}".into(),
        )),
    }
}

/// Why a section stopped: end of input, or a block-control tag that the
/// caller owns.
#[derive(Debug, PartialEq)]
enum Stop {
    Eof,
    Else,
    Endif,
}

enum Tag {
    If(String),
    Else,
    Endif,
}

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
    ctx: &'a TemplateContext,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str, ctx: &'a TemplateContext) -> Self {
        Self { src, pos: 0, ctx }
    }

    /// Render until EOF or a block-control tag. `emit` is false inside
    /// untaken branches: structure is still parsed (so nesting and syntax
    /// stay checked) but values are neither looked up nor written.
    fn render_section(&mut self, out: &mut String, emit: bool) -> Result<Stop, NotifyError> {
        loop {
            let rest = &self.src[self.pos..];
            let var_at = rest.find("{{");
            let tag_at = rest.find("{%");

            let (offset, is_var) = match (var_at, tag_at) {
                (None, None) => {
                    if emit {
                        out.push_str(rest);
                    }
                    self.pos = self.src.len();
                    return Ok(Stop::Eof);
                }
                (Some(v), None) => (v, true),
                (None, Some(t)) => (t, false),
                (Some(v), Some(t)) if v < t => (v, true),
                (Some(_), Some(t)) => (t, false),
            };

            if emit {
                out.push_str(&rest[..offset]);
            }
            self.pos += offset;

            if is_var {
                let name = self.take_placeholder()?;
                if emit {
                    let value = self
                        .ctx
                        .get(&name)
                        .ok_or(NotifyError::MissingVariable(name))?;
                    out.push_str(&value.render());
                }
            } else {
                match self.take_tag()? {
                    Tag::If(name) => self.render_if(out, emit, &name)?,
                    Tag::Else => return Ok(Stop::Else),
                    Tag::Endif => return Ok(Stop::Endif),
                }
            }
        }
    }

    /// Render both branches of an `{% if %}` just parsed, emitting at most
    /// one of them.
    fn render_if(&mut self, out: &mut String, emit: bool, name: &str) -> Result<(), NotifyError> {
        let truthy = self.ctx.truthy(name);

        match self.render_section(out, emit && truthy)? {
            Stop::Endif => Ok(()),
            Stop::Else => match self.render_section(out, emit && !truthy)? {
                Stop::Endif => Ok(()),
                Stop::Else => Err(NotifyError::TemplateSyntax(format!(
                    "second {{% else %}} in {{% if {name} %}} block"
                ))),
                Stop::Eof => Err(NotifyError::TemplateSyntax(format!(
                    "unclosed {{% if {name} %}} block"
                ))),
            },
            Stop::Eof => Err(NotifyError::TemplateSyntax(format!(
                "unclosed {{% if {name} %}} block"
            ))),
        }
    }

    /// Consume `{{ name }}` at the cursor and return the key.
    fn take_placeholder(&mut self) -> Result<String, NotifyError> {
        let inner_start = self.pos + 2;
        let Some(close) = self.src[inner_start..].find("}}") else {
            return Err(NotifyError::TemplateSyntax(
                "unterminated placeholder: missing `}}`".into(),
            ));
        };
        let name = self.src[inner_start..inner_start + close].trim();
        validate_key(name)?;
        self.pos = inner_start + close + 2;
        Ok(name.to_owned())
    }

    /// Consume `{% … %}` at the cursor and classify it.
    fn take_tag(&mut self) -> Result<Tag, NotifyError> {
        let inner_start = self.pos + 2;
        let Some(close) = self.src[inner_start..].find("%}") else {
            return Err(NotifyError::TemplateSyntax(
                "unterminated tag: missing `%}`".into(),
            ));
        };
        let inner = self.src[inner_start..inner_start + close].trim();
        self.pos = inner_start + close + 2;

        let mut words = inner.split_whitespace();
        match (words.next(), words.next(), words.next()) {
            (Some("if"), Some(name), None) => {
                validate_key(name)?;
                Ok(Tag::If(name.to_owned()))
            }
            (Some("else"), None, None) => Ok(Tag::Else),
            (Some("endif"), None, None) => Ok(Tag::Endif),
            _ => Err(NotifyError::TemplateSyntax(format!(
                "unsupported tag `{{% {inner} %}}`"
            ))),
        }
    }
}

/// Context keys are snake_case identifiers.
fn validate_key(name: &str) -> Result<(), NotifyError> {
    if name.is_empty() {
        return Err(NotifyError::TemplateSyntax("empty placeholder name".into()));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(NotifyError::TemplateSyntax(format!(
            "invalid placeholder name `{name}`"
        )));
    }
    Ok(())
}
