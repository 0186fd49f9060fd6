//! Callback URL resolution.
//!
//! A URL template passes through three stages, in order:
//!
//! 1. Runtime body expressions `{$request.body#/ptr}` are substituted from
//!    the incoming request payload via RFC 6901 JSON Pointer evaluation.
//! 2. Token placeholders `{name}` are substituted from the resolved request
//!    variables, URL-encoded.
//! 3. The result is absolutized: already-absolute HTTP(S) URLs pass
//!    through; anything else is combined with the context's default base
//!    URI.
//!
//! The `file`-scheme guard in stage 3 exists because on POSIX a
//! leading-slash string parses as `file:///…`; callbacks are HTTP(S), so
//! such inputs are treated as relative paths.

use crate::context::CallbackRuntimeContext;
use crate::error::Error;
use regex::{Captures, Regex};
use reqwest::Url;
use serde_json::Value;

/// Expands runtime expressions and token placeholders against a runtime
/// context, yielding an absolute URI.
pub struct UrlResolver {
    body_expression: Regex,
    token: Regex,
}

impl UrlResolver {
    /// # Panics
    ///
    /// Never panics: the template grammar regexes are compile-time
    /// constants.
    #[must_use]
    pub fn new() -> Self {
        Self {
            body_expression: Regex::new(r"\{\$request\.body#(?P<ptr>/[^}]*)\}")
                .expect("runtime expression regex is valid"),
            token: Regex::new(r"\{(?P<name>[A-Za-z_][A-Za-z0-9_]*)\}")
                .expect("token regex is valid"),
        }
    }

    /// Resolves a URL template to an absolute URI.
    ///
    /// # Errors
    ///
    /// Returns a `Resolution` error when a runtime expression has no
    /// payload to read, a pointer does not resolve, a token placeholder has
    /// no value, or the result is relative with no default base URI.
    pub fn resolve(
        &self,
        url_template: &str,
        ctx: &CallbackRuntimeContext,
    ) -> Result<Url, Error> {
        let resolved = self.substitute_body_expressions(url_template, ctx)?;
        let resolved = self.substitute_tokens(&resolved, ctx)?;
        absolutize(&resolved, ctx)
    }

    fn substitute_body_expressions(
        &self,
        input: &str,
        ctx: &CallbackRuntimeContext,
    ) -> Result<String, Error> {
        substitute(&self.body_expression, input, |captures| {
            let pointer = &captures["ptr"];
            let payload = ctx
                .callback_payload
                .as_ref()
                .ok_or_else(|| Error::missing_payload(format!("$request.body#{pointer}")))?;
            let value = eval_pointer(payload, pointer)?;
            render_value(value)
        })
    }

    fn substitute_tokens(
        &self,
        input: &str,
        ctx: &CallbackRuntimeContext,
    ) -> Result<String, Error> {
        substitute(&self.token, input, |captures| {
            let name = &captures["name"];
            let value = ctx
                .vars
                .token_value(name)
                .ok_or_else(|| Error::missing_token(name))?;
            Ok(urlencoding::encode(&value).into_owned())
        })
    }
}

impl Default for UrlResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Replaces every match of `re` in `input` with the fallible replacement.
fn substitute<F>(re: &Regex, input: &str, mut replacement: F) -> Result<String, Error>
where
    F: FnMut(&Captures<'_>) -> Result<String, Error>,
{
    let mut output = String::with_capacity(input.len());
    let mut last_end = 0;

    for captures in re.captures_iter(input) {
        let matched = captures.get(0).expect("group 0 always participates");
        output.push_str(&input[last_end..matched.start()]);
        output.push_str(&replacement(&captures)?);
        last_end = matched.end();
    }

    output.push_str(&input[last_end..]);
    Ok(output)
}

/// RFC 6901 pointer evaluation over a JSON value.
///
/// Segments unescape `~1` to `/` and `~0` to `~`, in that order. Object
/// navigation is by key; array navigation is by base-10 index with bounds
/// checking and no leading zeros.
fn eval_pointer<'a>(payload: &'a Value, pointer: &str) -> Result<&'a Value, Error> {
    let mut current = payload;

    for raw_segment in pointer.split('/').skip(1) {
        let segment = raw_segment.replace("~1", "/").replace("~0", "~");
        current = match current {
            Value::Object(map) => map
                .get(&segment)
                .ok_or_else(|| Error::pointer_not_found(pointer, &segment))?,
            Value::Array(items) => {
                if segment.len() > 1 && segment.starts_with('0') {
                    return Err(Error::pointer_not_found(pointer, &segment));
                }
                let index: usize = segment
                    .parse()
                    .map_err(|_| Error::pointer_not_found(pointer, &segment))?;
                items
                    .get(index)
                    .ok_or_else(|| Error::pointer_not_found(pointer, &segment))?
            }
            _ => return Err(Error::pointer_type_error(pointer, &segment)),
        };
    }

    Ok(current)
}

/// Strings insert their raw characters; other values insert their
/// canonical JSON text.
fn render_value(value: &Value) -> Result<String, Error> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Ok(serde_json::to_string(other)?),
    }
}

fn absolutize(resolved: &str, ctx: &CallbackRuntimeContext) -> Result<Url, Error> {
    if let Ok(url) = Url::parse(resolved) {
        if url.scheme() != "file" || !resolved.starts_with('/') {
            return Ok(url);
        }
    }

    let base = ctx
        .default_base_uri
        .as_ref()
        .ok_or_else(|| Error::unresolvable_url(resolved))?;
    base.join(resolved)
        .map_err(|e| Error::invalid_url(resolved, e.to_string()))
}
