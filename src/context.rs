//! Request-scoped runtime context consumed by URL and body resolution.
//!
//! These types decouple the dispatch core from any specific server host.
//! The host builds a [`CallbackRuntimeContext`] from its request pipeline
//! (trace id, resolved route/query parameters, parsed body) and the engine
//! never looks back at the incoming request.

use crate::vars::Vars;
use regex::Regex;
use reqwest::Url;
use std::sync::OnceLock;

/// Placeholder grammar used for idempotency-seed derivation.
///
/// Accepts the typed form `{name:constraint}`; the constraint is discarded
/// after name extraction. Runtime body expressions never match because their
/// pointers contain `/`.
fn seed_placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{(?P<name>[^{}:/?]+)(?::[^{}]+)?\}").expect("placeholder regex is valid")
    })
}

/// Per-request values carried into callback dispatch.
///
/// Immutable for the lifetime of one dispatch.
#[derive(Debug, Clone)]
pub struct CallbackRuntimeContext {
    /// Propagated trace id of the incoming request.
    pub correlation_id: String,
    /// Deterministic seed for the idempotency key.
    pub idempotency_seed: String,
    /// Base URI used to absolutize relative callback URLs.
    pub default_base_uri: Option<Url>,
    /// Resolved request variables (route, query, header parameters).
    pub vars: Vars,
    /// Parsed body of the incoming request, if any.
    pub callback_payload: Option<serde_json::Value>,
}

impl CallbackRuntimeContext {
    /// Starts building a context from the incoming request's trace id.
    pub fn builder(trace_id: impl Into<String>) -> CallbackRuntimeContextBuilder {
        CallbackRuntimeContextBuilder {
            trace_id: trace_id.into(),
            vars: Vars::new(),
            callback_payload: None,
            default_base_uri: None,
            url_template: None,
        }
    }

    /// Returns a copy with `vars` replaced and the idempotency seed
    /// re-derived for `url_template` over the new variables.
    #[must_use]
    pub fn with_vars_for_template(&self, vars: Vars, url_template: &str) -> Self {
        let idempotency_seed = derive_idempotency_seed(url_template, &vars, &self.correlation_id);
        Self {
            correlation_id: self.correlation_id.clone(),
            idempotency_seed,
            default_base_uri: self.default_base_uri.clone(),
            vars,
            callback_payload: self.callback_payload.clone(),
        }
    }
}

/// Builder mirroring what a request-scoped host context provides.
#[derive(Debug)]
pub struct CallbackRuntimeContextBuilder {
    trace_id: String,
    vars: Vars,
    callback_payload: Option<serde_json::Value>,
    default_base_uri: Option<Url>,
    url_template: Option<String>,
}

impl CallbackRuntimeContextBuilder {
    /// Seeds the variable map from resolved request parameters.
    #[must_use]
    pub fn with_parameters<I, K>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = (K, serde_json::Value)>,
        K: Into<String>,
    {
        for (name, value) in parameters {
            self.vars.insert(name, value);
        }
        self
    }

    /// Adds a single resolved variable.
    #[must_use]
    pub fn with_var(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.vars.insert(name, value);
        self
    }

    /// Sets the typed body of the incoming request.
    #[must_use]
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.callback_payload = Some(payload);
        self
    }

    /// Sets the base URI used to absolutize relative callback URLs.
    #[must_use]
    pub fn with_default_base_uri(mut self, base: Url) -> Self {
        self.default_base_uri = Some(base);
        self
    }

    /// Sets the URL template the idempotency seed is derived from.
    ///
    /// Without a template the seed falls back to the correlation id.
    #[must_use]
    pub fn with_url_template(mut self, template: impl Into<String>) -> Self {
        self.url_template = Some(template.into());
        self
    }

    #[must_use]
    pub fn build(self) -> CallbackRuntimeContext {
        let idempotency_seed = self.url_template.as_deref().map_or_else(
            || self.trace_id.clone(),
            |template| derive_idempotency_seed(template, &self.vars, &self.trace_id),
        );
        CallbackRuntimeContext {
            correlation_id: self.trace_id,
            idempotency_seed,
            default_base_uri: self.default_base_uri,
            vars: self.vars,
            callback_payload: self.callback_payload,
        }
    }
}

/// Derives the idempotency seed for a URL template over resolved variables.
///
/// Placeholder names are extracted with the `{name}`/`{name:constraint}`
/// grammar, deduplicated and sorted case-insensitively, and joined as
/// `name=value` pairs with `&`. Only names resolving to non-blank values
/// contribute. Templates without placeholders seed from the correlation id.
#[must_use]
pub fn derive_idempotency_seed(url_template: &str, vars: &Vars, correlation_id: &str) -> String {
    let mut names: Vec<&str> = seed_placeholder_regex()
        .captures_iter(url_template)
        .filter_map(|captures| captures.name("name"))
        .map(|m| m.as_str())
        .collect();

    if names.is_empty() {
        return correlation_id.to_string();
    }

    names.sort_by_key(|name| name.to_ascii_lowercase());
    names.dedup_by_key(|name| name.to_ascii_lowercase());

    let pairs: Vec<String> = names
        .iter()
        .filter_map(|name| {
            vars.token_value(name)
                .filter(|value| !value.trim().is_empty())
                .map(|value| format!("{name}={value}"))
        })
        .collect();

    pairs.join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(entries: &[(&str, serde_json::Value)]) -> Vars {
        entries
            .iter()
            .map(|(name, value)| ((*name).to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn seed_joins_sorted_pairs() {
        let vars = vars(&[("b", json!("2")), ("a", json!("1"))]);
        let seed = derive_idempotency_seed("/x/{b}/{a}", &vars, "trace");
        assert_eq!(seed, "a=1&b=2");
    }

    #[test]
    fn seed_is_order_insensitive() {
        let vars = vars(&[("paymentId", json!("p-42")), ("region", json!("eu"))]);
        let forward = derive_idempotency_seed("/v1/{paymentId}/{region}", &vars, "t");
        let reversed = derive_idempotency_seed("/v1/{region}/{paymentId}", &vars, "t");
        assert_eq!(forward, reversed);
        assert_eq!(forward, "paymentId=p-42&region=eu");
    }

    #[test]
    fn seed_skips_blank_and_missing_values() {
        let vars = vars(&[("a", json!("")), ("b", json!(null)), ("c", json!("v"))]);
        let seed = derive_idempotency_seed("/{a}/{b}/{c}/{d}", &vars, "t");
        assert_eq!(seed, "c=v");
    }

    #[test]
    fn seed_discards_type_constraints() {
        let vars = vars(&[("id", json!("7"))]);
        let seed = derive_idempotency_seed("/items/{id:int}", &vars, "t");
        assert_eq!(seed, "id=7");
    }

    #[test]
    fn seed_ignores_runtime_body_expressions() {
        let vars = vars(&[("id", json!("7"))]);
        let seed = derive_idempotency_seed("{$request.body#/cb}/items/{id}", &vars, "t");
        assert_eq!(seed, "id=7");
    }

    #[test]
    fn placeholderless_template_falls_back_to_correlation_id() {
        let seed = derive_idempotency_seed("https://cb.example/ping", &Vars::new(), "trace-9");
        assert_eq!(seed, "trace-9");
    }

    #[test]
    fn builder_without_template_seeds_from_trace_id() {
        let ctx = CallbackRuntimeContext::builder("trace-1")
            .with_var("a", json!("x"))
            .build();
        assert_eq!(ctx.idempotency_seed, "trace-1");
        assert_eq!(ctx.correlation_id, "trace-1");
    }

    #[test]
    fn builder_with_template_derives_seed() {
        let ctx = CallbackRuntimeContext::builder("trace-1")
            .with_parameters([("paymentId".to_string(), json!("p-42"))])
            .with_url_template("https://cb.example/v1/payments/{paymentId}/status")
            .build();
        assert_eq!(ctx.idempotency_seed, "paymentId=p-42");
    }

    #[test]
    fn duplicate_placeholders_contribute_once() {
        let vars = vars(&[("id", json!("7"))]);
        let seed = derive_idempotency_seed("/{id}/copies/{id}", &vars, "t");
        assert_eq!(seed, "id=7");
    }
}
