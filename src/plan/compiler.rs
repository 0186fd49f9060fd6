use crate::error::Error;
use crate::plan::models::{CallbackBodyPlan, CallbackPathParam, CallbackPlan};
use openapiv3::{Callback, OpenAPI, Operation, Parameter, ReferenceOr, RequestBody};

/// Compiles OpenAPI callback declarations into executable callback plans.
///
/// The compiler is pure: it performs no I/O, never mutates its input, and
/// emits plans in document order (paths, then operations, then callback
/// entries, then callback path items).
pub struct PlanCompiler;

impl PlanCompiler {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Walks every operation of the document and compiles its callback
    /// declarations.
    ///
    /// Reference entries (`$ref` callbacks and parameters) are skipped;
    /// document validation is expected to have resolved or rejected them.
    #[must_use]
    pub fn compile(&self, spec: &OpenAPI) -> Vec<CallbackPlan> {
        let mut plans = Vec::new();

        for (_, path_item) in spec.paths.iter() {
            let ReferenceOr::Item(item) = path_item else {
                continue;
            };

            let operations = [
                &item.get,
                &item.put,
                &item.post,
                &item.delete,
                &item.options,
                &item.head,
                &item.patch,
                &item.trace,
            ];

            for operation in operations.into_iter().flatten() {
                for (callback_id, callback) in &operation.callbacks {
                    Self::compile_callback(callback_id, callback, &mut plans);
                }
            }
        }

        plans
    }

    /// Compiles a single callback entry: one plan per path item per
    /// declared operation.
    fn compile_callback(callback_id: &str, callback: &Callback, plans: &mut Vec<CallbackPlan>) {
        for (url_template, path_item) in callback {
            if url_template.is_empty() {
                continue;
            }

            let operations = [
                ("GET", &path_item.get),
                ("PUT", &path_item.put),
                ("POST", &path_item.post),
                ("DELETE", &path_item.delete),
                ("OPTIONS", &path_item.options),
                ("HEAD", &path_item.head),
                ("PATCH", &path_item.patch),
                ("TRACE", &path_item.trace),
            ];

            for (method, operation) in operations {
                if let Some(op) = operation {
                    plans.push(Self::compile_operation(callback_id, url_template, method, op));
                }
            }
        }
    }

    fn compile_operation(
        callback_id: &str,
        url_template: &str,
        method: &str,
        operation: &Operation,
    ) -> CallbackPlan {
        let operation_id = operation
            .operation_id
            .clone()
            .unwrap_or_else(|| format!("{callback_id}__{}", method.to_lowercase()));

        let path_params = operation
            .parameters
            .iter()
            .filter_map(|param_ref| match param_ref {
                ReferenceOr::Item(Parameter::Path { parameter_data, .. }) => {
                    Some(CallbackPathParam {
                        name: parameter_data.name.clone(),
                        location: crate::constants::PARAM_LOCATION_PATH.to_string(),
                        required: parameter_data.required,
                    })
                }
                _ => None,
            })
            .filter(|param| !param.name.is_empty())
            .collect();

        let body = operation
            .request_body
            .as_ref()
            .and_then(Self::compile_request_body);

        CallbackPlan {
            callback_id: callback_id.to_string(),
            url_template: url_template.to_string(),
            method: method.to_uppercase(),
            operation_id,
            path_params,
            body,
        }
    }

    /// Prefers `application/json`; otherwise the first declared media type.
    fn compile_request_body(request_body: &ReferenceOr<RequestBody>) -> Option<CallbackBodyPlan> {
        match request_body {
            ReferenceOr::Item(body) => {
                let media_type = if body
                    .content
                    .contains_key(crate::constants::CONTENT_TYPE_JSON)
                {
                    crate::constants::CONTENT_TYPE_JSON.to_string()
                } else {
                    body.content.keys().next()?.clone()
                };

                Some(CallbackBodyPlan {
                    media_type,
                    required: body.required,
                })
            }
            ReferenceOr::Reference { .. } => None,
        }
    }
}

impl Default for PlanCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl CallbackPlan {
    /// Checks the plan invariants before registration.
    ///
    /// # Errors
    ///
    /// Returns an error when the URL template is empty or the method is not
    /// a valid HTTP method.
    pub fn validate(&self) -> Result<(), Error> {
        if self.url_template.is_empty() {
            return Err(Error::empty_url_template(&self.callback_id));
        }
        reqwest::Method::from_bytes(self.method.as_bytes())
            .map_err(|_| Error::invalid_http_method(&self.method))?;
        Ok(())
    }
}
