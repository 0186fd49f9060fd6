use crate::vars::Vars;
use serde::{Deserialize, Serialize};

/// Precompiled, immutable description of one outbound HTTP callback.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct CallbackPlan {
    /// Callback name as declared in the OpenAPI document.
    pub callback_id: String,
    /// URL template: the callback path-item key, a runtime expression
    /// and/or `{token}` placeholder string.
    pub url_template: String,
    /// Uppercase HTTP method of the callback operation.
    pub method: String,
    /// `operationId`, or `{callback_id}__{method_lower}` when absent.
    pub operation_id: String,
    /// Declared path parameters, in document order.
    pub path_params: Vec<CallbackPathParam>,
    /// Body plan, absent when the operation declares no request body.
    pub body: Option<CallbackBodyPlan>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct CallbackPathParam {
    pub name: String,
    pub location: String,
    pub required: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct CallbackBodyPlan {
    /// Preferred media type; `application/json` when declared, otherwise
    /// the first declared media type.
    pub media_type: String,
    pub required: bool,
}

/// A plan plus per-request resolved parameter values.
///
/// Created for each incoming request that triggers a callback and discarded
/// after enqueue.
#[derive(Debug, Clone)]
pub struct CallbackExecutionPlan {
    pub plan: CallbackPlan,
    /// Parameters resolved for this dispatch; override request-derived
    /// variables on key collision.
    pub parameters: Vars,
    /// When set, the request body is the JSON encoding of this parameter
    /// instead of the incoming request payload.
    pub body_parameter_name: Option<String>,
}

impl CallbackExecutionPlan {
    /// Wraps a plan with no per-request parameter overrides.
    #[must_use]
    pub fn new(plan: CallbackPlan) -> Self {
        Self {
            plan,
            parameters: Vars::new(),
            body_parameter_name: None,
        }
    }

    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(name, value);
        self
    }

    #[must_use]
    pub fn with_body_parameter(mut self, name: impl Into<String>) -> Self {
        self.body_parameter_name = Some(name.into());
        self
    }
}
