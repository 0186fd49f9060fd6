//! Callback body serialization.
//!
//! Produces `(content_type, bytes)` from a plan and runtime context. JSON
//! is the mandatory default; plans declaring another media type keep their
//! declared content type but the payload is still rendered as JSON text
//! (form encoders can be layered on top by embedders).

use crate::constants;
use crate::context::CallbackRuntimeContext;
use crate::error::Error;
use crate::plan::CallbackPlan;

/// Serialized body of one callback request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedBody {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl SerializedBody {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Serializes the runtime payload according to the plan's body declaration.
pub struct BodySerializer;

impl BodySerializer {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// # Errors
    ///
    /// Returns an error when the payload cannot be rendered as JSON.
    pub fn serialize(
        &self,
        plan: &CallbackPlan,
        ctx: &CallbackRuntimeContext,
    ) -> Result<SerializedBody, Error> {
        let Some(body_plan) = &plan.body else {
            return Ok(SerializedBody {
                content_type: constants::CONTENT_TYPE_JSON.to_string(),
                bytes: Vec::new(),
            });
        };

        let bytes = match &ctx.callback_payload {
            None | Some(serde_json::Value::Null) => Vec::new(),
            Some(payload) => serde_json::to_vec(payload)?,
        };

        Ok(SerializedBody {
            content_type: body_plan.media_type.clone(),
            bytes,
        })
    }

    /// Renders a single named parameter as the body, used when the
    /// execution plan names a body parameter.
    ///
    /// # Errors
    ///
    /// Returns an error when the value cannot be rendered as JSON.
    pub fn serialize_value(
        &self,
        content_type: &str,
        value: &serde_json::Value,
    ) -> Result<SerializedBody, Error> {
        Ok(SerializedBody {
            content_type: content_type.to_string(),
            bytes: serde_json::to_vec(value)?,
        })
    }
}

impl Default for BodySerializer {
    fn default() -> Self {
        Self::new()
    }
}
