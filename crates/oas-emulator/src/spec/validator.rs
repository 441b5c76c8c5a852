//! Request validation against the spec.

use super::loader::SpecProvider;

impl SpecProvider {
    /// True iff the operation declares a request body with `required: true`.
    pub fn requires_body(&self, template: &str, method: &str) -> bool {
        self.find_operation(template, method)
            .and_then(|op| op.request_body.as_ref())
            .is_some_and(|body| body.required)
    }
}

/// True iff the collected body is empty after trimming whitespace.
pub fn is_empty_body(body: &[u8]) -> bool {
    body.iter().all(|b| b.is_ascii_whitespace())
}
