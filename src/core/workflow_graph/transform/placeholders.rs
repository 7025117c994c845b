use crate::core::workflow_graph::diagnostics::Diagnostic;
use crate::core::workflow_graph::transform::WorkflowTransform;
use crate::core::workflow_graph::walk::visit_strings_mut;
use serde_json::Value;

const BASE_URL_PLACEHOLDER: &str = "${BASE_URL}";
const UI_PORT_PLACEHOLDER: &str = "{{UI_PORT}}";

/// `${BASE_URL}` and `{{UI_PORT}}` substitution.
pub struct PlaceholderTransform<'a> {
    pub base_url: &'a str,
}

impl WorkflowTransform for PlaceholderTransform<'_> {
    fn name(&self) -> &'static str {
        "PlaceholderTransform"
    }

    fn transform(&self, definition: &mut Value) -> Vec<Diagnostic> {
        substitute_placeholders(definition, self.base_url);
        Vec::new()
    }
}

/// Replace placeholders in every string of `definition`.
///
/// `${BASE_URL}` always becomes the base URL, even an empty one.
/// `{{UI_PORT}}` is replaced only when a port can be extracted.
pub fn substitute_placeholders(definition: &mut Value, base_url: &str) {
    let port = extract_port(base_url);
    visit_strings_mut(definition, "", &mut |text, _site| {
        if text.contains(BASE_URL_PLACEHOLDER) {
            *text = text.replace(BASE_URL_PLACEHOLDER, base_url);
        }
        if let Some(port) = &port {
            if text.contains(UI_PORT_PLACEHOLDER) {
                *text = text.replace(UI_PORT_PLACEHOLDER, port);
            }
        }
    });
}

/// Port of a base URL such as `http://localhost:3000/app` (`3000`).
///
/// The scheme and any path are ignored; the port is the run after the last
/// `:` of the authority and must be all digits.
pub fn extract_port(base_url: &str) -> Option<String> {
    let trimmed = base_url.trim();
    let rest = match trimmed.find("://") {
        Some(index) => &trimmed[index + 3..],
        None => trimmed,
    };
    let authority = rest.split('/').next().unwrap_or("");
    let (_, port) = authority.rsplit_once(':')?;
    if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) {
        Some(port.to_string())
    } else {
        None
    }
}
