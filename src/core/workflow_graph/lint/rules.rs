//! Per-node-type rule table.
//!
//! Every node type in the closed catalogue maps to a [`NodeRule`]: fields that
//! must be non-empty strings, groups of which at least one member must be
//! present, and an optional custom validator. Adding a node type means adding
//! a [`NodeKind`] variant and its table row.

use crate::core::workflow_graph::diagnostics::Diagnostic;
use crate::core::workflow_graph::walk::{is_present, lowered, non_empty_str, number_field, pointer_push};
use serde_json::{Map, Value};

const WAIT_DURATION_LONG_MS: f64 = 60_000.0;
const LOOP_MAX_ITERATIONS_SAFE: f64 = 1_000.0;

const EXPECTED_VALUE_MODES: &[&str] = &[
    "text_equals",
    "text_contains",
    "attribute_equals",
    "attribute_contains",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Click,
    Hover,
    DragDrop,
    Focus,
    Blur,
    Type,
    Keyboard,
    Shortcut,
    Select,
    Screenshot,
    Wait,
    Extract,
    Assert,
    Navigate,
    Loop,
    Evaluate,
    Subflow,
    WorkflowCall,
}

impl NodeKind {
    pub const ALL: [NodeKind; 18] = [
        NodeKind::Click,
        NodeKind::Hover,
        NodeKind::DragDrop,
        NodeKind::Focus,
        NodeKind::Blur,
        NodeKind::Type,
        NodeKind::Keyboard,
        NodeKind::Shortcut,
        NodeKind::Select,
        NodeKind::Screenshot,
        NodeKind::Wait,
        NodeKind::Extract,
        NodeKind::Assert,
        NodeKind::Navigate,
        NodeKind::Loop,
        NodeKind::Evaluate,
        NodeKind::Subflow,
        NodeKind::WorkflowCall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Click => "click",
            NodeKind::Hover => "hover",
            NodeKind::DragDrop => "dragDrop",
            NodeKind::Focus => "focus",
            NodeKind::Blur => "blur",
            NodeKind::Type => "type",
            NodeKind::Keyboard => "keyboard",
            NodeKind::Shortcut => "shortcut",
            NodeKind::Select => "select",
            NodeKind::Screenshot => "screenshot",
            NodeKind::Wait => "wait",
            NodeKind::Extract => "extract",
            NodeKind::Assert => "assert",
            NodeKind::Navigate => "navigate",
            NodeKind::Loop => "loop",
            NodeKind::Evaluate => "evaluate",
            NodeKind::Subflow => "subflow",
            NodeKind::WorkflowCall => "workflowCall",
        }
    }

    pub fn parse(node_type: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == node_type)
    }

    /// Node types whose `data` may carry an inline `workflowDefinition`.
    pub fn embeds_workflow(&self) -> bool {
        matches!(self, NodeKind::Subflow | NodeKind::WorkflowCall)
    }

    pub fn rule(&self) -> NodeRule {
        match self {
            NodeKind::Click | NodeKind::Hover | NodeKind::Focus | NodeKind::Blur | NodeKind::Extract => {
                NodeRule::required(&["selector"])
            }
            NodeKind::DragDrop => NodeRule::required(&["sourceSelector", "targetSelector"]),
            NodeKind::Type => NodeRule::required(&["selector"]).custom(validate_type),
            NodeKind::Keyboard => NodeRule::custom_only(validate_keyboard),
            NodeKind::Shortcut => NodeRule::one_of(&[&["shortcut", "keys"]]),
            NodeKind::Select => NodeRule {
                required_data: &["selector"],
                require_one_of: &[&["value", "label", "index"]],
                custom: None,
            },
            NodeKind::Screenshot => NodeRule::custom_only(validate_screenshot),
            NodeKind::Wait => NodeRule::custom_only(validate_wait),
            NodeKind::Assert => NodeRule::required(&["selector"]).custom(validate_assert),
            NodeKind::Navigate => NodeRule::custom_only(validate_navigate),
            NodeKind::Loop => NodeRule::custom_only(validate_loop),
            NodeKind::Evaluate => NodeRule::one_of(&[&["expression", "script", "code"]]),
            NodeKind::Subflow | NodeKind::WorkflowCall => NodeRule::custom_only(validate_subflow),
        }
    }
}

/// Custom validators are plain functions so the table stays a value.
pub type CustomValidator = fn(&NodeContext<'_>, &mut Vec<Diagnostic>);

#[derive(Clone, Copy)]
pub struct NodeRule {
    pub required_data: &'static [&'static str],
    pub require_one_of: &'static [&'static [&'static str]],
    pub custom: Option<CustomValidator>,
}

impl NodeRule {
    const fn required(fields: &'static [&'static str]) -> Self {
        Self {
            required_data: fields,
            require_one_of: &[],
            custom: None,
        }
    }

    const fn one_of(groups: &'static [&'static [&'static str]]) -> Self {
        Self {
            required_data: &[],
            require_one_of: groups,
            custom: None,
        }
    }

    const fn custom_only(validator: CustomValidator) -> Self {
        Self {
            required_data: &[],
            require_one_of: &[],
            custom: Some(validator),
        }
    }

    const fn custom(mut self, validator: CustomValidator) -> Self {
        self.custom = Some(validator);
        self
    }
}

/// The node under validation, with its data already shape-checked.
pub struct NodeContext<'a> {
    pub id: Option<&'a str>,
    pub node_type: &'a str,
    pub data: &'a Map<String, Value>,
    /// JSON pointer of the node itself.
    pub pointer: &'a str,
}

impl NodeContext<'_> {
    fn field_pointer(&self, field: &str) -> String {
        pointer_push(&pointer_push(self.pointer, "data"), field)
    }

    pub fn error(&self, code: &str, field: &str, message: impl Into<String>) -> Diagnostic {
        Diagnostic::error(code, message)
            .with_node(self.id, Some(self.node_type))
            .with_field(field)
            .with_pointer(self.field_pointer(field))
    }

    pub fn warning(&self, code: &str, field: &str, message: impl Into<String>) -> Diagnostic {
        Diagnostic::warning(code, message)
            .with_node(self.id, Some(self.node_type))
            .with_field(field)
            .with_pointer(self.field_pointer(field))
    }

    fn label(&self) -> String {
        match self.id {
            Some(id) => format!("{} node `{}`", self.node_type, id),
            None => format!("{} node", self.node_type),
        }
    }

    fn present(&self, field: &str) -> bool {
        is_present(self.data.get(field))
    }
}

/// Apply the generic rules, then the custom validator, of `kind` to one node.
pub fn apply_rule(kind: NodeKind, ctx: &NodeContext<'_>, out: &mut Vec<Diagnostic>) {
    let rule = kind.rule();

    for field in rule.required_data {
        if non_empty_str(ctx.data, field).is_none() {
            out.push(ctx.error(
                "WF_NODE_FIELD_REQUIRED",
                field,
                format!("{} requires a non-empty `{}`", ctx.label(), field),
            ));
        }
    }

    for group in rule.require_one_of {
        if !group.iter().any(|field| ctx.present(field)) {
            out.push(
                ctx.error(
                    "WF_NODE_FIELD_ONE_OF",
                    group[0],
                    format!(
                        "{} requires one of {{{}}}",
                        ctx.label(),
                        group.join(", ")
                    ),
                )
                .with_field(group.join("|"))
                .with_pointer(pointer_push(ctx.pointer, "data")),
            );
        }
    }

    if let Some(custom) = rule.custom {
        custom(ctx, out);
    }
}

fn validate_type(ctx: &NodeContext<'_>, out: &mut Vec<Diagnostic>) {
    if !["value", "text", "variable"].iter().any(|field| ctx.present(field)) {
        out.push(ctx.error(
            "WF_TYPE_INPUT_REQUIRED",
            "value",
            format!("{} needs input: set `value`, `text`, or `variable`", ctx.label()),
        ));
    }
}

fn validate_keyboard(ctx: &NodeContext<'_>, out: &mut Vec<Diagnostic>) {
    let has_keys = matches!(ctx.data.get("keys"), Some(Value::Array(keys)) if !keys.is_empty());
    let has_sequence = non_empty_str(ctx.data, "sequence").is_some();
    if has_keys || has_sequence {
        return;
    }
    if ctx.present("key") {
        out.push(
            ctx.warning(
                "WF_KEYBOARD_KEY_FIELD",
                "key",
                format!("{} uses the deprecated `key` field", ctx.label()),
            )
            .with_hint("use a `keys` array or a `sequence` string"),
        );
        return;
    }
    out.push(ctx.error(
        "WF_KEYBOARD_INPUT_REQUIRED",
        "keys",
        format!("{} needs a `keys` array or a `sequence` string", ctx.label()),
    ));
}

fn validate_screenshot(ctx: &NodeContext<'_>, out: &mut Vec<Diagnostic>) {
    let full_page = ctx.data.get("fullPage").and_then(Value::as_bool).unwrap_or(false);
    if !full_page && non_empty_str(ctx.data, "selector").is_none() {
        out.push(ctx.error(
            "WF_SCREENSHOT_TARGET_REQUIRED",
            "selector",
            format!("{} needs `fullPage: true` or a `selector`", ctx.label()),
        ));
    }
}

fn validate_wait(ctx: &NodeContext<'_>, out: &mut Vec<Diagnostic>) {
    match lowered(ctx.data, "waitType").as_str() {
        "element" => {
            if non_empty_str(ctx.data, "selector").is_none() {
                out.push(ctx.error(
                    "WF_WAIT_SELECTOR_REQUIRED",
                    "selector",
                    format!("{} waits for an element but has no `selector`", ctx.label()),
                ));
            }
        }
        "duration" | "delay" | "time" => match number_field(ctx.data, "durationMs") {
            Some(duration) if duration > 0.0 => {
                if duration > WAIT_DURATION_LONG_MS {
                    out.push(
                        ctx.warning(
                            "WF_WAIT_DURATION_LONG",
                            "durationMs",
                            format!("{} waits {}ms", ctx.label(), duration),
                        )
                        .with_hint("prefer waiting for an element over waits longer than 60s"),
                    );
                }
            }
            _ => out.push(ctx.error(
                "WF_WAIT_DURATION_REQUIRED",
                "durationMs",
                format!("{} needs a positive `durationMs`", ctx.label()),
            )),
        },
        other => out.push(
            ctx.warning(
                "WF_WAIT_TYPE_UNKNOWN",
                "waitType",
                format!("{} has unknown waitType `{}`", ctx.label(), other),
            )
            .with_hint("use `element` or `duration`"),
        ),
    }
}

fn validate_assert(ctx: &NodeContext<'_>, out: &mut Vec<Diagnostic>) {
    let mode = lowered(ctx.data, "assertMode");
    if EXPECTED_VALUE_MODES.contains(&mode.as_str()) && !ctx.present("expectedValue") {
        out.push(ctx.error(
            "WF_ASSERT_EXPECTED_REQUIRED",
            "expectedValue",
            format!("{} in mode `{}` needs `expectedValue`", ctx.label(), mode),
        ));
    }
    if mode.starts_with("attribute") && non_empty_str(ctx.data, "attributeName").is_none() {
        out.push(ctx.error(
            "WF_ASSERT_ATTRIBUTE_REQUIRED",
            "attributeName",
            format!("{} in mode `{}` needs `attributeName`", ctx.label(), mode),
        ));
    }
}

fn validate_navigate(ctx: &NodeContext<'_>, out: &mut Vec<Diagnostic>) {
    match lowered(ctx.data, "destinationType").as_str() {
        "" | "url" => {
            if non_empty_str(ctx.data, "url").is_none() {
                out.push(ctx.error(
                    "WF_NAVIGATE_URL_REQUIRED",
                    "url",
                    format!("{} needs a `url`", ctx.label()),
                ));
            }
        }
        "scenario" => {
            if non_empty_str(ctx.data, "scenario").is_none() {
                out.push(ctx.error(
                    "WF_NAVIGATE_SCENARIO_REQUIRED",
                    "scenario",
                    format!("{} navigates to a scenario but names none", ctx.label()),
                ));
            }
            if !ctx.data.contains_key("scenarioPath") {
                out.push(ctx.warning(
                    "WF_NAVIGATE_SCENARIO_PATH_DEFAULT",
                    "scenarioPath",
                    format!("{} has no `scenarioPath`; `/` will be used", ctx.label()),
                ));
            }
        }
        other => out.push(
            ctx.warning(
                "WF_NAVIGATE_DESTINATION_UNKNOWN",
                "destinationType",
                format!("{} has unknown destinationType `{}`", ctx.label(), other),
            )
            .with_hint("use `url` or `scenario`"),
        ),
    }
}

fn validate_loop(ctx: &NodeContext<'_>, out: &mut Vec<Diagnostic>) {
    match lowered(ctx.data, "loopType").as_str() {
        "foreach" | "for_each" => {
            if non_empty_str(ctx.data, "arraySource").is_none() {
                out.push(ctx.error(
                    "WF_LOOP_ARRAY_SOURCE_REQUIRED",
                    "arraySource",
                    format!("{} iterates but has no `arraySource`", ctx.label()),
                ));
            }
        }
        "repeat" => {
            if !number_field(ctx.data, "count").is_some_and(|count| count > 0.0) {
                out.push(ctx.error(
                    "WF_LOOP_COUNT_REQUIRED",
                    "count",
                    format!("{} repeats but has no positive `count`", ctx.label()),
                ));
            }
        }
        "while" => {
            if non_empty_str(ctx.data, "condition").is_none() {
                out.push(ctx.error(
                    "WF_LOOP_CONDITION_REQUIRED",
                    "condition",
                    format!("{} loops while a condition holds but has no `condition`", ctx.label()),
                ));
            }
        }
        other => out.push(
            ctx.warning(
                "WF_LOOP_TYPE_UNKNOWN",
                "loopType",
                format!("{} has unknown loopType `{}`", ctx.label(), other),
            )
            .with_hint("use `foreach`, `repeat`, or `while`"),
        ),
    }

    if let Some(limit) = number_field(ctx.data, "maxIterations") {
        if limit > LOOP_MAX_ITERATIONS_SAFE {
            out.push(ctx.warning(
                "WF_LOOP_MAX_ITERATIONS",
                "maxIterations",
                format!("{} allows {} iterations", ctx.label(), limit),
            ));
        }
    }
}

fn validate_subflow(ctx: &NodeContext<'_>, out: &mut Vec<Diagnostic>) {
    if non_empty_str(ctx.data, "workflowId").is_some() {
        return;
    }
    let Some(Value::Object(inline)) = ctx.data.get("workflowDefinition") else {
        out.push(ctx.error(
            "WF_SUBFLOW_TARGET",
            "workflowId",
            format!("{} needs a `workflowId` or an inline `workflowDefinition`", ctx.label()),
        ));
        return;
    };
    if !matches!(inline.get("nodes"), Some(Value::Array(nodes)) if !nodes.is_empty()) {
        out.push(ctx.error(
            "WF_SUBFLOW_NODES_REQUIRED",
            "workflowDefinition",
            format!("{} has an inline workflow without nodes", ctx.label()),
        ));
    }
    if !matches!(inline.get("edges"), Some(Value::Array(_))) {
        out.push(ctx.error(
            "WF_SUBFLOW_EDGES_REQUIRED",
            "workflowDefinition",
            format!("{} has an inline workflow without an `edges` array", ctx.label()),
        ));
    }
}
