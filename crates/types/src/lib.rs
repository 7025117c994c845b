//! Typed V2 playbook message model.
//!
//! The V2 format is the proto-JSON encoding of the workflow messages: enum
//! values are `SCREAMING_CASE` strings and each action's `oneof` parameter
//! message is a sibling field named after the action kind. Scalars follow
//! proto3 defaults, so a missing string decodes to `""`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Root V2 workflow definition.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinitionV2 {
    #[serde(default)]
    pub nodes: Vec<WorkflowNodeV2>,
    #[serde(default)]
    pub edges: Vec<WorkflowEdgeV2>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<WorkflowSettingsV2>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<WorkflowMetadataV2>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowMetadataV2 {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSettingsV2 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport_width: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport_height: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_timeout_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headless: Option<bool>,
}

/// A single graph node. `action` is optional on the wire so that a missing
/// action can be reported instead of failing the decode.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowNodeV2 {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<NodePosition>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct NodePosition {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowEdgeV2 {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Closed catalogue of V2 action kinds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum ActionType {
    #[serde(rename = "ACTION_TYPE_NAVIGATE")]
    Navigate,
    #[serde(rename = "ACTION_TYPE_CLICK")]
    Click,
    #[serde(rename = "ACTION_TYPE_HOVER")]
    Hover,
    #[serde(rename = "ACTION_TYPE_FOCUS")]
    Focus,
    #[serde(rename = "ACTION_TYPE_BLUR")]
    Blur,
    #[serde(rename = "ACTION_TYPE_TYPE")]
    Type,
    #[serde(rename = "ACTION_TYPE_KEYBOARD")]
    Keyboard,
    #[serde(rename = "ACTION_TYPE_SELECT")]
    Select,
    #[serde(rename = "ACTION_TYPE_WAIT")]
    Wait,
    #[serde(rename = "ACTION_TYPE_ASSERT")]
    Assert,
    #[serde(rename = "ACTION_TYPE_SCREENSHOT")]
    Screenshot,
    #[serde(rename = "ACTION_TYPE_EXTRACT")]
    Extract,
    #[serde(rename = "ACTION_TYPE_EVALUATE")]
    Evaluate,
    #[serde(rename = "ACTION_TYPE_SUBFLOW")]
    Subflow,
    #[serde(rename = "ACTION_TYPE_LOOP")]
    Loop,
    #[default]
    #[serde(rename = "ACTION_TYPE_UNSPECIFIED", other)]
    Unspecified,
}

impl ActionType {
    /// Proto field name of the parameter message carried by this kind.
    pub fn params_field(self) -> Option<&'static str> {
        match self {
            ActionType::Unspecified => None,
            ActionType::Navigate => Some("navigate"),
            ActionType::Click => Some("click"),
            ActionType::Hover => Some("hover"),
            ActionType::Focus => Some("focus"),
            ActionType::Blur => Some("blur"),
            ActionType::Type => Some("input"),
            ActionType::Keyboard => Some("keyboard"),
            ActionType::Select => Some("select"),
            ActionType::Wait => Some("wait"),
            ActionType::Assert => Some("assert"),
            ActionType::Screenshot => Some("screenshot"),
            ActionType::Extract => Some("extract"),
            ActionType::Evaluate => Some("evaluate"),
            ActionType::Subflow => Some("subflow"),
            ActionType::Loop => Some("loop"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionMetadata {
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Action envelope: the declared kind plus the `oneof` parameter messages.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDefinition {
    #[serde(rename = "type", default)]
    pub action_type: ActionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ActionMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navigate: Option<NavigateParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub click: Option<SelectorParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hover: Option<SelectorParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus: Option<SelectorParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blur: Option<SelectorParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<InputParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyboard: Option<KeyboardParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<SelectParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait: Option<WaitParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assert: Option<AssertParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<ScreenshotParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract: Option<ExtractParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluate: Option<EvaluateParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subflow: Option<SubflowParams>,
    #[serde(rename = "loop", default, skip_serializing_if = "Option::is_none")]
    pub loop_params: Option<LoopParams>,
}

/// Borrowed view of the parameter message matching an action's kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActionParams<'a> {
    Navigate(&'a NavigateParams),
    Click(&'a SelectorParams),
    Hover(&'a SelectorParams),
    Focus(&'a SelectorParams),
    Blur(&'a SelectorParams),
    Type(&'a InputParams),
    Keyboard(&'a KeyboardParams),
    Select(&'a SelectParams),
    Wait(&'a WaitParams),
    Assert(&'a AssertParams),
    Screenshot(&'a ScreenshotParams),
    Extract(&'a ExtractParams),
    Evaluate(&'a EvaluateParams),
    Subflow(&'a SubflowParams),
    Loop(&'a LoopParams),
}

impl ActionDefinition {
    /// The parameter message for the declared kind, if the sender set it.
    pub fn params(&self) -> Option<ActionParams<'_>> {
        match self.action_type {
            ActionType::Unspecified => None,
            ActionType::Navigate => self.navigate.as_ref().map(ActionParams::Navigate),
            ActionType::Click => self.click.as_ref().map(ActionParams::Click),
            ActionType::Hover => self.hover.as_ref().map(ActionParams::Hover),
            ActionType::Focus => self.focus.as_ref().map(ActionParams::Focus),
            ActionType::Blur => self.blur.as_ref().map(ActionParams::Blur),
            ActionType::Type => self.input.as_ref().map(ActionParams::Type),
            ActionType::Keyboard => self.keyboard.as_ref().map(ActionParams::Keyboard),
            ActionType::Select => self.select.as_ref().map(ActionParams::Select),
            ActionType::Wait => self.wait.as_ref().map(ActionParams::Wait),
            ActionType::Assert => self.assert.as_ref().map(ActionParams::Assert),
            ActionType::Screenshot => self.screenshot.as_ref().map(ActionParams::Screenshot),
            ActionType::Extract => self.extract.as_ref().map(ActionParams::Extract),
            ActionType::Evaluate => self.evaluate.as_ref().map(ActionParams::Evaluate),
            ActionType::Subflow => self.subflow.as_ref().map(ActionParams::Subflow),
            ActionType::Loop => self.loop_params.as_ref().map(ActionParams::Loop),
        }
    }

    pub fn label(&self) -> &str {
        self.metadata
            .as_ref()
            .map(|metadata| metadata.label.as_str())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigateParams {
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_until: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<i64>,
}

/// Shared parameters of the pointer actions (click, hover, focus, blur).
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorParams {
    #[serde(default)]
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub click_count: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputParams {
    #[serde(default)]
    pub selector: String,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyboardParams {
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectParams {
    #[serde(default)]
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertParams {
    #[serde(default)]
    pub selector: String,
    #[serde(default)]
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_page: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractParams {
    #[serde(default)]
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_as: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateParams {
    #[serde(default)]
    pub expression: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_result: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubflowParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum LoopType {
    #[serde(rename = "LOOP_TYPE_FOREACH")]
    Foreach,
    #[serde(rename = "LOOP_TYPE_REPEAT")]
    Repeat,
    #[serde(rename = "LOOP_TYPE_WHILE")]
    While,
    #[default]
    #[serde(rename = "LOOP_TYPE_UNSPECIFIED", other)]
    Unspecified,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopParams {
    #[serde(default)]
    pub loop_type: LoopType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_variable: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<i64>,
}
