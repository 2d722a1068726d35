//! Yes/no decisions and label classification built on forced tool calls.
//!
//! The model is offered a single schema-only tool and its first call is
//! parsed into the answer.

use rcommon::ErrorPayload;
use rprovider::ToolCall;
use rtooling::{schema_from_model, validate_arguments};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::{ChatClient, ChatRequest, StructuredOutput};

/// Return a boolean.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct IfDecision {
    value: bool,
}

/// Return one label.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ClassifyDecision {
    label: String,
}

pub(crate) fn if_request(input: &str, question: &str) -> ChatRequest {
    let prompt = format!(
        "Here is an input:\n<input>\n{}\n</input>\n\nAnd a question:\n<question>\n{}\n</question>\n\nAnswer by calling the tool with a boolean `value`.",
        input.trim(),
        question.trim()
    );
    ChatRequest::prompt(prompt).with_tool(schema_from_model::<IfDecision>())
}

/// Builds the classification request and returns the trimmed choices it offers.
pub(crate) fn classify_request<S: AsRef<str>>(
    input: &str,
    choices: &[S],
) -> Result<(ChatRequest, Vec<String>), ErrorPayload> {
    if choices.is_empty() {
        return Err(ErrorPayload::invalid_input("choices must not be empty."));
    }
    let choices: Vec<String> = choices
        .iter()
        .map(|choice| choice.as_ref().trim().to_string())
        .collect();
    let prompt = format!(
        "You are given this input:\n<input>\n{}\n</input>\n\nAnd the following choices:\n<choices>\n{}\n</choices>\n\nAnswer by calling the tool with `label` set to one of the choices.",
        input.trim(),
        choices.join(", ")
    );
    let request = ChatRequest::prompt(prompt).with_tool(schema_from_model::<ClassifyDecision>());
    Ok((request, choices))
}

pub(crate) fn parse_decision(calls: StructuredOutput<Vec<ToolCall>>) -> Result<bool, ErrorPayload> {
    let decision: IfDecision = parse_first_call(&calls.into_result()?, &schema_for::<IfDecision>())?;
    Ok(decision.value)
}

pub(crate) fn parse_label(
    calls: StructuredOutput<Vec<ToolCall>>,
    choices: &[String],
) -> Result<String, ErrorPayload> {
    let decision: ClassifyDecision =
        parse_first_call(&calls.into_result()?, &schema_for::<ClassifyDecision>())?;
    if !choices.contains(&decision.label) {
        return Err(ErrorPayload::invalid_input(
            "classification label is not in the allowed choices.",
        )
        .with_detail("label", decision.label)
        .with_detail("choices", choices.to_vec()));
    }
    Ok(decision.label)
}

fn schema_for<T: schemars::JsonSchema>() -> Value {
    schema_from_model::<T>()["function"]["parameters"].clone()
}

fn parse_first_call<T: DeserializeOwned>(calls: &[ToolCall], schema: &Value) -> Result<T, ErrorPayload> {
    let call = calls
        .first()
        .ok_or_else(|| ErrorPayload::invalid_input("tool call is missing."))?;
    let args: Value = serde_json::from_str(call.arguments()).map_err(|error| {
        ErrorPayload::invalid_input("tool arguments are not valid JSON.")
            .with_detail("error", error.to_string())
    })?;
    let Value::Object(args) = args else {
        return Err(ErrorPayload::invalid_input("tool arguments must be an object."));
    };
    let errors = validate_arguments(schema, &args);
    if !errors.is_empty() {
        return Err(validation_failed(errors));
    }
    serde_json::from_value(Value::Object(args)).map_err(|error| {
        validation_failed(vec![json!({"loc": [], "msg": error.to_string(), "type": "value_error"})])
    })
}

fn validation_failed(errors: Vec<Value>) -> ErrorPayload {
    ErrorPayload::invalid_input("tool arguments failed validation.")
        .with_detail("errors", errors)
}

impl ChatClient {
    /// Asks the model a yes/no `question` about `input`.
    pub fn if_(&self, input: &str, question: &str) -> Result<bool, ErrorPayload> {
        self.decide(if_request(input, question))
    }

    pub async fn if_async(&self, input: &str, question: &str) -> Result<bool, ErrorPayload> {
        self.decide_async(if_request(input, question)).await
    }

    /// Asks the model to label `input` with one of `choices`. A label outside
    /// the choices is an `InvalidInput` error.
    pub fn classify<S: AsRef<str>>(&self, input: &str, choices: &[S]) -> Result<String, ErrorPayload> {
        let (request, choices) = classify_request(input, choices)?;
        self.pick_label(request, &choices)
    }

    pub async fn classify_async<S: AsRef<str>>(
        &self,
        input: &str,
        choices: &[S],
    ) -> Result<String, ErrorPayload> {
        let (request, choices) = classify_request(input, choices)?;
        self.pick_label_async(request, &choices).await
    }

    pub(crate) fn decide(&self, request: ChatRequest) -> Result<bool, ErrorPayload> {
        parse_decision(self.tool_calls(request))
    }

    pub(crate) async fn decide_async(&self, request: ChatRequest) -> Result<bool, ErrorPayload> {
        parse_decision(self.tool_calls_async(request).await)
    }

    pub(crate) fn pick_label(
        &self,
        request: ChatRequest,
        choices: &[String],
    ) -> Result<String, ErrorPayload> {
        parse_label(self.tool_calls(request), choices)
    }

    pub(crate) async fn pick_label_async(
        &self,
        request: ChatRequest,
        choices: &[String],
    ) -> Result<String, ErrorPayload> {
        parse_label(self.tool_calls_async(request).await, choices)
    }
}
