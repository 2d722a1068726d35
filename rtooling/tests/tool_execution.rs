use std::sync::{Arc, Mutex};
use std::time::Duration;

use rcommon::{ErrorKind, ErrorPayload};
use rprovider::ToolCall;
use rtooling::{
    ParamType, Tool, ToolContext, ToolError, ToolExecutor, ToolParams, ToolRuntimeHooks, ToolSet,
    normalize_tools, required_string,
};
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize, schemars::JsonSchema)]
/// Weather lookup input.
struct WeatherQuery {
    city: String,
    days: Option<u8>,
}

fn weather_tool() -> Tool {
    Tool::from_model(|query: WeatherQuery| {
        if query.city == "Atlantis" {
            return Err(ErrorPayload::not_found("No forecast for Atlantis.").into());
        }
        Ok(json!({"city": query.city, "days": query.days.unwrap_or(1), "sky": "clear"}))
    })
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct Destination {
    city: String,
    country: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
/// Trip planning input.
struct TripPlan {
    destination: Destination,
    travelers: u8,
}

fn trip_tool() -> Tool {
    Tool::from_model(|plan: TripPlan| {
        Ok(json!({"city": plan.destination.city, "travelers": plan.travelers}))
    })
}

fn echo_tool() -> Tool {
    Tool::from_fn(
        "echo",
        ToolParams::new().required("text", ParamType::String),
        |args, _ctx| Ok(json!(required_string(&args, "text")?)),
    )
}

fn failing_tool() -> Tool {
    Tool::from_fn("explode", ToolParams::new(), |_args, _ctx| {
        Err(ToolError::execution("ValueError('disk full')"))
    })
}

fn counter_tool() -> Tool {
    Tool::from_fn("count_visit", ToolParams::new(), |_args, ctx| {
        let ctx = ctx.ok_or_else(|| ToolError::execution("context missing"))?;
        let visits = ctx
            .state_value("visits")
            .and_then(|value| value.as_u64())
            .unwrap_or(0)
            + 1;
        ctx.set_state("visits", visits)?;
        Ok(json!({"tape": ctx.tape, "run_id": ctx.run_id, "visits": visits}))
    })
    .with_context()
}

fn tools(items: Vec<Tool>) -> ToolSet {
    normalize_tools(items.into_iter().map(Into::into).collect()).expect("tools should normalize")
}

fn call(name: &str, arguments: Value) -> Value {
    json!({"id": format!("call_{name}"), "type": "function", "function": {"name": name, "arguments": arguments}})
}

#[test]
fn per_call_failures_do_not_abort_the_batch() {
    let toolset = tools(vec![echo_tool(), failing_tool()]);
    let execution = ToolExecutor::new()
        .execute(
            json!([
                call("echo", json!("{\"text\":\"first\"}")),
                call("explode", json!({})),
                call("echo", json!({"text": "third"})),
            ]),
            Some(&toolset),
            None,
        )
        .expect("batch should run");

    assert_eq!(execution.tool_calls.len(), 3);
    assert_eq!(execution.tool_results[0], json!("first"));
    assert_eq!(execution.tool_results[2], json!("third"));

    let failure = &execution.tool_results[1];
    assert_eq!(failure["kind"], "tool");
    assert_eq!(failure["message"], "Tool 'explode' execution failed.");
    assert_eq!(failure["details"]["error"], "ValueError('disk full')");

    let error = execution.error.expect("batch error should be set");
    assert_eq!(error.kind, ErrorKind::Tool);
}

#[test]
fn call_resolution_errors_are_classified() {
    let toolset = tools(vec![echo_tool()]);
    let execution = ToolExecutor::new()
        .execute(
            json!([
                {"function": {"arguments": "{}"}},
                call("missing", json!({})),
                call("echo", json!("{not json")),
                call("echo", json!("[1]")),
                "not an object",
            ]),
            Some(&toolset),
            None,
        )
        .expect("batch should run");

    let messages = execution
        .tool_results
        .iter()
        .map(|result| {
            (
                result["kind"].as_str().unwrap_or_default().to_string(),
                result["message"].as_str().unwrap_or_default().to_string(),
            )
        })
        .collect::<Vec<_>>();
    assert_eq!(
        messages,
        vec![
            ("invalid_input".to_string(), "Tool call is missing name.".to_string()),
            ("tool".to_string(), "Unknown tool name: missing.".to_string()),
            (
                "invalid_input".to_string(),
                "Tool 'echo' arguments are not valid JSON.".to_string()
            ),
            (
                "invalid_input".to_string(),
                "Tool 'echo' arguments must be an object.".to_string()
            ),
            (
                "invalid_input".to_string(),
                "Each tool call must be an object.".to_string()
            ),
        ]
    );
}

#[test]
fn model_tools_validate_arguments_and_pass_through_classified_errors() {
    let toolset = tools(vec![weather_tool()]);
    let executor = ToolExecutor::new();

    let execution = executor
        .execute(
            vec![ToolCall::new(None, "weather_query", "{\"city\":\"Lisbon\",\"days\":3}")],
            Some(&toolset),
            None,
        )
        .expect("batch should run");
    assert_eq!(execution.tool_results[0]["days"], 3);
    assert!(execution.is_ok());

    let execution = executor
        .execute(
            vec![ToolCall::new(None, "weather_query", "{\"days\":\"soon\"}")],
            Some(&toolset),
            None,
        )
        .expect("batch should run");
    let error = execution.error.expect("validation should fail");
    assert_eq!(error.kind, ErrorKind::InvalidInput);
    assert_eq!(error.message, "Tool 'weather_query' argument validation failed.");
    let errors = &error.details.expect("details")["errors"];
    assert_eq!(errors[0]["loc"], json!(["city"]));
    assert_eq!(errors[0]["type"], "missing");
    assert_eq!(errors[1]["loc"], json!(["days"]));

    let execution = executor
        .execute(
            vec![ToolCall::new(None, "weather_query", "{\"city\":\"Atlantis\"}")],
            Some(&toolset),
            None,
        )
        .expect("batch should run");
    let error = execution.error.expect("handler error should surface");
    assert_eq!(error.kind, ErrorKind::NotFound);
    assert_eq!(error.message, "No forecast for Atlantis.");
}

#[test]
fn model_tools_report_nested_and_range_errors_per_field() {
    let toolset = tools(vec![trip_tool()]);
    let executor = ToolExecutor::new();

    let execution = executor
        .execute(
            vec![ToolCall::new(
                None,
                "trip_plan",
                "{\"destination\":{\"country\":\"PT\"},\"travelers\":-2}",
            )],
            Some(&toolset),
            None,
        )
        .expect("batch should run");
    let error = execution.error.expect("validation should fail");
    assert_eq!(error.kind, ErrorKind::InvalidInput);
    assert_eq!(error.message, "Tool 'trip_plan' argument validation failed.");

    let details = error.details.expect("details");
    let errors = details["errors"].as_array().expect("error list");
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0]["loc"], json!(["destination", "city"]));
    assert_eq!(errors[0]["type"], "missing");
    assert_eq!(errors[1]["loc"], json!(["travelers"]));
    assert_eq!(errors[1]["type"], "value_error");

    let execution = executor
        .execute(
            vec![ToolCall::new(
                None,
                "trip_plan",
                "{\"destination\":{\"city\":\"Porto\",\"country\":\"PT\"},\"travelers\":2}",
            )],
            Some(&toolset),
            None,
        )
        .expect("batch should run");
    assert!(execution.is_ok());
    assert_eq!(execution.tool_results[0], json!({"city": "Porto", "travelers": 2}));
}

#[test]
fn context_is_required_and_state_is_shared_across_calls() {
    let toolset = tools(vec![counter_tool()]);
    let executor = ToolExecutor::new();

    let execution = executor
        .execute(json!([call("count_visit", json!({}))]), Some(&toolset), None)
        .expect("batch should run");
    let error = execution.error.expect("context should be required");
    assert_eq!(error.kind, ErrorKind::InvalidInput);
    assert_eq!(
        error.message,
        "Tool 'count_visit' requires context but none was provided."
    );

    let context = ToolContext::new("run-42").with_tape("support");
    let execution = executor
        .execute(
            json!([call("count_visit", json!({})), call("count_visit", json!({}))]),
            Some(&toolset),
            Some(&context),
        )
        .expect("batch should run");
    assert!(execution.is_ok());
    assert_eq!(
        execution.tool_results[1],
        json!({"tape": "support", "run_id": "run-42", "visits": 2})
    );
    assert_eq!(context.state_value("visits"), Some(json!(2)));
}

#[tokio::test]
async fn async_execution_runs_both_handler_kinds() {
    let lookup = Tool::from_async_fn(
        "lookup",
        ToolParams::new().required("key", ParamType::String),
        |args, _ctx| async move {
            required_string(&args, "key").map(|key| json!(format!("value-for-{key}")))
        },
    );
    let toolset = tools(vec![echo_tool(), lookup]);

    let execution = ToolExecutor::new()
        .execute_async(
            json!([call("lookup", json!({"key": "a"})), call("echo", json!({"text": "b"}))]),
            Some(&toolset),
            None,
        )
        .await
        .expect("batch should run");

    assert_eq!(execution.tool_results, vec![json!("value-for-a"), json!("b")]);
    assert!(execution.error.is_none());
}

#[tokio::test]
async fn async_model_tools_validate_arguments() {
    let tool = Tool::from_model_async(|query: WeatherQuery| async move {
        Ok(json!({"city": query.city}))
    });
    let toolset = tools(vec![tool]);

    let execution = ToolExecutor::new()
        .execute_async(json!([call("weather_query", json!({}))]), Some(&toolset), None)
        .await
        .expect("batch should run");

    let error = execution.error.expect("validation should fail");
    assert_eq!(error.kind, ErrorKind::InvalidInput);
}

#[derive(Default)]
struct RecordingHooks {
    events: Mutex<Vec<String>>,
}

impl ToolRuntimeHooks for RecordingHooks {
    fn on_execution_start(&self, tool_name: &str, _call: &Value, context: Option<&ToolContext>) {
        self.events.lock().expect("events lock").push(format!(
            "start:{tool_name}:{}",
            context.map(|ctx| ctx.run_id.as_str()).unwrap_or("-")
        ));
    }

    fn on_execution_success(&self, tool_name: &str, _call: &Value, _result: &Value, _elapsed: Duration) {
        self.events
            .lock()
            .expect("events lock")
            .push(format!("success:{tool_name}"));
    }

    fn on_execution_failure(
        &self,
        tool_name: &str,
        _call: &Value,
        error: &ErrorPayload,
        _elapsed: Duration,
    ) {
        self.events
            .lock()
            .expect("events lock")
            .push(format!("failure:{tool_name}:{}", error.kind));
    }
}

#[test]
fn hooks_observe_every_call() {
    let hooks = Arc::new(RecordingHooks::default());
    let toolset = tools(vec![echo_tool(), failing_tool()]);
    let context = ToolContext::new("run-1");

    ToolExecutor::new()
        .with_hooks(hooks.clone())
        .execute(
            json!([call("echo", json!({"text": "x"})), call("explode", json!({}))]),
            Some(&toolset),
            Some(&context),
        )
        .expect("batch should run");

    let events = hooks.events.lock().expect("events lock").clone();
    assert_eq!(
        events,
        vec![
            "start:echo:run-1",
            "success:echo",
            "start:explode:run-1",
            "failure:explode:tool",
        ]
    );
}
