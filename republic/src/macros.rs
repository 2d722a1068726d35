/// Creates a single chat message object from a role shorthand.
///
/// ```rust
/// use republic::republic_msg;
///
/// let message = republic_msg!(assistant => "Done.");
/// assert_eq!(message["role"], "assistant");
/// assert_eq!(message["content"], "Done.");
/// ```
#[macro_export]
macro_rules! republic_msg {
    (system => $content:expr $(,)?) => {
        $crate::serde_json::json!({"role": "system", "content": $content})
    };
    (user => $content:expr $(,)?) => {
        $crate::serde_json::json!({"role": "user", "content": $content})
    };
    (assistant => $content:expr $(,)?) => {
        $crate::serde_json::json!({"role": "assistant", "content": $content})
    };
    (tool => $content:expr, $call_id:expr $(,)?) => {
        $crate::serde_json::json!({"role": "tool", "content": $content, "tool_call_id": $call_id})
    };
    ($role:ident => $content:expr $(,)?) => {
        compile_error!("unsupported role: use system, user, assistant, or tool");
    };
}

/// Creates a `Vec<serde_json::Value>` from role/content pairs, ready for
/// `ChatRequest::messages`.
///
/// ```rust
/// use republic::republic_messages;
///
/// let messages = republic_messages![
///     system => "You are concise.",
///     user => "Summarize this repository.",
/// ];
///
/// assert_eq!(messages.len(), 2);
/// assert_eq!(messages[0]["role"], "system");
/// assert_eq!(messages[1]["role"], "user");
/// ```
#[macro_export]
macro_rules! republic_messages {
    () => {
        Vec::<$crate::serde_json::Value>::new()
    };
    ($($role:ident => $content:expr),+ $(,)?) => {
        vec![$($crate::republic_msg!($role => $content)),+]
    };
}
