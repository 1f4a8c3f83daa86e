use routecodex_common::RouteKey;
use serde_json::Value;

/// The signals `classify` needs, pulled out of the inbound request so the
/// classification itself stays a pure function of plain data (§4.8: "a
/// pure function of `{ model, tools?, image-parts?, reasoning?, explicit
/// header override }`").
#[derive(Debug, Clone, Default)]
pub struct RequestSignals<'a> {
    pub header_override: Option<&'a str>,
    pub model: Option<&'a str>,
    pub has_non_empty_tools: bool,
    pub has_vision_part: bool,
    pub reasoning_effort_set: bool,
    pub body_bytes: usize,
    pub has_explicit_search_tool: bool,
}

const LONGCONTEXT_THRESHOLD_BYTES: usize = 64 * 1024;

/// Derives the semantic route key from an inbound request's signals, in
/// the exact priority order of the table in §4.8. Unknown header values
/// still route (they become [`RouteKey::Custom`]); `ConfigView::pool`
/// is what falls them back to `default`.
pub fn classify(signals: &RequestSignals<'_>) -> RouteKey {
    if let Some(header) = signals.header_override {
        return RouteKey::parse(header);
    }
    if signals.has_non_empty_tools {
        return RouteKey::Tools;
    }
    if signals.has_vision_part {
        return RouteKey::Vision;
    }
    if signals.reasoning_effort_set || model_has_thinking_suffix(signals.model) {
        return RouteKey::Thinking;
    }
    if signals.body_bytes > LONGCONTEXT_THRESHOLD_BYTES {
        return RouteKey::Longcontext;
    }
    if signals.has_explicit_search_tool {
        return RouteKey::WebSearch;
    }
    RouteKey::Default
}

fn model_has_thinking_suffix(model: Option<&str>) -> bool {
    model.is_some_and(|m| m.rsplit('-').next().is_some_and(|suffix| suffix == "thinking") || m.contains("-thinking-"))
}

/// Extracts [`RequestSignals`] from a parsed OpenAI/Anthropic-shaped
/// request body plus the inbound headers. Shared by all three entry
/// protocols since, at this layer, the body is still opaque JSON (the
/// shape conversion happens later, inside the `LLMSwitch` pipeline stage).
pub fn signals_from_body<'a>(body: &'a Value, header_override: Option<&'a str>, body_bytes: usize) -> RequestSignals<'a> {
    let model = body.get("model").and_then(Value::as_str);

    let tools = body.get("tools").and_then(Value::as_array);
    let has_non_empty_tools = tools.is_some_and(|t| !t.is_empty());
    let has_explicit_search_tool = tools.is_some_and(|tools| {
        tools.iter().any(|tool| {
            let type_field = tool.get("type").and_then(Value::as_str).unwrap_or_default();
            let name_field = tool
                .get("name")
                .or_else(|| tool.get("function").and_then(|f| f.get("name")))
                .and_then(Value::as_str)
                .unwrap_or_default();
            type_field.contains("search") || name_field.contains("search")
        })
    });

    let has_vision_part = body
        .get("messages")
        .and_then(Value::as_array)
        .map(|messages| messages.iter().any(message_has_vision_part))
        .unwrap_or(false);

    let reasoning_effort_set = body
        .get("reasoning_effort")
        .is_some_and(|v| !v.is_null())
        || body
            .get("reasoning")
            .and_then(|r| r.get("effort"))
            .is_some_and(|v| !v.is_null());

    RequestSignals {
        header_override,
        model,
        has_non_empty_tools,
        has_vision_part,
        reasoning_effort_set,
        body_bytes,
        has_explicit_search_tool,
    }
}

fn message_has_vision_part(message: &Value) -> bool {
    let Some(parts) = message.get("content").and_then(Value::as_array) else {
        return false;
    };
    parts.iter().any(|part| {
        matches!(
            part.get("type").and_then(Value::as_str),
            Some("image_url") | Some("image") | Some("input_image")
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn header_override_wins_over_everything() {
        let signals = RequestSignals {
            header_override: Some("coding"),
            has_non_empty_tools: true,
            ..Default::default()
        };
        assert_eq!(classify(&signals), RouteKey::Coding);
    }

    #[test]
    fn tools_beats_vision_and_longcontext() {
        let signals = RequestSignals {
            has_non_empty_tools: true,
            has_vision_part: true,
            body_bytes: 1_000_000,
            ..Default::default()
        };
        assert_eq!(classify(&signals), RouteKey::Tools);
    }

    #[test]
    fn vision_part_routes_to_vision() {
        let body = json!({
            "model": "gpt-x",
            "messages": [{"role": "user", "content": [{"type": "image_url", "image_url": {"url": "x"}}]}]
        });
        let signals = signals_from_body(&body, None, 10);
        assert_eq!(classify(&signals), RouteKey::Vision);
    }

    #[test]
    fn thinking_model_suffix_routes_to_thinking() {
        let body = json!({ "model": "glm-4.6-thinking" });
        let signals = signals_from_body(&body, None, 10);
        assert_eq!(classify(&signals), RouteKey::Thinking);
    }

    #[test]
    fn large_body_routes_to_longcontext() {
        let signals = RequestSignals {
            body_bytes: 64 * 1024 + 1,
            ..Default::default()
        };
        assert_eq!(classify(&signals), RouteKey::Longcontext);
    }

    #[test]
    fn explicit_search_tool_routes_to_web_search() {
        let body = json!({ "tools": [] , "model": "gpt-x"});
        let mut signals = signals_from_body(&body, None, 10);
        signals.has_explicit_search_tool = true;
        assert_eq!(classify(&signals), RouteKey::WebSearch);
    }

    #[test]
    fn otherwise_default() {
        let signals = RequestSignals::default();
        assert_eq!(classify(&signals), RouteKey::Default);
    }
}
