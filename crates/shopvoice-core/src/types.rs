use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// =============================================================================
// Messages
// =============================================================================

/// Who authored a message in the conversation log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One entry of the conversation log. Never changed after it is appended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

// =============================================================================
// Side-panel data
// =============================================================================

/// Backend-reported description of the last tool the assistant invoked.
///
/// Opaque to the client: it is stored and rendered, never interpreted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolInfo(pub Value);

impl ToolInfo {
    /// The `name` key, when the payload is an object carrying one.
    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    /// Pretty-printed JSON for display.
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| self.0.to_string())
    }
}

/// A context document the backend used to ground its reply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RetrievedDocWire")]
pub struct RetrievedDoc {
    /// Document title, or its source when untitled.
    pub title_or_source: String,
    pub final_price: Option<String>,
    pub prod_id: Option<String>,
    pub url: Option<String>,
}

/// Shape of a `retrieved_docs` entry as the backend sends it.
#[derive(Deserialize)]
struct RetrievedDocWire {
    #[serde(default, deserialize_with = "lenient_string")]
    title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    source: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    final_price: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    prod_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    url: Option<String>,
}

impl From<RetrievedDocWire> for RetrievedDoc {
    fn from(wire: RetrievedDocWire) -> Self {
        let title_or_source = wire
            .title
            .filter(|t| !t.is_empty())
            .or(wire.source.filter(|s| !s.is_empty()))
            .unwrap_or_else(|| "Untitled".to_string());
        Self {
            title_or_source,
            final_price: wire.final_price.filter(|p| !p.is_empty()),
            prod_id: wire.prod_id,
            url: wire.url,
        }
    }
}

/// Accepts strings, numbers and booleans; `null` becomes `None`.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

// =============================================================================
// Wire types
// =============================================================================

/// Body of `POST /chat`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRequest {
    pub text: String,
}

/// Body of a successful `POST /chat` response.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct TurnResponse {
    pub reply: String,
    #[serde(default)]
    pub last_tool: Option<ToolInfo>,
    #[serde(default)]
    pub retrieved_docs: Option<Vec<RetrievedDoc>>,
    /// SSML rendition of `reply`, when the backend produced one.
    #[serde(default)]
    pub reply_ssml: Option<String>,
    /// Server-side processing time.
    #[serde(default)]
    pub elapsed_ms: Option<u64>,
}

impl TurnResponse {
    /// A plain reply without side-panel data.
    pub fn reply(text: impl Into<String>) -> Self {
        Self {
            reply: text.into(),
            last_tool: None,
            retrieved_docs: None,
            reply_ssml: None,
            elapsed_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_constructors() {
        let m = Message::user("Where is my order?");
        assert_eq!(m.role, Role::User);
        assert_eq!(m.text, "Where is my order?");
        assert_eq!(Message::assistant("ok").role, Role::Assistant);
    }

    #[test]
    fn test_role_display_and_serde() {
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Assistant.to_string(), "assistant");
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
    }

    #[test]
    fn test_turn_request_wire_shape() {
        let body = serde_json::to_value(TurnRequest {
            text: "track order 123".to_string(),
        })
        .unwrap();
        assert_eq!(body, json!({"text": "track order 123"}));
    }

    #[test]
    fn test_turn_response_full() {
        let resp: TurnResponse = serde_json::from_value(json!({
            "reply": "Your order ships tomorrow.",
            "last_tool": {"name": "order_lookup", "args": {"order_id": "123"}},
            "retrieved_docs": [
                {"title": "Trail Runner 2", "source": "products", "final_price": "89.99"},
                {"source": "returns_policy"}
            ],
            "reply_ssml": "<speak>Your order ships tomorrow.</speak>",
            "elapsed_ms": 412
        }))
        .unwrap();

        assert_eq!(resp.reply, "Your order ships tomorrow.");
        assert_eq!(resp.last_tool.as_ref().and_then(ToolInfo::name), Some("order_lookup"));
        let docs = resp.retrieved_docs.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].title_or_source, "Trail Runner 2");
        assert_eq!(docs[0].final_price.as_deref(), Some("89.99"));
        assert_eq!(docs[1].title_or_source, "returns_policy");
        assert!(docs[1].final_price.is_none());
        assert_eq!(resp.elapsed_ms, Some(412));
    }

    #[test]
    fn test_turn_response_minimal() {
        let resp: TurnResponse = serde_json::from_value(json!({"reply": "Hi"})).unwrap();
        assert!(resp.last_tool.is_none());
        assert!(resp.retrieved_docs.is_none());
        assert!(resp.reply_ssml.is_none());
    }

    #[test]
    fn test_null_side_panel_fields_are_absent() {
        let resp: TurnResponse = serde_json::from_value(json!({
            "reply": "Hi",
            "last_tool": null,
            "retrieved_docs": null
        }))
        .unwrap();
        assert!(resp.last_tool.is_none());
        assert!(resp.retrieved_docs.is_none());
    }

    #[test]
    fn test_missing_reply_is_rejected() {
        let result: Result<TurnResponse, _> = serde_json::from_value(json!({"answer": "Hi"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_numeric_price_and_null_title() {
        let doc: RetrievedDoc = serde_json::from_value(json!({
            "title": null,
            "source": "products",
            "final_price": 19.5,
            "prod_id": 42
        }))
        .unwrap();
        assert_eq!(doc.title_or_source, "products");
        assert_eq!(doc.final_price.as_deref(), Some("19.5"));
        assert_eq!(doc.prod_id.as_deref(), Some("42"));
    }

    #[test]
    fn test_untitled_doc() {
        let doc: RetrievedDoc = serde_json::from_value(json!({"final_price": ""})).unwrap();
        assert_eq!(doc.title_or_source, "Untitled");
        assert!(doc.final_price.is_none());
    }

    #[test]
    fn test_tool_info_pretty_json() {
        let tool = ToolInfo(json!({"name": "order_lookup"}));
        assert!(tool.to_pretty_json().contains("\"name\": \"order_lookup\""));
        assert!(ToolInfo(json!("search")).name().is_none());
    }
}
