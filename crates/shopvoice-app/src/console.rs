//! Line-oriented console front-end: command parsing and rendering.

use shopvoice_core::{Message, Role, SessionEvent, SessionState};

pub const HELP: &str = "\
Type a message and press Enter to send it.
  /voice   speak your message
  /stop    stop speaking or listening
  /panel   show the last tool and retrieved documents
  /help    show this help
  /quit    exit";

/// One line of console input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Say(String),
    Voice,
    Stop,
    Panel,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

pub fn parse_command(line: &str) -> ConsoleCommand {
    let line = line.trim();
    if line.is_empty() {
        return ConsoleCommand::Empty;
    }
    if !line.starts_with('/') {
        return ConsoleCommand::Say(line.to_string());
    }
    match line.to_ascii_lowercase().as_str() {
        "/voice" | "/v" => ConsoleCommand::Voice,
        "/stop" | "/s" => ConsoleCommand::Stop,
        "/panel" | "/p" => ConsoleCommand::Panel,
        "/help" | "/h" | "/?" => ConsoleCommand::Help,
        "/quit" | "/q" | "/exit" => ConsoleCommand::Quit,
        _ => ConsoleCommand::Unknown(line.to_string()),
    }
}

pub fn render_message(message: &Message) -> String {
    match message.role {
        Role::User => format!("You: {}", message.text),
        Role::Assistant => format!("Assistant: {}", message.text),
    }
}

/// Console line for a session event, if it deserves one.
pub fn render_event(event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::MessageAppended { message, .. } => Some(render_message(message)),
        SessionEvent::LoadingChanged { loading: true } => {
            Some("Assistant is thinking…".to_string())
        }
        SessionEvent::ListeningChanged { listening: true } => Some("[listening]".to_string()),
        SessionEvent::SpeakingChanged { speaking: true } => Some("[speaking]".to_string()),
        SessionEvent::SidePanelUpdated {
            tool_name,
            doc_count,
        } => {
            if tool_name.is_none() && *doc_count == 0 {
                return None;
            }
            let tool = tool_name.as_deref().unwrap_or("none");
            Some(format!(
                "[tool: {tool}, {doc_count} document(s); /panel for details]"
            ))
        }
        SessionEvent::CaptureUnsupported => {
            Some("Speech recognition not supported on this system".to_string())
        }
        _ => None,
    }
}

/// The tool activity panel.
pub fn render_panel(state: &SessionState) -> String {
    let mut out = String::from("Last Tool Used\n");
    match state.last_tool() {
        Some(tool) => {
            out.push_str(&tool.to_pretty_json());
            out.push('\n');
        }
        None => out.push_str("  No tool used yet\n"),
    }

    out.push_str("Retrieved Context\n");
    if state.retrieved_docs().is_empty() {
        out.push_str("  No documents retrieved\n");
    }
    for doc in state.retrieved_docs() {
        match &doc.final_price {
            Some(price) => out.push_str(&format!("  - {} — Price: {}\n", doc.title_or_source, price)),
            None => out.push_str(&format!("  - {}\n", doc.title_or_source)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shopvoice_core::{SharedSession, TurnResponse};

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("  "), ConsoleCommand::Empty);
        assert_eq!(
            parse_command(" Where is my order? "),
            ConsoleCommand::Say("Where is my order?".to_string())
        );
        assert_eq!(parse_command("/voice"), ConsoleCommand::Voice);
        assert_eq!(parse_command("/STOP"), ConsoleCommand::Stop);
        assert_eq!(parse_command("/p"), ConsoleCommand::Panel);
        assert_eq!(parse_command("/quit"), ConsoleCommand::Quit);
        assert_eq!(
            parse_command("/dance"),
            ConsoleCommand::Unknown("/dance".to_string())
        );
    }

    #[test]
    fn test_render_events() {
        assert_eq!(
            render_event(&SessionEvent::MessageAppended {
                index: 1,
                message: Message::user("hi"),
            })
            .as_deref(),
            Some("You: hi")
        );
        assert_eq!(
            render_event(&SessionEvent::LoadingChanged { loading: true }).as_deref(),
            Some("Assistant is thinking…")
        );
        assert!(render_event(&SessionEvent::LoadingChanged { loading: false }).is_none());
        assert!(render_event(&SessionEvent::SpeakingChanged { speaking: false }).is_none());
        assert!(render_event(&SessionEvent::SidePanelUpdated {
            tool_name: None,
            doc_count: 0,
        })
        .is_none());
        assert_eq!(
            render_event(&SessionEvent::CaptureUnsupported).as_deref(),
            Some("Speech recognition not supported on this system")
        );
    }

    #[test]
    fn test_render_empty_panel() {
        let panel = render_panel(&SharedSession::new("hi").snapshot());
        assert!(panel.contains("No tool used yet"));
        assert!(panel.contains("No documents retrieved"));
    }

    #[test]
    fn test_render_panel_with_docs() {
        let session = SharedSession::new("hi");
        session.begin_turn("boots", true).unwrap();
        let response: TurnResponse = serde_json::from_value(json!({
            "reply": "Two options.",
            "last_tool": {"name": "product_search"},
            "retrieved_docs": [
                {"title": "Hiking Boot", "final_price": "120"},
                {"source": "size_guide"}
            ]
        }))
        .unwrap();
        session.complete_turn(&response);

        let panel = render_panel(&session.snapshot());
        assert!(panel.contains("\"name\": \"product_search\""));
        assert!(panel.contains("Hiking Boot — Price: 120"));
        assert!(panel.contains("  - size_guide\n"));
    }
}
