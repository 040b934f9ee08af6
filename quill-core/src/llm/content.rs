//! Neutral conversation content model shared by every provider adapter.
//!
//! A [`Content`] is a role plus an ordered sequence of [`Part`]s. Parts may
//! interleave text and function calls within one model turn; function
//! responses always travel in a user-role content.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Conversation role understood by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Model,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
            Role::System => "system",
        }
    }
}

/// A tool invocation issued by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Provider-assigned call id; synthesized when the backend omits one.
    pub id: String,
    pub name: String,
    /// Parsed argument object. Adapters only surface complete JSON here.
    pub args: Value,
}

/// The result of executing a tool, fed back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    /// Echoes the id of the call this responds to.
    pub id: String,
    pub name: String,
    pub response: Value,
}

/// One element of a content sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    Text { text: String },
    FunctionCall { call: FunctionCall },
    FunctionResponse { response: FunctionResponse },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn as_function_call(&self) -> Option<&FunctionCall> {
        match self {
            Part::FunctionCall { call } => Some(call),
            _ => None,
        }
    }

    pub fn as_function_response(&self) -> Option<&FunctionResponse> {
        match self {
            Part::FunctionResponse { response } => Some(response),
            _ => None,
        }
    }
}

/// A role paired with an ordered part sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self { role, parts }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![Part::text(text)])
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self::new(Role::Model, vec![Part::text(text)])
    }

    pub fn system_text(text: impl Into<String>) -> Self {
        Self::new(Role::System, vec![Part::text(text)])
    }

    /// Function responses are always carried on a user-role content.
    pub fn function_responses(responses: Vec<FunctionResponse>) -> Self {
        Self::new(
            Role::User,
            responses
                .into_iter()
                .map(|response| Part::FunctionResponse { response })
                .collect(),
        )
    }

    /// Concatenated text of every text part, in order.
    pub fn joined_text(&self) -> String {
        let mut out = String::new();
        for part in &self.parts {
            if let Part::Text { text } = part {
                out.push_str(text);
            }
        }
        out
    }

    pub fn function_calls(&self) -> impl Iterator<Item = &FunctionCall> {
        self.parts.iter().filter_map(Part::as_function_call)
    }

    pub fn has_function_calls(&self) -> bool {
        self.parts
            .iter()
            .any(|part| matches!(part, Part::FunctionCall { .. }))
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
            || self.parts.iter().all(|part| match part {
                Part::Text { text } => text.is_empty(),
                _ => false,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parts_serialize_with_discriminator() {
        let part = Part::FunctionCall {
            call: FunctionCall {
                id: "call_1".to_string(),
                name: "read_file".to_string(),
                args: json!({"path": "a.txt"}),
            },
        };
        let value = serde_json::to_value(&part).unwrap();
        assert_eq!(value["type"], "function_call");
        assert_eq!(value["call"]["name"], "read_file");

        let back: Part = serde_json::from_value(value).unwrap();
        assert_eq!(back, part);
    }

    #[test]
    fn content_round_trips() {
        let content = Content::new(
            Role::Model,
            vec![
                Part::text("running the tool"),
                Part::FunctionCall {
                    call: FunctionCall {
                        id: "call_2".to_string(),
                        name: "list_dir".to_string(),
                        args: json!({"path": "."}),
                    },
                },
            ],
        );
        let raw = serde_json::to_string(&content).unwrap();
        let back: Content = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, content);
        assert!(back.has_function_calls());
        assert_eq!(back.joined_text(), "running the tool");
    }

    #[test]
    fn function_responses_are_user_role() {
        let content = Content::function_responses(vec![FunctionResponse {
            id: "call_3".to_string(),
            name: "read_file".to_string(),
            response: json!({"content": "hi\n"}),
        }]);
        assert_eq!(content.role, Role::User);
        assert_eq!(content.parts.len(), 1);
    }
}
