use serde::{Deserialize, Serialize};

// Chat API request format
//
// `message` is the documented field. The other names are accepted for older
// clients; see `user_message`.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub user_text: Option<String>,
    #[serde(default)]
    pub user_message: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
}

impl ChatRequest {
    /// The user's text: the last non-blank field (in declaration order) that
    /// is not a copy of the persona template. Empty when there is none.
    pub fn user_message(&self, persona_template: &str) -> &str {
        let template = persona_template.trim();
        [
            &self.message,
            &self.user_text,
            &self.user_message,
            &self.query,
            &self.prompt,
        ]
        .into_iter()
        .filter_map(|field| field.as_deref())
        .filter(|text| !text.trim().is_empty() && text.trim() != template)
        .last()
        .unwrap_or("")
    }
}

// Chat API response format
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ChatResponse {
    pub response: String,
}
