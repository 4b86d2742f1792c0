//! GraphQL object and input types.

use async_graphql::{InputObject, OutputType, SimpleObject};

use crate::provider::{Message, Role};
use crate::usage::CostEstimate;

/// Uniform `{success, message, data}` payload for business operations.
///
/// `success == true` always carries `data`; `success == false` never does.
#[derive(Debug, Clone, SimpleObject)]
#[graphql(concrete(name = "ChatResponse", params(ChatData)))]
#[graphql(concrete(name = "CompletionResponse", params(CompletionData)))]
#[graphql(concrete(name = "ImageGenerationResponse", params(ImageData)))]
pub struct Envelope<T: OutputType> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T: OutputType> Envelope<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

pub type ChatResponse = Envelope<ChatData>;
pub type CompletionResponse = Envelope<CompletionData>;
pub type ImageGenerationResponse = Envelope<ImageData>;

#[derive(Debug, Clone, SimpleObject)]
pub struct ChatData {
    pub reply: String,
    pub model: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, SimpleObject)]
pub struct CompletionData {
    pub text: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, SimpleObject)]
pub struct ImageData {
    pub urls: Vec<String>,
    pub timestamp: String,
}

#[derive(Debug, Clone, SimpleObject)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, SimpleObject)]
pub struct WelcomeMessage {
    pub message: String,
    pub version: String,
}

/// Estimated prompt usage of a conversation.
#[derive(Debug, Clone, SimpleObject)]
pub struct UsageReport {
    pub tokens: u64,
    pub model: String,
    pub cost: UsageCost,
}

/// Estimated cost in USD.
#[derive(Debug, Clone, SimpleObject)]
pub struct UsageCost {
    pub input: f64,
    pub output: f64,
    pub total: f64,
}

impl From<CostEstimate> for UsageCost {
    fn from(cost: CostEstimate) -> Self {
        Self {
            input: cost.input,
            output: cost.output,
            total: cost.total,
        }
    }
}

#[derive(Debug, Clone, InputObject)]
pub struct ChatInput {
    /// Conversation so far, oldest first.
    pub messages: Vec<MessageInput>,
    /// Model to use, defaults to gpt-3.5-turbo.
    pub model: Option<String>,
}

impl ChatInput {
    /// Convert to provider messages, rejecting unknown roles.
    pub fn to_messages(&self) -> async_graphql::Result<Vec<Message>> {
        self.messages
            .iter()
            .map(|m| -> async_graphql::Result<Message> {
                let role: Role = m.role.parse()?;
                Ok(Message::new(role, m.content.clone()))
            })
            .collect()
    }
}

#[derive(Debug, Clone, InputObject)]
pub struct MessageInput {
    /// One of system, user, assistant.
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, InputObject)]
pub struct ImageGenerationInput {
    pub prompt: String,
    /// Number of images, defaults to 1.
    pub n: Option<i32>,
    /// Image size, defaults to 1024x1024.
    pub size: Option<String>,
}
