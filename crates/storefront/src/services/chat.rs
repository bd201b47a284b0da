//! Shopping assistant chat.
//!
//! Each reply is a single completion call: the prompt carries the store
//! persona, a few catalog products matching the customer's message, the
//! recent conversation and the new message. Provider failures never fail
//! the request; the customer gets a canned reply instead.

use std::collections::HashSet;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use emporium_core::{ProductId, format_usd};

use crate::db::{ProductRepository, RepositoryError};
use crate::gemini::GeminiClient;
use crate::models::Product;

/// Longest accepted customer message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 1000;

/// Conversation turns forwarded to the model.
pub const MAX_HISTORY_TURNS: usize = 10;

/// Products included as context.
const MAX_CONTEXT_PRODUCTS: i64 = 5;

/// Keywords used for the product lookup.
const MAX_KEYWORDS: usize = 8;

pub const FALLBACK_REPLY: &str = "Sorry, our shopping assistant is unavailable right now. \
     You can browse the catalog or search for a product, and we'll be back shortly.";

const PERSONA: &str = "You are the friendly shopping assistant for Emporium, an online store. \
     Answer briefly and helpfully. Only recommend products from the list below; \
     if nothing fits, say so and suggest browsing the catalog. \
     Never invent prices, stock levels or policies.";

const STOPWORDS: &[&str] = &[
    "about", "and", "any", "are", "can", "could", "do", "does", "for", "from", "have", "help",
    "how", "looking", "me", "need", "please", "show", "some", "that", "the", "there", "this",
    "want", "what", "which", "with", "would", "you", "your",
];

/// Errors from chat requests.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{0}")]
    InvalidMessage(String),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One earlier message in the conversation, as kept by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

/// A product mentioned in the reply's context.
#[derive(Debug, Clone, Serialize)]
pub struct SuggestedProduct {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub price: rust_decimal::Decimal,
    pub image_url: Option<String>,
}

impl From<&Product> for SuggestedProduct {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            slug: p.slug.as_str().to_owned(),
            price: p.price,
            image_url: p.image_url.clone(),
        }
    }
}

/// The assistant's answer.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub reply: String,
    pub products: Vec<SuggestedProduct>,
    /// `true` when the canned reply was used.
    pub fallback: bool,
}

/// Chat operations.
pub struct ChatService<'a> {
    products: ProductRepository<'a>,
    client: Option<&'a GeminiClient>,
}

impl<'a> ChatService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, client: Option<&'a GeminiClient>) -> Self {
        Self {
            products: ProductRepository::new(pool),
            client,
        }
    }

    /// Answer a customer message.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::InvalidMessage` for empty or oversized messages.
    /// Provider errors are not returned; they produce the fallback reply.
    #[instrument(skip_all, fields(history_len = history.len()))]
    pub async fn reply(&self, message: &str, history: &[ChatTurn]) -> Result<ChatReply, ChatError> {
        let message = validate_message(message)?;

        let keywords = extract_keywords(message);
        let products = match self
            .products
            .search_active(&keywords, MAX_CONTEXT_PRODUCTS)
            .await
        {
            Ok(products) => products,
            Err(e) => {
                tracing::warn!(error = %e, "Product lookup for chat failed");
                Vec::new()
            }
        };
        let suggestions: Vec<SuggestedProduct> = products.iter().map(SuggestedProduct::from).collect();

        let Some(client) = self.client else {
            tracing::warn!("Chat requested but no completion API is configured");
            return Ok(fallback(suggestions));
        };

        let prompt = build_prompt(&products, recent_history(history), message);

        match client.generate(&prompt).await {
            Ok(reply) => Ok(ChatReply {
                reply,
                products: suggestions,
                fallback: false,
            }),
            Err(e) => {
                tracing::warn!(error = %e, "Chat completion failed, using fallback reply");
                Ok(fallback(suggestions))
            }
        }
    }
}

fn fallback(products: Vec<SuggestedProduct>) -> ChatReply {
    ChatReply {
        reply: FALLBACK_REPLY.to_owned(),
        products,
        fallback: true,
    }
}

fn validate_message(message: &str) -> Result<&str, ChatError> {
    let message = message.trim();
    if message.is_empty() {
        return Err(ChatError::InvalidMessage("message cannot be empty".to_owned()));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ChatError::InvalidMessage(format!(
            "message cannot exceed {MAX_MESSAGE_CHARS} characters"
        )));
    }
    Ok(message)
}

/// The last [`MAX_HISTORY_TURNS`] turns.
fn recent_history(history: &[ChatTurn]) -> &[ChatTurn] {
    let start = history.len().saturating_sub(MAX_HISTORY_TURNS);
    history.get(start..).unwrap_or_default()
}

/// Lowercased, de-duplicated words worth searching the catalog for.
fn extract_keywords(message: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    message
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() >= 3 && !STOPWORDS.contains(&w.as_str()))
        .filter(|w| seen.insert(w.clone()))
        .take(MAX_KEYWORDS)
        .collect()
}

fn build_prompt(products: &[Product], history: &[ChatTurn], message: &str) -> String {
    let mut prompt = String::from(PERSONA);

    prompt.push_str("\n\nProducts:\n");
    if products.is_empty() {
        prompt.push_str("(no matching products)\n");
    }
    for p in products {
        let stock = if p.inventory > 0 { "in stock" } else { "out of stock" };
        let _ = writeln!(prompt, "- {} ({}, {stock}): /products/{}", p.name, format_usd(p.price), p.slug);
    }

    if !history.is_empty() {
        prompt.push_str("\nConversation so far:\n");
        for turn in history {
            let speaker = match turn.role {
                ChatRole::User => "Customer",
                ChatRole::Assistant => "Assistant",
            };
            let _ = writeln!(prompt, "{speaker}: {}", turn.content.trim());
        }
    }

    let _ = write!(prompt, "\nCustomer: {message}\nAssistant:");
    prompt
}
