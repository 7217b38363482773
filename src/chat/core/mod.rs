//! Core conversation types and identifiers.

pub mod config;
pub mod errors;
pub mod ids;
pub mod message;
pub mod session;

pub use config::{ApiConfig, ChatConfig, GreetingConfig, TitleConfig};
pub use errors::{ChatError, ChatResult};
pub use ids::{MessageId, RequestId, SessionId, UserId, UserIdError};
pub use message::{Message, MessageRole, RoleParseError};
pub use session::{DEFAULT_SESSION_TITLE, SessionRecord};
