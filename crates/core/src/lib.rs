//! Shared domain vocabulary for the concierge workspace: capability descriptors,
//! function declarations, the uniform [`Tool`] seam, conversation sessions, the
//! error taxonomy and layered configuration.

pub mod config;
pub mod domain;
pub mod errors;

pub use config::{AppConfig, ConfigError, LoadOptions, SourceConfig, SourceKey};
pub use domain::capability::{CapabilityDescriptor, SourceId, SourceKind};
pub use domain::declaration::{
    map_declaration, tool_name_from_id, FunctionDeclaration, ParameterSchema, PropertySchema,
    SchemaType, UNKNOWN_CAPABILITY_NAME,
};
pub use domain::session::{ChatMessage, ConversationSession, MessageRole};
pub use domain::tool::Tool;
pub use errors::{
    ApplicationError, DeclarationMappingError, DiscoveryError, InterfaceError, ToolError,
    TurnError,
};
