use thiserror::Error;

/// An advertised input schema that could not be turned into a declaration.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("cannot map schema of `{capability}`: {reason}")]
pub struct DeclarationMappingError {
    pub capability: String,
    pub reason: String,
}

/// Failure of a single tool invocation. Always names the capability.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("Failed to execute {capability}: {message}")]
pub struct ToolError {
    pub capability: String,
    pub message: String,
}

impl ToolError {
    pub fn new(capability: impl Into<String>, message: impl Into<String>) -> Self {
        Self { capability: capability.into(), message: message.into() }
    }
}

/// Why a source is not (yet) contributing tools. Recorded as state, never propagated.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("protocol failure: {0}")]
    Protocol(String),
    #[error("source is running but no capabilities are available")]
    EmptyCapabilitySet,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TurnError {
    #[error("execution runtime failed to start: {0}")]
    RuntimeStart(String),
    #[error("execution runtime stream failed: {0}")]
    RuntimeStream(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Turn(#[from] TurnError),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "I apologize, but I encountered an error while processing your request. Please try again."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::InvalidRequest(message) => Self::BadRequest { message, correlation_id },
            ApplicationError::Discovery(error) => {
                Self::ServiceUnavailable { message: error.to_string(), correlation_id }
            }
            ApplicationError::Turn(error) => {
                Self::ServiceUnavailable { message: error.to_string(), correlation_id }
            }
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}
