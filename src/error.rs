/*!
Errors raised while building configurations, generating event sources, and writing events.

None of these are transient. They point at a configuration, an interface, or fallback wiring
that needs to be fixed before the event source is built again.
*/

use thiserror::Error;

/**
A configuration can't be built.
*/
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("additional parameters must have a non-empty name")]
    EmptyParameterName,

    #[error("mapping output type `{output}` can't be written to an event")]
    UnsupportedMappingOutput { output: String },

    #[error("type `{ty}` has multiple mappings, so each one needs a distinct non-empty name")]
    UnnamedMultipleMapping { ty: String },
}

/**
An event source can't be generated for an interface.
*/
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("only methods can be declared by an event interface (`{interface}::{member}`)")]
    NotAMethod { interface: String, member: String },

    #[error("event methods can't return a value (`{interface}::{method}` returns `{returns}`)")]
    NonVoidMethod {
        interface: String,
        method: String,
        returns: String,
    },

    #[error("missing event id (`{interface}::{method}`)")]
    MissingEventId { interface: String, method: String },

    #[error("duplicate event id {id} (`{interface}::{method}`)")]
    DuplicateEventId {
        interface: String,
        method: String,
        id: u32,
    },

    #[error("no event id is left to assign after {highest} (`{interface}::{method}`)")]
    EventIdOverflow {
        interface: String,
        method: String,
        highest: u32,
    },

    #[error("the cached event source for `{interface}` has an unexpected type")]
    InstanceMismatch { interface: String },
}

/**
An event can't be written.

These are raised before anything is written, so an event is either fully written or not at all.
*/
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallTimeError {
    #[error("fallback converter missing for type `{ty}` (`{method}`, parameter `{parameter}`)")]
    MissingFallback {
        ty: String,
        method: String,
        parameter: String,
    },

    #[error("expected {expected} arguments but got {actual} (`{method}`)")]
    ArgumentCount {
        method: String,
        expected: usize,
        actual: usize,
    },

    #[error("expected a value of type `{ty}` (`{method}`, parameter `{parameter}`)")]
    ArgumentType {
        ty: String,
        method: String,
        parameter: String,
    },

    #[error("`{interface}` doesn't declare method {index} on this event source")]
    UnknownMethod { interface: String, index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    CallTime(#[from] CallTimeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_offender() {
        let err = CallTimeError::MissingFallback {
            ty: "app::CustomData".into(),
            method: "app::TestLog::test".into(),
            parameter: "data".into(),
        };

        let msg = err.to_string();

        assert!(msg.contains("app::CustomData"), "{}", msg);
        assert!(msg.contains("app::TestLog::test"), "{}", msg);
        assert!(msg.contains("data"), "{}", msg);
    }

    #[test]
    fn error_from() {
        let err = Error::from(ConfigurationError::EmptyParameterName);

        assert!(matches!(err, Error::Configuration(_)));
        assert_eq!(
            ConfigurationError::EmptyParameterName.to_string(),
            err.to_string()
        );
    }
}
