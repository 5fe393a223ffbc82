//! Adapter-level input errors.
//!
//! The `Display` strings are part of the JSON contract with the calling plugin:
//! they are printed verbatim as `{"error": "..."}`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("No command specified")]
    NoCommand,

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("No content specified")]
    NoContent,

    #[error("No query specified")]
    NoQuery,

    #[error("No ID specified")]
    NoId,

    #[error("No resource URL specified")]
    NoResourceUrl,

    #[error("invalid JSON payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_plugin_contract() {
        assert_eq!(BridgeError::NoCommand.to_string(), "No command specified");
        assert_eq!(
            BridgeError::UnknownCommand("frobnicate".into()).to_string(),
            "Unknown command: frobnicate"
        );
        assert_eq!(BridgeError::NoResourceUrl.to_string(), "No resource URL specified");
    }
}
