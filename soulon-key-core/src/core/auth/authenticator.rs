use crate::infrastructure::platform::BoundCipher;
use crate::shared::constants::{DEFAULT_PROMPT_SUBTITLE, DEFAULT_PROMPT_TITLE};
use crate::shared::types::SecurityResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Methods a challenge may accept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AllowedAuthenticators {
    pub strong_biometric: bool,
    pub device_credential: bool,
}

impl AllowedAuthenticators {
    pub fn biometric_or_credential() -> Self {
        Self {
            strong_biometric: true,
            device_credential: true,
        }
    }

    pub fn biometric_only() -> Self {
        Self {
            strong_biometric: true,
            device_credential: false,
        }
    }

    pub fn credential_only() -> Self {
        Self {
            strong_biometric: false,
            device_credential: true,
        }
    }
}

impl Default for AllowedAuthenticators {
    fn default() -> Self {
        Self::biometric_or_credential()
    }
}

/// Text shown on the presence prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptInfo {
    pub title: String,
    pub subtitle: String,
    pub allowed: AllowedAuthenticators,
}

impl PromptInfo {
    pub fn new(title: impl Into<String>, subtitle: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: subtitle.into(),
            allowed: AllowedAuthenticators::default(),
        }
    }

    pub fn with_allowed(mut self, allowed: AllowedAuthenticators) -> Self {
        self.allowed = allowed;
        self
    }
}

impl Default for PromptInfo {
    fn default() -> Self {
        Self::new(DEFAULT_PROMPT_TITLE, DEFAULT_PROMPT_SUBTITLE)
    }
}

/// One presence ceremony
///
/// When `bound_cipher` is set the authenticator must hand the same instance back
/// in [`AuthEvent::Succeeded`]. Cancelling `cancellation` dismisses the prompt.
#[derive(Debug)]
pub struct ChallengeRequest {
    pub prompt: PromptInfo,
    pub bound_cipher: Option<BoundCipher>,
    pub cancellation: CancellationToken,
}

/// Outcome stream of a challenge. Only `FailedRetryable` may be followed by
/// further events.
#[derive(Debug)]
pub enum AuthEvent {
    Succeeded(Option<BoundCipher>),
    FailedRetryable,
    Errored { code: i32, message: String },
    Cancelled,
}

impl AuthEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AuthEvent::FailedRetryable)
    }
}

/// Presence-ceremony collaborator (biometric sensor, device credential, ...)
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Show the prompt and return the event stream. An `Err` means the prompt
    /// could not be shown at all.
    async fn present_challenge(&self, request: ChallengeRequest) -> SecurityResult<mpsc::Receiver<AuthEvent>>;

    /// Human-readable name for logs
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompt() {
        let prompt = PromptInfo::default();
        assert_eq!(prompt.title, DEFAULT_PROMPT_TITLE);
        assert!(prompt.allowed.strong_biometric && prompt.allowed.device_credential);
    }

    #[test]
    fn test_with_allowed() {
        let prompt = PromptInfo::new("t", "s").with_allowed(AllowedAuthenticators::credential_only());
        assert!(!prompt.allowed.strong_biometric);
        assert!(prompt.allowed.device_credential);
    }

    #[test]
    fn test_terminal_events() {
        assert!(!AuthEvent::FailedRetryable.is_terminal());
        assert!(AuthEvent::Cancelled.is_terminal());
        assert!(AuthEvent::Succeeded(None).is_terminal());
        assert!(AuthEvent::Errored { code: 7, message: "lockout".into() }.is_terminal());
    }
}
