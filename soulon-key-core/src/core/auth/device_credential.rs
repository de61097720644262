use super::{AuthEvent, Authenticator, ChallengeRequest, PromptInfo};
use crate::core::crypto::password::CredentialVerifier;
use crate::shared::constants::*;
use crate::shared::error::SecurityError;
use crate::shared::types::SecurityResult;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use zeroize::Zeroizing;

/// Source of typed device credentials
///
/// `Ok(None)` means the input was closed. Implementations may block; they are
/// always called from a blocking thread.
#[cfg_attr(test, mockall::automock)]
pub trait CredentialPrompt: Send + Sync {
    fn read_credential(&self, prompt: &PromptInfo, attempt: u32) -> SecurityResult<Option<String>>;
}

/// Reads the credential from the controlling terminal without echo
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl CredentialPrompt for TerminalPrompt {
    fn read_credential(&self, prompt: &PromptInfo, attempt: u32) -> SecurityResult<Option<String>> {
        let label = if attempt > 1 {
            format!("{} ({}, attempt {}): ", prompt.title, prompt.subtitle, attempt)
        } else {
            format!("{} ({}): ", prompt.title, prompt.subtitle)
        };

        match rpassword::prompt_password(label) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(SecurityError::authentication(
                AUTH_ERROR_HW_UNAVAILABLE,
                format!("Terminal unavailable: {}", e.kind()),
            )),
        }
    }
}

/// Presence ceremony backed by a device passphrase
///
/// Each challenge allows `max_attempts` entries. A wrong entry emits
/// `FailedRetryable`, running out of attempts emits a lockout error, and an
/// empty or closed entry cancels.
pub struct DeviceCredentialAuthenticator {
    prompt: Arc<dyn CredentialPrompt>,
    verifier: Arc<CredentialVerifier>,
    credential_hash: Arc<str>,
    max_attempts: u32,
}

impl DeviceCredentialAuthenticator {
    /// `credential_hash` is an Argon2id PHC string from [`CredentialVerifier::hash_credential`]
    pub fn new(
        prompt: Arc<dyn CredentialPrompt>,
        verifier: CredentialVerifier,
        credential_hash: impl Into<String>,
        max_attempts: u32,
    ) -> SecurityResult<Self> {
        if max_attempts == 0 {
            return Err(SecurityError::config("max_attempts must be at least 1"));
        }
        let credential_hash = credential_hash.into();
        // Fail early on a malformed hash rather than at the first prompt
        argon2::PasswordHash::new(&credential_hash)?;

        Ok(Self {
            prompt,
            verifier: Arc::new(verifier),
            credential_hash: Arc::from(credential_hash),
            max_attempts,
        })
    }

    /// Terminal-backed authenticator for a freshly chosen credential
    pub fn with_terminal(credential: &str, max_attempts: u32) -> SecurityResult<Self> {
        let verifier = CredentialVerifier::new_default();
        let hash = verifier.hash_credential(credential)?;
        Self::new(Arc::new(TerminalPrompt), verifier, hash, max_attempts)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

enum Entry {
    Accepted,
    Rejected,
    Closed,
    Failed(SecurityError),
}

#[async_trait]
impl Authenticator for DeviceCredentialAuthenticator {
    async fn present_challenge(&self, request: ChallengeRequest) -> SecurityResult<mpsc::Receiver<AuthEvent>> {
        if !request.prompt.allowed.device_credential {
            return Err(SecurityError::authentication(
                AUTH_ERROR_HW_UNAVAILABLE,
                "Device credential not allowed for this prompt",
            ));
        }

        let (tx, rx) = mpsc::channel(AUTH_EVENT_BUFFER);
        let prompt = self.prompt.clone();
        let verifier = self.verifier.clone();
        let credential_hash = self.credential_hash.clone();
        let max_attempts = self.max_attempts;
        let ChallengeRequest {
            prompt: info,
            bound_cipher,
            cancellation,
        } = request;

        tokio::spawn(async move {
            let mut bound = bound_cipher;
            for attempt in 1..=max_attempts {
                let prompt = prompt.clone();
                let verifier = verifier.clone();
                let credential_hash = credential_hash.clone();
                let info = info.clone();

                let check = tokio::task::spawn_blocking(move || {
                    let entry = match prompt.read_credential(&info, attempt) {
                        Ok(Some(entry)) => Zeroizing::new(entry),
                        Ok(None) => return Entry::Closed,
                        Err(e) => return Entry::Failed(e),
                    };
                    if entry.is_empty() {
                        return Entry::Closed;
                    }
                    match verifier.verify_credential(&entry, &credential_hash) {
                        Ok(true) => Entry::Accepted,
                        Ok(false) => Entry::Rejected,
                        Err(e) => Entry::Failed(e),
                    }
                });

                let outcome = tokio::select! {
                    biased;
                    _ = cancellation.cancelled() => {
                        log::debug!("Credential prompt dismissed");
                        return;
                    }
                    outcome = check => outcome,
                };

                let event = match outcome {
                    Ok(Entry::Accepted) => AuthEvent::Succeeded(bound.take()),
                    Ok(Entry::Rejected) => {
                        log::debug!("Credential attempt {} of {} rejected", attempt, max_attempts);
                        AuthEvent::FailedRetryable
                    }
                    Ok(Entry::Closed) => AuthEvent::Cancelled,
                    Ok(Entry::Failed(e)) => AuthEvent::Errored {
                        code: AUTH_ERROR_HW_UNAVAILABLE,
                        message: e.to_string(),
                    },
                    Err(join) => AuthEvent::Errored {
                        code: AUTH_ERROR_HW_UNAVAILABLE,
                        message: SecurityError::from(join).to_string(),
                    },
                };

                let terminal = event.is_terminal();
                if tx.send(event).await.is_err() || terminal {
                    return;
                }
            }

            log::warn!("Device credential locked out after {} attempts", max_attempts);
            let _ = tx
                .send(AuthEvent::Errored {
                    code: AUTH_ERROR_LOCKOUT,
                    message: format!("Too many attempts ({})", max_attempts),
                })
                .await;
        });

        Ok(rx)
    }

    fn name(&self) -> &str {
        "device-credential"
    }
}
