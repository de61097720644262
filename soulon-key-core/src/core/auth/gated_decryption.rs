//! Authentication-gated decryption
//!
//! The decrypt-mode cipher is initialized before the prompt is shown and handed
//! to the authenticator, which must return that same instance on success. A
//! cipher with a different binding is refused, so passing the presence check
//! cannot be turned into a decryption under an attacker-chosen cipher.
//!
//! ```text
//! Idle -> CipherInitialized -> PromptShown -> Succeeded
//!                                  |  ^    -> Errored
//!                                  v  |    -> Cancelled
//!                               FailedRetry
//! ```

use super::{AuthEvent, Authenticator, ChallengeRequest, PromptInfo};
use crate::core::crypto::encryption::EncryptedEnvelope;
use crate::infrastructure::platform::{BoundCipher, KeyHandle};
use crate::shared::constants::{AUTH_ERROR_BINDING_MISMATCH, AUTH_ERROR_HW_UNAVAILABLE};
use crate::shared::error::SecurityError;
use crate::shared::types::SecurityResult;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use zeroize::Zeroizing;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeState {
    Idle,
    CipherInitialized,
    PromptShown,
    Succeeded,
    FailedRetry,
    Errored,
    Cancelled,
}

impl HandshakeState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            HandshakeState::Succeeded | HandshakeState::Errored | HandshakeState::Cancelled
        )
    }

    fn can_advance_to(self, next: HandshakeState) -> bool {
        use HandshakeState::*;
        matches!(
            (self, next),
            (Idle, CipherInitialized)
                | (Idle, PromptShown)
                | (CipherInitialized, PromptShown)
                | (PromptShown, Succeeded)
                | (PromptShown, FailedRetry)
                | (PromptShown, Errored)
                | (PromptShown, Cancelled)
                | (FailedRetry, PromptShown)
                | (Idle, Errored)
                | (Idle, Cancelled)
                | (CipherInitialized, Errored)
                | (CipherInitialized, Cancelled)
        )
    }
}

/// Path a single request takes through [`HandshakeState`]
#[derive(Debug, Clone)]
pub struct Handshake {
    id: Uuid,
    history: Vec<HandshakeState>,
    rejected_attempts: u32,
}

impl Handshake {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            history: vec![HandshakeState::Idle],
            rejected_attempts: 0,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.history
            .last()
            .copied()
            .unwrap_or(HandshakeState::Idle)
    }

    pub fn history(&self) -> &[HandshakeState] {
        &self.history
    }

    pub fn rejected_attempts(&self) -> u32 {
        self.rejected_attempts
    }

    fn advance(&mut self, next: HandshakeState) -> SecurityResult<()> {
        let current = self.state();
        if !current.can_advance_to(next) {
            return Err(SecurityError::internal(format!(
                "Illegal handshake transition {:?} -> {:?}",
                current, next
            )));
        }
        log::debug!("Handshake {}: {:?} -> {:?}", self.id, current, next);
        if next == HandshakeState::FailedRetry {
            self.rejected_attempts += 1;
        }
        self.history.push(next);
        Ok(())
    }
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new()
    }
}

enum Resolution {
    Succeeded(Option<BoundCipher>),
    Errored { code: i32, message: String },
    Cancelled,
}

/// Runs presence ceremonies against one authenticator
pub struct AuthGate {
    authenticator: Arc<dyn Authenticator>,
    prompt: PromptInfo,
}

impl AuthGate {
    pub fn new(authenticator: Arc<dyn Authenticator>, prompt: PromptInfo) -> Self {
        Self { authenticator, prompt }
    }

    pub fn prompt(&self) -> &PromptInfo {
        &self.prompt
    }

    /// Decrypt `envelope` after a successful presence ceremony
    ///
    /// Rejected attempts are retried silently. An authenticator error becomes
    /// `Authentication`, a dismissed prompt or a cancelled `cancel` becomes
    /// `Cancelled`. No plaintext is returned once cancellation is observed.
    pub async fn decrypt_with_authentication(
        &self,
        handle: &KeyHandle,
        envelope: &EncryptedEnvelope,
        cancel: &CancellationToken,
    ) -> SecurityResult<Vec<u8>> {
        let mut handshake = Handshake::new();
        let result = self.run_decrypt(handle, envelope, cancel, &mut handshake).await;
        log::info!(
            "Gated decryption finished in state {:?} after {} rejected attempts",
            handshake.state(),
            handshake.rejected_attempts()
        );
        result
    }

    /// Presence check with no cipher attached
    ///
    /// Authenticator errors resolve to `Ok(false)`; cancellation is still `Err(Cancelled)`.
    pub async fn authenticate_once(&self, cancel: &CancellationToken) -> SecurityResult<bool> {
        let mut handshake = Handshake::new();
        match self.run_challenge(&mut handshake, None, cancel).await? {
            Resolution::Succeeded(_) => Ok(true),
            Resolution::Errored { code, .. } => {
                log::warn!("Presence check errored with code {}", code);
                Ok(false)
            }
            Resolution::Cancelled => Err(SecurityError::Cancelled),
        }
    }

    async fn run_decrypt(
        &self,
        handle: &KeyHandle,
        envelope: &EncryptedEnvelope,
        cancel: &CancellationToken,
        handshake: &mut Handshake,
    ) -> SecurityResult<Vec<u8>> {
        let bound = handle
            .init_decrypt(envelope.iv())
            .map_err(|_| SecurityError::Decryption)?;
        handshake.advance(HandshakeState::CipherInitialized)?;
        let fallback = bound.fallback_copy();

        let cipher = match self.run_challenge(handshake, Some(bound), cancel).await? {
            Resolution::Succeeded(returned) => returned.unwrap_or(fallback),
            Resolution::Errored { code, message } => {
                return Err(SecurityError::authentication(code, message));
            }
            Resolution::Cancelled => return Err(SecurityError::Cancelled),
        };

        if cancel.is_cancelled() {
            return Err(SecurityError::Cancelled);
        }
        let mut plaintext = Zeroizing::new(cipher.do_final(envelope.ciphertext())?);
        if cancel.is_cancelled() {
            return Err(SecurityError::Cancelled);
        }
        Ok(std::mem::take(&mut *plaintext))
    }

    async fn run_challenge(
        &self,
        handshake: &mut Handshake,
        bound_cipher: Option<BoundCipher>,
        cancel: &CancellationToken,
    ) -> SecurityResult<Resolution> {
        if cancel.is_cancelled() {
            handshake.advance(HandshakeState::Cancelled)?;
            return Ok(Resolution::Cancelled);
        }

        let expected_binding = bound_cipher.as_ref().map(BoundCipher::binding_id);
        let prompt_token = cancel.child_token();
        // Leaving this function by any path closes the prompt
        let _dismiss = prompt_token.clone().drop_guard();

        let request = ChallengeRequest {
            prompt: self.prompt.clone(),
            bound_cipher,
            cancellation: prompt_token,
        };

        let mut events = match self.authenticator.present_challenge(request).await {
            Ok(events) => events,
            Err(e) => {
                log::warn!(
                    "{} could not show a prompt: code {}",
                    self.authenticator.name(),
                    e.code()
                );
                handshake.advance(HandshakeState::Errored)?;
                let code = match &e {
                    SecurityError::Authentication { code, .. } => *code,
                    _ => AUTH_ERROR_HW_UNAVAILABLE,
                };
                return Ok(Resolution::Errored {
                    code,
                    message: e.to_string(),
                });
            }
        };
        handshake.advance(HandshakeState::PromptShown)?;

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    handshake.advance(HandshakeState::Cancelled)?;
                    return Ok(Resolution::Cancelled);
                }
                event = events.recv() => event,
            };

            match event {
                Some(AuthEvent::FailedRetryable) => {
                    handshake.advance(HandshakeState::FailedRetry)?;
                    handshake.advance(HandshakeState::PromptShown)?;
                }
                Some(AuthEvent::Succeeded(returned)) => {
                    if let (Some(expected), Some(cipher)) = (expected_binding, returned.as_ref()) {
                        if cipher.binding_id() != expected {
                            log::warn!("{} returned a cipher from another request", self.authenticator.name());
                            handshake.advance(HandshakeState::Errored)?;
                            return Ok(Resolution::Errored {
                                code: AUTH_ERROR_BINDING_MISMATCH,
                                message: "Authenticator returned a cipher not issued for this request".to_string(),
                            });
                        }
                    }
                    handshake.advance(HandshakeState::Succeeded)?;
                    return Ok(Resolution::Succeeded(returned));
                }
                Some(AuthEvent::Errored { code, message }) => {
                    handshake.advance(HandshakeState::Errored)?;
                    return Ok(Resolution::Errored { code, message });
                }
                Some(AuthEvent::Cancelled) => {
                    handshake.advance(HandshakeState::Cancelled)?;
                    return Ok(Resolution::Cancelled);
                }
                None => {
                    handshake.advance(HandshakeState::Errored)?;
                    return Ok(Resolution::Errored {
                        code: AUTH_ERROR_HW_UNAVAILABLE,
                        message: "Authenticator closed without a result".to_string(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::test_support::{ScriptedAuthenticator, Step};
    use crate::core::crypto::encryption::EnvelopeCipher;
    use crate::infrastructure::platform::KeySpec;
    use crate::shared::constants::{AES_KEY_SIZE, AUTH_ERROR_LOCKOUT};
    use HandshakeState::*;

    fn handle() -> KeyHandle {
        KeyHandle::from_key_material("master", &[0x77u8; AES_KEY_SIZE], KeySpec::aes_gcm_256(true)).unwrap()
    }

    fn sealed(handle: &KeyHandle) -> EncryptedEnvelope {
        EnvelopeCipher::new().encrypt(handle, b"gated secret").unwrap()
    }

    fn gate(authenticator: &Arc<ScriptedAuthenticator>) -> AuthGate {
        AuthGate::new(authenticator.clone(), PromptInfo::default())
    }

    async fn run(steps: Vec<Step>) -> (SecurityResult<Vec<u8>>, Handshake, Arc<ScriptedAuthenticator>) {
        let authenticator = Arc::new(ScriptedAuthenticator::new(steps));
        let handle = handle();
        let envelope = sealed(&handle);
        let mut handshake = Handshake::new();
        let result = gate(&authenticator)
            .run_decrypt(&handle, &envelope, &CancellationToken::new(), &mut handshake)
            .await;
        (result, handshake, authenticator)
    }

    #[tokio::test]
    async fn test_success_returns_plaintext() {
        let (result, handshake, authenticator) = run(vec![Step::Succeed]).await;
        assert_eq!(result.unwrap(), b"gated secret");
        assert_eq!(handshake.history(), &[Idle, CipherInitialized, PromptShown, Succeeded]);
        assert_eq!(authenticator.challenges(), 1);
        assert!(authenticator.saw_bound_cipher());
    }

    #[tokio::test]
    async fn test_rejected_attempts_are_silent() {
        let (result, handshake, _) =
            run(vec![Step::RejectAttempt, Step::RejectAttempt, Step::Succeed]).await;
        assert_eq!(result.unwrap(), b"gated secret");
        assert_eq!(handshake.rejected_attempts(), 2);
        assert_eq!(
            handshake.history(),
            &[Idle, CipherInitialized, PromptShown, FailedRetry, PromptShown, FailedRetry, PromptShown, Succeeded]
        );
    }

    #[tokio::test]
    async fn test_missing_cipher_falls_back_to_local() {
        let (result, handshake, _) = run(vec![Step::SucceedWithoutCipher]).await;
        assert_eq!(result.unwrap(), b"gated secret");
        assert_eq!(handshake.state(), Succeeded);
    }

    #[tokio::test]
    async fn test_foreign_cipher_refused() {
        let (result, handshake, _) = run(vec![Step::SucceedWithForeignCipher]).await;
        assert_eq!(
            result.unwrap_err(),
            SecurityError::Authentication {
                code: AUTH_ERROR_BINDING_MISMATCH,
                message: "Authenticator returned a cipher not issued for this request".to_string(),
            }
        );
        assert_eq!(handshake.state(), Errored);
    }

    #[tokio::test]
    async fn test_error_propagates_as_authentication() {
        let (result, handshake, _) = run(vec![Step::RejectAttempt, Step::Error(AUTH_ERROR_LOCKOUT)]).await;
        assert!(matches!(
            result,
            Err(SecurityError::Authentication { code: AUTH_ERROR_LOCKOUT, .. })
        ));
        assert_eq!(handshake.state(), Errored);
    }

    #[tokio::test]
    async fn test_user_cancel() {
        let (result, handshake, _) = run(vec![Step::Cancel]).await;
        assert_eq!(result.unwrap_err(), SecurityError::Cancelled);
        assert_eq!(handshake.state(), Cancelled);
    }

    #[tokio::test]
    async fn test_closed_channel_is_an_error() {
        let (result, _, _) = run(vec![Step::CloseChannel]).await;
        assert!(matches!(
            result,
            Err(SecurityError::Authentication { code: AUTH_ERROR_HW_UNAVAILABLE, .. })
        ));
    }

    #[tokio::test]
    async fn test_unavailable_authenticator() {
        let authenticator = Arc::new(ScriptedAuthenticator::unavailable());
        let handle = handle();
        let envelope = sealed(&handle);
        let mut handshake = Handshake::new();
        let result = gate(&authenticator)
            .run_decrypt(&handle, &envelope, &CancellationToken::new(), &mut handshake)
            .await;
        assert!(matches!(result, Err(SecurityError::Authentication { .. })));
        assert_eq!(handshake.history(), &[Idle, CipherInitialized, Errored]);
    }

    #[tokio::test]
    async fn test_refused_challenge_keeps_collaborator_code() {
        let handle = handle();
        let envelope = sealed(&handle);

        let locked_out = Arc::new(ScriptedAuthenticator::refusing(SecurityError::authentication(
            AUTH_ERROR_LOCKOUT,
            "Too many attempts",
        )));
        let result = gate(&locked_out)
            .decrypt_with_authentication(&handle, &envelope, &CancellationToken::new())
            .await;
        assert!(matches!(
            result,
            Err(SecurityError::Authentication { code: AUTH_ERROR_LOCKOUT, .. })
        ));

        // Anything that is not an authentication error reads as a missing sensor
        let broken = Arc::new(ScriptedAuthenticator::refusing(SecurityError::internal("prompt host gone")));
        let result = gate(&broken)
            .decrypt_with_authentication(&handle, &envelope, &CancellationToken::new())
            .await;
        assert!(matches!(
            result,
            Err(SecurityError::Authentication { code: AUTH_ERROR_HW_UNAVAILABLE, .. })
        ));
    }

    #[tokio::test]
    async fn test_tampered_envelope_fails_after_success() {
        let authenticator = Arc::new(ScriptedAuthenticator::new(vec![Step::Succeed]));
        let handle = handle();
        let envelope = sealed(&handle);
        let mut ciphertext = envelope.ciphertext().to_vec();
        ciphertext[0] ^= 1;
        let tampered = EncryptedEnvelope::new(envelope.iv().to_vec(), ciphertext, envelope.timestamp()).unwrap();

        let result = gate(&authenticator)
            .decrypt_with_authentication(&handle, &tampered, &CancellationToken::new())
            .await;
        assert_eq!(result.unwrap_err(), SecurityError::Decryption);
    }

    #[tokio::test]
    async fn test_cancel_while_prompt_open_dismisses_prompt() {
        let authenticator = Arc::new(ScriptedAuthenticator::new(vec![Step::WaitForDismissal]));
        let gate = gate(&authenticator);
        let handle = handle();
        let envelope = sealed(&handle);
        let cancel = CancellationToken::new();

        let (result, _) = tokio::join!(
            gate.decrypt_with_authentication(&handle, &envelope, &cancel),
            async {
                tokio::task::yield_now().await;
                cancel.cancel();
            }
        );

        assert_eq!(result.unwrap_err(), SecurityError::Cancelled);
        assert!(authenticator.was_dismissed());
    }

    #[tokio::test]
    async fn test_precancelled_token_never_prompts() {
        let authenticator = Arc::new(ScriptedAuthenticator::new(vec![Step::Succeed]));
        let handle = handle();
        let envelope = sealed(&handle);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut handshake = Handshake::new();
        let result = gate(&authenticator)
            .run_decrypt(&handle, &envelope, &cancel, &mut handshake)
            .await;
        assert_eq!(result.unwrap_err(), SecurityError::Cancelled);
        assert_eq!(authenticator.challenges(), 0);
        assert_eq!(handshake.history(), &[Idle, CipherInitialized, Cancelled]);
    }

    #[tokio::test]
    async fn test_prompt_closed_after_success() {
        let (_, _, authenticator) = run(vec![Step::Succeed]).await;
        assert!(authenticator.was_dismissed());
    }

    #[tokio::test]
    async fn test_authenticate_once_outcomes() {
        let cancel = CancellationToken::new();

        let ok = Arc::new(ScriptedAuthenticator::new(vec![Step::RejectAttempt, Step::Succeed]));
        assert!(gate(&ok).authenticate_once(&cancel).await.unwrap());
        assert!(!ok.saw_bound_cipher());

        let errored = Arc::new(ScriptedAuthenticator::new(vec![Step::Error(AUTH_ERROR_LOCKOUT)]));
        assert!(!gate(&errored).authenticate_once(&cancel).await.unwrap());

        let unavailable = Arc::new(ScriptedAuthenticator::unavailable());
        assert!(!gate(&unavailable).authenticate_once(&cancel).await.unwrap());

        let cancelled = Arc::new(ScriptedAuthenticator::new(vec![Step::Cancel]));
        assert_eq!(
            gate(&cancelled).authenticate_once(&cancel).await.unwrap_err(),
            SecurityError::Cancelled
        );
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let mut handshake = Handshake::new();
        assert!(handshake.advance(Succeeded).is_err());
        handshake.advance(PromptShown).unwrap();
        handshake.advance(Succeeded).unwrap();
        assert!(handshake.state().is_terminal());
        assert!(handshake.advance(PromptShown).is_err());
    }
}
