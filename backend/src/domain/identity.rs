//! External collaborators of the engine: the identity provider that checks
//! passwords and one-time codes, and the dispatcher that delivers notices.
//!
//! Both sit behind traits so deployments can plug in real services. The local
//! implementations here back the default server and the test-suite.

use anyhow::Result;
use async_trait::async_trait;
use log::info;
use rand::Rng;
use sha2::{Digest, Sha256};
use shared::ChallengeChannel;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify_password(&self, guardian_id: &str, secret: &str) -> Result<bool>;

    /// Issue a one-time code on `channel`; returns the provider's challenge id
    async fn send_challenge(&self, guardian_id: &str, channel: ChallengeChannel) -> Result<String>;

    async fn verify_challenge(&self, challenge_id: &str, code: &str) -> Result<bool>;

    /// Forget a challenge that expired or ran out of attempts
    async fn revoke_challenge(&self, _challenge_id: &str) -> Result<()> {
        Ok(())
    }

    fn has_password(&self, guardian_id: &str) -> bool;

    fn channels_for(&self, guardian_id: &str) -> Vec<ChallengeChannel>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub recipient: String,
    pub channel: String,
    pub subject: String,
    pub body: String,
    /// One-time code carried by verification notices
    pub code: Option<String>,
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, notification: Notification) -> Result<()>;
}

/// SHA-256 hex digest used for stored guardian credentials
pub fn hash_secret(secret: &str) -> String {
    format!("{:x}", Sha256::digest(secret.as_bytes()))
}

const OUTBOX_CAPACITY: usize = 256;

/// Dispatcher that logs notices and keeps the most recent ones in memory
#[derive(Clone, Default)]
pub struct OutboxDispatcher {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl OutboxDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    /// Most recent one-time code delivered to `recipient`
    pub fn last_code_for(&self, recipient: &str) -> Option<String> {
        self.sent()
            .into_iter()
            .rev()
            .find(|n| n.recipient == recipient && n.code.is_some())
            .and_then(|n| n.code)
    }
}

#[async_trait]
impl NotificationDispatcher for OutboxDispatcher {
    async fn dispatch(&self, notification: Notification) -> Result<()> {
        info!(
            "Dispatching '{}' to {} via {}",
            notification.subject, notification.recipient, notification.channel
        );
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| anyhow::anyhow!("outbox lock poisoned"))?;
        if sent.len() >= OUTBOX_CAPACITY {
            sent.remove(0);
        }
        sent.push(notification);
        Ok(())
    }
}

struct IssuedCode {
    code: String,
}

/// Identity provider backed by hashed credentials held in memory
pub struct LocalIdentityProvider {
    credentials: Mutex<HashMap<String, String>>,
    channels: Vec<ChallengeChannel>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    issued: Mutex<HashMap<String, IssuedCode>>,
}

impl LocalIdentityProvider {
    pub fn new(dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        Self {
            credentials: Mutex::new(HashMap::new()),
            channels: vec![
                ChallengeChannel::Authenticator,
                ChallengeChannel::Sms,
                ChallengeChannel::WhatsApp,
                ChallengeChannel::Email,
            ],
            dispatcher,
            issued: Mutex::new(HashMap::new()),
        }
    }

    /// Register a guardian with a SHA-256 hex password hash
    pub fn with_password_hash(self, guardian_id: impl Into<String>, sha256_hex: impl Into<String>) -> Self {
        self.set_password_hash(guardian_id, sha256_hex);
        self
    }

    pub fn set_password_hash(&self, guardian_id: impl Into<String>, sha256_hex: impl Into<String>) {
        if let Ok(mut credentials) = self.credentials.lock() {
            credentials.insert(guardian_id.into(), sha256_hex.into().to_lowercase());
        }
    }

    pub fn set_password(&self, guardian_id: impl Into<String>, password: &str) {
        self.set_password_hash(guardian_id, hash_secret(password));
    }

    fn generate_code() -> String {
        let mut rng = rand::thread_rng();
        format!("{:06}", rng.gen_range(0..1_000_000u32))
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn verify_password(&self, guardian_id: &str, secret: &str) -> Result<bool> {
        let credentials = self
            .credentials
            .lock()
            .map_err(|_| anyhow::anyhow!("credential store lock poisoned"))?;
        Ok(credentials
            .get(guardian_id)
            .map(|stored| *stored == hash_secret(secret))
            .unwrap_or(false))
    }

    async fn send_challenge(&self, guardian_id: &str, channel: ChallengeChannel) -> Result<String> {
        let challenge_id = format!("challenge::{}", Uuid::new_v4().simple());
        let code = Self::generate_code();

        self.dispatcher
            .dispatch(Notification {
                recipient: guardian_id.to_string(),
                channel: channel.to_string(),
                subject: "Verification code".to_string(),
                body: format!("Your verification code is {}", code),
                code: Some(code.clone()),
            })
            .await?;

        self.issued
            .lock()
            .map_err(|_| anyhow::anyhow!("challenge store lock poisoned"))?
            .insert(challenge_id.clone(), IssuedCode { code });
        Ok(challenge_id)
    }

    async fn verify_challenge(&self, challenge_id: &str, code: &str) -> Result<bool> {
        let mut issued = self
            .issued
            .lock()
            .map_err(|_| anyhow::anyhow!("challenge store lock poisoned"))?;
        let matches = issued
            .get(challenge_id)
            .map(|entry| entry.code == code.trim())
            .unwrap_or(false);
        if matches {
            issued.remove(challenge_id);
        }
        Ok(matches)
    }

    async fn revoke_challenge(&self, challenge_id: &str) -> Result<()> {
        if let Ok(mut issued) = self.issued.lock() {
            issued.remove(challenge_id);
        }
        Ok(())
    }

    fn has_password(&self, guardian_id: &str) -> bool {
        self.credentials
            .lock()
            .map(|credentials| credentials.contains_key(guardian_id))
            .unwrap_or(false)
    }

    fn channels_for(&self, _guardian_id: &str) -> Vec<ChallengeChannel> {
        self.channels.clone()
    }
}
