//! The sequential connect workflow: config, identity, token, connection.
//!
//! Each stage must succeed before the next one runs. The first failure wins
//! and is classified into a [`FailureStage`] so the diagnostics reporter can
//! emit a targeted remediation checklist instead of a generic error dump.

pub mod session;

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;

use crate::config::ConnectionConfig;

/// Token audience for Azure Cache for Redis. Fixed per service type and
/// deliberately narrow: a leaked token for this scope cannot be replayed
/// against any other service.
pub const REDIS_TOKEN_SCOPE: &str = "https://redis.azure.com/.default";

/// The authenticated caller, as reported by the identity provider.
///
/// The object id doubles as the AUTH username on the cache side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalIdentity {
    pub object_id: String,
}

/// A short-lived bearer credential restricted to one resource audience.
///
/// The raw value is only reachable through [`AccessToken::secret`]; both
/// `Debug` and `Display` render a redacted placeholder so the token cannot
/// leak through logging or error formatting.
#[derive(Clone)]
pub struct AccessToken {
    secret: String,
    scope: String,
}

impl AccessToken {
    pub fn new(secret: String, scope: impl Into<String>) -> Self {
        Self {
            secret,
            scope: scope.into(),
        }
    }

    /// The raw token value. Only the AUTH call site should touch this.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("scope", &self.scope)
            .finish()
    }
}

impl fmt::Display for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<redacted>")
    }
}

/// Which stage of the workflow failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    ConfigMissing,
    IdentityUnavailable,
    TokenUnavailable,
    NetworkUnreachable,
    AuthenticationRejected,
    Unknown,
}

/// Classified failure from any stage of the workflow.
///
/// The message carries the provider's own detail; the variant carries the
/// classification the reporter keys its remediation checklist on.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("configuration error: {0}")]
    ConfigMissing(String),
    #[error("identity unavailable: {0}")]
    IdentityUnavailable(String),
    #[error("token unavailable: {0}")]
    TokenUnavailable(String),
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),
    #[error("authentication rejected: {0}")]
    AuthenticationRejected(String),
    #[error("{0}")]
    Unknown(String),
}

impl ProbeError {
    pub fn stage(&self) -> FailureStage {
        match self {
            ProbeError::ConfigMissing(_) => FailureStage::ConfigMissing,
            ProbeError::IdentityUnavailable(_) => FailureStage::IdentityUnavailable,
            ProbeError::TokenUnavailable(_) => FailureStage::TokenUnavailable,
            ProbeError::NetworkUnreachable(_) => FailureStage::NetworkUnreachable,
            ProbeError::AuthenticationRejected(_) => FailureStage::AuthenticationRejected,
            ProbeError::Unknown(_) => FailureStage::Unknown,
        }
    }
}

/// Successful probe outcome.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    /// `host:port` the probe connected to.
    pub target: String,
    /// Leading lines of the service's `INFO server` reply.
    pub server_info: String,
}

/// Seam over the ambient identity session (the `az` CLI in production).
///
/// The two calls fail independently and must surface distinct errors: a dead
/// login session is not the same fault as a rejected scope request.
#[async_trait]
pub trait IdentityBroker: Send + Sync {
    /// "Who is the signed-in principal" — object id of the caller.
    async fn signed_in_principal(&self) -> Result<PrincipalIdentity, ProbeError>;

    /// "Issue a token for scope" — audience-restricted bearer token.
    async fn issue_token(&self, scope: &str) -> Result<AccessToken, ProbeError>;
}

/// Resolve the signed-in principal, then a token for the Redis audience.
///
/// Short-circuits: if the principal lookup fails the token request is never
/// attempted.
pub async fn acquire_credentials(
    broker: &dyn IdentityBroker,
) -> Result<(PrincipalIdentity, AccessToken), ProbeError> {
    let identity = broker.signed_in_principal().await?;
    debug!("Resolved signed-in principal {}", identity.object_id);
    let token = broker.issue_token(REDIS_TOKEN_SCOPE).await?;
    debug!("Issued access token for scope {}", token.scope());
    Ok((identity, token))
}

/// Run the config → identity → token → connect chain, leaving the session
/// open for further commands (interactive mode).
pub async fn establish(
    broker: &dyn IdentityBroker,
    env_file: &Path,
    deadline: Option<Duration>,
) -> Result<session::RedisSession, ProbeError> {
    with_deadline(deadline, establish_inner(broker, env_file)).await
}

/// Run the full chain plus a single liveness exchange, then close the
/// connection (non-interactive probe mode).
pub async fn run_probe(
    broker: &dyn IdentityBroker,
    env_file: &Path,
    deadline: Option<Duration>,
) -> Result<ProbeResult, ProbeError> {
    with_deadline(deadline, async {
        let mut session = establish_inner(broker, env_file).await?;
        let server_info = session.liveness().await?;
        Ok(ProbeResult {
            target: session.target().to_string(),
            server_info,
        })
    })
    .await
}

async fn establish_inner(
    broker: &dyn IdentityBroker,
    env_file: &Path,
) -> Result<session::RedisSession, ProbeError> {
    let config = ConnectionConfig::from_env_file(env_file)?;
    let (identity, token) = acquire_credentials(broker).await?;
    session::RedisSession::connect(&config, &identity, &token).await
}

/// Apply a caller-supplied deadline to the whole chain. Expiry is reported
/// as a classified timeout rather than hanging indefinitely.
async fn with_deadline<T>(
    deadline: Option<Duration>,
    fut: impl Future<Output = Result<T, ProbeError>>,
) -> Result<T, ProbeError> {
    match deadline {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Unknown(format!(
                "probe timed out after {}s",
                limit.as_secs()
            ))),
        },
        None => fut.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct RecordingBroker {
        identity_called: AtomicBool,
        token_called: AtomicBool,
        fail_identity: bool,
    }

    impl RecordingBroker {
        fn new(fail_identity: bool) -> Self {
            Self {
                identity_called: AtomicBool::new(false),
                token_called: AtomicBool::new(false),
                fail_identity,
            }
        }
    }

    #[async_trait]
    impl IdentityBroker for RecordingBroker {
        async fn signed_in_principal(&self) -> Result<PrincipalIdentity, ProbeError> {
            self.identity_called.store(true, Ordering::SeqCst);
            if self.fail_identity {
                return Err(ProbeError::IdentityUnavailable(
                    "no active session".into(),
                ));
            }
            Ok(PrincipalIdentity {
                object_id: "00000000-1111-2222-3333-444444444444".into(),
            })
        }

        async fn issue_token(&self, scope: &str) -> Result<AccessToken, ProbeError> {
            self.token_called.store(true, Ordering::SeqCst);
            Ok(AccessToken::new("fake-token".into(), scope))
        }
    }

    fn env_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn config_failure_skips_identity_resolution() {
        let broker = RecordingBroker::new(false);
        let err = run_probe(&broker, Path::new("/nonexistent/.env"), None)
            .await
            .unwrap_err();
        assert_eq!(err.stage(), FailureStage::ConfigMissing);
        assert!(!broker.identity_called.load(Ordering::SeqCst));
        assert!(!broker.token_called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn identity_failure_skips_token_acquisition() {
        let broker = RecordingBroker::new(true);
        let file = env_file("REDIS_HOST=cache.example.net\nREDIS_PORT=6380\n");
        let err = run_probe(&broker, file.path(), None).await.unwrap_err();
        assert_eq!(err.stage(), FailureStage::IdentityUnavailable);
        assert!(broker.identity_called.load(Ordering::SeqCst));
        assert!(!broker.token_called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn deadline_expiry_reports_timeout() {
        struct SleepyBroker;

        #[async_trait]
        impl IdentityBroker for SleepyBroker {
            async fn signed_in_principal(&self) -> Result<PrincipalIdentity, ProbeError> {
                tokio::time::sleep(Duration::from_secs(30)).await;
                unreachable!("deadline should have fired");
            }

            async fn issue_token(&self, _scope: &str) -> Result<AccessToken, ProbeError> {
                unreachable!("identity never resolves");
            }
        }

        let file = env_file("REDIS_HOST=cache.example.net\nREDIS_PORT=6380\n");
        let err = run_probe(&SleepyBroker, file.path(), Some(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert_eq!(err.stage(), FailureStage::Unknown);
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn token_debug_and_display_are_redacted() {
        let token = AccessToken::new("super-secret-value".into(), REDIS_TOKEN_SCOPE);
        let debug = format!("{:?}", token);
        let display = format!("{}", token);
        assert!(!debug.contains("super-secret-value"));
        assert!(!display.contains("super-secret-value"));
        assert!(debug.contains("<redacted>"));
        assert_eq!(token.secret(), "super-secret-value");
    }

    #[test]
    fn every_error_variant_maps_to_its_stage() {
        let cases = [
            (
                ProbeError::ConfigMissing("x".into()),
                FailureStage::ConfigMissing,
            ),
            (
                ProbeError::IdentityUnavailable("x".into()),
                FailureStage::IdentityUnavailable,
            ),
            (
                ProbeError::TokenUnavailable("x".into()),
                FailureStage::TokenUnavailable,
            ),
            (
                ProbeError::NetworkUnreachable("x".into()),
                FailureStage::NetworkUnreachable,
            ),
            (
                ProbeError::AuthenticationRejected("x".into()),
                FailureStage::AuthenticationRejected,
            ),
            (ProbeError::Unknown("x".into()), FailureStage::Unknown),
        ];
        for (err, stage) in cases {
            assert_eq!(err.stage(), stage);
        }
    }
}
