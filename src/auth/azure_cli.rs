//! Identity broker backed by the `az` CLI.
//!
//! Two independent calls: "who is signed in" and "issue a token for this
//! scope". Either can fail on its own (dead session vs. rejected scope
//! request), so each maps to its own failure stage.

use std::process::Stdio;

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use tokio::process::Command;

use crate::probe::{AccessToken, IdentityBroker, PrincipalIdentity, ProbeError};

pub struct AzureCliBroker;

#[derive(Deserialize)]
struct SignedInUser {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    access_token: String,
}

impl AzureCliBroker {
    pub fn new() -> Self {
        Self
    }

    /// Run `az` with `args`, classifying launch and non-zero-exit failures
    /// with the caller's error constructor. stdout is returned untouched
    /// and never logged, since token responses flow through here.
    async fn run_az(
        args: &[&str],
        classify: fn(String) -> ProbeError,
    ) -> Result<String, ProbeError> {
        debug!("Running az {}", args.join(" "));
        let output = Command::new("az")
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| classify(format!("failed to launch the az CLI: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.trim();
            let detail = if detail.is_empty() {
                format!("az exited with {}", output.status)
            } else {
                detail.to_string()
            };
            return Err(classify(detail));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for AzureCliBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityBroker for AzureCliBroker {
    async fn signed_in_principal(&self) -> Result<PrincipalIdentity, ProbeError> {
        let stdout = Self::run_az(
            &["ad", "signed-in-user", "show", "--output", "json"],
            ProbeError::IdentityUnavailable,
        )
        .await?;

        let user: SignedInUser = serde_json::from_str(&stdout).map_err(|e| {
            ProbeError::IdentityUnavailable(format!("unexpected az response: {e}"))
        })?;
        if user.id.trim().is_empty() {
            return Err(ProbeError::IdentityUnavailable(
                "az returned an empty principal object id".into(),
            ));
        }
        Ok(PrincipalIdentity {
            object_id: user.id.trim().to_string(),
        })
    }

    async fn issue_token(&self, scope: &str) -> Result<AccessToken, ProbeError> {
        let stdout = Self::run_az(
            &[
                "account",
                "get-access-token",
                "--scope",
                scope,
                "--output",
                "json",
            ],
            ProbeError::TokenUnavailable,
        )
        .await?;

        let response: TokenResponse = serde_json::from_str(&stdout)
            .map_err(|e| ProbeError::TokenUnavailable(format!("unexpected az response: {e}")))?;
        if response.access_token.trim().is_empty() {
            return Err(ProbeError::TokenUnavailable(
                "az returned an empty access token".into(),
            ));
        }
        Ok(AccessToken::new(response.access_token, scope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_in_user_payload_parses() {
        let payload = r#"{
            "id": "00000000-1111-2222-3333-444444444444",
            "displayName": "Probe User",
            "userPrincipalName": "probe@example.com"
        }"#;
        let user: SignedInUser = serde_json::from_str(payload).unwrap();
        assert_eq!(user.id, "00000000-1111-2222-3333-444444444444");
    }

    #[test]
    fn token_payload_parses_camel_case() {
        let payload = r#"{
            "accessToken": "opaque-bearer-value",
            "expiresOn": "2026-08-26 12:00:00.000000",
            "tokenType": "Bearer"
        }"#;
        let response: TokenResponse = serde_json::from_str(payload).unwrap();
        assert_eq!(response.access_token, "opaque-bearer-value");
    }
}
