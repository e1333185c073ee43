//! Renders probe outcomes for humans.
//!
//! Pure formatting over an already-classified value: the reporter never
//! performs network actions, so it can be tested line by line. Each failure
//! stage maps to its own remediation checklist and the checklists stay
//! disjoint — a DNS fault never suggests RBAC work and vice versa.

use colored::Colorize;

use crate::probe::{FailureStage, ProbeError, ProbeResult};

/// One-line label for a failure stage.
pub fn classification(stage: FailureStage) -> &'static str {
    match stage {
        FailureStage::ConfigMissing => "configuration missing or incomplete",
        FailureStage::IdentityUnavailable => "no usable identity session",
        FailureStage::TokenUnavailable => "token request rejected",
        FailureStage::NetworkUnreachable => "cache endpoint unreachable",
        FailureStage::AuthenticationRejected => "cache rejected the credentials",
        FailureStage::Unknown => "unclassified failure",
    }
}

/// Ordered remediation steps for one failure stage.
pub fn remediation(stage: FailureStage) -> &'static [&'static str] {
    match stage {
        FailureStage::ConfigMissing => &[
            "check that the config file exists and is readable",
            "check that REDIS_HOST and REDIS_PORT are set and non-empty",
        ],
        FailureStage::IdentityUnavailable => &[
            "run `az login` to start a fresh identity session",
            "run `az ad signed-in-user show` and confirm it prints your account",
        ],
        FailureStage::TokenUnavailable => &[
            "run `az account show` and confirm the expected subscription is selected",
            "confirm the signed-in account is allowed to request tokens for the Redis audience",
        ],
        FailureStage::NetworkUnreachable => &[
            "test raw connectivity: `nc -vz <host> <port>`",
            "confirm DNS resolves the cache hostname",
            "check firewall rules and private-endpoint/VNet configuration",
        ],
        FailureStage::AuthenticationRejected => &[
            "check the RBAC data-access role assignment for this principal on this cache",
            "confirm Microsoft Entra authentication is enabled on the cache",
            "re-run the command to pick up a fresh token in case the previous one expired",
        ],
        FailureStage::Unknown => &[
            "re-run with RUST_LOG=debug for the stage-by-stage trace",
            "inspect the service-side logs for the reported error",
        ],
    }
}

/// Failure report: classification line, provider detail, then the
/// stage-specific checklist. The binary prints this to stderr.
pub fn render_failure(err: &ProbeError) -> String {
    let stage = err.stage();
    let mut out = String::new();
    out.push_str(&format!(
        "{} {}\n",
        "✗".bright_red().bold(),
        classification(stage).bright_red().bold()
    ));
    out.push_str(&format!("  {err}\n"));
    out.push_str(&format!("\n  {}\n", "Try, in order:".bright_white().bold()));
    for (i, step) in remediation(stage).iter().enumerate() {
        out.push_str(&format!("  {}. {step}\n", i + 1));
    }
    out
}

/// Success summary. The binary prints this to stdout.
pub fn render_success(result: &ProbeResult) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} {} {}\n",
        "✓".bright_green().bold(),
        "connected to".bright_green(),
        result.target.cyan().bold()
    ));
    for line in result.server_info.lines() {
        out.push_str(&format!("  {line}\n"));
    }
    out
}
