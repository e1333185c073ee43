//! TLS session against the target cache, authenticated with the
//! principal/token pair.
//!
//! Interactive mode and the single probe share the same connect primitive;
//! they only differ in what happens after the handshake. The connection is
//! closed when the session value drops, on every exit path.

use log::{debug, info};
use redis::{ConnectionAddr, ConnectionInfo, ProtocolVersion, RedisConnectionInfo, Value};

use super::{AccessToken, PrincipalIdentity, ProbeError};
use crate::config::ConnectionConfig;

/// How many lines of `INFO server` make it into the success summary.
const SERVER_INFO_LINES: usize = 8;

pub struct RedisSession {
    connection: redis::aio::MultiplexedConnection,
    target: String,
}

impl RedisSession {
    /// Open a TLS connection to `host:port` and authenticate with the
    /// principal object id as username and the token value as password.
    ///
    /// The two shell conventions for presenting these credentials
    /// (`-u <id> -a <token>` and `--user <id> --pass <token>`) both reduce
    /// to the same RESP AUTH exchange, which is what happens here.
    pub async fn connect(
        config: &ConnectionConfig,
        identity: &PrincipalIdentity,
        token: &AccessToken,
    ) -> Result<Self, ProbeError> {
        let info = ConnectionInfo {
            addr: ConnectionAddr::TcpTls {
                host: config.host.clone(),
                port: config.port,
                insecure: false,
                tls_params: None,
            },
            redis: RedisConnectionInfo {
                db: 0,
                username: Some(identity.object_id.clone()),
                password: Some(token.secret().to_string()),
                protocol: ProtocolVersion::RESP2,
            },
        };

        let client = redis::Client::open(info)
            .map_err(|e| ProbeError::Unknown(format!("invalid connection parameters: {e}")))?;

        debug!("Opening TLS connection to {}:{}", config.host, config.port);
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(classify)?;
        info!("Connected to {}:{}", config.host, config.port);

        Ok(Self {
            connection,
            target: format!("{}:{}", config.host, config.port),
        })
    }

    /// Single liveness exchange: `PING`, then the leading lines of
    /// `INFO server`.
    pub async fn liveness(&mut self) -> Result<String, ProbeError> {
        let pong: String = redis::cmd("PING")
            .query_async(&mut self.connection)
            .await
            .map_err(classify)?;
        if pong != "PONG" {
            return Err(ProbeError::Unknown(format!(
                "unexpected PING reply: {pong:?}"
            )));
        }
        debug!("PING acknowledged by {}", self.target);

        let raw: String = redis::cmd("INFO")
            .arg("server")
            .query_async(&mut self.connection)
            .await
            .map_err(classify)?;
        Ok(summarize_info(&raw))
    }

    /// Execute one whitespace-split command line (interactive mode).
    pub async fn execute_line(&mut self, line: &str) -> Result<Value, ProbeError> {
        let mut words = line.split_whitespace();
        let name = words
            .next()
            .ok_or_else(|| ProbeError::Unknown("empty command".into()))?;
        let mut command = redis::cmd(name);
        for arg in words {
            command.arg(arg);
        }
        command
            .query_async(&mut self.connection)
            .await
            .map_err(classify)
    }

    /// `host:port` this session is connected to.
    pub fn target(&self) -> &str {
        &self.target
    }
}

/// Map a client error onto the failure taxonomy.
///
/// Transport-level faults (TCP refusal, TLS failure, DNS, timeouts) are
/// network problems; a reply that rejects the credential pair is an
/// authorization problem. The distinction drives which remediation
/// checklist the user sees, so it must not blur.
fn classify(err: redis::RedisError) -> ProbeError {
    if err.kind() == redis::ErrorKind::AuthenticationFailed || is_auth_rejection(&err) {
        ProbeError::AuthenticationRejected(err.to_string())
    } else if err.is_io_error()
        || err.is_timeout()
        || err.is_connection_refusal()
        || err.is_connection_dropped()
    {
        ProbeError::NetworkUnreachable(err.to_string())
    } else {
        ProbeError::Unknown(err.to_string())
    }
}

fn is_auth_rejection(err: &redis::RedisError) -> bool {
    matches!(err.code(), Some("WRONGPASS") | Some("NOAUTH") | Some("NOPERM"))
}

/// Keep the leading non-blank lines of an `INFO server` reply; the version
/// line lands near the top, which is the part worth showing.
fn summarize_info(raw: &str) -> String {
    raw.lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .take(SERVER_INFO_LINES)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render a RESP value the way redis-cli would, for the interactive loop.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Nil => "(nil)".to_string(),
        Value::Okay => "OK".to_string(),
        Value::Int(n) => format!("(integer) {n}"),
        Value::SimpleString(s) => s.clone(),
        Value::BulkString(bytes) => format!("\"{}\"", String::from_utf8_lossy(bytes)),
        Value::Array(items) => {
            if items.is_empty() {
                return "(empty array)".to_string();
            }
            items
                .iter()
                .enumerate()
                .map(|(i, item)| format!("{}) {}", i + 1, format_value(item)))
                .collect::<Vec<_>>()
                .join("\n")
        }
        other => format!("{other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::FailureStage;

    #[test]
    fn io_errors_classify_as_network() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = classify(redis::RedisError::from(io));
        assert_eq!(err.stage(), FailureStage::NetworkUnreachable);
    }

    #[test]
    fn auth_failures_classify_as_rejected() {
        let err = classify(redis::RedisError::from((
            redis::ErrorKind::AuthenticationFailed,
            "invalid username-password pair",
        )));
        assert_eq!(err.stage(), FailureStage::AuthenticationRejected);
    }

    #[test]
    fn protocol_surprises_classify_as_unknown() {
        let err = classify(redis::RedisError::from((
            redis::ErrorKind::TypeError,
            "unexpected reply shape",
        )));
        assert_eq!(err.stage(), FailureStage::Unknown);
    }

    #[test]
    fn info_summary_keeps_leading_lines() {
        let raw = "# Server\r\nredis_version:7.4.0\r\nredis_mode:standalone\r\n\r\nos:Linux\r\n";
        let summary = summarize_info(raw);
        assert!(summary.starts_with("# Server"));
        assert!(summary.contains("redis_version:7.4.0"));
        assert!(!summary.contains('\r'));
        assert!(!summary.contains("\n\n"));
    }

    #[test]
    fn info_summary_truncates_long_replies() {
        let raw = (0..40)
            .map(|i| format!("line{i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let summary = summarize_info(&raw);
        assert_eq!(summary.lines().count(), SERVER_INFO_LINES);
    }

    #[test]
    fn values_render_like_redis_cli() {
        assert_eq!(format_value(&Value::Nil), "(nil)");
        assert_eq!(format_value(&Value::Okay), "OK");
        assert_eq!(format_value(&Value::Int(42)), "(integer) 42");
        assert_eq!(
            format_value(&Value::BulkString(b"hello".to_vec())),
            "\"hello\""
        );
        let array = Value::Array(vec![Value::Int(1), Value::BulkString(b"two".to_vec())]);
        assert_eq!(format_value(&array), "1) (integer) 1\n2) \"two\"");
    }
}
