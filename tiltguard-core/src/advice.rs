//! Coaching advice text
//!
//! Advice is a capability that always yields text: providers fail soft with a
//! fallback string, and nothing in the ban or risk derivation depends on it.
//! The networked provider talks to a local Ollama instance over plain HTTP.

use crate::model::Rank;
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_OLLAMA_HOST: &str = "http://127.0.0.1:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";

/// Used when the model answers with an empty text
pub const FALLBACK_EMPTY: &str = "Reset your mindset: rest is part of getting stronger.";

/// Used when the advice service cannot be reached or answers garbage
pub const FALLBACK_OFFLINE: &str =
    "Stay calm and review the last game. The coach is offline right now.";

/// Upper bound on the response we are willing to buffer
const MAX_RESPONSE_BYTES: u64 = 1_048_576;

/// Errors from the networked advice provider
#[derive(Error, Debug)]
pub enum AdviceError {
    #[error("invalid host: {0}")]
    InvalidHost(String),

    #[error("failed to resolve host {0}")]
    Resolve(String),

    #[error("connection failed: {0}")]
    Connect(#[source] std::io::Error),

    #[error("transport error: {0}")]
    Transport(#[source] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Source of short coaching text for an account
pub trait AdviceProvider {
    /// Never fails; implementations return fallback text on any error
    fn get_advice(&self, rank: Rank, was_recent_loss: bool) -> String;
}

/// Offline provider that only returns fallback text
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticAdvisor;

impl AdviceProvider for StaticAdvisor {
    fn get_advice(&self, _rank: Rank, was_recent_loss: bool) -> String {
        if was_recent_loss {
            FALLBACK_EMPTY.to_string()
        } else {
            FALLBACK_OFFLINE.to_string()
        }
    }
}

/// Advice from an Ollama `/api/generate` endpoint
#[derive(Debug, Clone)]
pub struct OllamaAdvisor {
    pub host: String,
    pub model: String,
    pub connect_timeout: Duration,
    pub io_timeout: Duration,
}

impl OllamaAdvisor {
    pub fn new(host: impl Into<String>, model: impl Into<String>) -> Self {
        OllamaAdvisor {
            host: host.into(),
            model: model.into(),
            connect_timeout: Duration::from_secs(5),
            io_timeout: Duration::from_secs(30),
        }
    }

    /// Request advice, surfacing the error instead of falling back
    pub fn try_get_advice(&self, rank: Rank, was_recent_loss: bool) -> Result<String, AdviceError> {
        let prompt = build_prompt(rank, was_recent_loss);
        self.generate(&prompt)
    }

    fn generate(&self, prompt: &str) -> Result<String, AdviceError> {
        let (hostname, port) = parse_host(&self.host).map_err(AdviceError::InvalidHost)?;

        let addr = (hostname.as_str(), port)
            .to_socket_addrs()
            .map_err(|_| AdviceError::Resolve(hostname.clone()))?
            .next()
            .ok_or_else(|| AdviceError::Resolve(hostname.clone()))?;

        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false
        })
        .to_string();

        let mut stream =
            TcpStream::connect_timeout(&addr, self.connect_timeout).map_err(AdviceError::Connect)?;
        stream
            .set_read_timeout(Some(self.io_timeout))
            .map_err(AdviceError::Transport)?;
        stream
            .set_write_timeout(Some(self.io_timeout))
            .map_err(AdviceError::Transport)?;

        let request = format!(
            "POST /api/generate HTTP/1.1\r\nHost: {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            hostname,
            body.len(),
            body
        );
        stream
            .write_all(request.as_bytes())
            .map_err(AdviceError::Transport)?;

        let mut raw = String::new();
        stream
            .take(MAX_RESPONSE_BYTES)
            .read_to_string(&mut raw)
            .map_err(AdviceError::Transport)?;

        let status_line = raw
            .lines()
            .next()
            .ok_or_else(|| AdviceError::Malformed("empty response".to_string()))?;
        parse_http_status(status_line).map_err(AdviceError::Http)?;

        let (headers, body) = raw
            .split_once("\r\n\r\n")
            .ok_or_else(|| AdviceError::Malformed("missing header terminator".to_string()))?;
        if is_chunked(headers) {
            extract_response_text(&decode_chunked(body)?)
        } else {
            extract_response_text(body)
        }
    }
}

impl AdviceProvider for OllamaAdvisor {
    fn get_advice(&self, rank: Rank, was_recent_loss: bool) -> String {
        match self.try_get_advice(rank, was_recent_loss) {
            Ok(text) if text.trim().is_empty() => FALLBACK_EMPTY.to_string(),
            Ok(text) => {
                debug!(model = %self.model, "advice received");
                text.trim().to_string()
            }
            Err(e) => {
                warn!(host = %self.host, error = %e, "advice request failed, using fallback");
                FALLBACK_OFFLINE.to_string()
            }
        }
    }
}

/// Build the advice prompt for a rank
pub fn build_prompt(rank: Rank, was_recent_loss: bool) -> String {
    if was_recent_loss {
        format!(
            "I just lost a ranked match (rank: {}) and I'm tilted. My account is now locked \
             for 3 days by my own rule. Give me a short, stern but encouraging message \
             (under 50 words) on why resting matters for my mindset and how to avoid \
             chasing losses.",
            rank
        )
    } else {
        format!(
            "I'm a {}-rank ranked player. Give me one short macro-strategy tip \
             (under 30 words) to improve my game awareness.",
            rank
        )
    }
}

/// Parse a host string like "http://127.0.0.1:11434", "https://example.com:8080",
/// or "127.0.0.1:11434" into (hostname, port). Defaults to port 11434.
pub fn parse_host(host: &str) -> Result<(String, u16), String> {
    let h = host
        .strip_prefix("https://")
        .or_else(|| host.strip_prefix("http://"))
        .unwrap_or(host);
    let h = h.trim_end_matches('/');
    let mut parts = h.split(':');
    let hostname = parts.next().ok_or("missing host")?.trim().to_string();
    if hostname.is_empty() {
        return Err("empty hostname".to_string());
    }
    let port = parts
        .next()
        .unwrap_or("11434")
        .trim()
        .parse::<u16>()
        .map_err(|_| "invalid port".to_string())?;
    Ok((hostname, port))
}

/// Parse an HTTP status line like "HTTP/1.1 200 OK" and return the status code
/// for 2xx responses, or an error for non-2xx or malformed lines.
pub fn parse_http_status(status_line: &str) -> Result<u16, String> {
    let parts: Vec<&str> = status_line.splitn(3, ' ').collect();
    if parts.len() < 2 {
        return Err("invalid HTTP status line".to_string());
    }
    let code: u16 = parts[1]
        .parse()
        .map_err(|_| "invalid HTTP status code".to_string())?;
    if (200..300).contains(&code) {
        Ok(code)
    } else {
        let reason = parts.get(2).copied().unwrap_or("Unknown");
        Err(format!("{} {}", code, reason.trim()))
    }
}

fn is_chunked(headers: &str) -> bool {
    headers.lines().skip(1).any(|line| {
        line.split_once(':').is_some_and(|(name, value)| {
            name.trim().eq_ignore_ascii_case("transfer-encoding")
                && value.to_ascii_lowercase().contains("chunked")
        })
    })
}

/// Decode a `Transfer-Encoding: chunked` body
pub fn decode_chunked(body: &str) -> Result<String, AdviceError> {
    let mut decoded = String::new();
    let mut rest = body;
    loop {
        let (size_line, after) = rest
            .split_once("\r\n")
            .ok_or_else(|| AdviceError::Malformed("truncated chunk size".to_string()))?;
        let size_hex = size_line.split(';').next().unwrap_or("").trim();
        let size = usize::from_str_radix(size_hex, 16)
            .map_err(|_| AdviceError::Malformed(format!("invalid chunk size {:?}", size_hex)))?;
        if size == 0 {
            return Ok(decoded);
        }
        let chunk = after
            .get(..size)
            .ok_or_else(|| AdviceError::Malformed("truncated chunk".to_string()))?;
        decoded.push_str(chunk);
        rest = after[size..]
            .strip_prefix("\r\n")
            .ok_or_else(|| AdviceError::Malformed("missing chunk terminator".to_string()))?;
    }
}

/// Pull the `response` field out of an Ollama JSON body
pub fn extract_response_text(body: &str) -> Result<String, AdviceError> {
    let v: serde_json::Value =
        serde_json::from_str(body.trim()).map_err(|e| AdviceError::Malformed(e.to_string()))?;
    v.get("response")
        .and_then(|x| x.as_str())
        .map(str::to_string)
        .ok_or_else(|| AdviceError::Malformed("missing response field".to_string()))
}
