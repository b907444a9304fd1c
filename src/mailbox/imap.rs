//! Minimal blocking IMAP4rev1 client over rustls.
//!
//! Only what the inbox needs: LOGIN, SELECT, UID SEARCH, UID FETCH and
//! UID STORE. Run it inside `spawn_blocking`.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use rustls_pki_types::ServerName;
use secrecy::ExposeSecret;

use crate::error::MailboxError;

use super::email::EmailConfig;

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

/// Socket read timeout.
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything the server sent for one tagged command.
#[derive(Debug, Default)]
pub(crate) struct ImapResponse {
    /// Untagged and continuation lines, CRLF stripped.
    pub lines: Vec<String>,
    /// Literal payloads (`{n}` blocks) in arrival order.
    pub literals: Vec<Vec<u8>>,
    /// The tagged completion line.
    pub status: String,
}

/// An authenticated session with INBOX selected.
pub(crate) struct ImapSession {
    stream: TlsStream,
    next_tag: u32,
}

impl ImapSession {
    /// Connect, log in and select INBOX.
    pub fn open(config: &EmailConfig) -> Result<Self, MailboxError> {
        let tcp = TcpStream::connect((config.imap_host.as_str(), config.imap_port)).map_err(
            |e| MailboxError::Connection {
                host: config.imap_host.clone(),
                port: config.imap_port,
                reason: e.to_string(),
            },
        )?;
        tcp.set_read_timeout(Some(READ_TIMEOUT))?;

        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = Arc::new(
            rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth(),
        );
        let server_name = ServerName::try_from(config.imap_host.clone())
            .map_err(|e| MailboxError::Tls(format!("invalid server name: {e}")))?;
        let conn = rustls::ClientConnection::new(tls_config, server_name)
            .map_err(|e| MailboxError::Tls(e.to_string()))?;

        let mut session = Self {
            stream: rustls::StreamOwned::new(conn, tcp),
            next_tag: 1,
        };

        let greeting = session.read_line()?;
        if !greeting.starts_with("* OK") && !greeting.starts_with("* PREAUTH") {
            return Err(MailboxError::Protocol(format!(
                "unexpected greeting: {}",
                greeting.trim_end()
            )));
        }

        session.command(&format!(
            "LOGIN {} {}",
            quote(&config.username),
            quote(config.password.expose_secret())
        ))?;
        session.command("SELECT \"INBOX\"")?;
        Ok(session)
    }

    /// UIDs of unseen messages, ascending.
    pub fn search_unseen(&mut self) -> Result<Vec<u32>, MailboxError> {
        let response = self.command("UID SEARCH UNSEEN")?;
        Ok(parse_search(&response.lines))
    }

    /// Raw RFC 5322 bytes for one UID without setting `\Seen`.
    pub fn fetch_raw(&mut self, uid: u32) -> Result<Option<Vec<u8>>, MailboxError> {
        let mut response = self.command(&format!("UID FETCH {uid} BODY.PEEK[]"))?;
        if response.literals.is_empty() {
            return Ok(None);
        }
        Ok(Some(response.literals.swap_remove(0)))
    }

    /// Add flags (e.g. `\Answered \Seen`) to one UID.
    pub fn add_flags(&mut self, uid: u32, flags: &str) -> Result<(), MailboxError> {
        self.command(&format!("UID STORE {uid} +FLAGS ({flags})"))?;
        Ok(())
    }

    /// Best-effort LOGOUT.
    pub fn logout(mut self) {
        if let Err(e) = self.command("LOGOUT") {
            tracing::debug!(error = %e, "IMAP logout failed");
        }
    }

    /// Send a tagged command and collect the response up to its completion.
    fn command(&mut self, cmd: &str) -> Result<ImapResponse, MailboxError> {
        let tag = format!("A{}", self.next_tag);
        self.next_tag += 1;

        self.stream.write_all(format!("{tag} {cmd}\r\n").as_bytes())?;
        self.stream.flush()?;

        let mut response = ImapResponse::default();
        loop {
            let line = self.read_line()?;
            if let Some(len) = literal_len(&line) {
                let mut literal = vec![0u8; len];
                self.stream.read_exact(&mut literal)?;
                response.literals.push(literal);
                response.lines.push(line.trim_end().to_string());
                continue;
            }
            if line.starts_with(&format!("{tag} ")) {
                response.status = line.trim_end().to_string();
                break;
            }
            response.lines.push(line.trim_end().to_string());
        }

        if !is_tagged_ok(&response.status, &tag) {
            let verb = cmd.split_whitespace().next().unwrap_or("command");
            return Err(MailboxError::Protocol(format!(
                "{verb} failed: {}",
                response.status
            )));
        }
        Ok(response)
    }

    fn read_line(&mut self) -> Result<String, MailboxError> {
        let mut buf = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            match self.stream.read(&mut byte)? {
                0 => return Err(MailboxError::Protocol("IMAP connection closed".into())),
                _ => {
                    buf.push(byte[0]);
                    if buf.ends_with(b"\r\n") {
                        return Ok(String::from_utf8_lossy(&buf).into_owned());
                    }
                }
            }
        }
    }
}

/// Quote a string as an IMAP quoted-string.
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Length of a literal announced at the end of a line (`... {123}\r\n`).
pub(crate) fn literal_len(line: &str) -> Option<usize> {
    let line = line.trim_end();
    let open = line.rfind('{')?;
    let inner = line[open + 1..].strip_suffix('}')?;
    inner.trim_end_matches('+').parse().ok()
}

/// Whether a tagged completion line reports `OK`.
pub(crate) fn is_tagged_ok(status: &str, tag: &str) -> bool {
    status
        .strip_prefix(tag)
        .map(|rest| rest.trim_start().to_ascii_uppercase().starts_with("OK"))
        .unwrap_or(false)
}

/// Collect UIDs from `* SEARCH` lines.
pub(crate) fn parse_search(lines: &[String]) -> Vec<u32> {
    let mut uids: Vec<u32> = lines
        .iter()
        .filter_map(|l| l.strip_prefix("* SEARCH"))
        .flat_map(|rest| rest.split_whitespace().filter_map(|n| n.parse().ok()))
        .collect();
    uids.sort_unstable();
    uids
}
