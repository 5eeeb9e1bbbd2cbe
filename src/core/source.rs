//! Input Sources
//!
//! Where DTD text comes from: inline text, a file, or an http(s) URL. Reading
//! is a single blocking call that returns the decoded text. URLs are fetched
//! with a bare HTTP/1.0 GET; https needs the `tls` feature.

use super::encoding;
use super::error::{ParseError, Result};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Text(String),
    File(PathBuf),
    Url(String),
}

impl Source {
    /// Classify a location string as a URL or a file path
    pub fn detect(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            Source::Url(location.to_string())
        } else if let Some(path) = location.strip_prefix("file://") {
            Source::File(PathBuf::from(path))
        } else {
            Source::File(PathBuf::from(location))
        }
    }

    /// Identifier reported in errors; None for inline text
    pub fn id(&self) -> Option<String> {
        match self {
            Source::Text(_) => None,
            Source::File(path) => Some(path.display().to_string()),
            Source::Url(url) => Some(url.clone()),
        }
    }

    /// Directory or URL prefix that relative system identifiers resolve against
    pub fn base(&self) -> Option<String> {
        match self {
            Source::Text(_) => None,
            Source::File(path) => path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(|p| p.display().to_string()),
            Source::Url(url) => {
                let authority = url.find("://").map_or(0, |i| i + 3);
                url[authority..]
                    .rfind('/')
                    .map(|i| url[..authority + i + 1].to_string())
            }
        }
    }

    /// Read the whole source and decode it to text
    pub fn read(&self) -> Result<String> {
        let bytes = match self {
            Source::Text(text) => return Ok(text.clone()),
            Source::File(path) => read_file(path),
            Source::Url(url) => fetch(url),
        };
        let bytes = bytes.map_err(|e| ParseError::io(self.id(), e))?;
        tracing::debug!(source = ?self.id(), bytes = bytes.len(), "read DTD source");
        encoding::decode(bytes).map_err(|e| ParseError::io(self.id(), e))
    }
}

fn read_file(path: &Path) -> std::result::Result<Vec<u8>, String> {
    std::fs::read(path).map_err(|e| format!("Cannot read {}: {}", path.display(), e))
}

// ============================================================================
// HTTP
// ============================================================================

#[derive(Debug, PartialEq, Eq)]
struct HttpTarget {
    secure: bool,
    host: String,
    port: u16,
    path: String,
}

impl HttpTarget {
    fn parse(url: &str) -> std::result::Result<Self, String> {
        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| format!("Invalid URL: {}", url))?;
        let secure = match scheme {
            "http" => false,
            "https" => true,
            other => return Err(format!("Unsupported scheme: {}", other)),
        };

        let (authority, path) = match rest.find('/') {
            Some(i) => (&rest[..i], &rest[i..]),
            None => (rest, "/"),
        };
        let (host, port) = match authority.split_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|e| format!("Invalid port number: {}", e))?;
                (host, port)
            }
            None => (authority, if secure { 443 } else { 80 }),
        };
        if host.is_empty() {
            return Err(format!("Invalid URL: {}", url));
        }

        Ok(HttpTarget {
            secure,
            host: host.to_string(),
            port,
            path: path.to_string(),
        })
    }

    fn request(&self) -> String {
        format!(
            "GET {} HTTP/1.0\r\nHost: {}\r\nAccept: application/xml-dtd, */*\r\n\r\n",
            self.path, self.host
        )
    }
}

fn fetch(url: &str) -> std::result::Result<Vec<u8>, String> {
    let target = HttpTarget::parse(url)?;
    let stream = TcpStream::connect((target.host.as_str(), target.port))
        .map_err(|e| format!("Cannot connect to {}:{}: {}", target.host, target.port, e))?;

    if target.secure {
        fetch_tls(&target, stream)
    } else {
        exchange(&target, stream)
    }
}

#[cfg(feature = "tls")]
fn fetch_tls(target: &HttpTarget, stream: TcpStream) -> std::result::Result<Vec<u8>, String> {
    let connector = native_tls::TlsConnector::new().map_err(|e| format!("TLS setup failed: {}", e))?;
    let stream = connector
        .connect(&target.host, stream)
        .map_err(|e| format!("TLS handshake with {} failed: {}", target.host, e))?;
    exchange(target, stream)
}

#[cfg(not(feature = "tls"))]
fn fetch_tls(target: &HttpTarget, _stream: TcpStream) -> std::result::Result<Vec<u8>, String> {
    Err(format!(
        "https://{} requires the `tls` feature",
        target.host
    ))
}

fn exchange<S: Read + Write>(target: &HttpTarget, mut stream: S) -> std::result::Result<Vec<u8>, String> {
    stream
        .write_all(target.request().as_bytes())
        .and_then(|_| stream.flush())
        .map_err(|e| format!("Request to {} failed: {}", target.host, e))?;
    read_response(BufReader::new(stream))
}

/// Status line must be 2xx; headers are skipped and the body returned as-is
fn read_response<R: BufRead>(mut reader: R) -> std::result::Result<Vec<u8>, String> {
    let io_err = |e: std::io::Error| format!("Error reading response: {}", e);

    let mut status_line = String::new();
    reader.read_line(&mut status_line).map_err(io_err)?;
    let mut parts = status_line.trim_end().splitn(3, ' ');
    let status = match (parts.next(), parts.next()) {
        (Some(version), Some(code)) if version.starts_with("HTTP/") => code,
        _ => return Err(format!("Malformed status line: {:?}", status_line.trim_end())),
    };
    if !status.starts_with('2') {
        return Err(format!("HTTP status {}", status_line.trim_end()));
    }

    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).map_err(io_err)?;
        if n == 0 || line.trim_end_matches(['\r', '\n']).is_empty() {
            break;
        }
    }

    let mut body = Vec::new();
    reader.read_to_end(&mut body).map_err(io_err)?;
    Ok(body)
}
