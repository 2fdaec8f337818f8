use std::time::Duration;

use log::trace;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::RpcError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl Endpoint {
    /// Accepts `http://host[:port][/path]`; IPv6 hosts go in brackets.
    pub fn parse(uri: &str) -> Result<Self, RpcError> {
        let invalid = || RpcError::InvalidUri(uri.to_string());

        let rest = uri.trim().strip_prefix("http://").ok_or_else(invalid)?;
        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, "/"),
        };
        if authority.is_empty() {
            return Err(invalid());
        }

        let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
            let end = bracketed.find(']').ok_or_else(invalid)?;
            let host = &bracketed[..end];
            let port = match bracketed[end + 1..].strip_prefix(':') {
                Some(port) => port.parse().map_err(|_| invalid())?,
                None => 80,
            };
            (host, port)
        } else {
            match authority.rsplit_once(':') {
                Some((host, port)) => (host, port.parse().map_err(|_| invalid())?),
                None => (authority, 80),
            }
        };

        Ok(Endpoint {
            host: host.to_string(),
            port,
            path: path.to_string(),
        })
    }
}

/// POSTs an XML document and returns the response body. The whole exchange,
/// connect included, is bounded by `limit`.
pub async fn post_xml(uri: &str, body: &str, limit: Duration) -> Result<String, RpcError> {
    let endpoint = Endpoint::parse(uri)?;
    timeout(limit, exchange(&endpoint, body))
        .await
        .map_err(|_| RpcError::Timeout(limit))?
}

async fn exchange(endpoint: &Endpoint, body: &str) -> Result<String, RpcError> {
    let mut stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port)).await?;

    let request = format!(
        "POST {} HTTP/1.1\r\nHost: {}:{}\r\nUser-Agent: ros-status/{}\r\n\
         Content-Type: text/xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        endpoint.path,
        endpoint.host,
        endpoint.port,
        env!("CARGO_PKG_VERSION"),
        body.len()
    );
    stream.write_all(request.as_bytes()).await?;
    stream.write_all(body.as_bytes()).await?;
    stream.flush().await?;

    let mut raw = Vec::with_capacity(4096);
    let header_end = loop {
        if let Some(idx) = find_subslice(&raw, b"\r\n\r\n") {
            break idx;
        }
        let read = stream.read_buf(&mut raw).await?;
        if read == 0 {
            return Err(RpcError::Malformed(
                "connection closed before response headers".to_string(),
            ));
        }
    };

    let head = std::str::from_utf8(&raw[..header_end])
        .map_err(|_| RpcError::Malformed("response headers are not UTF-8".to_string()))?;
    let head = ResponseHead::parse(head)?;
    trace!(
        "{}:{} answered {} (content-length {:?})",
        endpoint.host,
        endpoint.port,
        head.status,
        head.content_length
    );
    if head.status != 200 {
        return Err(RpcError::Http(head.status));
    }

    let mut payload = raw.split_off(header_end + 4);
    match head.content_length {
        Some(len) => {
            while payload.len() < len {
                let read = stream.read_buf(&mut payload).await?;
                if read == 0 {
                    return Err(RpcError::Malformed(format!(
                        "body truncated at {} of {} bytes",
                        payload.len(),
                        len
                    )));
                }
            }
            payload.truncate(len);
        }
        None => {
            stream.read_to_end(&mut payload).await?;
        }
    }

    if head.chunked {
        payload = dechunk(&payload)?;
    }

    String::from_utf8(payload)
        .map_err(|_| RpcError::Malformed("response body is not UTF-8".to_string()))
}

struct ResponseHead {
    status: u16,
    content_length: Option<usize>,
    chunked: bool,
}

impl ResponseHead {
    fn parse(head: &str) -> Result<Self, RpcError> {
        let mut lines = head.split("\r\n");
        let status_line = lines.next().unwrap_or_default();
        let mut parts = status_line.split_whitespace();
        let version = parts.next().unwrap_or_default();
        if !version.starts_with("HTTP/") {
            return Err(RpcError::Malformed(format!(
                "bad status line {:?}",
                status_line
            )));
        }
        let status = parts
            .next()
            .and_then(|code| code.parse().ok())
            .ok_or_else(|| RpcError::Malformed(format!("bad status line {:?}", status_line)))?;

        let mut content_length = None;
        let mut chunked = false;
        for line in lines {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                content_length = Some(value.parse().map_err(|_| {
                    RpcError::Malformed(format!("bad content-length {:?}", value))
                })?);
            } else if name.eq_ignore_ascii_case("transfer-encoding") {
                chunked = value.eq_ignore_ascii_case("chunked");
            }
        }

        // Content-Length is meaningless alongside chunked framing.
        if chunked {
            content_length = None;
        }

        Ok(ResponseHead {
            status,
            content_length,
            chunked,
        })
    }
}

fn dechunk(mut data: &[u8]) -> Result<Vec<u8>, RpcError> {
    let mut out = Vec::with_capacity(data.len());
    loop {
        let line_end = find_subslice(data, b"\r\n")
            .ok_or_else(|| RpcError::Malformed("unterminated chunk size".to_string()))?;
        let size_line = std::str::from_utf8(&data[..line_end])
            .map_err(|_| RpcError::Malformed("bad chunk size".to_string()))?;
        let size_hex = size_line.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_hex, 16)
            .map_err(|_| RpcError::Malformed(format!("bad chunk size {:?}", size_hex)))?;
        data = &data[line_end + 2..];
        if size == 0 {
            return Ok(out);
        }
        if data.len() < size {
            return Err(RpcError::Malformed("chunk truncated".to_string()));
        }
        out.extend_from_slice(&data[..size]);
        data = data[size..].strip_prefix(b"\r\n").unwrap_or(&data[size..]);
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
