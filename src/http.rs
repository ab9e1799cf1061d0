//! Minimal HTTP/1.1 GET over an embassy-net TCP socket, with optional TLS
//!
//! `http://` URLs go straight over TCP, `https://` URLs through embedded-tls.
//! One redirect is followed.

use core::fmt::{self, Write};

use embassy_net::{Stack, dns::DnsQueryType, tcp::ConnectError};
use embassy_time::Duration;
use embedded_io::{Error as _, ErrorKind};
use embedded_io_async::{Read, Write as IoWrite};
use embedded_tls::{Aes128GcmSha256, TlsConfig, TlsConnection, TlsContext, TlsError};
use heapless::String;
use rand_core::{CryptoRng, RngCore};

use crate::socket::AsyncTcpSocket;
use crate::tls::TlsProvider;

pub const SOCKET_TIMEOUT: Duration = Duration::from_secs(10);
pub const REQUEST_CAPACITY: usize = 1024;
pub const RESPONSE_BUFFER_SIZE: usize = 1024;
pub const BODY_CAPACITY: usize = 256;
pub const LOCATION_CAPACITY: usize = 256;

const USER_AGENT: &str = concat!("emontemp/", env!("CARGO_PKG_VERSION"));

#[derive(Debug)]
pub enum HttpError {
    /// URL is not `http://` or `https://` with a host
    InvalidUrl,
    Dns,
    Connect(ConnectError),
    Tls(TlsError),
    Write(ErrorKind),
    Read(ErrorKind),
    /// Request line and headers did not fit the request buffer
    RequestTooLong,
    MalformedResponse,
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpError::InvalidUrl => write!(f, "invalid URL"),
            HttpError::Dns => write!(f, "DNS lookup failed"),
            HttpError::Connect(e) => write!(f, "connect failed: {:?}", e),
            HttpError::Tls(e) => write!(f, "TLS failed: {:?}", e),
            HttpError::Write(e) => write!(f, "write failed: {:?}", e),
            HttpError::Read(e) => write!(f, "read failed: {:?}", e),
            HttpError::RequestTooLong => write!(f, "request too long"),
            HttpError::MalformedResponse => write!(f, "malformed response"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Url<'a> {
    pub scheme: Scheme,
    pub host: &'a str,
    pub port: u16,
    /// Path and query, always starting with `/`
    pub target: &'a str,
}

impl<'a> Url<'a> {
    /// `https://host[:port][/target]`
    pub fn parse(url: &'a str) -> Option<Self> {
        let (scheme, rest) = if let Some(rest) = url.strip_prefix("https://") {
            (Scheme::Https, rest)
        } else if let Some(rest) = url.strip_prefix("http://") {
            (Scheme::Http, rest)
        } else {
            return None;
        };

        let (authority, target) = match rest.find('/') {
            Some(i) => (&rest[..i], &rest[i..]),
            None => (rest, "/"),
        };
        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => (host, port.parse().ok()?),
            None => (authority, scheme.default_port()),
        };
        if host.is_empty() {
            return None;
        }

        Some(Url {
            scheme,
            host,
            port,
            target,
        })
    }

    /// Resolve a `Location` header value against this URL
    pub fn join<'b>(&self, location: &'b str) -> Option<Url<'b>>
    where
        'a: 'b,
    {
        if location.starts_with('/') {
            Some(Url {
                target: location,
                ..*self
            })
        } else {
            Url::parse(location)
        }
    }
}

impl fmt::Display for Url<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = match self.scheme {
            Scheme::Http => "http",
            Scheme::Https => "https",
        };
        write!(f, "{}://{}", scheme, self.host)?;
        if self.port != self.scheme.default_port() {
            write!(f, ":{}", self.port)?;
        }
        f.write_str(self.target)
    }
}

#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub location: Option<String<LOCATION_CAPACITY>>,
    /// Start of the body, truncated to what fits
    pub body: String<BODY_CAPACITY>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 303 | 307 | 308)
    }
}

pub fn write_request_head<W: Write>(out: &mut W, host: &str, target: &str) -> fmt::Result {
    write!(out, "GET {} HTTP/1.1\r\n", target)?;
    write!(out, "Host: {}\r\n", host)?;
    write!(out, "User-Agent: {}\r\n", USER_AGENT)?;
    write!(out, "Content-Type: application/x-www-form-urlencoded\r\n")?;
    write!(out, "Connection: close\r\n\r\n")
}

/// `HTTP/1.1 200 OK` -> `Some(200)`
pub fn parse_status_line(response: &[u8]) -> Option<u16> {
    let line_end = find(response, b"\r\n").unwrap_or(response.len());
    let line = core::str::from_utf8(&response[..line_end]).ok()?;

    let mut parts = line.split(' ');
    let version = parts.next()?;
    if !version.starts_with("HTTP/") {
        return None;
    }
    let code = parts.next()?;
    if code.len() != 3 {
        return None;
    }
    code.parse().ok()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Append as much of `raw` as decodes and fits
fn push_text<const N: usize>(out: &mut String<N>, raw: &[u8]) -> bool {
    let text = match core::str::from_utf8(raw) {
        Ok(text) => text,
        // The buffer may have cut a character in half
        Err(e) => core::str::from_utf8(&raw[..e.valid_up_to()]).unwrap_or_default(),
    };
    for c in text.chars() {
        if out.push(c).is_err() {
            return false;
        }
    }
    true
}

/// Strip chunk framing from `raw`, stopping at the last chunk or wherever the
/// buffer ends
pub fn decode_chunked<const N: usize>(mut raw: &[u8], out: &mut String<N>) {
    loop {
        let Some(line_end) = find(raw, b"\r\n") else {
            return;
        };
        let Ok(line) = core::str::from_utf8(&raw[..line_end]) else {
            return;
        };
        // Chunk extensions follow a `;`
        let size = line.split(';').next().unwrap_or_default().trim();
        let Ok(size) = usize::from_str_radix(size, 16) else {
            return;
        };
        if size == 0 {
            return;
        }

        raw = &raw[line_end + 2..];
        let take = size.min(raw.len());
        if !push_text(out, &raw[..take]) || take < size {
            return;
        }
        raw = raw.get(size + 2..).unwrap_or_default();
    }
}

pub fn parse_response(response: &[u8]) -> Result<Response, HttpError> {
    let status = parse_status_line(response).ok_or(HttpError::MalformedResponse)?;

    let (head, raw_body) = match find(response, b"\r\n\r\n") {
        Some(end) => (&response[..end], &response[end + 4..]),
        None => (response, &[][..]),
    };
    let head = match core::str::from_utf8(head) {
        Ok(head) => head,
        Err(e) => core::str::from_utf8(&head[..e.valid_up_to()]).unwrap_or_default(),
    };

    let mut location = None;
    let mut chunked = false;
    let mut content_length = None;
    for line in head.split("\r\n").skip(1) {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        let value = value.trim();
        if name.eq_ignore_ascii_case("location") {
            let mut text = String::new();
            if text.push_str(value).is_ok() {
                location = Some(text);
            }
        } else if name.eq_ignore_ascii_case("transfer-encoding") {
            chunked = value
                .split(',')
                .any(|coding| coding.trim().eq_ignore_ascii_case("chunked"));
        } else if name.eq_ignore_ascii_case("content-length") {
            content_length = value.parse::<usize>().ok();
        }
    }

    let mut body = String::new();
    if chunked {
        decode_chunked(raw_body, &mut body);
    } else {
        let end = content_length.map_or(raw_body.len(), |len| len.min(raw_body.len()));
        push_text(&mut body, &raw_body[..end]);
    }

    Ok(Response {
        status,
        location,
        body,
    })
}

/// Send `request` and read until the peer closes or `buf` is full
async fn exchange<S>(stream: &mut S, request: &[u8], buf: &mut [u8]) -> Result<usize, HttpError>
where
    S: Read + IoWrite,
{
    stream
        .write_all(request)
        .await
        .map_err(|e| HttpError::Write(e.kind()))?;
    stream.flush().await.map_err(|e| HttpError::Write(e.kind()))?;

    let mut filled = 0;
    while filled < buf.len() {
        match stream.read(&mut buf[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if filled == 0 => return Err(HttpError::Read(e.kind())),
            Err(_) => break,
        }
    }
    Ok(filled)
}

/// Socket and TLS record buffers, borrowed for the life of the client
pub struct Buffers<'a> {
    pub tcp_rx: &'a mut [u8],
    pub tcp_tx: &'a mut [u8],
    pub tls_read: &'a mut [u8],
    pub tls_write: &'a mut [u8],
}

pub struct HttpClient<'a, R> {
    stack: Stack<'a>,
    buffers: Buffers<'a>,
    rng: R,
}

impl<'a, R> HttpClient<'a, R>
where
    R: RngCore + CryptoRng,
{
    pub fn new(stack: Stack<'a>, buffers: Buffers<'a>, rng: R) -> Self {
        Self {
            stack,
            buffers,
            rng,
        }
    }

    /// GET `url`, following at most one redirect
    pub async fn get(&mut self, url: Url<'_>) -> Result<Response, HttpError> {
        let response = self.fetch(&url).await?;
        if !response.is_redirect() {
            return Ok(response);
        }

        let Some(next) = response.location.as_deref().and_then(|l| url.join(l)) else {
            esp_println::println!("[HTTP] {} without usable Location", response.status);
            return Ok(response);
        };
        esp_println::println!("[HTTP] {} -> {}", response.status, next);
        self.fetch(&next).await
    }

    async fn fetch(&mut self, url: &Url<'_>) -> Result<Response, HttpError> {
        let addresses = self
            .stack
            .dns_query(url.host, DnsQueryType::A)
            .await
            .map_err(|_| HttpError::Dns)?;
        let address = *addresses.first().ok_or(HttpError::Dns)?;
        esp_println::println!("[HTTP] {} resolved to {}", url.host, address);

        let mut request = String::<REQUEST_CAPACITY>::new();
        write_request_head(&mut request, url.host, url.target)
            .map_err(|_| HttpError::RequestTooLong)?;

        let mut socket = AsyncTcpSocket::new(
            self.stack,
            &mut *self.buffers.tcp_rx,
            &mut *self.buffers.tcp_tx,
        );
        socket.set_timeout(Some(SOCKET_TIMEOUT));
        socket
            .connect((address, url.port))
            .await
            .map_err(HttpError::Connect)?;

        let mut buf = [0u8; RESPONSE_BUFFER_SIZE];
        let filled = match url.scheme {
            Scheme::Http => {
                let result = exchange(&mut socket, request.as_bytes(), &mut buf).await;
                socket.close();
                result?
            }
            Scheme::Https => {
                let config = TlsConfig::new().with_server_name(url.host);
                let mut tls = TlsConnection::<AsyncTcpSocket, Aes128GcmSha256>::new(
                    socket,
                    &mut *self.buffers.tls_read,
                    &mut *self.buffers.tls_write,
                );
                tls.open(TlsContext::new(&config, TlsProvider::new(&mut self.rng)))
                    .await
                    .map_err(HttpError::Tls)?;

                let result = exchange(&mut tls, request.as_bytes(), &mut buf).await;
                let mut socket = match tls.close().await {
                    Ok(socket) => socket,
                    Err((socket, e)) => {
                        esp_println::println!("[HTTP] TLS close failed: {:?}", e);
                        socket
                    }
                };
                socket.close();
                result?
            }
        };

        parse_response(&buf[..filled])
    }
}
