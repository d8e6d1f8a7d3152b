//! Minimal HTTP/1.1 server for the service facade
//!
//! Parses just enough of HTTP to serve the routes: the request line,
//! headers, and a Content-Length body. One thread per connection; no
//! state is shared across requests. The remote mail calls made by the
//! handler block the connection thread for their full duration.

use anyhow::{Context, Result};
use log::{debug, error};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

/// Upper bound on accepted request bodies; the only expected body is a
/// one-field JSON object.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// A parsed HTTP request
#[derive(Debug)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub body: Vec<u8>,
}

impl Request {
    /// Build a request value directly (used by handler tests)
    pub fn new(method: impl Into<String>, path: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            body: body.into(),
        }
    }
}

/// An HTTP response ready to be written to a connection
#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub content_type: Option<&'static str>,
    pub body: Vec<u8>,
}

impl Response {
    /// A plain-text response
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: Some("text/plain; charset=utf-8"),
            body: body.into().into_bytes(),
        }
    }

    /// A JSON response serialized from `value`
    pub fn json(status: u16, value: &impl serde::Serialize) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self {
                status,
                content_type: Some("application/json"),
                body,
            },
            Err(e) => {
                error!("Failed to serialize response body: {}", e);
                Self::text(500, "internal error")
            }
        }
    }

    /// A response with no body (preflight replies)
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            content_type: None,
            body: Vec::new(),
        }
    }

    /// The response body as UTF-8 text
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    fn reason(&self) -> &'static str {
        match self.status {
            200 => "OK",
            204 => "No Content",
            400 => "Bad Request",
            404 => "Not Found",
            500 => "Internal Server Error",
            _ => "",
        }
    }

    /// Write the response, including the CORS headers that make the
    /// endpoint callable from any web page.
    fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        write!(writer, "HTTP/1.1 {} {}\r\n", self.status, self.reason())?;
        write!(writer, "Access-Control-Allow-Origin: *\r\n")?;
        write!(writer, "Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n")?;
        write!(writer, "Access-Control-Allow-Headers: Content-Type\r\n")?;
        if let Some(content_type) = self.content_type {
            write!(writer, "Content-Type: {}\r\n", content_type)?;
        }
        write!(writer, "Content-Length: {}\r\n", self.body.len())?;
        write!(writer, "Connection: close\r\n\r\n")?;
        writer.write_all(&self.body)?;
        writer.flush()
    }
}

/// Request handler shared across connection threads
pub type Handler = Arc<dyn Fn(&Request) -> Response + Send + Sync>;

/// Accept loop over a bound listener
pub struct Server {
    listener: TcpListener,
}

impl Server {
    /// Bind on all interfaces at `port` (0 picks an ephemeral port)
    pub fn bind(port: u16) -> Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .with_context(|| format!("Failed to bind port {}", port))?;
        Ok(Self { listener })
    }

    /// The bound address
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Failed to read local address")
    }

    /// Serve connections forever, one thread per connection
    pub fn serve(self, handler: Handler) -> Result<()> {
        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    let handler = Arc::clone(&handler);
                    thread::spawn(move || {
                        if let Err(e) = handle_connection(stream, &handler) {
                            debug!("Connection error: {:#}", e);
                        }
                    });
                }
                Err(e) => error!("Failed to accept connection: {}", e),
            }
        }
        Ok(())
    }
}

fn handle_connection(stream: TcpStream, handler: &Handler) -> Result<()> {
    let mut reader = BufReader::new(stream.try_clone().context("Failed to clone stream")?);
    let mut writer = stream;

    let response = match parse_request(&mut reader) {
        Ok(request) => {
            debug!("{} {}", request.method, request.path);
            handler(&request)
        }
        Err(e) => {
            debug!("Rejected malformed request: {:#}", e);
            Response::text(400, "bad request")
        }
    };

    response
        .write_to(&mut writer)
        .context("Failed to write response")
}

/// Parse the request line, headers, and body from a connection
fn parse_request<R: BufRead>(reader: &mut R) -> Result<Request> {
    let mut request_line = String::new();
    reader
        .read_line(&mut request_line)
        .context("Failed to read request line")?;

    // Format: METHOD /path HTTP/1.1
    let mut parts = request_line.split_whitespace();
    let method = parts.next().context("Malformed request line")?.to_string();
    let target = parts.next().context("Malformed request line")?;
    let path = target.split('?').next().unwrap_or(target).to_string();

    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        let read = reader.read_line(&mut line).context("Failed to read header")?;
        if read == 0 || line.trim_end().is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':')
            && name.eq_ignore_ascii_case("content-length")
        {
            content_length = value
                .trim()
                .parse()
                .context("Invalid Content-Length header")?;
        }
    }

    anyhow::ensure!(content_length <= MAX_BODY_BYTES, "Request body too large");

    let mut body = vec![0u8; content_length];
    reader
        .read_exact(&mut body)
        .context("Failed to read request body")?;

    Ok(Request { method, path, body })
}
