//! Request routing and the email-query handler
//!
//! Handlers are stateless: each request flows linearly through
//! credential load, remote fetch, and classification. The mailbox and
//! classifier are passed in as constructed dependencies so tests can
//! substitute a fake mailbox.

use log::{error, info};
use mail::{Classifier, Label, UnreadMailbox};
use serde::{Deserialize, Serialize};

use crate::http::{Request, Response};

/// Usage string served at the root route
const USAGE: &str = "API Gmail lista. Usar POST /email con JSON { 'email': 'ejemplo@gmail.com' }";

/// JSON body accepted by POST /email
#[derive(Debug, Deserialize)]
struct EmailQuery {
    email: Option<String>,
}

/// Every JSON reply has this single-field shape
#[derive(Debug, Serialize)]
struct Reply {
    message: String,
}

fn json_message(status: u16, message: impl Into<String>) -> Response {
    Response::json(
        status,
        &Reply {
            message: message.into(),
        },
    )
}

/// Dispatch a request to the matching route
pub fn respond(req: &Request, mailbox: &dyn UnreadMailbox, classifier: &Classifier) -> Response {
    match (req.method.as_str(), req.path.as_str()) {
        ("GET", "/") => Response::text(200, USAGE),
        ("POST", "/email") => email_query(req, mailbox, classifier),
        // CORS preflight for browser callers
        ("OPTIONS", _) => Response::empty(204),
        _ => Response::text(404, "not found"),
    }
}

/// Handle POST /email: look up the latest unread message for the given
/// address and describe what it contained.
fn email_query(req: &Request, mailbox: &dyn UnreadMailbox, classifier: &Classifier) -> Response {
    // An unparseable body is answered like a missing address.
    let query: EmailQuery = serde_json::from_slice(&req.body).unwrap_or(EmailQuery { email: None });

    let Some(address) = query.email.filter(|email| !email.is_empty()) else {
        return json_message(400, "❌ No se envió correo");
    };

    match lookup(&address, mailbox, classifier) {
        Ok(message) => json_message(200, message),
        Err(e) => {
            error!("Email query failed for {}: {:#}", address, e);
            json_message(500, format!("❌ Error con {}:\n{:#}", address, e))
        }
    }
}

/// Fetch, classify, and phrase the outcome for one address
fn lookup(
    address: &str,
    mailbox: &dyn UnreadMailbox,
    classifier: &Classifier,
) -> anyhow::Result<String> {
    let unread = mailbox.fetch_latest_unread(address)?;

    let Some(body) = unread.and_then(|message| message.body) else {
        return Ok("📭 No hay correos no leídos.".to_string());
    };

    let result = classifier.classify(&body);
    info!("Classified latest unread for {} as {:?}", address, result.label);

    Ok(match (result.label, result.link) {
        (Label::UpdateHome, Some(link)) => {
            format!("✅ {}\nActualizar hogar:\n{}", address, link)
        }
        (Label::TemporaryAccessCode, Some(link)) => {
            format!("✅ {}\nCódigo de acceso:\n{}", address, link)
        }
        _ => format!("⚠️ {}: Correo encontrado, pero sin enlace útil.", address),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Handler, Server};
    use anyhow::anyhow;
    use mail::UnreadMessage;
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use std::sync::Arc;

    /// Fake mailbox returning a canned outcome
    enum FakeMailbox {
        Unread(UnreadMessage),
        Empty,
        Failing(&'static str),
    }

    impl UnreadMailbox for FakeMailbox {
        fn fetch_latest_unread(&self, _address: &str) -> anyhow::Result<Option<UnreadMessage>> {
            match self {
                FakeMailbox::Unread(message) => Ok(Some(message.clone())),
                FakeMailbox::Empty => Ok(None),
                FakeMailbox::Failing(reason) => Err(anyhow!(*reason)),
            }
        }
    }

    fn post_email(body: &str, mailbox: &dyn UnreadMailbox) -> Response {
        let request = Request::new("POST", "/email", body.as_bytes().to_vec());
        respond(&request, mailbox, &Classifier::new())
    }

    #[test]
    fn test_root_route_serves_usage() {
        let request = Request::new("GET", "/", Vec::new());
        let response = respond(&request, &FakeMailbox::Empty, &Classifier::new());

        assert_eq!(response.status, 200);
        assert_eq!(response.body_text(), USAGE);
    }

    #[test]
    fn test_unknown_route_is_404() {
        let request = Request::new("GET", "/otra", Vec::new());
        let response = respond(&request, &FakeMailbox::Empty, &Classifier::new());

        assert_eq!(response.status, 404);
    }

    #[test]
    fn test_preflight_is_no_content() {
        let request = Request::new("OPTIONS", "/email", Vec::new());
        let response = respond(&request, &FakeMailbox::Empty, &Classifier::new());

        assert_eq!(response.status, 204);
        assert!(response.body.is_empty());
    }

    #[test]
    fn test_missing_address_is_rejected() {
        let response = post_email("{}", &FakeMailbox::Empty);

        assert_eq!(response.status, 400);
        assert!(response.body_text().contains("No se envió correo"));
    }

    #[test]
    fn test_empty_address_is_rejected() {
        let response = post_email(r#"{"email": ""}"#, &FakeMailbox::Empty);
        assert_eq!(response.status, 400);
    }

    #[test]
    fn test_unparseable_body_is_rejected() {
        let response = post_email("not json", &FakeMailbox::Empty);
        assert_eq!(response.status, 400);
    }

    #[test]
    fn test_no_unread_messages() {
        let response = post_email(r#"{"email": "a@b.com"}"#, &FakeMailbox::Empty);

        assert_eq!(response.status, 200);
        assert!(response.body_text().contains("No hay correos no leídos"));
    }

    #[test]
    fn test_message_without_plain_text_body_reads_as_no_unread() {
        let mailbox = FakeMailbox::Unread(UnreadMessage::without_body("solo html"));
        let response = post_email(r#"{"email": "a@b.com"}"#, &mailbox);

        assert_eq!(response.status, 200);
        assert!(response.body_text().contains("No hay correos no leídos"));
    }

    #[test]
    fn test_update_home_message() {
        let mailbox = FakeMailbox::Unread(UnreadMessage::new(
            "aviso",
            "Hola.\nSí, la envié yo.\nConfirma aquí: https://ex.com/ok?id=1 Gracias",
        ));
        let response = post_email(r#"{"email": "a@b.com"}"#, &mailbox);

        assert_eq!(response.status, 200);
        let body = response.body_text();
        assert!(body.contains("✅ a@b.com\\nActualizar hogar:\\nhttps://ex.com/ok?id=1"));
    }

    #[test]
    fn test_temporary_access_code_message() {
        let mailbox = FakeMailbox::Unread(UnreadMessage::new(
            "aviso",
            "Obtener código de acceso:\nhttps://ex.com/code?id=2",
        ));
        let response = post_email(r#"{"email": "a@b.com"}"#, &mailbox);

        assert_eq!(response.status, 200);
        let body = response.body_text();
        assert!(body.contains("✅ a@b.com\\nCódigo de acceso:\\nhttps://ex.com/code?id=2"));
    }

    #[test]
    fn test_unclassified_message() {
        let mailbox = FakeMailbox::Unread(UnreadMessage::new("aviso", "Algo no relacionado."));
        let response = post_email(r#"{"email": "a@b.com"}"#, &mailbox);

        assert_eq!(response.status, 200);
        assert!(
            response
                .body_text()
                .contains("⚠️ a@b.com: Correo encontrado, pero sin enlace útil.")
        );
    }

    #[test]
    fn test_mailbox_failure_is_500_with_address() {
        let mailbox = FakeMailbox::Failing("token endpoint unreachable");
        let response = post_email(r#"{"email": "a@b.com"}"#, &mailbox);

        assert_eq!(response.status, 500);
        let body = response.body_text();
        assert!(body.contains("❌ Error con a@b.com"));
        assert!(body.contains("token endpoint unreachable"));
    }

    // === Full stack over a real socket ===

    fn spawn_server(mailbox: FakeMailbox) -> std::net::SocketAddr {
        let server = Server::bind(0).unwrap();
        let addr = server.local_addr().unwrap();
        let classifier = Classifier::new();
        let handler: Handler =
            Arc::new(move |request| respond(request, &mailbox, &classifier));
        let _ = std::thread::spawn(move || server.serve(handler));
        addr
    }

    fn exchange(addr: std::net::SocketAddr, raw: String) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(raw.as_bytes()).unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        response
    }

    #[test]
    fn test_end_to_end_over_loopback() {
        let addr = spawn_server(FakeMailbox::Unread(UnreadMessage::new(
            "aviso",
            "Sí, la envié yo\nhttps://ex.com/ok",
        )));

        // Root route
        let response = exchange(addr, "GET / HTTP/1.1\r\nHost: x\r\n\r\n".to_string());
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("API Gmail lista"));
        assert!(response.contains("Access-Control-Allow-Origin: *"));

        // Classified lookup
        let body = r#"{"email": "a@b.com"}"#;
        let response = exchange(
            addr,
            format!(
                "POST /email HTTP/1.1\r\nHost: x\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
                body.len(),
                body
            ),
        );
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("Actualizar hogar"));
        assert!(response.contains("https://ex.com/ok"));
    }

    #[test]
    fn test_end_to_end_missing_address() {
        let addr = spawn_server(FakeMailbox::Empty);

        let response = exchange(
            addr,
            "POST /email HTTP/1.1\r\nHost: x\r\nContent-Length: 2\r\n\r\n{}".to_string(),
        );
        assert!(response.starts_with("HTTP/1.1 400 Bad Request"));
        assert!(response.contains("No se envió correo"));
    }
}
