//! Mock HTTP servers and redirect fixtures.
//!
//! Suites that need a loopback listener call [`mock_server`]; where binding
//! 127.0.0.1 is impossible the test is skipped, unless
//! `COURIER_REQUIRE_SOCKET_TESTS` is set, in which case it fails.

use std::io;
use std::net::TcpListener;
use std::sync::Arc;

use courier::{Client, ProviderRegistry, SocketProvider};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn loopback_required() -> bool {
    std::env::var("COURIER_REQUIRE_SOCKET_TESTS")
        .is_ok_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

fn report_unavailable(error: &io::Error) {
    let message = format!("[mock-http] cannot bind 127.0.0.1 ({error})");
    assert!(
        !loopback_required(),
        "{message}; unset COURIER_REQUIRE_SOCKET_TESTS to skip instead"
    );
    eprintln!("{message}; skipping. Set COURIER_REQUIRE_SOCKET_TESTS=1 to fail instead.");
}

/// Starts a mock server, or returns `None` when loopback sockets are unavailable.
pub async fn mock_server() -> Option<MockServer> {
    match TcpListener::bind("127.0.0.1:0") {
        Ok(probe) => {
            drop(probe);
            Some(MockServer::start().await)
        }
        Err(error) => {
            report_unavailable(&error);
            None
        }
    }
}

/// Client whose only provider is a fresh socket provider.
#[allow(dead_code)]
pub fn socket_client() -> Client {
    Client::new(ProviderRegistry::with_default(Arc::new(SocketProvider::new())))
}

/// A 3xx answer pointing at `location`.
#[allow(dead_code)]
pub fn redirect_to(status: u16, location: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).insert_header("Location", location)
}

/// Mounts `/target`, answering with the method it was reached by.
#[allow(dead_code)]
pub async fn mount_method_echo(server: &MockServer) {
    for verb in ["GET", "POST", "PUT"] {
        Mock::given(method(verb))
            .and(path("/target"))
            .respond_with(ResponseTemplate::new(200).set_body_string(verb))
            .mount(server)
            .await;
    }
}

/// `uri` with `user:password@` inserted after the scheme.
#[allow(dead_code)]
pub fn with_userinfo(uri: &str, user: &str, password: &str) -> String {
    uri.replacen("://", &format!("://{user}:{password}@"), 1)
}
