//! Network collaborators the station calls into
//!
//! The platform provides the WiFi station interface and the HTTP transport;
//! the core only decides when to connect and what to send.

use core::fmt::Debug;

/// A request header as a name/value pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header<'a> {
    pub name: &'a str,
    pub value: &'a str,
}

impl<'a> Header<'a> {
    pub const fn new(name: &'a str, value: &'a str) -> Self {
        Self { name, value }
    }
}

/// Station-mode WiFi connection.
pub trait WifiLink {
    type Error: Debug;

    /// Join the network, resolving once the link is up or the attempt failed.
    fn connect(
        &mut self,
        ssid: &str,
        password: &str,
    ) -> impl Future<Output = Result<(), Self::Error>>;

    fn is_connected(&self) -> bool;
}

/// Transport for a single HTTP request.
pub trait HttpClient {
    type Error: Debug;

    /// Send a `POST` of `body` to `url` and return the response status code.
    fn post(
        &mut self,
        url: &str,
        headers: &[Header<'_>],
        body: &[u8],
    ) -> impl Future<Output = Result<u16, Self::Error>>;
}
