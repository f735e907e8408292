//! Frame status codes.
//!
//! Inbound frames reuse HTTP-style numeric codes; only `200` settles a
//! request successfully.

/// Status code carried in the `code` field of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(pub u16);

impl StatusCode {
    pub const OK: StatusCode = StatusCode(200);

    /// The only success status on the wire.
    pub fn is_ok(&self) -> bool {
        self.0 == Self::OK.0
    }

    /// 4xx: the request itself was rejected.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.0)
    }

    /// 5xx: the server failed to handle the request.
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.0)
    }
}

impl From<u16> for StatusCode {
    fn from(code: u16) -> Self {
        StatusCode(code)
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
