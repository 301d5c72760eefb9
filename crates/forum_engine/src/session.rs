/// Supplies the `Cookie` header for outgoing requests.
///
/// Login and cookie persistence live outside the engine; this is only the
/// read side the fetcher needs.
pub trait SessionStore: Send + Sync {
    fn cookie_header(&self) -> Option<String>;
}

/// Anonymous access.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSession;

impl SessionStore for NoSession {
    fn cookie_header(&self) -> Option<String> {
        None
    }
}

/// A fixed cookie header, e.g. copied from a logged-in browser.
#[derive(Debug, Clone)]
pub struct StaticSession {
    header: String,
}

impl StaticSession {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
        }
    }
}

impl SessionStore for StaticSession {
    fn cookie_header(&self) -> Option<String> {
        let header = self.header.trim();
        (!header.is_empty()).then(|| header.to_string())
    }
}
