//! `MockDriver`: the [`dbc_core::driver::Driver`] implementation fronting
//! [`MockDocumentConnection`].

use dbc_core::driver::Driver;
use dbc_core::error::Result;
use dbc_core::uri::ConnectionUri;

use crate::connection::MockDocumentConnection;

#[derive(Debug, Default, Clone, Copy)]
pub struct MockDriver;

impl MockDriver {
    pub fn new() -> Self {
        MockDriver
    }
}

impl Driver for MockDriver {
    type Connection = MockDocumentConnection;

    fn name(&self) -> &'static str {
        "document-mock"
    }

    fn url_schemes(&self) -> &'static [&'static str] {
        &["mongodb"]
    }

    fn connect(&self, uri: &ConnectionUri) -> Result<MockDocumentConnection> {
        MockDocumentConnection::open(uri)
    }
}
