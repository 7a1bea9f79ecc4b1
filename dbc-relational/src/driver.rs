//! `MockDriver`: the [`dbc_core::driver::Driver`] implementation fronting
//! [`MockConnection`].

use dbc_core::driver::Driver;
use dbc_core::error::Result;
use dbc_core::uri::ConnectionUri;

use crate::connection::MockConnection;

#[derive(Debug, Default, Clone, Copy)]
pub struct MockDriver;

impl MockDriver {
    pub fn new() -> Self {
        MockDriver
    }
}

impl Driver for MockDriver {
    type Connection = MockConnection;

    fn name(&self) -> &'static str {
        "relational-mock"
    }

    fn url_schemes(&self) -> &'static [&'static str] {
        &["mysql", "postgresql"]
    }

    fn connect(&self, uri: &ConnectionUri) -> Result<MockConnection> {
        MockConnection::open(uri)
    }
}
