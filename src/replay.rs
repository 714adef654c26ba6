//! Mock database server answering clients from captured fixtures.

pub mod fixture_server;

pub use fixture_server::FixtureServer;
