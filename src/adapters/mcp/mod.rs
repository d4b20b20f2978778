//! MCP transports.
//!
//! Two interchangeable surfaces over the same gateway: a JSON-RPC 2.0
//! stdio server for MCP clients and an HTTP/JSON server. Neither contains
//! business logic; every tool and route delegates to
//! [`crate::SemanticGateway`].

pub mod http_server;
pub mod stdio_server;

pub use http_server::HttpServer;
pub use stdio_server::StdioServer;
