/// Core MCP runtime: schema generation, content serialisation, typed
/// errors, the tool registry, the JSON-RPC dispatcher, layered
/// configuration, parameter mapping, and the HTTP/STDIO server wiring.
pub mod config;
pub mod content;
pub mod dispatcher;
pub mod error;
pub mod mapper;
pub mod registry;
pub mod schema;
pub mod server;
