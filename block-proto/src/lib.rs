//! The line-oriented configuration protocol (§4.9, §4.10, §6): parses
//! client commands, dispatches them against a `block_core::Context`, and
//! renders responses back into wire text. No knowledge of sockets lives
//! here — the connection loop (see the `blockctl` binary) owns reading
//! lines and writing `Response`s.

mod dispatcher;
mod response;
mod system_commands;
mod table_writer;

pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use response::Response;
pub use table_writer::{parse_table_header, TableWriter};
