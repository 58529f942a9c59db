//! The config-port socket server (§5, §6): one OS thread per connection,
//! synchronous request/response, torn down by closing the listening socket
//! on shutdown.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use block_core::Context;
use block_proto::{DispatchOutcome, Dispatcher};
use log::{error, info, warn};

/// Binds the config port and serves connections until `listener` is closed
/// by another thread (the shutdown path drops it to unblock `accept`).
pub fn serve(listener: TcpListener, ctx: Arc<Context>, verbose: bool) {
    loop {
        match listener.accept() {
            Ok((stream, addr)) => {
                info!("accepted connection from {}", addr);
                let ctx = Arc::clone(&ctx);
                thread::spawn(move || {
                    if let Err(e) = handle_connection(stream, &ctx, verbose) {
                        warn!("connection error: {}", e);
                    }
                });
            }
            Err(e) => {
                // A closed listener (shutdown) surfaces as an error here;
                // any other error is logged and the loop continues.
                error!("accept failed, stopping listener: {}", e);
                return;
            }
        }
    }
}

fn handle_connection(stream: TcpStream, ctx: &Context, verbose: bool) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;
    let mut dispatcher = Dispatcher::new();

    let mut line = String::new();
    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            return Ok(()); // EOF: client disconnected or shutdown closed us out
        }

        match dispatcher.dispatch(ctx, &line, verbose) {
            DispatchOutcome::Respond(response) => {
                response.write_to(&mut writer)?;
                writer.flush()?;
            }
            DispatchOutcome::BeginTable(mut table) => {
                loop {
                    let mut payload_line = String::new();
                    let bytes_read = reader.read_line(&mut payload_line)?;
                    if bytes_read == 0 {
                        break; // abnormal termination: EOF mid-table
                    }
                    let trimmed = payload_line.trim_end_matches(['\r', '\n']);
                    if trimmed.is_empty() {
                        break;
                    }
                    table.feed_line(trimmed);
                }
                match table.close() {
                    Ok(_word_count) => block_proto::Response::Ok.write_to(&mut writer)?,
                    Err(e) => block_proto::Response::err(e).write_to(&mut writer)?,
                }
                writer.flush()?;
            }
        }
    }
}
