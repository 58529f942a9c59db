//! The line-oriented command dispatcher (§4.9), grounded in
//! `config_server.c`'s `process_config_command`/`do_read_command`/
//! `do_write_command`.
//!
//! One `Dispatcher` is created per connection; it owns that connection's
//! `ChangeTracker` state (the per-category `report_index[]`) and is fed one
//! line at a time by the socket server.

use block_core::{Block, ChangeTracker, Context, CoreError, Field, GetValue};
use log::debug;

use crate::response::Response;
use crate::system_commands;
use crate::table_writer::{parse_table_header, TableWriter};

/// What the connection handler should do after one line is dispatched.
pub enum DispatchOutcome {
    /// The command was fully handled; write `Response` and read the next
    /// line.
    Respond(Response),
    /// A `<` command opened a table ingest session; the handler must keep
    /// reading payload lines (feeding them to the writer) until a blank
    /// line or EOF, then call `TableWriter::close` and report the result.
    BeginTable(TableWriter),
}

#[derive(Default)]
pub struct Dispatcher {
    tracker: ChangeTracker,
}

impl Dispatcher {
    pub fn new() -> Self {
        Dispatcher::default()
    }

    pub fn dispatch(&mut self, ctx: &Context, line: &str, verbose: bool) -> DispatchOutcome {
        let line = line.trim_end_matches(['\r', '\n']);
        if verbose {
            debug!("> {}", line);
        }

        let (is_system, rest) = match line.strip_prefix('*') {
            Some(rest) => (true, rest),
            None => (false, line),
        };

        let separator_at = rest.find(['?', '=', '<']);
        let Some(separator_at) = separator_at else {
            return DispatchOutcome::Respond(Response::err("Unknown command"));
        };
        let name = &rest[..separator_at];
        let sep = rest.as_bytes()[separator_at] as char;
        let value = &rest[separator_at + 1..];

        if is_system {
            return DispatchOutcome::Respond(self.dispatch_system(ctx, name, sep, value));
        }

        self.dispatch_entity(ctx, name, sep, value)
    }

    fn dispatch_system(&mut self, ctx: &Context, name: &str, sep: char, value: &str) -> Response {
        let mut segments = name.splitn(2, '.');
        let head = segments.next().unwrap_or("");
        let tail = segments.next();

        match (head, sep, tail) {
            ("BLOCKS", '?', None) => system_commands::blocks(ctx),
            ("CHANGES", '?', tail) => system_commands::changes(ctx, &mut self.tracker, tail),
            ("CAPTURE", '?', None) => system_commands::capture_list(ctx),
            ("CAPTURE", '=', None) if value.is_empty() => system_commands::capture_reset(ctx),
            ("CAPTURE", '?', Some("POSITIONS")) => system_commands::capture_positions(ctx),
            ("CAPTURE", '?', Some(group_tail)) if group_tail.starts_with("BITS") => {
                match group_tail["BITS".len()..].parse::<usize>() {
                    Ok(group) => system_commands::capture_bits(ctx, group),
                    Err(_) => Response::err(format!("malformed bit group '{}'", group_tail)),
                }
            }
            _ => Response::err(format!("Unknown command '*{}'", name)),
        }
    }

    fn dispatch_entity(&mut self, ctx: &Context, name: &str, sep: char, value: &str) -> DispatchOutcome {
        let resolved = resolve_entity(ctx, name);
        let (block, instance, field, attr) = match resolved {
            Ok(found) => found,
            // A table command must still open a (dummy-sink) session on a
            // lookup failure: the client is about to send payload lines
            // regardless, and they have to be drained rather than parsed
            // as fresh commands.
            Err(e) if sep == '<' => return DispatchOutcome::BeginTable(TableWriter::dummy(e)),
            Err(e) => return DispatchOutcome::Respond(Response::err(e)),
        };

        match sep {
            '?' => DispatchOutcome::Respond(self.handle_get(block, instance, field, attr)),
            '=' => DispatchOutcome::Respond(self.handle_put(ctx, block, instance, field, attr, value)),
            '<' => self.handle_table_open(field, value),
            _ => unreachable!("dispatch only ever sees ?, =, or <"),
        }
    }

    fn handle_get(&self, _block: &Block, instance: usize, field: &Field, attr: Option<&str>) -> Response {
        let Some(attr_name) = attr else {
            return match field.class().get(instance) {
                Ok(GetValue::One(value)) => Response::OkValue(value),
                Ok(GetValue::Many(lines)) => Response::Many(lines),
                Err(e) => Response::err(e),
            };
        };

        // CAPTURE/CAPTURE_INDEX are served by the class directly rather
        // than through the generic attribute table (see block-core's
        // `Class::attr`); try that path first, then the field's own
        // attributes (type-contributed accessors such as SCALE/OFFSET).
        let result = field
            .class()
            .capture_get(instance, attr_name)
            .or_else(|_| field.lookup_attr(attr_name).and_then(|a| a.format(instance)));

        match result {
            Ok(value) => Response::OkValue(value),
            Err(e) => Response::err(e),
        }
    }

    fn handle_put(
        &self,
        ctx: &Context,
        block: &Block,
        instance: usize,
        field: &Field,
        attr: Option<&str>,
        value: &str,
    ) -> Response {
        let outcome = match attr {
            Some(attr_name) => field
                .class()
                .capture_put(instance, attr_name, value, &ctx.clock)
                .or_else(|_| {
                    field
                        .lookup_attr(attr_name)
                        .and_then(|a| a.put(instance, value, &ctx.clock))
                }),
            None => field
                .class()
                .put(instance, value, block.base(), ctx.bus.as_ref(), &ctx.clock),
        };

        match outcome {
            Ok(()) => Response::Ok,
            Err(e) => Response::err(e),
        }
    }

    fn handle_table_open(&self, field: &Field, header: &str) -> DispatchOutcome {
        let parsed = parse_table_header(header);
        let (append, base64, header_error) = match parsed {
            Ok((append, base64)) => (append, base64, None),
            Err(e) => (false, false, Some(e)),
        };
        let writer = TableWriter::open(field.class(), append, base64, header_error);
        DispatchOutcome::BeginTable(writer)
    }
}

fn resolve_entity<'a>(
    ctx: &'a Context,
    name: &str,
) -> Result<(&'a Block, usize, &'a Field, Option<&'a str>), CoreError> {
    let mut parts = name.splitn(3, '.');
    let block_token = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CoreError::parse("Unknown command"))?;
    let field_name = parts
        .next()
        .ok_or_else(|| CoreError::parse(format!("missing field name in '{}'", name)))?;
    let attr_name = parts.next();

    let (block, instance) = resolve_block(ctx, block_token)?;
    let field = block
        .field(field_name)
        .ok_or_else(|| CoreError::lookup(format!("no such field '{}.{}'", block.name(), field_name)))?;
    Ok((block, instance, field, attr_name))
}

/// Resolves `TOKEN` to a block and a 0-based instance number: tries the
/// token as a bare block name first (the `count == 1` case), then strips a
/// trailing 1-based instance number.
fn resolve_block<'a>(ctx: &'a Context, token: &str) -> Result<(&'a Block, usize), CoreError> {
    if let Ok(block) = ctx.registry.lookup_block(token) {
        return Ok((block, 0));
    }
    let split_at = token
        .rfind(|c: char| !c.is_ascii_digit())
        .map(|i| i + 1)
        .unwrap_or(0);
    if split_at == 0 || split_at == token.len() {
        return Err(CoreError::lookup(format!("no such block '{}'", token)));
    }
    let (name_part, digits) = token.split_at(split_at);
    let instance: usize = digits
        .parse()
        .map_err(|_| CoreError::lookup(format!("no such block '{}'", token)))?;
    let block = ctx.registry.lookup_block(name_part)?;
    if instance == 0 || instance > block.count() {
        return Err(CoreError::range(format!(
            "instance {} out of range for block '{}'",
            instance, name_part
        )));
    }
    Ok((block, instance - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use block_core::{Class, Type};
    use std::sync::Arc;

    fn single_field_context() -> Context {
        let mut ctx = Context::new(Arc::new(block_hw::SimulatedHwBus::new()));
        let mut block = Block::new("SEQ", 1, 0x1000);
        let mut class = Class::param(1, Some(Type::Uint { bits: 8 }));
        class.set_register_offset(0, &[0]).unwrap();
        block.add_field(Field::new("ENABLE", 0, class)).unwrap();
        ctx.registry.create_block(block).unwrap();
        ctx
    }

    fn respond(outcome: DispatchOutcome) -> Response {
        match outcome {
            DispatchOutcome::Respond(r) => r,
            DispatchOutcome::BeginTable(_) => panic!("expected a plain response"),
        }
    }

    #[test]
    fn unknown_command_without_a_separator_is_an_error() {
        let ctx = single_field_context();
        let mut dispatcher = Dispatcher::new();
        match respond(dispatcher.dispatch(&ctx, "garbage", false)) {
            Response::Err(_) => {}
            _ => panic!("expected an error"),
        }
    }

    #[test]
    fn write_then_read_round_trips() {
        let ctx = single_field_context();
        let mut dispatcher = Dispatcher::new();
        match respond(dispatcher.dispatch(&ctx, "SEQ.ENABLE=200", false)) {
            Response::Ok => {}
            _ => panic!("expected OK"),
        }
        match respond(dispatcher.dispatch(&ctx, "SEQ.ENABLE?", false)) {
            Response::OkValue(v) => assert_eq!(v, "200"),
            _ => panic!("expected a value"),
        }
    }

    #[test]
    fn star_blocks_lists_registered_blocks() {
        let ctx = single_field_context();
        let mut dispatcher = Dispatcher::new();
        match respond(dispatcher.dispatch(&ctx, "*BLOCKS?", false)) {
            Response::Many(lines) => assert_eq!(lines, vec!["SEQ 1".to_string()]),
            _ => panic!("expected a multi-line response"),
        }
    }

    #[test]
    fn table_open_returns_begin_table_outcome() {
        let mut ctx = Context::new(Arc::new(block_hw::SimulatedHwBus::new()));
        let mut block = Block::new("SEQ", 1, 0);
        block.add_field(Field::new("TABLE", 0, Class::table())).unwrap();
        ctx.registry.create_block(block).unwrap();

        let mut dispatcher = Dispatcher::new();
        match dispatcher.dispatch(&ctx, "SEQ.TABLE<", false) {
            DispatchOutcome::BeginTable(_) => {}
            DispatchOutcome::Respond(_) => panic!("expected a table session"),
        }
    }
}
