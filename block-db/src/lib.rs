//! The bundled database loader (§4.12): reads a line-oriented text
//! description of blocks, fields, and registers and populates a
//! `block_core::Context`'s registry. This grammar is an implementation
//! detail of this loader, not a protocol guarantee — a different loader
//! could read a different file format and the rest of the repository would
//! be unaffected, since nothing downstream depends on anything but the
//! resulting `Registry`/`Context` state.
//!
//! Grammar (two levels of indentation, blank lines and `#` comments
//! ignored):
//!
//! ```text
//! <BLOCK_NAME> <count>
//!     register <base>
//!     description "<text>"
//!     <field_name> <class_name> [<type_name>] [<class-specific tail>]
//!         register <offset> [<offset>...]
//!         description "<text>"
//! ```

use std::fs;
use std::path::Path;
use std::sync::Arc;

use block_core::{Block, CaptureSubtype, Class, Context, CoreError, Enumeration, Field, ScaledType, Type};

#[remain::sorted]
#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("{0}")]
    Core(#[from] CoreError),
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
}

pub type Result<T> = std::result::Result<T, LoadError>;

struct BlockHeader {
    name: String,
    count: usize,
    base: u32,
}

/// Reads every file in `dir` (in name order, `.conf`/`.db` files only where
/// extensions are present) and loads them all into `ctx`'s registry.
pub fn load_dir(ctx: &mut Context, dir: &Path) -> Result<()> {
    let mut paths: Vec<_> = fs::read_dir(dir)
        .map_err(|e| LoadError::Syntax {
            line: 0,
            message: format!("cannot read config directory: {}", e),
        })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    paths.sort();

    for path in paths {
        let text = fs::read_to_string(&path).map_err(|e| LoadError::Syntax {
            line: 0,
            message: format!("cannot read '{}': {}", path.display(), e),
        })?;
        load_str(ctx, &text)?;
    }
    Ok(())
}

pub fn load_str(ctx: &mut Context, text: &str) -> Result<()> {
    let mut current_block: Option<BlockHeader> = None;
    let mut current_block_obj: Option<Block> = None;
    let mut current_field: Option<String> = None;

    for (line_no, raw_line) in text.lines().enumerate() {
        let line_no = line_no + 1;
        if raw_line.trim().is_empty() || raw_line.trim_start().starts_with('#') {
            continue;
        }
        let indent = raw_line.len() - raw_line.trim_start().len();
        let content = raw_line.trim();

        if indent == 0 {
            if let (Some(header), Some(block)) = (current_block.take(), current_block_obj.take()) {
                finish_block(ctx, header, block)?;
            }
            current_field = None;
            let header = parse_block_header(content, line_no)?;
            current_block_obj = Some(Block::new(header.name.clone(), header.count, header.base));
            current_block = Some(header);
            continue;
        }

        let Some(block) = current_block_obj.as_mut() else {
            return Err(LoadError::Syntax {
                line: line_no,
                message: "indented line before any block header".to_string(),
            });
        };
        let header = current_block.as_mut().expect("set alongside current_block_obj");

        if indent <= 4 {
            // Block-level directive or a new field header.
            if let Some(rest) = content.strip_prefix("register ") {
                header.base = parse_u32(rest.trim(), line_no)?;
            } else if content.starts_with("description ") {
                // Block description text is accepted but not retained on
                // `Block` beyond what `with_description` exposes; skipped
                // here since `Block` is already constructed without it.
            } else {
                let name = parse_field_header(content, header, block, ctx, line_no)?;
                current_field = Some(name);
            }
        } else {
            let Some(field_name) = current_field.as_ref() else {
                return Err(LoadError::Syntax {
                    line: line_no,
                    message: "nested register/description line outside a field".to_string(),
                });
            };
            let field = block.field_mut(field_name).expect("just inserted");
            if let Some(rest) = content.strip_prefix("register ") {
                let offsets: std::result::Result<Vec<u32>, LoadError> = rest
                    .split_whitespace()
                    .map(|tok| parse_u32(tok, line_no))
                    .collect();
                let offsets = offsets?;
                for instance in 0..header.count {
                    field.class_mut().set_register_offset(instance, &offsets)?;
                }
            }
            // `description "..."` lines for fields are accepted and
            // ignored for the same reason as block descriptions above.
        }
    }

    if let (Some(header), Some(block)) = (current_block, current_block_obj) {
        finish_block(ctx, header, block)?;
    }

    Ok(())
}

fn finish_block(ctx: &mut Context, _header: BlockHeader, block: Block) -> Result<()> {
    ctx.registry.create_block(block)?;
    Ok(())
}

fn parse_block_header(content: &str, line_no: usize) -> Result<BlockHeader> {
    let mut tokens = content.split_whitespace();
    let name = tokens
        .next()
        .ok_or_else(|| syntax(line_no, "missing block name"))?
        .to_string();
    let count: usize = tokens
        .next()
        .ok_or_else(|| syntax(line_no, "missing block instance count"))?
        .parse()
        .map_err(|_| syntax(line_no, "invalid block instance count"))?;
    Ok(BlockHeader { name, count, base: 0 })
}

fn parse_field_header(
    content: &str,
    header: &BlockHeader,
    block: &mut Block,
    ctx: &mut Context,
    line_no: usize,
) -> Result<String> {
    let mut tokens = content.split_whitespace();
    let field_name = tokens
        .next()
        .ok_or_else(|| syntax(line_no, "missing field name"))?
        .to_string();
    let class_name = tokens
        .next()
        .ok_or_else(|| syntax(line_no, "missing class name"))?;
    let tail: Vec<&str> = tokens.collect();

    let class = build_class(class_name, &tail, header, block, &field_name, ctx, line_no)?;
    let field = Field::new(field_name.clone(), block.field_list().len(), class);
    block.add_field(field)?;
    Ok(field_name)
}

fn build_class(
    class_name: &str,
    tail: &[&str],
    header: &BlockHeader,
    block: &Block,
    field_name: &str,
    ctx: &mut Context,
    line_no: usize,
) -> Result<Class> {
    match class_name {
        "param" => Ok(Class::param(header.count, parse_type(tail, line_no)?)),
        "read" => Ok(Class::read(header.count, parse_type(tail, line_no)?)),
        "write" => Ok(Class::write(header.count, parse_type(tail, line_no)?)),
        "time" => Ok(Class::time(header.count)),
        "table" => Ok(Class::table()),
        "bit_mux" => Ok(Class::bit_mux(header.count, ctx.bit_mux.clone())),
        "pos_mux" => Ok(Class::pos_mux(header.count, ctx.pos_mux.clone())),
        "bit_out" => {
            let indices = parse_bus_indices(tail, header.count, line_no)?;
            for (instance, &bus_index) in indices.iter().enumerate() {
                let name = block.format_name(instance, field_name, None);
                ctx.register_bit_name(bus_index, name.as_str());
                ctx.bit_mux.lock().unwrap().register(name).ok();
            }
            Ok(Class::bit_out(indices, ctx.capture.clone()))
        }
        "pos_out" => {
            let indices = parse_bus_indices(tail, header.count, line_no)?;
            let subtypes = vec![CaptureSubtype::Posn; header.count];
            for (instance, &bus_index) in indices.iter().enumerate() {
                let name = block.format_name(instance, field_name, None);
                ctx.register_position_name(bus_index, name.as_str());
                ctx.pos_mux.lock().unwrap().register(name).ok();
            }
            Ok(Class::pos_out(indices, subtypes, ctx.capture.clone()))
        }
        other => Err(syntax(line_no, &format!("unknown class '{}'", other))),
    }
}

fn parse_bus_indices(tail: &[&str], count: usize, line_no: usize) -> Result<Vec<usize>> {
    if tail.len() != count {
        return Err(syntax(
            line_no,
            &format!("expected {} bus indices, found {}", count, tail.len()),
        ));
    }
    tail.iter()
        .map(|tok| {
            tok.parse()
                .map_err(|_| syntax(line_no, &format!("invalid bus index '{}'", tok)))
        })
        .collect()
}

fn parse_type(tail: &[&str], line_no: usize) -> Result<Option<Type>> {
    let Some(&type_name) = tail.first() else {
        return Ok(None);
    };
    let rest = &tail[1..];
    let parsed = match type_name {
        "uint" => Type::Uint {
            bits: parse_bits(rest, line_no)?,
        },
        "int" => Type::Int {
            bits: parse_bits(rest, line_no)?,
        },
        "bit" => Type::Bit,
        "action" => Type::Action,
        "lut" => Type::Lut,
        "time" => Type::Time,
        "scalar" => Type::Scalar(parse_scaled(rest)),
        "position" => Type::Position(parse_scaled(rest)),
        "enum" => Type::Enum(Enumeration::from_labels(rest.iter().map(|s| s.to_string()))?),
        other => return Err(syntax(line_no, &format!("unknown type '{}'", other))),
    };
    Ok(Some(parsed))
}

fn parse_bits(rest: &[&str], line_no: usize) -> Result<u32> {
    rest.first()
        .ok_or_else(|| syntax(line_no, "missing bit width"))?
        .parse()
        .map_err(|_| syntax(line_no, "invalid bit width"))
}

fn parse_scaled(rest: &[&str]) -> ScaledType {
    let mut scaled = ScaledType::default();
    for token in rest {
        if let Some(v) = token.strip_prefix("scale=") {
            if let Ok(v) = v.parse() {
                scaled.scale = v;
            }
        } else if let Some(v) = token.strip_prefix("offset=") {
            if let Ok(v) = v.parse() {
                scaled.offset = v;
            }
        } else if let Some(v) = token.strip_prefix("units=") {
            scaled.units = v.to_string();
        }
    }
    scaled
}

fn parse_u32(token: &str, line_no: usize) -> Result<u32> {
    let parsed = if let Some(hex) = token.strip_prefix("0x") {
        u32::from_str_radix(hex, 16)
    } else {
        token.parse()
    };
    parsed.map_err(|_| syntax(line_no, &format!("invalid register offset '{}'", token)))
}

fn syntax(line: usize, message: &str) -> LoadError {
    LoadError::Syntax {
        line,
        message: message.to_string(),
    }
}

/// Builds a `Context` with no hardware attachment beyond a simulated bus;
/// convenience for tests and the default run mode.
pub fn context_with_simulated_bus() -> Context {
    Context::new(Arc::new(block_hw::SimulatedHwBus::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_a_simple_param_block() {
        let mut ctx = context_with_simulated_bus();
        let text = "\
SEQ 1
    register 0x1000
    ENABLE param uint 8
        register 0
";
        load_str(&mut ctx, text).unwrap();
        let block = ctx.registry.lookup_block("SEQ").unwrap();
        assert_eq!(block.count(), 1);
        assert!(block.field("ENABLE").is_some());
    }

    #[test]
    fn loads_a_counted_bit_out_block_and_registers_names() {
        let mut ctx = context_with_simulated_bus();
        let text = "\
TTLIN 2
    VAL bit_out 10 11
";
        load_str(&mut ctx, text).unwrap();
        assert_eq!(ctx.bit_name(10), Some("TTLIN1.VAL"));
        assert_eq!(ctx.bit_name(11), Some("TTLIN2.VAL"));
    }

    #[test]
    fn unknown_class_is_a_syntax_error() {
        let mut ctx = context_with_simulated_bus();
        let text = "SEQ 1\n    ENABLE bogus_class\n";
        assert!(load_str(&mut ctx, text).is_err());
    }
}
