//! The closed set of `*`-prefixed system commands (§6), grounded in
//! `config_server.c`'s `*BLOCKS`/`*CHANGES`/`*CAPTURE` handling.

use block_core::{CategorySet, Category, ChangeEntry, ChangeTracker, Context};
use block_hw::BIT_BUS_GROUPS;

use crate::response::Response;

/// `*BLOCKS?`: `<block-name> <count>` per block, in registration order.
pub fn blocks(ctx: &Context) -> Response {
    let lines = ctx
        .registry
        .block_list()
        .into_iter()
        .map(|(name, count)| format!("{} {}", name, count))
        .collect();
    Response::Many(lines)
}

/// `*CHANGES?` / `*CHANGES.<category>?`.
pub fn changes(ctx: &Context, tracker: &mut ChangeTracker, category_suffix: Option<&str>) -> Response {
    let requested = match category_suffix {
        None => CategorySet::all(),
        Some(name) => match Category::parse(name) {
            Some(category) => category.as_set(),
            None => return Response::err(format!("unknown change category '{}'", name)),
        },
    };

    ctx.refresh_all();
    let entries = tracker.report(&ctx.registry, &ctx.clock, requested);
    let lines = entries
        .into_iter()
        .map(|entry| match entry {
            ChangeEntry::Value { name, value } => format!("{}={}", name, value),
            ChangeEntry::AttrValue { name, value } => format!("{}={}", name, value),
            ChangeEntry::TableChanged { name } => format!("{}<", name),
            ChangeEntry::FormatError { name } => format!("{} (error)", name),
        })
        .collect();
    Response::Many(lines)
}

/// `*CAPTURE?`: captured position names followed by `*BITS<g>` markers, in
/// capture-index order.
pub fn capture_list(ctx: &Context) -> Response {
    let lines = ctx
        .capture
        .capture_list(|index| ctx.position_name(index).map(str::to_string));
    Response::Many(lines)
}

/// `*CAPTURE.BITS<g>?`: the 32 names in bit group `g`, empty string where a
/// bus entry has no owning field.
pub fn capture_bits(ctx: &Context, group: usize) -> Response {
    if group >= BIT_BUS_GROUPS {
        return Response::err(format!("no such bit group '{}'", group));
    }
    let lines = (0..32)
        .map(|offset| ctx.bit_name(group * 32 + offset).unwrap_or("").to_string())
        .collect();
    Response::Many(lines)
}

/// `*CAPTURE.POSITIONS?`: all 32 position names, empty where absent.
pub fn capture_positions(ctx: &Context) -> Response {
    let lines = (0..32)
        .map(|i| ctx.position_name(i).unwrap_or("").to_string())
        .collect();
    Response::Many(lines)
}

/// `*CAPTURE=`: clears every capture mask.
pub fn capture_reset(ctx: &Context) -> Response {
    ctx.capture.reset_capture(&ctx.clock);
    Response::Ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use block_core::Block;
    use std::sync::Arc;

    #[test]
    fn blocks_lists_every_registered_block() {
        let mut ctx = Context::new(Arc::new(block_hw::SimulatedHwBus::new()));
        ctx.registry.create_block(Block::new("SEQ", 4, 0)).unwrap();
        match blocks(&ctx) {
            Response::Many(lines) => assert_eq!(lines, vec!["SEQ 4".to_string()]),
            _ => panic!("expected a multi-line response"),
        }
    }

    #[test]
    fn capture_reset_clears_masks() {
        let ctx = Context::new(Arc::new(block_hw::SimulatedHwBus::new()));
        ctx.capture.set_position_captured(0, true, &ctx.clock);
        matches!(capture_reset(&ctx), Response::Ok);
        assert_eq!(ctx.capture.position_capture_index(0), None);
    }

    #[test]
    fn unknown_change_category_is_an_error() {
        let ctx = Context::new(Arc::new(block_hw::SimulatedHwBus::new()));
        let mut tracker = ChangeTracker::new();
        match changes(&ctx, &mut tracker, Some("NOPE")) {
            Response::Err(_) => {}
            _ => panic!("expected an error response"),
        }
    }
}
