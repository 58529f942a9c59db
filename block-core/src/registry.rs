//! The Field/Block registry (§4.7): the immutable-after-load graph of
//! blocks, fields, and attributes, plus the name lookup and formatting
//! rules the wire protocol and the change tracker both depend on.

use indexmap::IndexMap;

use crate::class::Class;
use crate::error::{CoreError, Result};

/// One field within a block: a class, and the attributes contributed by
/// that class and its type.
pub struct Field {
    name: String,
    seq: usize,
    description: Option<String>,
    class: Class,
}

impl Field {
    pub fn new(name: impl Into<String>, seq: usize, class: Class) -> Self {
        Field {
            name: name.into(),
            seq,
            description: None,
            class,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn seq(&self) -> usize {
        self.seq
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn class(&self) -> &Class {
        &self.class
    }

    pub fn class_mut(&mut self) -> &mut Class {
        &mut self.class
    }

    pub fn attr_list(&self) -> Vec<&str> {
        self.class.attr_names()
    }

    pub fn lookup_attr(&self, name: &str) -> Result<&crate::attribute::Attribute> {
        self.class
            .attr(name)
            .ok_or_else(|| CoreError::lookup(format!("no such attribute '{}.{}'", self.name, name)))
    }
}

/// A named, counted collection of fields sharing a register base.
pub struct Block {
    name: String,
    count: usize,
    base: u32,
    description: Option<String>,
    fields: IndexMap<String, Field>,
}

impl Block {
    pub fn new(name: impl Into<String>, count: usize, base: u32) -> Self {
        Block {
            name: name.into(),
            count,
            base,
            description: None,
            fields: IndexMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn add_field(&mut self, field: Field) -> Result<()> {
        if self.fields.contains_key(field.name()) {
            return Err(CoreError::state(format!(
                "duplicate field '{}.{}'",
                self.name,
                field.name()
            )));
        }
        self.fields.insert(field.name().to_string(), field);
        Ok(())
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.get_mut(name)
    }

    pub fn field_list(&self) -> Vec<(&str, usize, Option<&str>)> {
        self.fields
            .values()
            .map(|f| (f.name(), f.seq(), f.description()))
            .collect()
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    pub fn fields_mut(&mut self) -> impl Iterator<Item = &mut Field> {
        self.fields.values_mut()
    }

    /// Formats `block[<n>].field[.attr]` per §4.7: instance number omitted
    /// iff `count == 1`, otherwise 1-based.
    pub fn format_name(&self, instance: usize, field: &str, attr: Option<&str>) -> String {
        let mut out = if self.count == 1 {
            self.name.clone()
        } else {
            format!("{}{}", self.name, instance + 1)
        };
        out.push('.');
        out.push_str(field);
        if let Some(attr) = attr {
            out.push('.');
            out.push_str(attr);
        }
        out
    }
}

/// The top-level, insertion-ordered collection of blocks, built once at
/// startup by a `DatabaseLoader` and treated as immutable in structure
/// thereafter (only field/attribute *values* change at runtime).
#[derive(Default)]
pub struct Registry {
    blocks: IndexMap<String, Block>,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            blocks: IndexMap::new(),
        }
    }

    pub fn create_block(&mut self, block: Block) -> Result<()> {
        if self.blocks.contains_key(block.name()) {
            return Err(CoreError::state(format!(
                "duplicate block '{}'",
                block.name()
            )));
        }
        self.blocks.insert(block.name().to_string(), block);
        Ok(())
    }

    pub fn lookup_block(&self, name: &str) -> Result<&Block> {
        self.blocks
            .get(name)
            .ok_or_else(|| CoreError::lookup(format!("no such block '{}'", name)))
    }

    pub fn lookup_block_mut(&mut self, name: &str) -> Result<&mut Block> {
        self.blocks
            .get_mut(name)
            .ok_or_else(|| CoreError::lookup(format!("no such block '{}'", name)))
    }

    pub fn lookup_field<'a>(&'a self, block: &str, field: &str) -> Result<(&'a Block, &'a Field)> {
        let block = self.lookup_block(block)?;
        let field_ref = block
            .field(field)
            .ok_or_else(|| CoreError::lookup(format!("no such field '{}.{}'", block.name(), field)))?;
        Ok((block, field_ref))
    }

    pub fn block_list(&self) -> Vec<(&str, usize)> {
        self.blocks.values().map(|b| (b.name(), b.count())).collect()
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    pub fn blocks_mut(&mut self) -> impl Iterator<Item = &mut Block> {
        self.blocks.values_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::Class;

    #[test]
    fn format_name_omits_instance_for_singleton_blocks() {
        let block = Block::new("SEQ", 1, 0);
        assert_eq!(block.format_name(0, "ENABLE", None), "SEQ.ENABLE");
    }

    #[test]
    fn format_name_uses_one_based_instance_for_counted_blocks() {
        let block = Block::new("TTLIN", 6, 0);
        assert_eq!(block.format_name(0, "VAL", None), "TTLIN1.VAL");
        assert_eq!(block.format_name(5, "VAL", Some("CAPTURE")), "TTLIN6.VAL.CAPTURE");
    }

    #[test]
    fn duplicate_block_creation_is_rejected() {
        let mut registry = Registry::new();
        registry.create_block(Block::new("SEQ", 1, 0)).unwrap();
        assert!(registry.create_block(Block::new("SEQ", 1, 4)).is_err());
    }

    #[test]
    fn duplicate_field_creation_is_rejected() {
        let mut block = Block::new("SEQ", 1, 0);
        block
            .add_field(Field::new("ENABLE", 0, Class::param_bit()))
            .unwrap();
        assert!(block
            .add_field(Field::new("ENABLE", 1, Class::param_bit()))
            .is_err());
    }
}
