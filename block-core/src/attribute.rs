//! Field and type attributes (§4.5): named, per-instance accessors layered
//! on top of a field's class (e.g. `CAPTURE`, `CAPTURE_INDEX`, a scalar
//! type's `SCALE`/`OFFSET`/`UNITS`).
//!
//! An attribute does not own the value it exposes — it is a thin accessor
//! over whatever class or type state actually holds it — so `Attribute` is
//! built from plain closures rather than a trait object hierarchy, mirroring
//! how the rest of this crate prefers closed enums to `dyn` dispatch, but
//! closures here since the "owner" is truly per-instance callback state
//! rather than a fixed family of variants.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{CoreError, Result};

type FormatFn = Box<dyn Fn(usize) -> Result<String> + Send + Sync>;
type PutFn = Box<dyn Fn(usize, &str) -> Result<()> + Send + Sync>;

/// One named accessor on a field or type.
///
/// `bumps_change` records whether successful `put` calls should advance this
/// attribute's `update_index` and thus be visible to `*CHANGES.ATTR?`.
pub struct Attribute {
    name: String,
    bumps_change: bool,
    format: FormatFn,
    put: Option<PutFn>,
    update_index: AtomicU64,
}

impl Attribute {
    pub fn read_only(name: impl Into<String>, bumps_change: bool, format: FormatFn) -> Self {
        Attribute {
            name: name.into(),
            bumps_change,
            format,
            put: None,
            update_index: AtomicU64::new(0),
        }
    }

    pub fn read_write(
        name: impl Into<String>,
        bumps_change: bool,
        format: FormatFn,
        put: PutFn,
    ) -> Self {
        Attribute {
            name: name.into(),
            bumps_change,
            format,
            put: Some(put),
            update_index: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn format(&self, instance: usize) -> Result<String> {
        (self.format)(instance)
    }

    pub fn put(&self, instance: usize, value: &str, clock: &crate::ChangeClock) -> Result<()> {
        let put = self
            .put
            .as_ref()
            .ok_or_else(|| CoreError::state(format!("attribute '{}' is read-only", self.name)))?;
        put(instance, value)?;
        if self.bumps_change {
            self.update_index.store(clock.tick(), Ordering::SeqCst);
        }
        Ok(())
    }

    pub fn update_index(&self) -> u64 {
        self.update_index.load(Ordering::SeqCst)
    }

    pub fn is_writable(&self) -> bool {
        self.put.is_some()
    }
}

impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("bumps_change", &self.bumps_change)
            .field("writable", &self.put.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChangeClock;
    use std::sync::Mutex;

    #[test]
    fn read_only_attribute_rejects_put() {
        let attr = Attribute::read_only("CAPTURE_INDEX", false, Box::new(|_| Ok("3".to_string())));
        assert_eq!(attr.format(0).unwrap(), "3");
        let clock = ChangeClock::new();
        assert!(attr.put(0, "1", &clock).is_err());
    }

    #[test]
    fn writable_attribute_bumps_update_index_on_success() {
        let store = Mutex::new(0u32);
        let attr = Attribute::read_write(
            "CAPTURE",
            true,
            Box::new(|_| Ok("0".to_string())),
            Box::new(move |_, v| {
                *store.lock().unwrap() = v.parse().map_err(|_| CoreError::parse("bad"))?;
                Ok(())
            }),
        );
        let clock = ChangeClock::new();
        assert_eq!(attr.update_index(), 0);
        attr.put(0, "1", &clock).unwrap();
        assert_eq!(attr.update_index(), 1);
    }
}
