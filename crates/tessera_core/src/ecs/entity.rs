//! Generation-checked entity handles
//!
//! An index is recycled once its entity is destroyed; the generation tells
//! the old handle apart from the entity that reuses the index.

use std::fmt;

/// Handle to one entity record.
///
/// `index` addresses the entity tables and is also the row of the entity in
/// whichever archetype pool holds its data. `generation` is bumped when the
/// entity is destroyed and carried over when the index is reused, so a
/// handle stops validating as soon as its entity is gone.
///
/// ```ignore
/// let chunk = entities.create_entity(None, (Chunk::default(),))?;
/// entities.destroy_entity(chunk)?;
/// assert!(!entities.is_alive(chunk));
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Entity {
    index: u32,
    generation: u32,
}

impl Entity {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Generation in the high word, index in the low word.
    pub fn to_bits(&self) -> u64 {
        ((self.generation as u64) << 32) | (self.index as u64)
    }

    pub fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_pack_index_low_generation_high() {
        let entity = Entity::new(7, 3);
        assert_eq!(entity.to_bits(), (3u64 << 32) | 7);
        assert_eq!(Entity::from_bits(entity.to_bits()), entity);
        assert_eq!(entity.to_string(), "7v3");
    }
}
