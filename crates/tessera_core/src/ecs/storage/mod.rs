// mod.rs - Storage module exports

mod column;
mod pool;
mod range;

pub use column::FieldArray;
pub use pool::{ArchetypeDataPool, PoolError};
pub use range::ArrayRange;
