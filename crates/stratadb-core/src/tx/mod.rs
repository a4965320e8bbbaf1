mod bitmap;
mod flag;
mod layer;
mod map;
mod set;

#[cfg(test)]
mod tests;

pub use bitmap::{BitmapChanges, TransactionalBitmap};
pub use flag::{FlagChanges, TransactionalFlag};
pub use layer::{ContainerId, Transaction};
pub use map::{MapChanges, TransactionalMap};
pub use set::{SetChanges, TransactionalSet};
