use crate::{
    index::{Bitmap, ReferenceKey},
    query::sort::Sorter,
};

///
/// MergeMode
///
/// How atomic blocks map onto the final order: `AppendAll` emits every block
/// in traversal order, `AppendFirst` keeps one entry per distinct referenced
/// entity (the first block that reaches it wins).
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MergeMode {
    AppendAll,
    AppendFirst,
}

///
/// WithinBlockOrder
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WithinBlockOrder {
    PkAsc,
    PkDesc,
}

///
/// AtomicBlock
///
/// Contiguous run of results belonging to one reference key. A block may
/// span several reduced indices (one per scope carrying the relation); they
/// merge before the within-block order applies.
///

#[derive(Debug)]
pub struct AtomicBlock {
    pub reference_key: ReferenceKey,
    pub entity_ids: Bitmap,
}

///
/// SequentialSorter
///
/// Emits atomic blocks in their prepared order. Entities already emitted by
/// an earlier block are skipped, so an entity referencing several blocks
/// appears at its first position only.
///

#[derive(Debug)]
pub struct SequentialSorter {
    blocks: Vec<AtomicBlock>,
    mode: MergeMode,
    within: WithinBlockOrder,
}

impl SequentialSorter {
    #[must_use]
    pub const fn new(blocks: Vec<AtomicBlock>, mode: MergeMode, within: WithinBlockOrder) -> Self {
        Self {
            blocks,
            mode,
            within,
        }
    }

    #[must_use]
    pub const fn mode(&self) -> MergeMode {
        self.mode
    }

    #[must_use]
    pub fn blocks(&self) -> &[AtomicBlock] {
        &self.blocks
    }
}

impl Sorter for SequentialSorter {
    fn sort_into(&self, input: &Bitmap, out: &mut Vec<u32>, emitted: &mut Bitmap) {
        for block in &self.blocks {
            let members = &(&block.entity_ids & input) - &*emitted;
            if members.is_empty() {
                continue;
            }
            match self.within {
                WithinBlockOrder::PkAsc => out.extend(members.iter()),
                WithinBlockOrder::PkDesc => {
                    let mut keys = members.to_vec();
                    keys.reverse();
                    out.extend(keys);
                }
            }
            *emitted |= &members;
        }
    }
}
