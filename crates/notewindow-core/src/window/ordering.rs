//! Placement rules for the visible sequence

use crate::models::{EventId, RawRecord, ThreadInfo, ThreadRefs};

/// Timeline: newest first. A new entry goes right before the first entry that is
/// strictly older, so equal timestamps keep arrival order.
pub fn timeline_position<K: Copy>(sequence: &[K], created_at: u64, time_of: impl Fn(K) -> u64) -> usize {
    sequence.partition_point(|k| time_of(*k) >= created_at)
}

/// What thread placement needs to know about an entry already in the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placed {
    pub created_at: u64,
    pub depth: u32,
}

/// Thread: the root at the top, each reply after its parent and after the parent's
/// earlier replies (with their subtrees). An unknown parent means tail append.
pub fn thread_position<K: Copy>(
    sequence: &[K],
    info: &ThreadInfo,
    created_at: u64,
    parent_index: Option<usize>,
    placed: impl Fn(K) -> Placed,
) -> usize {
    if info.is_root() {
        return 0;
    }
    let Some(parent_index) = parent_index else {
        return sequence.len();
    };
    let parent_depth = placed(sequence[parent_index]).depth;

    let mut index = parent_index + 1;
    while index < sequence.len() {
        let other = placed(sequence[index]);
        if other.depth <= parent_depth {
            // Left the parent's subtree
            break;
        }
        if other.depth == parent_depth + 1 && other.created_at > created_at {
            break;
        }
        index += 1;
    }
    index
}

/// Thread placement of `record` inside the thread of `root`.
/// `parent_depth` is the depth of the parent when it is already in the window.
pub fn thread_info_for(record: &RawRecord, root: EventId, parent_depth: Option<u32>, max_depth: u32) -> ThreadInfo {
    if record.id == root {
        return ThreadInfo {
            root: None,
            parent: None,
            depth: 0,
        };
    }

    let refs = ThreadRefs::from_record(record);
    let depth = match parent_depth {
        Some(depth) => depth.saturating_add(1).min(max_depth),
        None => 1,
    };
    ThreadInfo {
        root: refs.root.or(Some(root)),
        parent: refs.parent().or(Some(root)),
        depth,
    }
}
