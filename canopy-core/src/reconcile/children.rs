//! Keyed child reconciliation.
//!
//! A two-pointer scan from both ends of the old and new child lists. At
//! each step the first matching pair wins:
//!
//! 1. old start ~ new start: patch in place
//! 2. old end ~ new end: patch in place
//! 3. old start ~ new end: patch, move after the old end node
//! 4. old end ~ new start: patch, move before the old start node
//! 5. otherwise look the new start key up among the unconsumed old children
//!    (the index is built once, on first use). A hit is patched and moved
//!    before the old start node; a miss is rendered and inserted there.
//!
//! Leftover new children are inserted before the node following the scanned
//! region; leftover old children are removed.

use std::collections::HashMap;

use tracing::warn;

use super::{patch, remove, render, RenderContext};
use crate::error::{Error, Result};
use crate::platform::NodeHandle;
use crate::vdom::{equivalent, Key, VNode};

pub(crate) fn update_children(
    cx: &mut RenderContext<'_>,
    parent: NodeHandle,
    old: &[VNode],
    new: &mut [VNode],
) -> Result<()> {
    let platform = cx.platform();

    // Old children still waiting to be matched. Consumed by the key lookup.
    let mut slots: Vec<Option<&VNode>> = old.iter().map(Some).collect();
    let mut keys: Option<HashMap<&Key, usize>> = None;

    // Half-open ranges.
    let (mut old_start, mut old_end) = (0, old.len());
    let (mut new_start, mut new_end) = (0, new.len());

    while old_start < old_end && new_start < new_end {
        let Some(old_first) = slots[old_start] else {
            old_start += 1;
            continue;
        };
        let Some(old_last) = slots[old_end - 1] else {
            old_end -= 1;
            continue;
        };

        if equivalent(old_first, &new[new_start]) {
            patch(cx, old_first, &mut new[new_start])?;
            old_start += 1;
            new_start += 1;
        } else if equivalent(old_last, &new[new_end - 1]) {
            patch(cx, old_last, &mut new[new_end - 1])?;
            old_end -= 1;
            new_end -= 1;
        } else if equivalent(old_first, &new[new_end - 1]) {
            let moved = patch(cx, old_first, &mut new[new_end - 1])?;
            let anchor = old_last.output.and_then(|node| platform.next_sibling(node));
            platform.insert_before(parent, moved, anchor);
            old_start += 1;
            new_end -= 1;
        } else if equivalent(old_last, &new[new_start]) {
            let moved = patch(cx, old_last, &mut new[new_start])?;
            platform.insert_before(parent, moved, old_first.output);
            old_end -= 1;
            new_start += 1;
        } else {
            if keys.is_none() {
                keys = Some(index_keys(cx, &slots, old_start, old_end)?);
            }
            let hit = new[new_start]
                .key()
                .and_then(|key| keys.as_ref().and_then(|keys| keys.get(key)))
                .copied()
                .filter(|&index| index >= old_start && index < old_end && slots[index].is_some());

            match hit {
                // Same key as the old start node but a different tag: replace
                // it where it stands.
                Some(index) if index == old_start => {
                    patch(cx, old_first, &mut new[new_start])?;
                    slots[index] = None;
                    old_start += 1;
                }
                Some(index) => {
                    if let Some(matched) = slots[index].take() {
                        let moved = patch(cx, matched, &mut new[new_start])?;
                        platform.insert_before(parent, moved, old_first.output);
                    }
                }
                None => {
                    let created = render(cx, &mut new[new_start])?;
                    platform.insert_before(parent, created, old_first.output);
                }
            }
            new_start += 1;
        }
    }

    if old_start >= old_end {
        let anchor = new.get(new_end).and_then(VNode::output);
        for node in &mut new[new_start..new_end] {
            let created = render(cx, node)?;
            platform.insert_before(parent, created, anchor);
        }
    } else if new_start >= new_end {
        for node in slots[old_start..old_end].iter().flatten() {
            remove(cx, node, true);
        }
    }

    Ok(())
}

/// Index the keyed old children in `start..end` by key.
fn index_keys<'a>(
    cx: &RenderContext<'_>,
    slots: &[Option<&'a VNode>],
    start: usize,
    end: usize,
) -> Result<HashMap<&'a Key, usize>> {
    let mut keys = HashMap::new();
    for (index, slot) in slots.iter().enumerate().take(end).skip(start) {
        let Some(key) = slot.and_then(VNode::key) else {
            continue;
        };
        if keys.insert(key, index).is_some() {
            if cx.config().strict_keys {
                return Err(Error::DuplicateKey(key.to_string()));
            }
            warn!(%key, "duplicate key among siblings, the last one wins");
        }
    }
    Ok(keys)
}
