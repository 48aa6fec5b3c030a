//! Dense ordinal positions for the children of a container.
//!
//! A container is a board (holding lists) or a list (holding tasks). Its
//! children carry positions `1..=N` with no gaps and no duplicates. Every
//! function here is pure: it takes a snapshot of the container and returns the
//! position changes that keep the sequence dense. Callers persist the plan in
//! a single guarded transaction.

use crate::error::{BoardError, Result};

/// Anything that occupies a slot in a container.
pub trait Positioned {
    fn id(&self) -> &str;
    fn position(&self) -> i64;
    fn created_at(&self) -> &str;
}

/// Snapshot of one child of a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub id: String,
    pub position: i64,
}

impl Slot {
    pub fn new(id: impl Into<String>, position: i64) -> Self {
        Self {
            id: id.into(),
            position,
        }
    }
}

/// One child changing rank
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reposition {
    pub id: String,
    pub from: i64,
    pub to: i64,
}

/// Position changes for moving a child between two containers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossMove {
    /// Siblings left behind, closing the gap
    pub source: Vec<Reposition>,
    /// Siblings in the destination, opening a slot
    pub target: Vec<Reposition>,
    /// The moved child: `from` in the source, `to` in the target
    pub moved: Reposition,
}

/// Snapshot slots from positioned items.
pub fn slots<T: Positioned>(items: &[T]) -> Vec<Slot> {
    items
        .iter()
        .map(|item| Slot::new(item.id(), item.position()))
        .collect()
}

/// Sort by position, falling back to creation order then id.
pub fn sort_positioned<T: Positioned>(items: &mut [T]) {
    items.sort_by(|a, b| {
        a.position()
            .cmp(&b.position())
            .then_with(|| a.created_at().cmp(b.created_at()))
            .then_with(|| a.id().cmp(b.id()))
    });
}

/// Position for a new child appended at the tail.
pub fn append_position(slots: &[Slot]) -> i64 {
    slots.iter().map(|s| s.position).max().map_or(1, |max| max + 1)
}

/// Rotate one child to `new_position` inside its container.
///
/// Returns the repositions including the moved child itself; empty when the
/// child already sits at `new_position`.
pub fn plan_move_within(slots: &[Slot], id: &str, new_position: i64) -> Result<Vec<Reposition>> {
    let old = find(slots, id)?.position;
    check_range(new_position, slots.len() as i64)?;

    if new_position == old {
        return Ok(Vec::new());
    }

    let mut plan: Vec<Reposition> = slots
        .iter()
        .filter(|s| s.id != id)
        .filter_map(|s| {
            let to = if new_position > old && s.position > old && s.position <= new_position {
                s.position - 1
            } else if new_position < old && s.position >= new_position && s.position < old {
                s.position + 1
            } else {
                return None;
            };
            Some(Reposition {
                id: s.id.clone(),
                from: s.position,
                to,
            })
        })
        .collect();

    plan.push(Reposition {
        id: id.to_string(),
        from: old,
        to: new_position,
    });
    Ok(plan)
}

/// Move one child from `source` into `target` at `new_position`.
///
/// `new_position` may be one past the target's tail.
pub fn plan_move_across(
    source: &[Slot],
    target: &[Slot],
    id: &str,
    new_position: i64,
) -> Result<CrossMove> {
    let old = find(source, id)?.position;
    if target.iter().any(|s| s.id == id) {
        return Err(BoardError::invalid("item already belongs to the target container"));
    }
    check_range(new_position, target.len() as i64 + 1)?;

    let source_plan = close_gap(source, id, old);
    let target_plan = target
        .iter()
        .filter(|s| s.position >= new_position)
        .map(|s| Reposition {
            id: s.id.clone(),
            from: s.position,
            to: s.position + 1,
        })
        .collect();

    Ok(CrossMove {
        source: source_plan,
        target: target_plan,
        moved: Reposition {
            id: id.to_string(),
            from: old,
            to: new_position,
        },
    })
}

/// Close the gap a removed child leaves behind.
pub fn plan_remove(slots: &[Slot], id: &str) -> Result<Vec<Reposition>> {
    let old = find(slots, id)?.position;
    Ok(close_gap(slots, id, old))
}

/// Apply a plan to a snapshot. Children not named in the plan keep their rank.
pub fn apply(slots: &mut [Slot], plan: &[Reposition]) {
    for step in plan {
        if let Some(slot) = slots.iter_mut().find(|s| s.id == step.id) {
            slot.position = step.to;
        }
    }
}

/// True when positions are exactly `1..=N`.
pub fn is_dense(slots: &[Slot]) -> bool {
    let mut positions: Vec<i64> = slots.iter().map(|s| s.position).collect();
    positions.sort_unstable();
    positions
        .iter()
        .enumerate()
        .all(|(i, p)| *p == i as i64 + 1)
}

fn close_gap(slots: &[Slot], id: &str, removed_at: i64) -> Vec<Reposition> {
    slots
        .iter()
        .filter(|s| s.id != id && s.position > removed_at)
        .map(|s| Reposition {
            id: s.id.clone(),
            from: s.position,
            to: s.position - 1,
        })
        .collect()
}

fn find<'a>(slots: &'a [Slot], id: &str) -> Result<&'a Slot> {
    slots
        .iter()
        .find(|s| s.id == id)
        .ok_or_else(|| BoardError::not_found("item", id))
}

fn check_range(position: i64, max: i64) -> Result<()> {
    if position < 1 || position > max {
        return Err(BoardError::invalid(format!(
            "position {} out of range 1..={}",
            position, max
        )));
    }
    Ok(())
}
