//! Slot accounting for tagged capacity reservations.
//!
//! The ledger tracks three counters per named tag (`reserved`, `in_use`,
//! `borrowed`) plus the generic group's reservation and usage. It answers
//! the admission question for a tag, settles releases, and applies live
//! resizes. The ledger itself is not synchronized; the pool guards it with
//! a single mutex so every mutation is atomic with respect to admit,
//! release, and resize.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::error::PoolError;
use crate::core::tag::Tag;

/// Counters for one slot group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TagUsage {
    /// Slots dedicated to this group.
    pub reserved: usize,
    /// Tasks currently running whose admitting tag is this group.
    pub in_use: usize,
    /// Tasks running under this group but admitted against generic slots.
    /// Always zero for the generic group itself.
    pub borrowed: usize,
}

/// Outcome of a successful admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// The task was admitted against the generic reserve rather than the
    /// tag's own reservation.
    pub borrowed: bool,
}

/// Outcome of a successful resize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizeReport {
    /// The resized tag.
    pub tag: Tag,
    /// Reservation before the resize.
    pub previous: usize,
    /// Reservation after the resize.
    pub current: usize,
    /// Generic reservation after the resize settles.
    pub generic_reserved: usize,
}

/// Per-tag slot accounting.
///
/// Admission follows a fixed decision order: a tag's own reservation is
/// consulted before the generic reserve, which keeps generic slots
/// available for groups that have exhausted their own.
#[derive(Debug)]
pub struct SlotLedger {
    generic_reserved: usize,
    generic_in_use: usize,
    /// Sum of `borrowed` across all named tags. Maintained incrementally so
    /// the generic admission test is O(1).
    borrowed_total: usize,
    named: HashMap<Arc<str>, TagUsage>,
}

impl SlotLedger {
    /// Create a ledger from a reservation map. A missing generic entry
    /// defaults to zero generic slots (no borrowing possible).
    #[must_use]
    pub fn new(reservations: HashMap<Tag, usize>) -> Self {
        let mut generic_reserved = 0;
        let mut named = HashMap::new();
        for (tag, reserved) in reservations {
            match tag {
                Tag::Generic => generic_reserved = reserved,
                Tag::Named(name) => {
                    named.insert(
                        name,
                        TagUsage {
                            reserved,
                            ..TagUsage::default()
                        },
                    );
                }
            }
        }
        Self {
            generic_reserved,
            generic_in_use: 0,
            borrowed_total: 0,
            named,
        }
    }

    /// Generic slots currently committed: direct generic admissions plus
    /// every outstanding borrow.
    fn generic_commitments(&self) -> usize {
        self.generic_in_use + self.borrowed_total
    }

    fn generic_has_free(&self) -> bool {
        self.generic_commitments() < self.generic_reserved
    }

    /// Try to admit one task under `tag`. Returns `None` when neither the
    /// tag's own reservation nor the generic reserve has a free slot.
    ///
    /// Unknown named tags are created on the fly with a zero reservation,
    /// so they can only borrow until a resize grows them.
    pub fn try_admit(&mut self, tag: &Tag) -> Option<Admission> {
        match tag {
            Tag::Generic => {
                if self.generic_has_free() {
                    self.generic_in_use += 1;
                    Some(Admission { borrowed: false })
                } else {
                    None
                }
            }
            Tag::Named(name) => {
                let generic_free = self.generic_has_free();
                if !self.named.contains_key(name) {
                    debug!(tag = %tag, "auto-creating tag with zero reservation");
                }
                let entry = self.named.entry(Arc::clone(name)).or_default();
                if entry.in_use - entry.borrowed < entry.reserved {
                    entry.in_use += 1;
                    Some(Admission { borrowed: false })
                } else if generic_free {
                    entry.in_use += 1;
                    entry.borrowed += 1;
                    self.borrowed_total += 1;
                    Some(Admission { borrowed: true })
                } else {
                    None
                }
            }
        }
    }

    /// Release one slot previously admitted under `tag`.
    pub fn release(&mut self, tag: &Tag, was_borrowed: bool) {
        match tag {
            Tag::Generic => {
                self.generic_in_use = self.generic_in_use.saturating_sub(1);
            }
            Tag::Named(name) => {
                if let Some(entry) = self.named.get_mut(name) {
                    entry.in_use = entry.in_use.saturating_sub(1);
                    if was_borrowed {
                        entry.borrowed = entry.borrowed.saturating_sub(1);
                        self.borrowed_total = self.borrowed_total.saturating_sub(1);
                    }
                }
            }
        }
    }

    /// Change `tag`'s reservation to `new_size`.
    ///
    /// With `use_generic` set, the delta is taken from (or returned to) the
    /// generic reserve so total capacity is conserved; the call fails with
    /// [`PoolError::InsufficientGeneric`] when that would leave the generic
    /// group below its current commitments. Without it, total capacity
    /// changes by the delta and the generic reserve is untouched.
    ///
    /// Shrinking never cancels running work. Surplus in-flight tasks keep
    /// their accounting; the tag simply grants no own-reserve admissions
    /// until releases bring it back under the new bound. `use_generic` has
    /// no meaning when resizing the generic tag itself and is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InsufficientGeneric`] in `use_generic` mode
    /// when growth exceeds the uncommitted generic reserve; the ledger is
    /// left untouched.
    pub fn resize(
        &mut self,
        tag: &Tag,
        new_size: usize,
        use_generic: bool,
    ) -> Result<ResizeReport, PoolError> {
        match tag {
            Tag::Generic => {
                let previous = self.generic_reserved;
                self.generic_reserved = new_size;
                if new_size < self.generic_commitments() {
                    warn!(
                        reserved = new_size,
                        committed = self.generic_commitments(),
                        "generic reserve shrunk below commitments; admissions deferred"
                    );
                }
                Ok(ResizeReport {
                    tag: tag.clone(),
                    previous,
                    current: new_size,
                    generic_reserved: new_size,
                })
            }
            Tag::Named(name) => {
                let previous = self.named.get(name).map_or(0, |e| e.reserved);
                if use_generic {
                    // Conserving mode: the named delta comes out of the
                    // generic reserve, which must stay at or above its
                    // commitments (and hence above zero).
                    let grow = new_size.saturating_sub(previous);
                    let shrink = previous.saturating_sub(new_size);
                    let floor = self.generic_commitments();
                    let available = self.generic_reserved.saturating_sub(floor);
                    if grow > available {
                        warn!(
                            tag = %tag,
                            requested = grow,
                            available,
                            "resize refused: generic reserve exhausted"
                        );
                        return Err(PoolError::InsufficientGeneric {
                            requested: grow,
                            available,
                        });
                    }
                    self.generic_reserved = self.generic_reserved - grow + shrink;
                }
                let entry = self.named.entry(Arc::clone(name)).or_default();
                entry.reserved = new_size;
                if entry.in_use.saturating_sub(entry.borrowed) > new_size {
                    debug!(
                        tag = %tag,
                        in_use = entry.in_use,
                        reserved = new_size,
                        "surplus in-flight work continues under old accounting"
                    );
                }
                Ok(ResizeReport {
                    tag: tag.clone(),
                    previous,
                    current: new_size,
                    generic_reserved: self.generic_reserved,
                })
            }
        }
    }

    /// Current counters for `tag`. Unknown tags read as all-zero.
    #[must_use]
    pub fn usage(&self, tag: &Tag) -> TagUsage {
        match tag {
            Tag::Generic => TagUsage {
                reserved: self.generic_reserved,
                in_use: self.generic_in_use,
                borrowed: 0,
            },
            Tag::Named(name) => self.named.get(name).copied().unwrap_or_default(),
        }
    }

    /// Snapshot of every reservation, generic included.
    #[must_use]
    pub fn reserved_snapshot(&self) -> HashMap<Tag, usize> {
        let mut out = HashMap::with_capacity(self.named.len() + 1);
        out.insert(Tag::Generic, self.generic_reserved);
        for (name, entry) in &self.named {
            out.insert(Tag::Named(Arc::clone(name)), entry.reserved);
        }
        out
    }

    /// Sum of outstanding borrows across all named tags.
    #[must_use]
    pub fn borrowed_total(&self) -> usize {
        self.borrowed_total
    }

    /// Total reserved slots across every group.
    #[must_use]
    pub fn total_reserved(&self) -> usize {
        self.generic_reserved + self.named.values().map(|e| e.reserved).sum::<usize>()
    }

    #[cfg(test)]
    fn assert_invariants(&self) {
        let mut borrowed = 0;
        for (name, entry) in &self.named {
            assert!(
                entry.in_use >= entry.borrowed,
                "tag {name}: in_use {} < borrowed {}",
                entry.in_use,
                entry.borrowed
            );
            borrowed += entry.borrowed;
        }
        assert_eq!(borrowed, self.borrowed_total, "borrowed_total out of sync");
    }
}
