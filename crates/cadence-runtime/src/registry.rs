//! Ordered, filtered, mutation-safe component registry
//!
//! `SortedRegistry` keeps a stably sorted, predicate-filtered view of
//! registered items and tolerates structural mutation performed by the very
//! callback that is iterating it. Additions, removals, and reorders are
//! journaled and merged into the backing store at one controlled commit
//! point, so an in-flight traversal never observes a half-applied change.
//!
//! Single-threaded by design: re-entrancy, not concurrency, is the hazard
//! this structure solves, so there is no lock anywhere. All methods take
//! `&self` so a callback holding a clone of the `Rc<SortedRegistry>` can
//! call back in while a traversal is running.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Shared handle to a registered item.
pub type Handle<T> = Rc<RefCell<T>>;

/// Ordered registry of updateable items, keyed by `update_order`.
pub type UpdateRegistry = SortedRegistry<dyn crate::component::Updateable>;

/// Ordered registry of drawable items, keyed by `draw_order`.
pub type DrawRegistry = SortedRegistry<dyn crate::component::Drawable>;

struct Entry<T: ?Sized> {
    item: Handle<T>,
    /// Order key evaluated at the last commit. Stays accurate while the
    /// entry is live: every order change re-journals through
    /// `order_changed`, so the key is never read mid-mutation.
    key: i32,
    /// Subscription state. Cleared the moment the item enters the remove
    /// journal; a dead entry ignores further change notifications.
    live: bool,
}

/// A stably sorted, predicate-filtered collection of shared items.
///
/// Items are ordered by `(key, insertion sequence)` ascending: equal keys
/// resolve by original relative insertion order, which keeps traversal
/// deterministic when many items share a priority.
pub struct SortedRegistry<T: ?Sized> {
    entries: RefCell<Vec<Entry<T>>>,
    add_journal: RefCell<Vec<(u64, Handle<T>)>>,
    remove_journal: RefCell<Vec<usize>>,
    cache: RefCell<Vec<Handle<T>>>,
    dirty: Cell<bool>,
    next_sequence: Cell<u64>,
    key: fn(&T) -> i32,
    active: fn(&T) -> bool,
}

impl<T: ?Sized> SortedRegistry<T> {
    /// Creates an empty registry ordered by `key` and filtered by `active`.
    pub fn new(key: fn(&T) -> i32, active: fn(&T) -> bool) -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
            add_journal: RefCell::new(Vec::new()),
            remove_journal: RefCell::new(Vec::new()),
            cache: RefCell::new(Vec::new()),
            dirty: Cell::new(true),
            next_sequence: Cell::new(0),
            key,
            active,
        }
    }

    /// Registers an item. The backing store is untouched until the next
    /// commit, so an item added mid-traversal is never observed
    /// half-subscribed. Repeated adds of the same handle yield independent
    /// entries; de-duplication is the caller's responsibility.
    pub fn add(&self, item: Handle<T>) {
        let sequence = self.next_sequence.get();
        self.next_sequence.set(sequence + 1);
        self.add_journal.borrow_mut().push((sequence, item));
        self.dirty.set(true);
    }

    /// Deregisters an item. Returns `false` if the item is not present
    /// (double-remove is a no-op).
    ///
    /// An item still sitting in the add journal is excised there — a cancel
    /// before commit. A resident item has its subscription torn down
    /// immediately; physical compaction of the backing store is deferred.
    pub fn remove(&self, item: &Handle<T>) -> bool {
        {
            let mut adds = self.add_journal.borrow_mut();
            if let Some(pos) = adds.iter().position(|(_, h)| Rc::ptr_eq(h, item)) {
                adds.remove(pos);
                self.dirty.set(true);
                return true;
            }
        }

        let mut entries = self.entries.borrow_mut();
        match entries
            .iter()
            .position(|e| e.live && Rc::ptr_eq(&e.item, item))
        {
            Some(index) => {
                entries[index].live = false;
                self.remove_journal.borrow_mut().push(index);
                self.dirty.set(true);
                true
            }
            None => false,
        }
    }

    /// Notification that a resident item's order key changed.
    ///
    /// Modeled as remove-then-re-add through the same journal machinery as
    /// any structural change: the comparator is only ever evaluated at the
    /// commit point, never mid-mutation. Items still pending in the add
    /// journal need no action — their key is read fresh at commit anyway.
    pub fn order_changed(&self, item: &Handle<T>) {
        let mut entries = self.entries.borrow_mut();
        if let Some(index) = entries
            .iter()
            .position(|e| e.live && Rc::ptr_eq(&e.item, item))
        {
            entries[index].live = false;
            self.remove_journal.borrow_mut().push(index);

            let sequence = self.next_sequence.get();
            self.next_sequence.set(sequence + 1);
            self.add_journal
                .borrow_mut()
                .push((sequence, entries[index].item.clone()));
            self.dirty.set(true);
        }
    }

    /// Notification that an item's active predicate changed. Only the
    /// filtered cache is invalidated; backing-store order is untouched.
    pub fn active_changed(&self) {
        self.dirty.set(true);
    }

    /// Number of registered items: resident live entries plus pending adds.
    pub fn len(&self) -> usize {
        let resident = self.entries.borrow().iter().filter(|e| e.live).count();
        resident + self.add_journal.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the item is currently registered (resident or pending).
    pub fn contains(&self, item: &Handle<T>) -> bool {
        self.entries
            .borrow()
            .iter()
            .any(|e| e.live && Rc::ptr_eq(&e.item, item))
            || self
                .add_journal
                .borrow()
                .iter()
                .any(|(_, h)| Rc::ptr_eq(h, item))
    }

    /// Deregisters everything: resident items, pending journal entries, and
    /// the filtered cache. Subscriptions are dropped with their entries, so
    /// nothing stale leaks into the next epoch.
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
        self.add_journal.borrow_mut().clear();
        self.remove_journal.borrow_mut().clear();
        self.cache.borrow_mut().clear();
        self.dirty.set(true);
    }

    /// Visits every item whose active predicate held at the last cache
    /// rebuild, in `(key, insertion sequence)` order.
    ///
    /// If the registry is dirty, pending journals are committed and the
    /// cache rebuilt first. The callback may freely add, remove, or reorder
    /// items — including the one being visited; the current call still
    /// completes over the snapshot already captured, and a cache dirtied
    /// mid-enumeration is discarded immediately afterwards so the next call
    /// rebuilds from scratch.
    ///
    /// The first error returned by the callback aborts the traversal and
    /// propagates to the caller; errors are deliberately not caught here.
    pub fn for_each_active<E>(
        &self,
        mut f: impl FnMut(&Handle<T>) -> Result<(), E>,
    ) -> Result<(), E> {
        if self.dirty.get() {
            self.commit();
            self.rebuild_cache();
            self.dirty.set(false);
        }

        // Snapshot so re-entrant mutation cannot touch the sequence being
        // walked. Cloning `Rc`s is cheap.
        let snapshot = self.cache.borrow().clone();
        let mut result = Ok(());
        for item in &snapshot {
            if let Err(err) = f(item) {
                result = Err(err);
                break;
            }
        }

        // A callback that dirtied the registry left the cache stale; drop
        // it now rather than ever serving a partially-stale view.
        if self.dirty.get() {
            self.cache.borrow_mut().clear();
        }
        result
    }

    /// Applies both journals to the backing store. Runs lazily, exactly once
    /// before a fresh cache rebuild; the sort invariant is never evaluated
    /// against a store with pending journal entries.
    fn commit(&self) {
        let mut entries = self.entries.borrow_mut();

        // Delete at recorded indices in descending order so earlier
        // deletions never invalidate later indices.
        let mut removes = self.remove_journal.borrow_mut();
        removes.sort_unstable_by(|a, b| b.cmp(a));
        for &index in removes.iter() {
            entries.remove(index);
        }
        removes.clear();
        drop(removes);

        let mut adds = self.add_journal.borrow_mut();
        if adds.is_empty() {
            return;
        }
        log::trace!("committing {} pending additions", adds.len());

        // Order keys are read here, at the one controlled commit point.
        adds.sort_by(|(seq_a, a), (seq_b, b)| {
            let key_a = (self.key)(&*a.borrow());
            let key_b = (self.key)(&*b.borrow());
            key_a.cmp(&key_b).then(seq_a.cmp(seq_b))
        });

        // Linear merge-insert into the compacted, still-sorted store. A
        // pending item splices in before the first entry with a strictly
        // greater key, so equal keys land after all existing holders of
        // that key (insertion-order tie-break).
        let mut cursor = 0;
        for (_, item) in adds.drain(..) {
            let key = (self.key)(&*item.borrow());
            while cursor < entries.len() && key >= entries[cursor].key {
                cursor += 1;
            }
            entries.insert(
                cursor,
                Entry {
                    item,
                    key,
                    live: true,
                },
            );
            cursor += 1;
        }
    }

    /// Rebuilds the filtered cache as the prefix-order-preserving
    /// subsequence of the backing store passing the active predicate.
    fn rebuild_cache(&self) {
        let entries = self.entries.borrow();
        let mut cache = self.cache.borrow_mut();
        cache.clear();
        for entry in entries.iter() {
            if (self.active)(&*entry.item.borrow()) {
                cache.push(entry.item.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Item {
        name: &'static str,
        order: i32,
        active: bool,
    }

    impl Item {
        fn new(name: &'static str, order: i32) -> Handle<Item> {
            Rc::new(RefCell::new(Item {
                name,
                order,
                active: true,
            }))
        }
    }

    fn order_of(item: &Item) -> i32 {
        item.order
    }

    fn is_active(item: &Item) -> bool {
        item.active
    }

    fn registry() -> Rc<SortedRegistry<Item>> {
        Rc::new(SortedRegistry::new(order_of, is_active))
    }

    fn visit(reg: &SortedRegistry<Item>) -> Vec<&'static str> {
        let mut names = Vec::new();
        reg.for_each_active(|item| {
            names.push(item.borrow().name);
            Ok::<(), ()>(())
        })
        .unwrap();
        names
    }

    #[test]
    fn orders_by_key_then_insertion() {
        let reg = registry();
        reg.add(Item::new("a", 5));
        reg.add(Item::new("b", 1));
        reg.add(Item::new("c", 5));
        assert_eq!(visit(&reg), vec!["b", "a", "c"]);
    }

    #[test]
    fn equal_keys_keep_insertion_order_across_unrelated_changes() {
        let reg = registry();
        let x = Item::new("x", 3);
        reg.add(Item::new("a", 2));
        reg.add(Item::new("b", 2));
        reg.add(x.clone());
        reg.add(Item::new("c", 2));
        assert_eq!(visit(&reg), vec!["a", "b", "c", "x"]);

        // Removing an unrelated item must not disturb the tie order.
        assert!(reg.remove(&x));
        reg.add(Item::new("d", 2));
        assert_eq!(visit(&reg), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn consecutive_traversals_are_identical() {
        let reg = registry();
        reg.add(Item::new("a", 1));
        reg.add(Item::new("b", 0));
        reg.add(Item::new("c", 1));
        let first = visit(&reg);
        let second = visit(&reg);
        assert_eq!(first, second);
    }

    #[test]
    fn inactive_items_are_skipped() {
        let reg = registry();
        let b = Item::new("b", 1);
        reg.add(Item::new("a", 0));
        reg.add(b.clone());
        reg.add(Item::new("c", 2));

        b.borrow_mut().active = false;
        reg.active_changed();
        assert_eq!(visit(&reg), vec!["a", "c"]);

        b.borrow_mut().active = true;
        reg.active_changed();
        assert_eq!(visit(&reg), vec!["a", "b", "c"]);
    }

    #[test]
    fn remove_of_pending_add_cancels_before_commit() {
        let reg = registry();
        let a = Item::new("a", 0);
        reg.add(a.clone());
        assert!(reg.remove(&a));
        assert!(reg.is_empty());
        assert_eq!(visit(&reg), Vec::<&str>::new());
    }

    #[test]
    fn double_remove_is_a_noop() {
        let reg = registry();
        let a = Item::new("a", 0);
        reg.add(a.clone());
        assert_eq!(visit(&reg), vec!["a"]);
        assert!(reg.remove(&a));
        assert!(!reg.remove(&a));
        assert_eq!(visit(&reg), Vec::<&str>::new());
    }

    #[test]
    fn len_and_contains_track_journals() {
        let reg = registry();
        let a = Item::new("a", 0);
        let b = Item::new("b", 1);
        reg.add(a.clone());
        assert_eq!(reg.len(), 1);
        assert!(reg.contains(&a));

        // Commit, then journal a removal: the entry is gone from the count
        // even before compaction runs.
        let _ = visit(&reg);
        reg.add(b.clone());
        assert_eq!(reg.len(), 2);
        assert!(reg.remove(&a));
        assert_eq!(reg.len(), 1);
        assert!(!reg.contains(&a));
        assert!(reg.contains(&b));
    }

    #[test]
    fn reentrant_remove_and_add_are_invisible_to_current_traversal() {
        let reg = registry();
        let a = Item::new("a", 0);
        let b = Item::new("b", 1);
        let c = Item::new("c", 2);
        reg.add(a.clone());
        reg.add(b.clone());
        reg.add(c.clone());

        let d = Item::new("d", 1);
        let mut seen = Vec::new();
        {
            let reg2 = reg.clone();
            let a2 = a.clone();
            let d2 = d.clone();
            reg.for_each_active(|item| {
                let name = item.borrow().name;
                seen.push(name);
                if name == "a" {
                    // Mutate the collection being iterated: remove self,
                    // add a new item.
                    assert!(reg2.remove(&a2));
                    reg2.add(d2.clone());
                }
                Ok::<(), ()>(())
            })
            .unwrap();
        }
        // The in-progress enumeration completed over the pre-mutation set.
        assert_eq!(seen, vec!["a", "b", "c"]);
        // The next traversal sees the updated set, no duplicates, no loss.
        assert_eq!(visit(&reg), vec!["b", "d", "c"]);
    }

    #[test]
    fn reorder_round_trip_moves_item_exactly_once() {
        let reg = registry();
        let a = Item::new("a", 0);
        let b = Item::new("b", 1);
        let c = Item::new("c", 2);
        reg.add(a.clone());
        reg.add(b.clone());
        reg.add(c.clone());
        assert_eq!(visit(&reg), vec!["a", "b", "c"]);

        a.borrow_mut().order = 5;
        reg.order_changed(&a);
        assert_eq!(visit(&reg), vec!["b", "c", "a"]);
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn reorder_from_inside_traversal_applies_next_call() {
        let reg = registry();
        let a = Item::new("a", 0);
        let b = Item::new("b", 1);
        reg.add(a.clone());
        reg.add(b.clone());

        let reg2 = reg.clone();
        let a2 = a.clone();
        let mut seen = Vec::new();
        reg.for_each_active(|item| {
            let name = item.borrow().name;
            seen.push(name);
            if name == "a" {
                a2.borrow_mut().order = 9;
                reg2.order_changed(&a2);
            }
            Ok::<(), ()>(())
        })
        .unwrap();
        assert_eq!(seen, vec!["a", "b"]);
        assert_eq!(visit(&reg), vec!["b", "a"]);
    }

    #[test]
    fn notification_for_dead_entry_is_ignored() {
        let reg = registry();
        let a = Item::new("a", 0);
        reg.add(a.clone());
        let _ = visit(&reg);

        assert!(reg.remove(&a));
        // The subscription was torn down with the removal; a late order
        // notification must not resurrect the item.
        a.borrow_mut().order = 7;
        reg.order_changed(&a);
        assert_eq!(visit(&reg), Vec::<&str>::new());
    }

    #[test]
    fn clear_resets_everything() {
        let reg = registry();
        let a = Item::new("a", 0);
        reg.add(a.clone());
        reg.add(Item::new("b", 1));
        let _ = visit(&reg);
        reg.add(Item::new("c", 2));

        reg.clear();
        assert!(reg.is_empty());
        assert!(!reg.contains(&a));
        assert_eq!(visit(&reg), Vec::<&str>::new());

        // The registry is usable for a fresh epoch afterwards.
        reg.add(Item::new("d", 0));
        assert_eq!(visit(&reg), vec!["d"]);
    }

    #[test]
    fn callback_error_aborts_and_propagates() {
        let reg = registry();
        reg.add(Item::new("a", 0));
        reg.add(Item::new("b", 1));
        reg.add(Item::new("c", 2));

        let mut seen = Vec::new();
        let result = reg.for_each_active(|item| {
            let name = item.borrow().name;
            seen.push(name);
            if name == "b" {
                Err("boom")
            } else {
                Ok(())
            }
        });
        assert_eq!(result, Err("boom"));
        assert_eq!(seen, vec!["a", "b"]);
    }

    #[test]
    fn mixed_removals_compact_without_index_skew() {
        let reg = registry();
        let items: Vec<_> = (0..6)
            .map(|i| {
                let h = Item::new(["a", "b", "c", "d", "e", "f"][i], i as i32);
                reg.add(h.clone());
                h
            })
            .collect();
        let _ = visit(&reg);

        // Remove out of order; descending-index deletion at commit keeps
        // the survivors intact.
        assert!(reg.remove(&items[1]));
        assert!(reg.remove(&items[4]));
        assert!(reg.remove(&items[0]));
        assert_eq!(visit(&reg), vec!["c", "d", "f"]);
    }
}
