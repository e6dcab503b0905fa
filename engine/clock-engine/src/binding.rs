//! Function bindings stored in priority buckets.

use crate::types::{BindingId, Callback, Context, Priority};

pub(crate) struct Binding {
    pub(crate) id: BindingId,
    pub(crate) priority: Priority,
    /// `None` while the callback is checked out for invocation
    pub(crate) callback: Option<Callback>,
    pub(crate) context: Option<Context>,
}

/// One ordered list per priority level.
///
/// Dispatch walks buckets from [`Priority::Highest`] down; inside a bucket, registration order.
#[derive(Default)]
pub struct BindingTable {
    buckets: [Vec<Binding>; Priority::COUNT],
    len: usize,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn insert(
        &mut self,
        id: BindingId,
        priority: Priority,
        callback: Callback,
        context: Option<Context>,
    ) {
        self.buckets[priority.index()].push(Binding {
            id,
            priority,
            callback: Some(callback),
            context,
        });
        self.len += 1;
    }

    /// Removes a binding, returning the priority it was registered with
    pub fn remove(&mut self, id: BindingId) -> Option<Priority> {
        for bucket in self.buckets.iter_mut() {
            if let Some(pos) = bucket.iter().position(|b| b.id == id) {
                let binding = bucket.remove(pos);
                self.len -= 1;
                return Some(binding.priority);
            }
        }
        None
    }

    pub fn contains(&self, id: BindingId) -> bool {
        self.get(id).is_some()
    }

    pub fn priority_of(&self, id: BindingId) -> Option<Priority> {
        self.get(id).map(|b| b.priority)
    }

    pub fn context(&self, id: BindingId) -> Option<Option<Context>> {
        self.get(id).map(|b| b.context.clone())
    }

    /// Replaces the context; returns false when `id` is not registered
    pub fn set_context(&mut self, id: BindingId, context: Option<Context>) -> bool {
        match self.get_mut(id) {
            Some(binding) => {
                binding.context = context;
                true
            }
            None => false,
        }
    }

    /// Point-in-time dispatch order: highest priority first, then registration order
    pub fn dispatch_order(&self) -> Vec<BindingId> {
        let mut order = Vec::with_capacity(self.len);
        for bucket in self.buckets.iter().rev() {
            order.extend(bucket.iter().map(|b| b.id));
        }
        order
    }

    /// Takes the callback out for invocation.
    ///
    /// Returns `None` if the binding is gone or its callback is already checked out.
    pub(crate) fn checkout(&mut self, id: BindingId) -> Option<(Callback, Option<Context>)> {
        let binding = self.get_mut(id)?;
        let callback = binding.callback.take()?;
        Some((callback, binding.context.clone()))
    }

    /// Puts a checked-out callback back. Returns false if the binding was removed meanwhile,
    /// in which case the callback is dropped.
    pub(crate) fn checkin(&mut self, id: BindingId, callback: Callback) -> bool {
        match self.get_mut(id) {
            Some(binding) => {
                binding.callback = Some(callback);
                true
            }
            None => false,
        }
    }

    /// Removes every binding, returning their ids in dispatch order
    pub fn clear(&mut self) -> Vec<BindingId> {
        let ids = self.dispatch_order();
        for bucket in self.buckets.iter_mut() {
            bucket.clear();
        }
        self.len = 0;
        ids
    }

    fn get(&self, id: BindingId) -> Option<&Binding> {
        self.buckets.iter().flat_map(|bucket| bucket.iter()).find(|b| b.id == id)
    }

    fn get_mut(&mut self, id: BindingId) -> Option<&mut Binding> {
        self.buckets.iter_mut().flat_map(|bucket| bucket.iter_mut()).find(|b| b.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn noop() -> Callback {
        Box::new(|_, _, _| {})
    }

    #[test]
    fn dispatch_order_is_priority_then_registration() {
        let mut table = BindingTable::new();
        table.insert(BindingId(1), Priority::Low, noop(), None);
        table.insert(BindingId(2), Priority::Highest, noop(), None);
        table.insert(BindingId(3), Priority::Low, noop(), None);
        table.insert(BindingId(4), Priority::Normal, noop(), None);
        table.insert(BindingId(5), Priority::Highest, noop(), None);

        let order = table.dispatch_order();
        assert_eq!(
            order,
            vec![BindingId(2), BindingId(5), BindingId(4), BindingId(1), BindingId(3)]
        );
    }

    #[test]
    fn remove_reports_priority_once() {
        let mut table = BindingTable::new();
        table.insert(BindingId(7), Priority::High, noop(), None);
        assert_eq!(table.priority_of(BindingId(7)), Some(Priority::High));
        assert_eq!(table.remove(BindingId(7)), Some(Priority::High));
        assert_eq!(table.remove(BindingId(7)), None);
        assert_eq!(table.priority_of(BindingId(7)), None);
        assert!(table.is_empty());
    }

    #[test]
    fn checkout_checkin_cycle() {
        let mut table = BindingTable::new();
        let ctx: Context = Rc::new(42u32);
        table.insert(BindingId(1), Priority::Normal, noop(), Some(ctx));

        let (cb, ctx) = table.checkout(BindingId(1)).expect("checked out");
        assert_eq!(ctx.and_then(|c| c.downcast_ref::<u32>().copied()), Some(42));
        assert!(table.checkout(BindingId(1)).is_none(), "already checked out");
        assert!(table.checkin(BindingId(1), cb));
        assert!(table.checkout(BindingId(1)).is_some());
    }

    #[test]
    fn checkin_after_removal_drops_callback() {
        let mut table = BindingTable::new();
        table.insert(BindingId(1), Priority::Normal, noop(), None);
        let (cb, _) = table.checkout(BindingId(1)).unwrap();
        table.remove(BindingId(1));
        assert!(!table.checkin(BindingId(1), cb));
        assert!(table.is_empty());
    }

    #[test]
    fn set_context_replaces_value() {
        let mut table = BindingTable::new();
        table.insert(BindingId(1), Priority::Normal, noop(), None);
        assert!(table.context(BindingId(1)).unwrap().is_none());
        assert!(table.set_context(BindingId(1), Some(Rc::new("fx") as Context)));
        let ctx = table.context(BindingId(1)).unwrap().unwrap();
        assert_eq!(ctx.downcast_ref::<&'static str>(), Some(&"fx"));
        assert!(!table.set_context(BindingId(9), None));
    }
}
