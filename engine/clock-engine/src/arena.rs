//! Slot arena owning every clock, addressed by generational [`ClockId`] handles.

use crate::types::ClockId;

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self { slots: Vec::new(), free: Vec::new(), len: 0 }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stores `value`, reusing the most recently freed slot first
    pub fn insert(&mut self, value: T) -> ClockId {
        self.insert_with(|_| value)
    }

    /// Like [`Arena::insert`], building the value from the handle it will live under
    pub fn insert_with(&mut self, make: impl FnOnce(ClockId) -> T) -> ClockId {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(slot.value.is_none(), "allocating an in-use slot");
            let id = ClockId { index, generation: slot.generation };
            slot.value = Some(make(id));
            return id;
        }
        let id = ClockId { index: self.slots.len() as u32, generation: 0 };
        self.slots.push(Slot { generation: 0, value: Some(make(id)) });
        id
    }

    pub fn remove(&mut self, id: ClockId) -> Option<T> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        Some(value)
    }

    #[inline]
    pub fn contains(&self, id: ClockId) -> bool {
        self.get(id).is_some()
    }

    #[inline]
    pub fn get(&self, id: ClockId) -> Option<&T> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.value.as_ref()
    }

    #[inline]
    pub fn get_mut(&mut self, id: ClockId) -> Option<&mut T> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.value.as_mut()
    }

    /// First live entry strictly after `previous` in slot order, or the first entry when
    /// `previous` is `None`.
    ///
    /// A stale `previous` still resumes from its slot position.
    pub fn next_after(&self, previous: Option<ClockId>) -> Option<ClockId> {
        let start = previous.map_or(0, |id| id.index as usize + 1);
        self.slots.iter().enumerate().skip(start).find_map(|(index, slot)| {
            slot.value.as_ref().map(|_| ClockId { index: index as u32, generation: slot.generation })
        })
    }

    /// Live handles in slot order
    pub fn ids(&self) -> Vec<ClockId> {
        self.iter().map(|(id, _)| id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ClockId, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (ClockId { index: index as u32, generation: slot.generation }, value))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_insert_remove_roundtrip() {
        let mut a = Arena::new();
        let h1 = a.insert("a");
        let h2 = a.insert("b");
        let h3 = a.insert("c");
        assert_eq!(a.len(), 3);

        assert_eq!(a.remove(h2), Some("b"));
        assert!(a.get(h2).is_none());
        assert_eq!(a.get(h1), Some(&"a"));
        assert_eq!(a.get(h3), Some(&"c"));

        let h4 = a.insert("d");
        assert_eq!(h4.index, h2.index, "freed slot reused");
        assert_ne!(h4, h2, "generation bumped on reuse");
        assert!(a.get(h2).is_none(), "stale handle must not alias the new value");
        assert_eq!(a.get(h4), Some(&"d"));
    }

    #[test]
    fn double_remove_is_none() {
        let mut a = Arena::new();
        let h = a.insert(1);
        assert_eq!(a.remove(h), Some(1));
        assert_eq!(a.remove(h), None);
        assert!(a.is_empty());
    }

    #[test]
    fn next_after_walks_slot_order() {
        let mut a = Arena::new();
        let h1 = a.insert(1);
        let h2 = a.insert(2);
        let h3 = a.insert(3);
        a.remove(h2);

        assert_eq!(a.next_after(None), Some(h1));
        assert_eq!(a.next_after(Some(h1)), Some(h3));
        assert_eq!(a.next_after(Some(h2)), Some(h3));
        assert_eq!(a.next_after(Some(h3)), None);
        assert_eq!(a.ids(), vec![h1, h3]);
    }
}
