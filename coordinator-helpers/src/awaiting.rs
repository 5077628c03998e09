use std::collections::HashMap;
use std::hash::Hash;

/// Maintains a mapping from request IDs to whatever is waiting on their outcome.
///
/// Owned by a single task, so no locking. Registering an ID that is already live is refused, which
/// keeps at most one waiter per outstanding request.
pub struct Awaiting<Id, Waiter> {
    map: HashMap<Id, Waiter>,
}

impl<Id, Waiter> Awaiting<Id, Waiter>
where
    Id: Copy + Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Registers `waiter` under `id`, handing it back if the ID is already taken.
    pub fn register(&mut self, id: Id, waiter: Waiter) -> Result<(), Waiter> {
        if self.map.contains_key(&id) {
            return Err(waiter);
        }
        self.map.insert(id, waiter);
        Ok(())
    }

    pub fn deregister(&mut self, id: &Id) -> Option<Waiter> {
        self.map.remove(id)
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.map.contains_key(id)
    }

    pub fn get(&self, id: &Id) -> Option<&Waiter> {
        self.map.get(id)
    }

    pub fn get_mut(&mut self, id: &Id) -> Option<&mut Waiter> {
        self.map.get_mut(id)
    }

    /// First ID whose waiter satisfies `predicate`.
    pub fn find<F>(&self, mut predicate: F) -> Option<Id>
    where
        F: FnMut(&Id, &Waiter) -> bool,
    {
        self.map
            .iter()
            .find(|(id, waiter)| predicate(id, waiter))
            .map(|(id, _)| *id)
    }

    /// Removes and returns every waiter satisfying `predicate`.
    pub fn remove_where<F>(&mut self, mut predicate: F) -> Vec<(Id, Waiter)>
    where
        F: FnMut(&Id, &Waiter) -> bool,
    {
        let ids: Vec<Id> = self
            .map
            .iter()
            .filter(|(id, waiter)| predicate(id, waiter))
            .map(|(id, _)| *id)
            .collect();

        ids.into_iter()
            .filter_map(|id| self.map.remove(&id).map(|waiter| (id, waiter)))
            .collect()
    }

    pub fn drain(&mut self) -> Vec<(Id, Waiter)> {
        self.map.drain().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Id, &Waiter)> {
        self.map.iter()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl<Id, Waiter> Default for Awaiting<Id, Waiter>
where
    Id: Copy + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_duplicate_ids() {
        let mut awaiting = Awaiting::new();
        assert!(awaiting.register(1u8, "first").is_ok());
        assert_eq!(awaiting.register(1u8, "second"), Err("second"));
        assert_eq!(awaiting.deregister(&1), Some("first"));
        assert!(awaiting.is_empty());
    }

    #[test]
    fn remove_where_only_takes_matches() {
        let mut awaiting = Awaiting::new();
        for id in 0u8..5 {
            awaiting.register(id, u32::from(id) * 10).unwrap();
        }

        let mut removed = awaiting.remove_where(|_, value| *value >= 30);
        removed.sort();
        assert_eq!(removed, vec![(3, 30), (4, 40)]);
        assert_eq!(awaiting.len(), 3);
        assert_eq!(awaiting.find(|_, value| *value == 20), Some(2));
    }
}
