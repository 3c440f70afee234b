//! Multicast listener registry: an explicit ordered list of subscribers
//! addressed by handles, so callers can unsubscribe without knowing their
//! position and notification order stays stable.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Entry<E> {
    id: ListenerId,
    callback: Box<dyn FnMut(&E)>,
}

pub struct Listeners<E> {
    entries: Vec<Entry<E>>,
    next_id: u64,
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Listeners<E> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }

    pub fn add(&mut self, callback: impl FnMut(&E) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            callback: Box::new(callback),
        });
        id
    }

    /// Returns true when the handle was still subscribed.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    pub fn emit(&mut self, event: &E) {
        for entry in self.entries.iter_mut() {
            (entry.callback)(event);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
