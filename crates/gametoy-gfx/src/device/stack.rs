/// LIFO of bindings for one binding point.
///
/// The active binding is always the top entry; an empty stack means the
/// default (null) binding.
#[derive(Debug, Clone)]
pub struct BindStack<T> {
    items: Vec<T>,
}

impl<T: Copy> BindStack<T> {
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    /// Removes the top entry and returns the binding that is now active.
    pub fn pop(&mut self) -> Option<T> {
        if self.items.pop().is_none() {
            log::debug!("bind stack popped while empty");
        }
        self.top()
    }

    #[inline]
    pub fn top(&self) -> Option<T> {
        self.items.last().copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Replaces the bottom entry, or pushes one if the stack is empty.
    pub fn set_base(&mut self, item: T) {
        match self.items.first_mut() {
            Some(base) => *base = item,
            None => self.items.push(item),
        }
    }
}

impl<T: Copy> Default for BindStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_returns_previous_top() {
        let mut s = BindStack::new();
        s.push(1);
        s.push(2);
        assert_eq!(s.top(), Some(2));
        assert_eq!(s.pop(), Some(1));
        assert_eq!(s.pop(), None);
    }

    #[test]
    fn pop_empty_is_default_binding() {
        let mut s: BindStack<u32> = BindStack::new();
        assert_eq!(s.pop(), None);
        assert!(s.is_empty());
    }

    #[test]
    fn set_base_keeps_upper_entries() {
        let mut s = BindStack::new();
        s.push(1);
        s.push(2);
        s.set_base(9);
        assert_eq!(s.top(), Some(2));
        assert_eq!(s.pop(), Some(9));
    }
}
