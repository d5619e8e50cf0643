use std::fmt;
use std::rc::Rc;

/// Content-independent handle of a managed object.
///
/// Derived from the address of the shared allocation holding the object, so
/// it never depends on mutable field content. The address is stable for as
/// long as some `Rc` keeps the allocation alive; the unit of work retains a
/// clone of every object it tracks, so a handle cannot be reused while it is
/// still a key in any side table.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle(usize);

impl ObjectHandle {
    /// Handle of the allocation behind `rc`.
    pub fn of<T: ?Sized>(rc: &Rc<T>) -> Self {
        Self(Rc::as_ptr(rc) as *const () as usize)
    }

    /// The raw handle value.
    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectHandle({:#x})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use std::cell::RefCell;

    #[test]
    fn clones_share_a_handle() {
        let a = Rc::new(RefCell::new(5u32));
        let b = Rc::clone(&a);
        assert_eq!(ObjectHandle::of(&a), ObjectHandle::of(&b));
    }

    #[test]
    fn distinct_allocations_differ() {
        let a = Rc::new(RefCell::new(5u32));
        let b = Rc::new(RefCell::new(5u32));
        assert_ne!(ObjectHandle::of(&a), ObjectHandle::of(&b));
    }

    #[test]
    fn erased_pointer_keeps_the_handle() {
        let a = Rc::new(RefCell::new(String::from("x")));
        let erased: Rc<dyn Any> = a.clone();
        assert_eq!(ObjectHandle::of(&a), ObjectHandle::of(&erased));
    }
}
