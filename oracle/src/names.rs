use std::borrow::Borrow;
use std::rc::Rc;

use hashbrown::HashMap;

/// Interned identifier used as a scope key.
#[derive(Clone, PartialEq, Eq, Hash)]
pub(crate) struct Name {
    inner: Rc<str>,
}

impl Name {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.inner
    }
}

#[derive(Clone, Default)]
pub(crate) struct Names {
    map: HashMap<Rc<str>, ()>,
}

impl Names {
    pub fn get_str(&mut self, name: &str) -> Name {
        let inner = match self.map.get_key_value(name) {
            Some((inner, ())) => inner.clone(),
            None => {
                let inner: Rc<str> = Rc::from(name);
                self.map.insert(inner.clone(), ());
                inner
            }
        };
        Name { inner }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }
}

impl Borrow<str> for Name {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.as_str().fmt(f)
    }
}

impl std::fmt::Debug for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.as_str().fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_shares_storage() {
        let mut names = Names::default();
        let a = names.get_str("p");
        let b = names.get_str("p");
        let c = names.get_str("q");
        assert!(Rc::ptr_eq(&a.inner, &b.inner));
        assert_ne!(a, c);
        assert_eq!(names.len(), 2);
    }
}
