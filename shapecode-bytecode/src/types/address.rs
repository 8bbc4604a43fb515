use std::fmt;

/// Index of an instruction inside a chain arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(pub u32);

/// Byte address inside a heap image; zero is the null address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Addr(pub usize);

impl OpId {
    pub fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl Addr {
    pub const NULL: Addr = Addr(0);

    pub fn new(addr: usize) -> Self {
        Self(addr)
    }

    pub fn get(&self) -> usize {
        self.0
    }

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Address `bytes` past this one, or `None` on overflow
    pub fn offset(&self, bytes: usize) -> Option<Addr> {
        self.0.checked_add(bytes).map(Addr)
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_id() {
        let id = OpId::new(42);
        assert_eq!(id.index(), 42);
        assert_eq!(id.to_string(), "#42");
    }

    #[test]
    fn test_addr() {
        assert!(Addr::NULL.is_null());
        assert_eq!(Addr::new(16).offset(8), Some(Addr(24)));
        assert_eq!(Addr::new(usize::MAX).offset(1), None);
        assert_eq!(Addr::new(255).to_string(), "0xff");
    }
}
