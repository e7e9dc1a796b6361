//! Global bone id allocation

/// Hands out bone ids in first-seen order across every armature of one
/// export. Create a fresh allocator for each encode call.
#[derive(Debug, Default)]
pub struct BoneIdAllocator {
    next: u32,
}

impl BoneIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Number of ids handed out so far
    pub fn allocated(&self) -> u32 {
        self.next
    }

    pub fn reset(&mut self) {
        self.next = 0;
    }
}
