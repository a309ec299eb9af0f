/// Allocates and recycles generation-tagged `u32` slot indices.
///
/// Backs every "index into a slot array" in the engine (render pass
/// subscriptions in particular). A freed index goes onto a free list and is
/// handed out again by the next allocation, so the backing array never grows
/// while there are holes. Each reuse bumps the slot's generation, which lets
/// stale ids be detected instead of aliasing the new occupant.
///
/// # Example
///
/// ```ignore
/// let mut alloc = SlotAllocator::new();
/// let a = alloc.alloc();   // index 0, generation 0
/// alloc.free(a);
/// let b = alloc.alloc();   // index 0, generation 1
/// assert!(!alloc.is_live(a));
/// ```

/// Index plus the generation it was allocated in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId {
    pub index: u32,
    pub generation: u32,
}

pub struct SlotAllocator {
    /// Current generation per slot index
    generations: Vec<u32>,
    /// Whether the slot at that index is currently allocated
    occupied: Vec<bool>,
    free_list: Vec<u32>,
    len: u32,
}

impl SlotAllocator {
    /// Create a new empty allocator
    pub fn new() -> Self {
        Self {
            generations: Vec::new(),
            occupied: Vec::new(),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Allocate a slot, recycling the most recently freed index first
    pub fn alloc(&mut self) -> SlotId {
        self.len += 1;
        match self.free_list.pop() {
            Some(index) => {
                let slot = index as usize;
                self.occupied[slot] = true;
                SlotId { index, generation: self.generations[slot] }
            }
            None => {
                let index = self.generations.len() as u32;
                self.generations.push(0);
                self.occupied.push(true);
                SlotId { index, generation: 0 }
            }
        }
    }

    /// Return a slot to the pool.
    ///
    /// Returns false (and changes nothing) if `id` is stale or already free.
    pub fn free(&mut self, id: SlotId) -> bool {
        if !self.is_live(id) {
            return false;
        }
        let slot = id.index as usize;
        self.occupied[slot] = false;
        self.generations[slot] = self.generations[slot].wrapping_add(1);
        self.free_list.push(id.index);
        self.len -= 1;
        true
    }

    /// Whether `id` refers to the current occupant of its slot
    pub fn is_live(&self, id: SlotId) -> bool {
        let slot = id.index as usize;
        slot < self.occupied.len() && self.occupied[slot] && self.generations[slot] == id.generation
    }

    /// Highest index ever allocated + 1 (minimum backing capacity)
    pub fn high_water_mark(&self) -> u32 {
        self.generations.len() as u32
    }

    /// Number of currently allocated slots
    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Free everything; generations keep counting so old ids stay stale
    pub fn clear(&mut self) {
        self.free_list.clear();
        for index in (0..self.generations.len()).rev() {
            if self.occupied[index] {
                self.occupied[index] = false;
                self.generations[index] = self.generations[index].wrapping_add(1);
            }
            self.free_list.push(index as u32);
        }
        self.len = 0;
    }
}

impl Default for SlotAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "slot_allocator_tests.rs"]
mod tests;
