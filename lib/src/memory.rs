//! Flat memory model: a single fixed-size byte arena partitioned into
//! contiguous owned blocks, allocated first-fit per process.
use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Mutex;

use thiserror::Error;

/// Contract violations on the allocator surface. Ordinary allocation
/// failure is not an error; `allocate` returns `None` and the caller
/// retries.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MemoryError {
    #[error("offset {offset} is outside the arena of {max_memory} bytes")]
    OutOfBounds { offset: usize, max_memory: usize },
    #[error("offset {offset} points inside the block owned by {owner} and was never returned by allocate")]
    NotABlockStart { offset: usize, owner: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Block {
    owner: String,
    size: usize,
}

#[derive(Default)]
struct ArenaState {
    /// Start offset to owned block. Everything between blocks is free.
    blocks: BTreeMap<usize, Block>,
    allocated: usize,
}

/// First-fit allocator over a contiguous byte range. All operations take
/// `&self`; the occupancy map sits behind one lock so allocate and
/// deallocate never interleave their view of the arena.
pub struct FlatMemoryAllocator {
    max_memory: usize,
    state: Mutex<ArenaState>,
}

impl FlatMemoryAllocator {
    pub fn new(max_memory: usize) -> Self {
        Self {
            max_memory,
            state: Mutex::new(ArenaState::default()),
        }
    }

    pub fn max_memory(&self) -> usize {
        self.max_memory
    }

    /// Grant the lowest-addressed free run of `size` bytes to `owner`.
    /// Returns the start offset, or `None` when no run fits; the caller is
    /// expected to keep the process queued and retry later.
    pub fn allocate(&self, size: usize, owner: &str) -> Option<usize> {
        if size == 0 || size > self.max_memory {
            return None;
        }
        let mut state = self.state.lock().unwrap();
        let offset = first_fit(&state.blocks, self.max_memory, size)?;
        state.blocks.insert(
            offset,
            Block {
                owner: owner.to_string(),
                size,
            },
        );
        state.allocated += size;
        Some(offset)
    }

    /// Free the block previously granted at `offset`. Exactly the granted
    /// size is reclaimed. Freeing an already-free offset is a no-op; an
    /// offset outside the arena or inside a block is a caller bug.
    pub fn deallocate(&self, offset: usize) -> Result<(), MemoryError> {
        if offset >= self.max_memory {
            return Err(MemoryError::OutOfBounds {
                offset,
                max_memory: self.max_memory,
            });
        }
        let mut state = self.state.lock().unwrap();
        if let Some(block) = state.blocks.remove(&offset) {
            state.allocated -= block.size;
            return Ok(());
        }
        if let Some((start, block)) = state.blocks.range(..offset).next_back() {
            if offset < start + block.size {
                return Err(MemoryError::NotABlockStart {
                    offset,
                    owner: block.owner.clone(),
                });
            }
        }
        Ok(())
    }

    /// Free bytes across the whole arena. This deliberately preserves the
    /// metric reported by the original teaching tool rather than strictly
    /// external fragmentation; see DESIGN.md.
    pub fn fragmentation_bytes(&self) -> usize {
        self.max_memory - self.state.lock().unwrap().allocated
    }

    /// Number of processes currently resident. Each resident process owns
    /// exactly one block, so this counts identities directly instead of
    /// dividing occupied bytes by a configured size.
    pub fn process_count(&self) -> usize {
        self.state.lock().unwrap().blocks.len()
    }

    pub fn allocated_bytes(&self) -> usize {
        self.state.lock().unwrap().allocated
    }

    pub fn free_bytes(&self) -> usize {
        self.max_memory - self.state.lock().unwrap().allocated
    }

    pub fn owner_at(&self, offset: usize) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .blocks
            .range(..=offset)
            .next_back()
            .filter(|(start, block)| offset < *start + block.size)
            .map(|(_, block)| block.owner.clone())
    }

    /// Render the arena from the highest address down to zero as
    /// `<endOffset>` / `<owner or blank>` pairs per contiguous run,
    /// terminated by the start marker. Same occupancy, same output.
    pub fn snapshot(&self, timestamp: &str) -> String {
        let state = self.state.lock().unwrap();
        let mut out = String::new();
        let _ = writeln!(out, "Timestamp: {}", timestamp);
        let _ = writeln!(out, "Number of processes in memory: {}", state.blocks.len());
        let _ = writeln!(
            out,
            "Total external fragmentation in KB: {}",
            self.max_memory - state.allocated
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "----end---- = {}", self.max_memory);
        let _ = writeln!(out);
        let mut cursor = self.max_memory;
        for (start, block) in state.blocks.iter().rev() {
            let end = start + block.size;
            if end < cursor {
                let _ = writeln!(out, "{}", cursor);
                let _ = writeln!(out);
            }
            let _ = writeln!(out, "{}", end);
            let _ = writeln!(out, "{}", block.owner);
            cursor = *start;
        }
        if cursor > 0 {
            let _ = writeln!(out, "{}", cursor);
            let _ = writeln!(out);
        }
        let _ = writeln!(out, "----start---- = 0");
        out
    }
}

fn first_fit(blocks: &BTreeMap<usize, Block>, max_memory: usize, size: usize) -> Option<usize> {
    let mut cursor = 0;
    for (start, block) in blocks {
        if start - cursor >= size {
            return Some(cursor);
        }
        cursor = start + block.size;
    }
    if max_memory - cursor >= size {
        Some(cursor)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_fit_reuses_lowest_freed_block() {
        let allocator = FlatMemoryAllocator::new(1024);
        assert_eq!(allocator.allocate(256, "P1"), Some(0));
        assert_eq!(allocator.allocate(256, "P2"), Some(256));
        allocator.deallocate(0).unwrap();
        assert_eq!(allocator.allocate(256, "P3"), Some(0));
        assert_eq!(allocator.owner_at(0), Some("P3".to_string()));
        assert_eq!(allocator.owner_at(256), Some("P2".to_string()));
    }

    #[test]
    fn test_first_fit_skips_undersized_gap() {
        let allocator = FlatMemoryAllocator::new(512);
        assert_eq!(allocator.allocate(100, "A"), Some(0));
        assert_eq!(allocator.allocate(50, "B"), Some(100));
        assert_eq!(allocator.allocate(100, "C"), Some(150));
        allocator.deallocate(100).unwrap();
        assert_eq!(allocator.allocate(40, "D"), Some(100));
        // The remaining 10-byte hole at 140 cannot hold 60 bytes.
        assert_eq!(allocator.allocate(60, "E"), Some(250));
    }

    #[test]
    fn test_allocate_denied_when_no_run_fits() {
        let allocator = FlatMemoryAllocator::new(512);
        assert_eq!(allocator.allocate(256, "A"), Some(0));
        assert_eq!(allocator.allocate(256, "B"), Some(256));
        assert_eq!(allocator.allocate(1, "C"), None);
        // Denial leaves the arena untouched.
        assert_eq!(allocator.allocated_bytes(), 512);
        assert_eq!(allocator.process_count(), 2);
    }

    #[test]
    fn test_allocate_denied_for_oversized_or_empty_request() {
        let allocator = FlatMemoryAllocator::new(1024);
        assert_eq!(allocator.allocate(2048, "A"), None);
        assert_eq!(allocator.allocate(0, "A"), None);
    }

    #[test]
    fn test_deallocate_free_offset_is_noop() {
        let allocator = FlatMemoryAllocator::new(1024);
        assert_eq!(allocator.allocate(256, "P1"), Some(0));
        allocator.deallocate(0).unwrap();
        let fragmentation = allocator.fragmentation_bytes();
        allocator.deallocate(0).unwrap();
        allocator.deallocate(512).unwrap();
        assert_eq!(allocator.fragmentation_bytes(), fragmentation);
        assert_eq!(allocator.allocated_bytes(), 0);
    }

    #[test]
    fn test_deallocate_out_of_bounds_is_contract_violation() {
        let allocator = FlatMemoryAllocator::new(1024);
        assert_eq!(
            allocator.deallocate(1024),
            Err(MemoryError::OutOfBounds {
                offset: 1024,
                max_memory: 1024
            })
        );
    }

    #[test]
    fn test_deallocate_inside_block_is_contract_violation() {
        let allocator = FlatMemoryAllocator::new(1024);
        assert_eq!(allocator.allocate(256, "P1"), Some(0));
        assert_eq!(
            allocator.deallocate(100),
            Err(MemoryError::NotABlockStart {
                offset: 100,
                owner: "P1".to_string()
            })
        );
        // The violation must not disturb the block.
        assert_eq!(allocator.owner_at(100), Some("P1".to_string()));
        assert_eq!(allocator.allocated_bytes(), 256);
    }

    #[test]
    fn test_conservation_across_allocate_deallocate_pairs() {
        let allocator = FlatMemoryAllocator::new(1024);
        let a = allocator.allocate(300, "A").unwrap();
        let b = allocator.allocate(200, "B").unwrap();
        assert_eq!(allocator.allocated_bytes() + allocator.free_bytes(), 1024);
        allocator.deallocate(a).unwrap();
        assert_eq!(allocator.allocated_bytes() + allocator.free_bytes(), 1024);
        let c = allocator.allocate(100, "C").unwrap();
        assert_eq!(allocator.allocated_bytes() + allocator.free_bytes(), 1024);
        allocator.deallocate(b).unwrap();
        allocator.deallocate(c).unwrap();
        assert_eq!(allocator.free_bytes(), 1024);
    }

    #[test]
    fn test_intervals_never_overlap() {
        let allocator = FlatMemoryAllocator::new(1024);
        let a = allocator.allocate(256, "A").unwrap();
        let b = allocator.allocate(256, "B").unwrap();
        let c = allocator.allocate(256, "C").unwrap();
        assert!(a + 256 <= b);
        assert!(b + 256 <= c);
        for offset in [a, b, c] {
            for probe in offset..offset + 256 {
                assert!(allocator.owner_at(probe).is_some());
            }
        }
        allocator.deallocate(b).unwrap();
        // The freed run is ownerless, its neighbours untouched.
        assert_eq!(allocator.owner_at(b), None);
        assert_eq!(allocator.owner_at(a), Some("A".to_string()));
        assert_eq!(allocator.owner_at(c), Some("C".to_string()));
    }

    #[test]
    fn test_fragmentation_counts_all_free_bytes() {
        let allocator = FlatMemoryAllocator::new(1024);
        assert_eq!(allocator.fragmentation_bytes(), 1024);
        allocator.allocate(256, "A").unwrap();
        allocator.allocate(256, "B").unwrap();
        assert_eq!(allocator.fragmentation_bytes(), 512);
        allocator.deallocate(0).unwrap();
        assert_eq!(allocator.fragmentation_bytes(), 768);
    }

    #[test]
    fn test_process_count_with_mixed_sizes() {
        let allocator = FlatMemoryAllocator::new(1024);
        assert_eq!(allocator.process_count(), 0);
        allocator.allocate(100, "A").unwrap();
        allocator.allocate(300, "B").unwrap();
        assert_eq!(allocator.process_count(), 2);
        allocator.deallocate(0).unwrap();
        assert_eq!(allocator.process_count(), 1);
    }

    #[test]
    fn test_snapshot_lists_runs_high_to_low() {
        let allocator = FlatMemoryAllocator::new(16);
        allocator.allocate(4, "P1").unwrap();
        allocator.allocate(4, "P2").unwrap();
        allocator.deallocate(0).unwrap();
        let snapshot = allocator.snapshot("01/01/2026, 12:00:00 AM");
        let expected = "Timestamp: 01/01/2026, 12:00:00 AM\n\
                        Number of processes in memory: 1\n\
                        Total external fragmentation in KB: 12\n\
                        \n\
                        ----end---- = 16\n\
                        \n\
                        16\n\
                        \n\
                        8\n\
                        P2\n\
                        4\n\
                        \n\
                        ----start---- = 0\n";
        assert_eq!(snapshot, expected);
    }

    #[test]
    fn test_snapshot_is_reproducible() {
        let allocator = FlatMemoryAllocator::new(64);
        allocator.allocate(16, "P1").unwrap();
        allocator.allocate(16, "P2").unwrap();
        let first = allocator.snapshot("t");
        let second = allocator.snapshot("t");
        assert_eq!(first, second);
    }

    #[test]
    fn test_snapshot_of_full_and_empty_arena() {
        let allocator = FlatMemoryAllocator::new(8);
        let empty = allocator.snapshot("t");
        assert!(empty.contains("Number of processes in memory: 0"));
        assert!(empty.contains("8\n\n----start---- = 0\n"));

        allocator.allocate(8, "P1").unwrap();
        let full = allocator.snapshot("t");
        assert!(full.contains("8\nP1\n----start---- = 0\n"));
        assert!(full.contains("Total external fragmentation in KB: 0"));
    }
}
