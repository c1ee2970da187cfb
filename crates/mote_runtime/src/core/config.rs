//! Heap sizing knobs and heap statistics selectors.

/// Sizing for one fixed-cell arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaOpts {
    /// Cells allocated per block.
    pub cells_per_block: u32,
    /// Hard cap on block count; allocation past this triggers a
    /// collection and then fails with out-of-memory.
    pub max_blocks: usize,
}

impl ArenaOpts {
    pub const fn new(cells_per_block: u32, max_blocks: usize) -> Self {
        Self {
            cells_per_block,
            max_blocks,
        }
    }
}

/// Options applied when a runtime is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateOpts {
    pub object_arena: ArenaOpts,
    pub function_arena: ArenaOpts,
    pub property_arena: ArenaOpts,
    /// Interpreter recursion ceiling.
    pub max_call_depth: usize,
    /// Statements executed between interrupt-flag checks.
    pub interrupt_interval: u32,
    /// Allocations tolerated since the last collection before the
    /// interpreter schedules one at the next statement boundary.
    pub gc_alloc_threshold: usize,
}

impl Default for CreateOpts {
    fn default() -> Self {
        Self {
            object_arena: ArenaOpts::new(512, 64),
            function_arena: ArenaOpts::new(128, 64),
            property_arena: ArenaOpts::new(1024, 64),
            max_call_depth: 256,
            interrupt_interval: 64,
            gc_alloc_threshold: 100_000,
        }
    }
}

/// What `Runtime::heap_stat` reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapStat {
    /// Bytes occupied by live cells across all arenas.
    HeapUsed,
    /// Bytes reserved by all arena blocks, live or not.
    HeapTotal,
    /// Bytes occupied by live managed strings.
    StringUsed,
    /// Bytes reserved by the string heap.
    StringTotal,
    /// Live object cells.
    ObjectCells,
    /// Object cells reserved, live or not.
    ObjectCapacity,
    /// Size of one object cell in bytes.
    ObjectCellSize,
    /// Live function cells.
    FunctionCells,
    /// Function cells reserved, live or not.
    FunctionCapacity,
    /// Size of one function cell in bytes.
    FunctionCellSize,
    /// Live property cells.
    PropertyCells,
    /// Property cells reserved, live or not.
    PropertyCapacity,
    /// Size of one property cell in bytes.
    PropertyCellSize,
}
