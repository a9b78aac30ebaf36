//! Process resource sampling.
//!
//! # Responsibilities
//! - Snapshot CPU time consumed by the process
//! - Sample resident and virtual memory for the memory gauges
//! - Track live heap bytes when `TrackingAllocator` is the global allocator
//!
//! # Design Decisions
//! - CPU and memory come from `sysinfo`, refreshed for this process only
//! - Sampling never fails: an unknown pid or a missing process reads as zeros

use std::alloc::{GlobalAlloc, Layout, System as SystemAllocator};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// CPU time consumed by the process so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuUsage {
    /// User plus system time.
    pub accumulated: Duration,
}

impl CpuUsage {
    pub fn from_millis(millis: u64) -> Self {
        Self {
            accumulated: Duration::from_millis(millis),
        }
    }

    /// Seconds consumed since `earlier`; never negative.
    pub fn seconds_since(&self, earlier: &CpuUsage) -> f64 {
        self.accumulated
            .saturating_sub(earlier.accumulated)
            .as_secs_f64()
    }
}

/// Memory usage in bytes, split the way the memory gauge is labeled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemorySample {
    /// Resident set size.
    pub rss: u64,
    /// Virtual memory reserved by the process.
    pub heap_total: u64,
    /// Live bytes handed out by the allocator.
    pub heap_used: u64,
    /// Resident memory the allocator does not account for.
    pub external: u64,
}

impl MemorySample {
    /// Combine process-level readings with the allocator's live byte count.
    pub fn from_readings(rss: u64, virtual_memory: u64, heap_used: u64) -> Self {
        Self {
            rss,
            heap_total: virtual_memory,
            heap_used,
            external: rss.saturating_sub(heap_used),
        }
    }

    /// `(type label, bytes)` pairs in gauge order.
    pub fn series(&self) -> [(&'static str, u64); 4] {
        [
            ("rss", self.rss),
            ("heapTotal", self.heap_total),
            ("heapUsed", self.heap_used),
            ("external", self.external),
        ]
    }
}

/// One reading of this process's CPU and memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessSnapshot {
    pub cpu: CpuUsage,
    pub memory: MemorySample,
}

/// Samples the current process through a shared `sysinfo::System`.
pub struct ProcessSampler {
    pid: Option<Pid>,
    system: Mutex<System>,
}

impl ProcessSampler {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                tracing::warn!(error = e, "Cannot resolve own pid, process metrics read as zero");
                None
            }
        };
        Self {
            pid,
            system: Mutex::new(System::new()),
        }
    }

    /// Refresh this process and read its CPU time and memory.
    pub fn snapshot(&self) -> ProcessSnapshot {
        let heap_used = allocated_bytes() as u64;
        let Some(pid) = self.pid else {
            return ProcessSnapshot {
                cpu: CpuUsage::default(),
                memory: MemorySample::from_readings(0, 0, heap_used),
            };
        };

        let mut system = match self.system.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_cpu().with_memory(),
        );

        match system.process(pid) {
            Some(process) => ProcessSnapshot {
                cpu: CpuUsage::from_millis(process.accumulated_cpu_time()),
                memory: MemorySample::from_readings(
                    process.memory(),
                    process.virtual_memory(),
                    heap_used,
                ),
            },
            None => ProcessSnapshot {
                cpu: CpuUsage::default(),
                memory: MemorySample::from_readings(0, 0, heap_used),
            },
        }
    }
}

impl Default for ProcessSampler {
    fn default() -> Self {
        Self::new()
    }
}

static ALLOCATED: AtomicUsize = AtomicUsize::new(0);

/// Live heap bytes, as counted by `TrackingAllocator`.
///
/// Always zero unless the binary installs the allocator.
pub fn allocated_bytes() -> usize {
    ALLOCATED.load(Ordering::Relaxed)
}

/// System allocator wrapper that counts live bytes.
pub struct TrackingAllocator;

unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = SystemAllocator.alloc(layout);
        if !ptr.is_null() {
            ALLOCATED.fetch_add(layout.size(), Ordering::Relaxed);
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = SystemAllocator.alloc_zeroed(layout);
        if !ptr.is_null() {
            ALLOCATED.fetch_add(layout.size(), Ordering::Relaxed);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        SystemAllocator.dealloc(ptr, layout);
        ALLOCATED.fetch_sub(layout.size(), Ordering::Relaxed);
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = SystemAllocator.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            ALLOCATED.fetch_sub(layout.size(), Ordering::Relaxed);
            ALLOCATED.fetch_add(new_size, Ordering::Relaxed);
        }
        new_ptr
    }
}
