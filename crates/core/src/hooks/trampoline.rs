//! Executable memory near hook targets
//!
//! Relocated prologues and relay stubs must be reachable from the target with
//! a rel32 jump, so they are carved from pages allocated within ±2GB of it.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::ptr::NonNull;

/// Page size (4KB on most systems)
const PAGE_SIZE: usize = 4096;

/// Allocation granularity used when probing for a free page
const SEARCH_STEP: usize = PAGE_SIZE * 16;

/// Maximum search range for near allocation (2GB minus slack)
pub const MAX_RANGE: usize = 0x7FFF_0000;

/// Alignment of every block handed out
const BLOCK_ALIGN: usize = 16;

/// Global executable arena
static ARENA: Mutex<ExecArena> = Mutex::new(ExecArena::new());

/// Pages of executable memory, keyed by base address
struct ExecArena {
    pages: BTreeMap<usize, Page>,
}

struct Page {
    base: *mut u8,
    used: usize,
}

// SAFETY: Pages are only touched while the arena mutex is held
unsafe impl Send for Page {}

fn distance(a: usize, b: usize) -> usize {
    a.abs_diff(b)
}

impl ExecArena {
    const fn new() -> Self {
        Self {
            pages: BTreeMap::new(),
        }
    }

    fn alloc_near(&mut self, target: usize, size: usize) -> Option<NonNull<u8>> {
        let size = size.next_multiple_of(BLOCK_ALIGN);
        if size > PAGE_SIZE {
            return None;
        }

        // Reuse a page in range that still has room
        for (&base, page) in &mut self.pages {
            if distance(base, target) + PAGE_SIZE < MAX_RANGE && page.used + size <= PAGE_SIZE {
                let ptr = unsafe { page.base.add(page.used) };
                page.used += size;
                return NonNull::new(ptr);
            }
        }

        let base = self.map_page_near(target)?;
        self.pages.insert(
            base as usize,
            Page {
                base,
                used: size,
            },
        );
        NonNull::new(base)
    }

    /// Search outward from the target, nearest candidates first
    fn map_page_near(&mut self, target: usize) -> Option<*mut u8> {
        let origin = target & !(SEARCH_STEP - 1);

        for step in 1..(MAX_RANGE / SEARCH_STEP) {
            let delta = step * SEARCH_STEP;
            for hint in [origin.checked_sub(delta), origin.checked_add(delta)]
                .into_iter()
                .flatten()
            {
                if hint == 0 {
                    continue;
                }
                if let Some(base) = map_page(hint) {
                    if distance(base as usize, target) + PAGE_SIZE < MAX_RANGE {
                        return Some(base);
                    }
                    unmap_page(base);
                }
            }
        }

        tracing::error!("Failed to allocate executable page near {:x}", target);
        None
    }
}

#[cfg(unix)]
fn map_page(hint: usize) -> Option<*mut u8> {
    use nix::sys::mman::{mmap_anonymous, MapFlags, ProtFlags};
    use std::num::NonZeroUsize;

    let result = unsafe {
        mmap_anonymous(
            NonZeroUsize::new(hint),
            NonZeroUsize::new_unchecked(PAGE_SIZE),
            ProtFlags::PROT_READ | ProtFlags::PROT_WRITE | ProtFlags::PROT_EXEC,
            MapFlags::MAP_PRIVATE | MapFlags::MAP_ANONYMOUS,
        )
    };

    result.ok().map(|ptr| ptr.as_ptr() as *mut u8)
}

#[cfg(unix)]
fn unmap_page(base: *mut u8) {
    if let Some(ptr) = NonNull::new(base as *mut std::ffi::c_void) {
        unsafe {
            let _ = nix::sys::mman::munmap(ptr, PAGE_SIZE);
        }
    }
}

#[cfg(windows)]
fn map_page(hint: usize) -> Option<*mut u8> {
    use windows::Win32::System::Memory::{
        VirtualAlloc, MEM_COMMIT, MEM_RESERVE, PAGE_EXECUTE_READWRITE,
    };

    let result = unsafe {
        VirtualAlloc(
            Some(hint as *const std::ffi::c_void),
            PAGE_SIZE,
            MEM_COMMIT | MEM_RESERVE,
            PAGE_EXECUTE_READWRITE,
        )
    };

    (!result.is_null()).then_some(result as *mut u8)
}

#[cfg(windows)]
fn unmap_page(base: *mut u8) {
    use windows::Win32::System::Memory::{VirtualFree, MEM_RELEASE};

    unsafe {
        let _ = VirtualFree(base as *mut std::ffi::c_void, 0, MEM_RELEASE);
    }
}

/// Allocate an executable block of `size` bytes within rel32 reach of `target`
pub fn alloc_near(target: *const u8, size: usize) -> Option<NonNull<u8>> {
    ARENA.lock().alloc_near(target as usize, size)
}
