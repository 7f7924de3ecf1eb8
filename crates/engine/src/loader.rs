//! Host module discovery

use crate::error::HostError;
use crate::globals::HostGlobals;

/// PE file header size (IMAGE_FILE_HEADER)
const FILE_HEADER_SIZE: usize = 20;

/// PE section header size (IMAGE_SECTION_HEADER)
const SECTION_HEADER_SIZE: usize = 40;

/// Executable code range of a loaded module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleRange {
    base: *const u8,
    size: usize,
}

// SAFETY: The range describes host code mapped for the process lifetime.
unsafe impl Send for ModuleRange {}
unsafe impl Sync for ModuleRange {}

impl ModuleRange {
    /// Create a range from a base address and size
    pub const fn new(base: *const u8, size: usize) -> Self {
        Self { base, size }
    }

    /// Start of the range
    pub fn base(&self) -> *const u8 {
        self.base
    }

    /// Length of the range in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Check whether an address falls inside the range
    pub fn contains(&self, addr: *const u8) -> bool {
        let start = self.base as usize;
        let addr = addr as usize;
        addr >= start && addr < start.saturating_add(self.size)
    }

    /// View the range as bytes
    ///
    /// # Safety
    /// The whole range must be mapped and readable.
    pub unsafe fn as_slice(&self) -> &[u8] {
        std::slice::from_raw_parts(self.base, self.size)
    }
}

fn read_u16(bytes: &[u8], at: usize) -> Option<u16> {
    bytes
        .get(at..at + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    bytes
        .get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Find the `.text` section of a PE image
///
/// `headers` must start at the image base and cover the section table.
///
/// # Returns
/// `(virtual_address, virtual_size)` of the section
pub fn text_section(headers: &[u8]) -> Result<(usize, usize), HostError> {
    if headers.get(0..2) != Some(b"MZ".as_slice()) {
        return Err(HostError::MalformedImage("missing DOS signature"));
    }

    let nt = read_u32(headers, 0x3C).ok_or(HostError::MalformedImage("truncated DOS header"))?
        as usize;
    if headers.get(nt..nt + 4) != Some(b"PE\0\0".as_slice()) {
        return Err(HostError::MalformedImage("missing NT signature"));
    }

    let file_header = nt + 4;
    let sections = read_u16(headers, file_header + 2)
        .ok_or(HostError::MalformedImage("truncated file header"))?;
    let optional_size = read_u16(headers, file_header + 16)
        .ok_or(HostError::MalformedImage("truncated file header"))?;

    let table = file_header + FILE_HEADER_SIZE + optional_size as usize;
    for i in 0..sections as usize {
        let header = table + i * SECTION_HEADER_SIZE;
        let name = headers
            .get(header..header + 8)
            .ok_or(HostError::MalformedImage("truncated section table"))?;

        if name.starts_with(b".text") {
            let size = read_u32(headers, header + 8)
                .ok_or(HostError::MalformedImage("truncated section table"))?;
            let rva = read_u32(headers, header + 12)
                .ok_or(HostError::MalformedImage("truncated section table"))?;
            return Ok((rva as usize, size as usize));
        }
    }

    Err(HostError::MalformedImage("no .text section"))
}

/// Locate the executable code of the host's main module
#[cfg(windows)]
pub fn locate_main_module() -> Result<ModuleRange, HostError> {
    use windows::core::PCWSTR;
    use windows::Win32::System::LibraryLoader::GetModuleHandleW;

    /// Size of the header page read when parsing a mapped PE image
    const PE_HEADER_SPAN: usize = 0x1000;

    let module = unsafe { GetModuleHandleW(PCWSTR::null()) }
        .map_err(|e| HostError::ModuleNotFound(e.to_string()))?;
    let base = module.0 as *const u8;
    if base.is_null() {
        return Err(HostError::ModuleNotFound("null module handle".into()));
    }

    // SAFETY: The first page of a loaded image holds its headers.
    let headers = unsafe { std::slice::from_raw_parts(base, PE_HEADER_SPAN) };
    let (rva, size) = text_section(headers)?;

    Ok(ModuleRange::new(unsafe { base.add(rva) }, size))
}

/// Locate the executable code of the host's main module
#[cfg(all(target_os = "linux", target_pointer_width = "64"))]
pub fn locate_main_module() -> Result<ModuleRange, HostError> {
    use std::ffi::{c_int, c_void};

    unsafe extern "C" fn visit(
        info: *mut libc::dl_phdr_info,
        _size: libc::size_t,
        data: *mut c_void,
    ) -> c_int {
        let out = &mut *(data as *mut Option<ModuleRange>);
        let info = &*info;

        // The first entry is always the main program
        for i in 0..info.dlpi_phnum as usize {
            let phdr = &*info.dlpi_phdr.add(i);
            if phdr.p_type == libc::PT_LOAD && phdr.p_flags & libc::PF_X != 0 {
                let base = (info.dlpi_addr + phdr.p_vaddr) as *const u8;
                *out = Some(ModuleRange::new(base, phdr.p_memsz as usize));
                break;
            }
        }
        1
    }

    let mut found: Option<ModuleRange> = None;
    unsafe {
        libc::dl_iterate_phdr(Some(visit), &mut found as *mut _ as *mut c_void);
    }

    found.ok_or_else(|| HostError::ModuleNotFound("no executable segment".into()))
}

/// Locate the executable code of the host's main module
#[cfg(not(any(windows, all(target_os = "linux", target_pointer_width = "64"))))]
pub fn locate_main_module() -> Result<ModuleRange, HostError> {
    Err(HostError::Unsupported)
}

/// Discover the host and build its globals
///
/// Called during load, before any signature is resolved.
#[tracing::instrument(skip_all)]
pub fn load_host() -> Result<HostGlobals, HostError> {
    let module = locate_main_module()?;
    tracing::info!(
        "Host code section: {:p} (+{:#x} bytes)",
        module.base(),
        module.size()
    );
    Ok(HostGlobals::new(module))
}
