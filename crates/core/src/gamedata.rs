//! Gamedata: host signatures and record offsets loaded from JSON
//!
//! Signatures and offsets are loaded from a gamedata file deployed with the
//! extension, so a host update only requires a new gamedata file. This is the
//! only place that knows where host functions and fields live.

use std::collections::HashMap;
use std::path::Path;

use posecam_engine::ModuleRange;
use serde::Deserialize;
use thiserror::Error;

/// Opcode of `call rel32`
const OPCODE_CALL: u8 = 0xE8;

/// Opcode of `jmp rel32`
const OPCODE_JMP: u8 = 0xE9;

/// Errors that can occur when loading or resolving gamedata
#[derive(Debug, Error)]
pub enum GamedataError {
    #[error("Failed to read gamedata file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse gamedata JSON: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Signature not found: {0}")]
    SignatureNotFound(String),

    #[error("Offset not found: {0}")]
    OffsetNotFound(String),

    #[error("Invalid signature format: {0}")]
    InvalidSignature(String),

    #[error("Failed to find signature in memory: {0}")]
    ScanFailed(String),
}

/// Platform-specific signature entry
#[derive(Debug, Deserialize)]
pub struct SignatureEntry {
    /// Module to scan
    #[serde(default = "default_library")]
    pub library: String,
    /// Windows signature pattern
    pub windows: Option<String>,
    /// Linux signature pattern
    pub linux: Option<String>,
    /// Byte offset of a rel32 operand inside the match to resolve instead of
    /// the match itself
    #[serde(default)]
    pub relative: Option<usize>,
}

fn default_library() -> String {
    "main".to_string()
}

/// Platform-specific offset entry
#[derive(Debug, Deserialize)]
pub struct OffsetEntry {
    /// Windows offset value
    pub windows: Option<i64>,
    /// Linux offset value
    pub linux: Option<i64>,
}

/// Loaded gamedata
#[derive(Debug, Default)]
pub struct Gamedata {
    signatures: HashMap<String, SignatureEntry>,
    offsets: HashMap<String, OffsetEntry>,
}

impl Gamedata {
    /// Load gamedata from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, GamedataError> {
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content)
    }

    /// Load gamedata from a JSON string
    pub fn load_from_str(json: &str) -> Result<Self, GamedataError> {
        let raw: HashMap<String, serde_json::Value> = serde_json::from_str(json)?;

        let mut gamedata = Gamedata::default();

        for (name, value) in raw {
            if let Some(signatures) = value.get("signatures") {
                let entry: SignatureEntry = serde_json::from_value(signatures.clone())?;
                gamedata.signatures.insert(name, entry);
            } else if let Some(offsets) = value.get("offsets") {
                let entry: OffsetEntry = serde_json::from_value(offsets.clone())?;
                gamedata.offsets.insert(name, entry);
            }
            // Bare signature object
            else if value.get("linux").is_some() || value.get("windows").is_some() {
                let entry: SignatureEntry = serde_json::from_value(value)?;
                gamedata.signatures.insert(name, entry);
            }
        }

        tracing::info!(
            "Loaded gamedata: {} signatures, {} offsets",
            gamedata.signatures.len(),
            gamedata.offsets.len()
        );

        Ok(gamedata)
    }

    /// Get a signature entry by name
    pub fn signature_entry(&self, name: &str) -> Result<&SignatureEntry, GamedataError> {
        self.signatures
            .get(name)
            .ok_or_else(|| GamedataError::SignatureNotFound(name.to_string()))
    }

    /// Get a signature pattern by name for the current platform
    pub fn get_signature(&self, name: &str) -> Result<&str, GamedataError> {
        let entry = self.signature_entry(name)?;

        #[cfg(target_os = "linux")]
        let sig = entry.linux.as_deref();

        #[cfg(target_os = "windows")]
        let sig = entry.windows.as_deref();

        #[cfg(not(any(target_os = "linux", target_os = "windows")))]
        let sig: Option<&str> = None;

        sig.ok_or_else(|| {
            GamedataError::SignatureNotFound(format!("{} (no signature for this platform)", name))
        })
    }

    /// Get an offset by name for the current platform
    pub fn get_offset(&self, name: &str) -> Result<i64, GamedataError> {
        let entry = self
            .offsets
            .get(name)
            .ok_or_else(|| GamedataError::OffsetNotFound(name.to_string()))?;

        #[cfg(target_os = "linux")]
        let offset = entry.linux;

        #[cfg(target_os = "windows")]
        let offset = entry.windows;

        #[cfg(not(any(target_os = "linux", target_os = "windows")))]
        let offset: Option<i64> = None;

        offset.ok_or_else(|| {
            GamedataError::OffsetNotFound(format!("{} (no offset for this platform)", name))
        })
    }
}

/// Parse a signature pattern string into bytes
///
/// Supports:
/// - Hex bytes: "55 48 89 E5"
/// - Wildcards: "55 ? 89 E5" or "55 ?? 89 E5"
pub fn parse_signature(pattern: &str) -> Result<Vec<Option<u8>>, GamedataError> {
    let bytes = pattern
        .split_whitespace()
        .map(|part| match part {
            "?" | "??" => Ok(None),
            hex => u8::from_str_radix(hex, 16).map(Some).map_err(|_| {
                GamedataError::InvalidSignature(format!("Invalid hex byte: {}", hex))
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    if bytes.is_empty() {
        return Err(GamedataError::InvalidSignature(
            "Empty signature pattern".to_string(),
        ));
    }

    Ok(bytes)
}

/// Find the first position where `pattern` matches `haystack`
pub fn find_pattern(haystack: &[u8], pattern: &[Option<u8>]) -> Option<usize> {
    if pattern.is_empty() || haystack.len() < pattern.len() {
        return None;
    }

    haystack.windows(pattern.len()).position(|window| {
        window
            .iter()
            .zip(pattern)
            .all(|(actual, expected)| expected.map_or(true, |b| b == *actual))
    })
}

/// Resolve a match to the address a signature stands for
///
/// With `relative`, the rel32 operand at that offset is resolved against the
/// end of the operand. Without it, a leading `call`/`jmp rel32` is followed
/// to its destination. Otherwise the match address itself is returned.
///
/// # Returns
/// Offset of the resolved address relative to the start of `haystack`, or
/// None if the operand lies outside the haystack.
pub fn resolve_match(haystack: &[u8], at: usize, relative: Option<usize>) -> Option<isize> {
    let operand = match relative {
        Some(offset) => at + offset,
        None => match haystack.get(at) {
            Some(&OPCODE_CALL) | Some(&OPCODE_JMP) => at + 1,
            _ => return Some(at as isize),
        },
    };

    let rel = haystack.get(operand..operand + 4)?;
    let rel = i32::from_le_bytes([rel[0], rel[1], rel[2], rel[3]]);
    Some((operand + 4) as isize + rel as isize)
}

/// Resolves named signatures to addresses in the host
pub trait SignatureResolver {
    /// Resolve a signature name to the address it stands for
    fn resolve(&self, name: &str) -> Result<*const u8, GamedataError>;

    /// Look up a named host record offset
    fn offset(&self, name: &str) -> Result<i64, GamedataError>;
}

/// Signature resolver that scans a loaded module
pub struct ModuleScanner<'a> {
    gamedata: &'a Gamedata,
    module: ModuleRange,
}

impl<'a> ModuleScanner<'a> {
    /// Create a scanner over a module's code range
    ///
    /// # Safety
    /// The whole module range must stay mapped and readable while the
    /// scanner exists.
    pub unsafe fn new(gamedata: &'a Gamedata, module: ModuleRange) -> Self {
        Self { gamedata, module }
    }
}

impl SignatureResolver for ModuleScanner<'_> {
    fn resolve(&self, name: &str) -> Result<*const u8, GamedataError> {
        let entry = self.gamedata.signature_entry(name)?;
        let pattern = parse_signature(self.gamedata.get_signature(name)?)?;

        // SAFETY: Guaranteed by the constructor contract.
        let code = unsafe { self.module.as_slice() };

        let at = find_pattern(code, &pattern)
            .ok_or_else(|| GamedataError::ScanFailed(name.to_string()))?;
        let resolved = resolve_match(code, at, entry.relative)
            .ok_or_else(|| GamedataError::ScanFailed(format!("{} (operand out of range)", name)))?;

        let address = (self.module.base() as isize + resolved) as *const u8;
        tracing::debug!("Resolved signature '{}' at {:p}", name, address);
        Ok(address)
    }

    fn offset(&self, name: &str) -> Result<i64, GamedataError> {
        self.gamedata.get_offset(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_signature() {
        let pattern = parse_signature("55 48 89 E5").unwrap();
        assert_eq!(
            pattern,
            vec![Some(0x55), Some(0x48), Some(0x89), Some(0xE5)]
        );

        let pattern = parse_signature("55 ? 89 ??").unwrap();
        assert_eq!(pattern, vec![Some(0x55), None, Some(0x89), None]);
    }

    #[test]
    fn test_parse_signature_rejects_garbage() {
        assert!(matches!(
            parse_signature("55 ZZ"),
            Err(GamedataError::InvalidSignature(_))
        ));
        assert!(matches!(
            parse_signature("   "),
            Err(GamedataError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_find_pattern_with_wildcard() {
        let data = [0x00, 0x55, 0xFF, 0x89, 0xE5, 0x00];
        let pattern = vec![Some(0x55), None, Some(0x89), Some(0xE5)];
        assert_eq!(find_pattern(&data, &pattern), Some(1));

        let missing = vec![Some(0x55), Some(0x00)];
        assert_eq!(find_pattern(&data, &missing), None);
    }

    #[test]
    fn test_resolve_follows_call() {
        // call +0x10 at offset 2, next instruction at 7, target 0x17
        let data = [0x90, 0x90, 0xE8, 0x10, 0x00, 0x00, 0x00, 0xC3];
        assert_eq!(resolve_match(&data, 2, None), Some(0x17));
    }

    #[test]
    fn test_resolve_backward_jump() {
        let data = [0x90, 0xE9, 0xFB, 0xFF, 0xFF, 0xFF];
        // next instruction at 6, rel -5
        assert_eq!(resolve_match(&data, 1, None), Some(1));
    }

    #[test]
    fn test_resolve_relative_operand() {
        // lea rcx, [rip+0x100]
        let data = [0x48, 0x8D, 0x0D, 0x00, 0x01, 0x00, 0x00];
        assert_eq!(resolve_match(&data, 0, Some(3)), Some(0x107));
        assert_eq!(resolve_match(&data, 0, Some(5)), None);
    }

    #[test]
    fn test_resolve_plain_match() {
        let data = [0x40, 0x55, 0x53];
        assert_eq!(resolve_match(&data, 1, None), Some(1));
    }

    #[test]
    fn test_module_scanner_resolves() {
        let code: Vec<u8> = vec![
            0xCC, 0xCC, 0x40, 0x55, 0x53, 0x57, // update prologue at 2
            0xE8, 0xF7, 0xFF, 0xFF, 0xFF, // call -9 -> 2
            0x48, 0x8D, 0x0D, 0x04, 0x00, 0x00, 0x00, // lea rcx,[rip+4] -> 22
        ];
        let json = r#"{
            "CameraUpdate": { "linux": "40 55 53 57", "windows": "40 55 53 57" },
            "CameraCollision": { "signatures": { "linux": "E8 ?? ?? ?? ?? 48", "windows": "E8 ?? ?? ?? ?? 48" } },
            "CameraManager": { "signatures": { "linux": "48 8D 0D", "windows": "48 8D 0D", "relative": 3 } },
            "Missing": { "linux": "DE AD BE EF", "windows": "DE AD BE EF" }
        }"#;
        let gd = Gamedata::load_from_str(json).unwrap();
        let module = ModuleRange::new(code.as_ptr(), code.len());
        let scanner = unsafe { ModuleScanner::new(&gd, module) };

        let base = code.as_ptr() as usize;
        assert_eq!(scanner.resolve("CameraUpdate").unwrap() as usize, base + 2);
        assert_eq!(scanner.resolve("CameraCollision").unwrap() as usize, base + 2);
        assert_eq!(scanner.resolve("CameraManager").unwrap() as usize, base + 22);
        assert!(matches!(
            scanner.resolve("Missing"),
            Err(GamedataError::ScanFailed(_))
        ));
        assert!(matches!(
            scanner.resolve("Unknown"),
            Err(GamedataError::SignatureNotFound(_))
        ));
    }

    #[test]
    fn test_load_gamedata_mixed_format() {
        let json = r#"{
            "CameraUpdate": {
                "linux": "40 55 53 57",
                "windows": "40 55 53 57 48 8D 6C 24 A0"
            },
            "SceneCamera::Position": {
                "offsets": { "linux": 80, "windows": 80 }
            }
        }"#;

        let gd = Gamedata::load_from_str(json).unwrap();
        assert_eq!(gd.signatures.len(), 1);
        assert_eq!(gd.offsets.len(), 1);
        assert_eq!(gd.signature_entry("CameraUpdate").unwrap().library, "main");

        #[cfg(target_os = "linux")]
        {
            assert_eq!(gd.get_signature("CameraUpdate").unwrap(), "40 55 53 57");
            assert_eq!(gd.get_offset("SceneCamera::Position").unwrap(), 80);
        }
        assert!(matches!(
            gd.get_offset("SceneCamera::LookAt"),
            Err(GamedataError::OffsetNotFound(_))
        ));
    }
}
