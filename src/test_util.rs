//! Test support: assertion macros and story-image builders.

#[macro_export]
macro_rules! assert_ok {
    ($expression:expr) => {{
        let result = $expression;
        assert!(result.is_ok(), "{:?}", result.err());
        result.unwrap()
    }};
}

#[macro_export]
macro_rules! assert_ok_eq {
    ($expression:expr, $expected:expr) => {{
        let result = $expression;
        assert!(result.is_ok(), "{:?}", result.err());
        assert_eq!(result.unwrap(), $expected);
    }};
    ($expression:expr, $expected:expr, $($arg:tt)+) => {{
        let result = $expression;
        assert!(result.is_ok(), $($arg)+);
        assert_eq!(result.unwrap(), $expected, $($arg)+);
    }};
}

#[macro_export]
macro_rules! assert_some {
    ($expression:expr) => {{
        let option = $expression;
        assert!(option.is_some());
        option.unwrap()
    }};
}

#[macro_export]
macro_rules! assert_some_eq {
    ($expression:expr, $expected:expr) => {{
        let option = $expression;
        assert!(option.is_some());
        assert_eq!(option.unwrap(), $expected);
    }};
}

use crate::state::header::HeaderField;

/// Builds a minimal story image: 2K of memory with a 1K dynamic region,
/// the global table at 0x0100, and release/serial/checksum filled in.
///
/// # Arguments
/// * `version` - story file version
pub fn test_map(version: u8) -> Vec<u8> {
    let mut map = vec![0; 0x800];
    map[HeaderField::Version as usize] = version;
    // Release 0x1234
    map[HeaderField::Release as usize] = 0x12;
    map[HeaderField::Release as usize + 1] = 0x34;
    // Initial PC
    map[HeaderField::InitialPC as usize] = 0x04;
    map[HeaderField::InitialPC as usize + 1] = 0x00;
    // Global table at 0x0100
    map[HeaderField::GlobalTable as usize] = 0x01;
    map[HeaderField::GlobalTable as usize + 1] = 0x00;
    // Static mark at 0x0400
    map[HeaderField::StaticMark as usize] = 0x04;
    map[HeaderField::StaticMark as usize + 1] = 0x00;
    // Serial "290830"
    for (i, b) in "290830".bytes().enumerate() {
        map[HeaderField::Serial as usize + i] = b;
    }
    // File length, scaled by version
    let scale = match version {
        1..=3 => 2,
        4 | 5 => 4,
        _ => 8,
    };
    let length = map.len() / scale;
    map[HeaderField::FileLength as usize] = (length >> 8) as u8;
    map[HeaderField::FileLength as usize + 1] = length as u8;
    // Checksum 0x5678; State never recomputes it during save/restore
    map[HeaderField::Checksum as usize] = 0x56;
    map[HeaderField::Checksum as usize + 1] = 0x78;

    map
}

/// A story image with recognizable non-zero bytes above the header, so
/// memory-diff tests have something to chew on.
pub fn test_map_with_pattern(version: u8) -> Vec<u8> {
    let mut map = test_map(version);
    for i in 0x40..map.len() {
        map[i] = i as u8;
    }

    map
}
