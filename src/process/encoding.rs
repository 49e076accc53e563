/// Text encoding of a child process output stream.
///
/// Determines both how the [`LineDecoder`](crate::process::decoder::LineDecoder)
/// scans for line separators (one or two bytes per code unit) and how raw
/// bytes are converted to UTF-8.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// Nothing is known about the stream, it is treated as UTF-8
    #[default]
    Unknown,
    /// The active ANSI code page on Windows, the locale encoding elsewhere
    PlatformCodePage,
    /// The OEM (console) code page on Windows, the locale encoding elsewhere
    OemCodePage,
    /// UTF-16, little endian
    Utf16,
    Utf8,
}

impl Encoding {
    /// Size in bytes of one code unit.
    pub fn code_unit_width(self) -> usize {
        match self {
            Encoding::Utf16 => 2,
            _ => 1,
        }
    }

    /// Converts raw bytes to UTF-8 text.
    ///
    /// Invalid sequences are replaced with U+FFFD. For UTF-16, a dangling odd
    /// byte at the end is ignored.
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Encoding::Utf16 => utf16_to_utf8(bytes),
            Encoding::PlatformCodePage => code_page_to_utf8(CodePage::Platform, bytes),
            Encoding::OemCodePage => code_page_to_utf8(CodePage::Oem, bytes),
            Encoding::Utf8 | Encoding::Unknown => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

fn utf16_to_utf8(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

#[derive(Debug, Clone, Copy)]
enum CodePage {
    Platform,
    Oem,
}

#[cfg(windows)]
fn code_page_to_utf8(cp: CodePage, bytes: &[u8]) -> String {
    use windows::Win32::Globalization::{
        CP_ACP, CP_OEMCP, MULTI_BYTE_TO_WIDE_CHAR_FLAGS, MultiByteToWideChar,
    };

    if bytes.is_empty() {
        return String::new();
    }

    let code_page = match cp {
        CodePage::Platform => CP_ACP,
        CodePage::Oem => CP_OEMCP,
    };

    // first call computes the required length
    let len = unsafe { MultiByteToWideChar(code_page, MULTI_BYTE_TO_WIDE_CHAR_FLAGS(0), bytes, None) };
    if len <= 0 {
        return String::from_utf8_lossy(bytes).into_owned();
    }

    let mut wide = vec![0u16; len as usize];
    let written = unsafe {
        MultiByteToWideChar(
            code_page,
            MULTI_BYTE_TO_WIDE_CHAR_FLAGS(0),
            bytes,
            Some(&mut wide),
        )
    };
    if written <= 0 {
        return String::from_utf8_lossy(bytes).into_owned();
    }

    wide.truncate(written as usize);
    String::from_utf16_lossy(&wide)
}

#[cfg(not(windows))]
fn code_page_to_utf8(_cp: CodePage, bytes: &[u8]) -> String {
    // code pages only exist on Windows, other platforms run with UTF-8 locales
    String::from_utf8_lossy(bytes).into_owned()
}
