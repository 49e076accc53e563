use crate::process::encoding::Encoding;

#[test]
fn code_unit_width() {
    assert_eq!(Encoding::Utf16.code_unit_width(), 2);
    for encoding in [
        Encoding::Unknown,
        Encoding::PlatformCodePage,
        Encoding::OemCodePage,
        Encoding::Utf8,
    ] {
        assert_eq!(encoding.code_unit_width(), 1);
    }
}

#[test]
fn utf8_and_unknown_decode_the_same() {
    let bytes = "déjà vu".as_bytes();
    assert_eq!(Encoding::Utf8.decode(bytes), "déjà vu");
    assert_eq!(Encoding::Unknown.decode(bytes), "déjà vu");
}

#[test]
fn utf16_ignores_dangling_byte() {
    let mut bytes: Vec<u8> = "ok".encode_utf16().flat_map(u16::to_le_bytes).collect();
    bytes.push(0x41);
    assert_eq!(Encoding::Utf16.decode(&bytes), "ok");
}

#[test]
fn code_pages_keep_ascii() {
    assert_eq!(Encoding::PlatformCodePage.decode(b"plain ascii"), "plain ascii");
    assert_eq!(Encoding::OemCodePage.decode(b""), "");
}
