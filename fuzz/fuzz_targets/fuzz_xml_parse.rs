#![no_main]
use libfuzzer_sys::fuzz_target;
use xmlsift::parser::{parse_bytes, ParseOptions};

fuzz_target!(|data: &[u8]| {
    // Strict and recovery mode must return an error rather than panic.
    let _ = parse_bytes(data, &ParseOptions::default());
    let _ = parse_bytes(data, &ParseOptions::default().recover(true));
});
