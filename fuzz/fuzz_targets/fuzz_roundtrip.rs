#![no_main]
use libfuzzer_sys::fuzz_target;
use xmlsift::parser::{parse_str_with_options, ParseOptions};
use xmlsift::serial::serialize;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // A document that parses strictly must re-parse to the same output.
        if let Ok(doc) = parse_str_with_options(s, &ParseOptions::default()) {
            let output = serialize(&doc);
            let reparsed = parse_str_with_options(&output, &ParseOptions::default())
                .unwrap_or_else(|e| panic!("serializer output failed to parse: {e}\n{output}"));
            assert_eq!(serialize(&reparsed), output);
        }
        let lenient = ParseOptions::default().recover(true);
        if let Ok(doc) = parse_str_with_options(s, &lenient) {
            let _ = parse_str_with_options(&serialize(&doc), &lenient);
        }
    }
});
