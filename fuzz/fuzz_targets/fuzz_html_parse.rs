#![no_main]
use libfuzzer_sys::fuzz_target;
use xmlsift::html::HtmlDocument;
use xmlsift::serial::{serialize_with_options, SerializeOptions};

fuzz_target!(|data: &[u8]| {
    // Byte input exercises <meta charset> sniffing as well as the builder.
    if let Ok(doc) = HtmlDocument::parse_reader(data, &xmlsift::ParseOptions::html()) {
        let _ = doc.title();
        let _ = serialize_with_options(&doc, &SerializeOptions::default().html(true));
    }
});
