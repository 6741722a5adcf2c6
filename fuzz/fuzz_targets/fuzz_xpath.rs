#![no_main]
use libfuzzer_sys::fuzz_target;
use xmlsift::css;
use xmlsift::Document;

fuzz_target!(|data: &[u8]| {
    if let Ok(expr) = std::str::from_utf8(data) {
        if let Ok(doc) = Document::parse_str(
            "<root xmlns:p=\"urn:p\"><child attr=\"val\">text</child><p:x id=\"i\"/><!--c--><?pi d?></root>",
        ) {
            let _ = doc.eval(expr);
            if let Some(root) = doc.root_element() {
                let _ = root.eval(expr);
            }
            if let Ok(translated) = css::to_xpath(expr) {
                // Every translation must compile.
                if let Err(e) = doc.xpath(&translated) {
                    panic!("css {expr:?} -> {translated:?} failed: {e}");
                }
            }
        }
    }
});
