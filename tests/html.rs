//! HTML documents: lenient parsing of real-world markup, querying with
//! XPath and CSS, and HTML-syntax serialization.

#![allow(clippy::unwrap_used)]

use xmlsift::serial::{serialize_with_options, SerializeOptions};
use xmlsift::{Document, Error, HtmlDocument, ParseOptions};

const PAGE: &str = r#"<!DOCTYPE html>
<HTML lang=en>
<head>
  <meta charset="utf-8">
  <title>Release notes</title>
  <style>p > b { color: red }</style>
</head>
<body>
  <h1 id=top>Notes &amp; changes</h1>
  <ul class="list changes">
    <li class=item>Faster <b>queries</b>
    <li class="item new">CSS selectors
    <li class=item>Fewer &nbsp;allocations
  </ul>
  <p>See <a href="/docs?a=1&b=2">docs</a><br>for details.
  <p class=footer>&copy; 2024
</body>
</HTML>"#;

fn page() -> HtmlDocument {
    HtmlDocument::parse(PAGE).unwrap()
}

fn texts(doc: &Document, selector: &str) -> Vec<String> {
    doc.css(selector)
        .unwrap()
        .iter()
        .map(|item| doc.resolve(item).unwrap().text().trim().to_string())
        .collect()
}

#[test]
fn test_page_structure() {
    let doc = page();
    assert_eq!(doc.title().as_deref(), Some("Release notes"));
    let root = doc.root_element().unwrap();
    assert_eq!(root.local_name(), Some("html"));
    assert_eq!(root.attr("lang"), Some("en"));
    assert_eq!(doc.head().unwrap().element_children().count(), 3);
    assert_eq!(
        doc.body().unwrap().element_children().filter_map(|e| e.local_name()).collect::<Vec<_>>(),
        ["h1", "ul", "p", "p"]
    );
}

#[test]
fn test_implied_end_tags_and_entities() {
    let doc = page();
    assert_eq!(
        texts(&doc, "li"),
        ["Faster queries", "CSS selectors", "Fewer \u{a0}allocations"]
    );
    assert_eq!(texts(&doc, "#top"), ["Notes & changes"]);
    assert_eq!(texts(&doc, ".footer"), ["\u{a9} 2024"]);
    let link = doc.css("a").unwrap();
    let link = doc.resolve(&link[0]).unwrap().as_node().unwrap();
    assert_eq!(link.attr("href"), Some("/docs?a=1&b=2"));
}

#[test]
fn test_css_on_html() {
    let doc = page();
    assert_eq!(texts(&doc, "ul.changes > li.new"), ["CSS selectors"]);
    assert_eq!(texts(&doc, "li:first-child b"), ["queries"]);
    assert_eq!(texts(&doc, "li:nth-child(3)"), ["Fewer \u{a0}allocations"]);
    assert_eq!(texts(&doc, "h1 ~ p:not(.footer) a"), ["docs"]);
    assert_eq!(texts(&doc, "a[href^='/docs']"), ["docs"]);
    assert!(texts(&doc, "p > b").is_empty());
}

#[test]
fn test_xpath_on_html() {
    let doc = page();
    assert_eq!(doc.eval("count(//li)").unwrap().to_number(), 3.0);
    assert_eq!(
        doc.eval("string(//style)").unwrap().to_xpath_string(),
        "p > b { color: red }"
    );
    assert_eq!(
        doc.eval("name(//br/..)").unwrap().to_xpath_string(),
        "p"
    );
}

#[test]
fn test_html_serialization() {
    let doc = page();
    let html = serialize_with_options(&doc, &SerializeOptions::default().html(true));
    assert!(html.contains("<style>p > b { color: red }</style>"), "{html}");
    assert!(html.contains("<br>for details."), "{html}");
    assert!(html.contains(r#"<a href="/docs?a=1&amp;b=2">docs</a>"#), "{html}");
    assert!(html.contains("<meta charset=\"utf-8\">"), "{html}");

    // HTML output re-parses to the same tree.
    let again = HtmlDocument::parse(&html).unwrap();
    assert_eq!(
        serialize_with_options(&again, &SerializeOptions::default().html(true)),
        html
    );
}

#[test]
fn test_xml_serialization_of_html_is_well_formed() {
    let doc = page();
    let xml = xmlsift::serial::serialize(&doc);
    let reparsed = Document::parse_str(&xml).unwrap();
    assert_eq!(reparsed.eval("count(//li)").unwrap().to_number(), 3.0);
    assert_eq!(
        reparsed.eval("string(//style)").unwrap().to_xpath_string(),
        "p > b { color: red }"
    );
}

#[test]
fn test_strict_xml_rejects_html() {
    assert!(Document::parse_str(PAGE).is_err());
    // Recovery never relaxes the limits.
    let opts = ParseOptions::html().max_depth(2);
    assert!(matches!(
        HtmlDocument::parse_with_options(PAGE, &opts).unwrap_err(),
        Error::LimitExceeded { .. }
    ));
}

#[test]
fn test_meta_charset_from_bytes() {
    let bytes = b"<html><head><meta charset=windows-1252></head><body><p>caf\xE9 \x80</p></body></html>";
    let doc = HtmlDocument::parse_reader(&bytes[..], &ParseOptions::html()).unwrap();
    assert_eq!(doc.body().unwrap().text(), "caf\u{e9} \u{20ac}");
}

#[test]
fn test_into_inner() {
    let doc = HtmlDocument::parse("<p>x").unwrap().into_inner();
    assert_eq!(doc.eval("string(//p)").unwrap().to_xpath_string(), "x");
}
