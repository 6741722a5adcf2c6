//! Serialization through the public API: escaping, namespace fix-up for
//! edited trees and subtrees, formatting options, byte output in other
//! encodings and streaming.

#![allow(clippy::unwrap_used)]

use xmlsift::serial::{
    fragments, serialize, serialize_node, serialize_to_bytes, serialize_with_options, write_to,
    SerializeOptions,
};
use xmlsift::{Document, Error, ParseOptions};

#[test]
fn test_text_and_attribute_escaping() {
    let mut doc = Document::new();
    let e = doc.create_element("e").unwrap();
    doc.append_child(doc.root(), e).unwrap();
    doc.set_attribute(e, "a", "<'tab'\there\nline\r>").unwrap();
    let t = doc.create_text("1 < 2 && 3 > 2\r\n").unwrap();
    doc.append_child(e, t).unwrap();

    let out = serialize(&doc);
    assert_eq!(
        out,
        "<e a=\"&lt;&apos;tab&apos;&#9;here&#10;line&#13;&gt;\">1 &lt; 2 &amp;&amp; 3 &gt; 2&#13;\n</e>"
    );
    // Every character survives a re-parse, including the ones attribute
    // normalization would otherwise turn into spaces.
    let again = Document::parse_str(&out).unwrap();
    let e = again.root_element().unwrap();
    assert_eq!(e.attr("a"), Some("<'tab'\there\nline\r>"));
    assert_eq!(e.text(), "1 < 2 && 3 > 2\r\n");
}

#[test]
fn test_moved_subtree_keeps_its_namespaces() {
    let mut doc = Document::parse_str(
        r#"<root xmlns:a="urn:a"><from><a:item a:k="v"/></from><to xmlns:a="urn:other"/></root>"#,
    )
    .unwrap();
    let item = doc.xpath("//from/*").unwrap()[0].node_id().unwrap();
    let to = doc.xpath("//to").unwrap()[0].node_id().unwrap();
    let item = doc.detach(item).unwrap();
    doc.append_child(to, item).unwrap();

    let out = serialize(&doc);
    let again = Document::parse_str(&out).unwrap_or_else(|e| panic!("{out}: {e}"));
    let moved = again.xpath("//to/*").unwrap();
    let moved = again.resolve(&moved[0]).unwrap().as_node().unwrap();
    assert_eq!(moved.namespace(), Some("urn:a"));
    assert_eq!(moved.attr_ns("k", Some("urn:a")), Some("v"));
}

#[test]
fn test_attribute_prefix_clash_gets_a_fresh_prefix() {
    let mut doc = Document::parse_str("<r xmlns:p='urn:two'/>").unwrap();
    let r = doc.root_element().unwrap().id();
    let e = doc.create_element_ns("p:a", Some("urn:one")).unwrap();
    doc.append_child(r, e).unwrap();
    doc.set_attribute(e, "p:x", "v").unwrap();
    assert_eq!(doc.get(e).unwrap().attr_ns("x", Some("urn:two")), Some("v"));

    let out = serialize(&doc);
    assert_eq!(
        out,
        r#"<r xmlns:p="urn:two"><p:a ns1:x="v" xmlns:p="urn:one" xmlns:ns1="urn:two"/></r>"#
    );
    let again = Document::parse_str(&out).unwrap();
    let a = again.root_element().unwrap().element_children().next().unwrap();
    assert_eq!(a.namespace(), Some("urn:one"));
    assert_eq!(a.attr_ns("x", Some("urn:two")), Some("v"));
    assert_eq!(a.attr_ns("x", Some("urn:one")), None);
}

#[test]
fn test_edited_declaration_is_written_as_set() {
    let mut doc = Document::parse_str(r#"<p:a xmlns:p="urn:u"><p:b/></p:a>"#).unwrap();
    let a = doc.root_element().unwrap().id();
    doc.set_attribute(a, "xmlns:p", "urn:v").unwrap();

    let out = serialize(&doc);
    assert!(out.contains(r#"xmlns:p="urn:v""#), "{out}");
    // The elements keep the namespace they were created in.
    let again = Document::parse_str(&out).unwrap_or_else(|e| panic!("{out}: {e}"));
    let root = again.root_element().unwrap();
    assert_eq!(root.attr("xmlns:p"), Some("urn:v"));
    assert_eq!(root.namespace(), Some("urn:u"));
    let b = root.element_children().next().unwrap();
    assert_eq!(b.namespace(), Some("urn:u"));
    assert_eq!(b.local_name(), Some("b"));
}

#[test]
fn test_subtree_serialization_is_standalone() {
    let doc = Document::parse_str(
        r#"<r xmlns="urn:d" xmlns:m="urn:m"><m:x><y m:z="1">t</y></m:x></r>"#,
    )
    .unwrap();
    let y = doc.xpath("//*[local-name() = 'y']").unwrap()[0].node_id().unwrap();
    let out = serialize_node(&doc, y).unwrap();
    let fragment = Document::parse_str(&out).unwrap_or_else(|e| panic!("{out}: {e}"));
    let y = fragment.root_element().unwrap();
    assert_eq!(y.namespace(), Some("urn:d"));
    assert_eq!(y.attr_ns("z", Some("urn:m")), Some("1"));
    assert_eq!(y.text(), "t");
}

#[test]
fn test_stale_subtree_is_an_error() {
    let mut doc = Document::parse_str("<r><a/></r>").unwrap();
    let a = doc.xpath("/r/a").unwrap()[0].node_id().unwrap();
    doc.detach(a).unwrap();
    assert!(matches!(
        serialize_node(&doc, a),
        Err(Error::StaleReference { .. })
    ));
    assert!(fragments(&doc, a, &SerializeOptions::default()).is_err());
}

#[test]
fn test_pretty_printing_round_trips_element_content() {
    let doc =
        Document::parse_str("<list><item n=\"1\"/><item n=\"2\"><sub/></item></list>").unwrap();
    let opts = SerializeOptions::default().indent(true).indent_str("\t");
    let out = serialize_with_options(&doc, &opts);
    assert_eq!(
        out,
        "<list>\n\t<item n=\"1\"/>\n\t<item n=\"2\">\n\t\t<sub/>\n\t</item>\n</list>\n"
    );
    let again = Document::parse_str(&out).unwrap();
    assert_eq!(again.eval("count(//item)").unwrap().to_number(), 2.0);
}

#[test]
fn test_latin1_output_uses_character_references() {
    let doc = Document::parse_str("<p t=\"\u{2603}\">na\u{ef}ve \u{2603}</p>").unwrap();
    let opts = SerializeOptions::default()
        .encoding("ISO-8859-1")
        .xml_declaration(true);
    let bytes = serialize_to_bytes(&doc, &opts).unwrap();
    assert_eq!(
        bytes,
        b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<p t=\"&#9731;\">na\xEFve &#9731;</p>".to_vec()
    );
    // And it reads back to the same text.
    let again = Document::parse_bytes(&bytes, &ParseOptions::default()).unwrap();
    assert_eq!(again.root_element().unwrap().text(), "na\u{ef}ve \u{2603}");
    assert_eq!(again.root_element().unwrap().attr("t"), Some("\u{2603}"));
}

#[test]
fn test_utf16_output_round_trips_with_bom() {
    let doc = Document::parse_str("<w>\u{1F600} ok</w>").unwrap();
    let opts = SerializeOptions::default().encoding("UTF-16LE");
    let bytes = serialize_to_bytes(&doc, &opts).unwrap();
    assert!(bytes.starts_with(&[0xFF, 0xFE]));
    let again = Document::parse_bytes(&bytes, &ParseOptions::default()).unwrap();
    assert_eq!(again.root_element().unwrap().text(), "\u{1F600} ok");
}

#[test]
fn test_non_utf8_output_parses_back() {
    let doc = Document::parse_str("<p>gr\u{fc}\u{df} \u{2603}</p>").unwrap();
    for label in ["windows-1252", "Shift_JIS", "UTF-16BE"] {
        let opts = SerializeOptions::default().encoding(label);
        let bytes = serialize_to_bytes(&doc, &opts).unwrap();
        let again = Document::parse_bytes(&bytes, &ParseOptions::default())
            .unwrap_or_else(|e| panic!("{label}: {e}"));
        assert_eq!(again.root_element().unwrap().text(), "gr\u{fc}\u{df} \u{2603}", "{label}");

        let mut written = Vec::new();
        write_to(&doc, &opts, &mut written).unwrap();
        assert_eq!(written, bytes, "{label}");
    }
}

#[test]
fn test_write_to_streams_utf8() {
    let doc = Document::parse_str("<a><b>1</b><b>2</b></a>").unwrap();
    let mut out = Vec::new();
    write_to(&doc, &SerializeOptions::default().xml_declaration(true), &mut out).unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<a><b>1</b><b>2</b></a>"
    );
}

#[test]
fn test_write_to_reports_io_errors() {
    struct Broken;
    impl std::io::Write for Broken {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
    let doc = Document::parse_str("<a/>").unwrap();
    assert!(matches!(
        write_to(&doc, &SerializeOptions::default(), Broken),
        Err(Error::Io(_))
    ));
}

#[test]
fn test_fragments_stop_early() {
    let xml: String = std::iter::once("<r>".to_string())
        .chain((0..10_000).map(|i| format!("<i>{i}</i>")))
        .chain(std::iter::once("</r>".to_string()))
        .collect();
    let doc = Document::parse_str(&xml).unwrap();
    let mut pulled = 0;
    let mut head = String::new();
    for piece in fragments(&doc, doc.root(), &SerializeOptions::default()).unwrap() {
        pulled += 1;
        head.push_str(&piece);
        if head.contains("</i>") {
            break;
        }
    }
    assert_eq!(head, "<r><i>0</i>");
    assert!(pulled < 10, "pulled {pulled} fragments");
}
