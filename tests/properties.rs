//! Whole-document properties that must hold for any well-formed input:
//! round-tripping, idempotent serialization, order preservation,
//! deterministic queries and stale-handle safety.

#![allow(clippy::unwrap_used)]

use std::borrow::Cow;

use xmlsift::serial::{serialize, serialize_with_options, SerializeOptions};
use xmlsift::{Document, Error, NodeKind, NodeRef};

const CORPUS: &[&str] = &[
    "<a/>",
    r#"<a x="1" y='2'><b>text</b><c/><!-- note --><?pi data?></a>"#,
    "<?xml version=\"1.0\"?>\n<!-- lead -->\n<r>\n  <i>1</i>\n  <i>2</i>\n</r>\n<?tail?>",
    r#"<p:r xmlns:p="urn:p" xmlns="urn:d"><c p:k="v"><d xmlns=""/></c></p:r>"#,
    "<r><![CDATA[<raw> & ]]]]><![CDATA[> stuff]]>&lt;&amp;&gt;&#x1F600;</r>",
    "<r a=\"tab&#9;nl&#10;cr&#13;\">line\r\nbreak</r>",
    r#"<r xml:lang="en" xml:space="preserve">   </r>"#,
];

/// Structural fingerprint of a subtree: kinds, names, attributes and content.
fn shape(node: NodeRef<'_>) -> String {
    let mut out = String::new();
    for n in std::iter::once(node).chain(node.descendants()) {
        match n.kind() {
            NodeKind::Document => out.push('D'),
            NodeKind::Element { .. } => {
                out.push_str(&format!("E({:?},{:?}", n.local_name(), n.namespace()));
                for a in n.attributes() {
                    out.push_str(&format!(" {}={:?}", a.qualified_name(), a.value));
                }
                out.push(')');
            }
            NodeKind::Text { content } => out.push_str(&format!("T({content:?})")),
            NodeKind::CData { content } => out.push_str(&format!("C({content:?})")),
            NodeKind::Comment { content } => out.push_str(&format!("M({content:?})")),
            NodeKind::ProcessingInstruction { target, data } => {
                out.push_str(&format!("P({target},{data:?})"));
            }
        }
        let depth = n.ancestors().count();
        out.push_str(&format!("@{depth};"));
    }
    out
}

fn doc_shape(doc: &Document) -> String {
    shape(doc.get(doc.root()).unwrap())
}

#[test]
fn test_round_trip_preserves_tree() {
    for input in CORPUS {
        let doc = Document::parse_str(input).unwrap();
        let out = serialize(&doc);
        let again = Document::parse_str(&out).unwrap_or_else(|e| panic!("{out:?}: {e}"));
        assert_eq!(doc_shape(&doc), doc_shape(&again), "input {input:?}");
    }
}

#[test]
fn test_round_trip_with_declaration_and_indent() {
    let opts = SerializeOptions::default().xml_declaration(true).indent(true);
    for input in CORPUS {
        let doc = Document::parse_str(input).unwrap();
        let out = serialize_with_options(&doc, &opts);
        assert!(out.starts_with("<?xml version=\"1.0\""), "{out}");
        let again = Document::parse_str(&out).unwrap_or_else(|e| panic!("{out:?}: {e}"));
        assert_eq!(
            doc.root_element().unwrap().text().split_whitespace().collect::<Vec<_>>(),
            again.root_element().unwrap().text().split_whitespace().collect::<Vec<_>>(),
        );
    }
}

#[test]
fn test_serialization_is_idempotent() {
    for input in CORPUS {
        let doc = Document::parse_str(input).unwrap();
        let first = serialize(&doc);
        let second = serialize(&doc);
        assert_eq!(first, second);
        // And stable across a re-parse.
        let again = Document::parse_str(&first).unwrap();
        assert_eq!(serialize(&again), first);
    }
}

#[test]
fn test_child_and_attribute_order_preserved() {
    let doc = Document::parse_str(r#"<r z="1" a="2" m="3"><c3/><c1/>t<c2/></r>"#).unwrap();
    let r = doc.root_element().unwrap();
    let attrs: Vec<_> = r.attributes().iter().map(|a| a.name.as_str()).collect();
    assert_eq!(attrs, ["z", "a", "m"]);
    let children: Vec<_> = r
        .children()
        .map(|c| c.name().map_or_else(|| c.text(), Cow::into_owned))
        .collect();
    assert_eq!(children, ["c3", "c1", "t", "c2"]);
    assert_eq!(
        serialize(&doc),
        r#"<r z="1" a="2" m="3"><c3/><c1/>t<c2/></r>"#
    );
}

#[test]
fn test_queries_are_deterministic() {
    let doc = Document::parse_str(CORPUS[2]).unwrap();
    for expr in [
        "//node()",
        "//i | /r | //comment()",
        "//i/ancestor-or-self::node()",
        "/descendant::node()[last()]/preceding::node()",
    ] {
        let first = doc.xpath(expr).unwrap();
        let second = doc.xpath(expr).unwrap();
        assert_eq!(first, second, "{expr}");
    }
}

#[test]
fn test_results_are_in_document_order() {
    let doc = Document::parse_str("<r><a><b/></a><c><d/></c></r>").unwrap();
    let hits = doc.xpath("//d | //b | //c/.. | //a").unwrap();
    let names: Vec<_> = hits
        .iter()
        .map(|i| doc.resolve(i).unwrap().as_node().unwrap().local_name().unwrap())
        .collect();
    assert_eq!(names, ["r", "a", "b", "d"]);
    // Reverse axes still yield document order.
    let hits = doc.xpath("//d/ancestor::*").unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(doc.resolve(&hits[0]).unwrap().as_node().unwrap().local_name(), Some("r"));
}

#[test]
fn test_detach_stales_every_handle_in_subtree() {
    let mut doc =
        Document::parse_str(r#"<r><s k="v"><t>one</t><!--c--></s><u>two</u></r>"#).unwrap();
    let inside = doc.xpath("//s//node() | //s/@k | //s").unwrap();
    let outside = doc.xpath("//u | //u/text() | /r").unwrap();
    let s = doc.xpath("//s").unwrap()[0].node_id().unwrap();

    doc.detach(s).unwrap();

    for item in &inside {
        assert!(
            matches!(doc.resolve(item), Err(Error::StaleReference { .. })),
            "{item:?} should be stale"
        );
    }
    for item in &outside {
        assert!(doc.resolve(item).is_ok(), "{item:?} should survive");
    }
}

#[test]
fn test_remove_child_stales_and_frees() {
    let mut doc = Document::parse_str("<r><a><b/></a></r>").unwrap();
    let before = doc.node_count();
    let a = doc.xpath("/r/a").unwrap()[0].node_id().unwrap();
    let b = doc.xpath("//b").unwrap()[0].node_id().unwrap();
    let r = doc.root_element().unwrap().id();

    doc.remove_child(r, a).unwrap();

    assert_eq!(doc.node_count(), before - 2);
    assert!(matches!(doc.get(a), Err(Error::StaleReference { .. })));
    assert!(matches!(doc.get(b), Err(Error::StaleReference { .. })));
    // A fresh node may reuse the freed slot; the old handles stay stale.
    let fresh = doc.create_element("n").unwrap();
    doc.append_child(r, fresh).unwrap();
    assert!(doc.get(a).is_err());
    assert!(doc.get(b).is_err());
    assert_eq!(serialize(&doc), "<r><n/></r>");
}
