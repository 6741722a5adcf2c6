//! Query tests against a small catalog document: XPath axes, predicates,
//! the function library, CSS selectors and query error reporting.

#![allow(clippy::unwrap_used)]

use xmlsift::css;
use xmlsift::xpath::{self, Namespaces, Query};
use xmlsift::{Document, Error, ItemRef, XPathValue};

const CATALOG: &str = r#"<catalog xmlns:x="urn:extra">
  <book id="b1" genre="fiction" lang="en">
    <title>The Hobbit</title>
    <price>12.50</price>
    <tags><tag>classic</tag><tag>fantasy</tag></tags>
  </book>
  <book id="b2" genre="science">
    <title>Cosmos</title>
    <price>20</price>
    <x:note>signed</x:note>
  </book>
  <book id="b3" genre="fiction poetry">
    <title>Leaves of Grass</title>
    <price>8</price>
  </book>
  <!-- out of print -->
</catalog>"#;

fn catalog() -> Document {
    Document::parse_str(CATALOG).unwrap()
}

fn strings(doc: &Document, expr: &str) -> Vec<String> {
    doc.xpath(expr)
        .unwrap()
        .iter()
        .map(|item| doc.resolve(item).unwrap().text())
        .collect()
}

fn css_titles(doc: &Document, selector: &str) -> Vec<String> {
    doc.css(selector)
        .unwrap()
        .iter()
        .map(|item| {
            let node = doc.resolve(item).unwrap().as_node().unwrap();
            node.first_child_by_tag("title", None)
                .map_or_else(|| node.text(), |t| t.text())
        })
        .collect()
}

// ---------------------------------------------------------------------------
// XPath
// ---------------------------------------------------------------------------

#[test]
fn test_paths_and_predicates() {
    let doc = catalog();
    assert_eq!(
        strings(&doc, "/catalog/book[price > 10]/title"),
        ["The Hobbit", "Cosmos"]
    );
    assert_eq!(strings(&doc, "//book[2]/title"), ["Cosmos"]);
    assert_eq!(strings(&doc, "//book[last()]/@id"), ["b3"]);
    assert_eq!(strings(&doc, "(//tag)[1]"), ["classic"]);
    assert_eq!(strings(&doc, "//tag[1]"), ["classic"]);
    assert_eq!(
        strings(&doc, "//title[../@genre = 'fiction']"),
        ["The Hobbit"]
    );
    assert_eq!(strings(&doc, "//book[not(@lang)]/@id"), ["b2", "b3"]);
}

#[test]
fn test_axes() {
    let doc = catalog();
    assert_eq!(
        strings(&doc, "//book[@id='b2']/following-sibling::book/@id"),
        ["b3"]
    );
    assert_eq!(
        strings(&doc, "//book[@id='b2']/preceding-sibling::*/@id"),
        ["b1"]
    );
    assert_eq!(
        strings(&doc, "//tag[. = 'fantasy']/ancestor::*[@id]/@id"),
        ["b1"]
    );
    assert_eq!(
        strings(&doc, "//book[@id='b3']/preceding::title"),
        ["The Hobbit", "Cosmos"]
    );
    assert_eq!(strings(&doc, "//book[@id='b3']/following::comment()"), [" out of print "]);
    assert_eq!(doc.xpath("//book/@*").unwrap().len(), 7);
    assert_eq!(strings(&doc, "//@lang/parent::*/title"), ["The Hobbit"]);
}

#[test]
fn test_functions() {
    let doc = catalog();
    let cases = [
        ("count(//book)", XPathValue::Number(3.0)),
        ("sum(//price)", XPathValue::Number(40.5)),
        ("floor(sum(//price) div count(//price))", XPathValue::Number(13.0)),
        ("round(2.5)", XPathValue::Number(3.0)),
        ("round(-2.5)", XPathValue::Number(-2.0)),
        ("string(//book[1]/title)", XPathValue::String("The Hobbit".into())),
        ("concat('a', 1, true())", XPathValue::String("a1true".into())),
        ("substring('12345', 1.5, 2.6)", XPathValue::String("234".into())),
        ("substring-before('2024-01-02', '-')", XPathValue::String("2024".into())),
        ("substring-after('2024-01-02', '-')", XPathValue::String("01-02".into())),
        ("translate('bar', 'abc', 'ABC')", XPathValue::String("BAr".into())),
        ("normalize-space('  a  b ')", XPathValue::String("a b".into())),
        ("starts-with(//book[2]/title, 'Cos')", XPathValue::Boolean(true)),
        ("contains(//book[3]/@genre, 'poetry')", XPathValue::Boolean(true)),
        ("local-name(//x:note)", XPathValue::String("note".into())),
        ("name(//x:note)", XPathValue::String("x:note".into())),
        ("namespace-uri(//x:note)", XPathValue::String("urn:extra".into())),
        ("string(id('b3 b2')[1]/title)", XPathValue::String("Cosmos".into())),
        ("count(id('missing'))", XPathValue::Number(0.0)),
        ("1 div 0", XPathValue::Number(f64::INFINITY)),
        ("7 mod -2", XPathValue::Number(1.0)),
    ];
    let mut doc = doc;
    doc.define_prefix("x", "urn:extra");
    for (expr, expected) in cases {
        assert_eq!(doc.eval(expr).unwrap(), expected, "{expr}");
    }
    assert!(doc.eval("number('abc')").unwrap().to_number().is_nan());
}

#[test]
fn test_comparisons_between_node_sets() {
    let doc = catalog();
    let truthy = |expr: &str| doc.eval(expr).unwrap().to_boolean();
    assert!(truthy("//price = 20"));
    assert!(truthy("//price != 20"));
    assert!(truthy("//price > 15"));
    assert!(!truthy("//price > 25"));
    assert!(truthy("//book/@genre = 'science'"));
    assert!(!truthy("//missing = //missing"));
    assert!(truthy("//tag = //tags/tag"));
}

#[test]
fn test_relative_queries_from_a_node() {
    let doc = catalog();
    let b2 = doc.element_by_id("b2").unwrap();
    assert_eq!(b2.eval("string(title)").unwrap().to_xpath_string(), "Cosmos");
    assert_eq!(b2.xpath("..").unwrap().len(), 1);
    assert_eq!(b2.eval("count(preceding-sibling::book)").unwrap().to_number(), 1.0);
    // An absolute path from a node still starts at the document.
    assert_eq!(b2.xpath("/catalog/book").unwrap().len(), 3);
}

#[test]
fn test_attribute_results() {
    let doc = catalog();
    let hits = doc.xpath("//book/@genre").unwrap();
    assert_eq!(hits.len(), 3);
    match doc.resolve(&hits[2]).unwrap() {
        ItemRef::Attribute(attr) => {
            assert_eq!(attr.name(), "genre");
            assert_eq!(attr.value(), "fiction poetry");
            assert_eq!(attr.owner().attr("id"), Some("b3"));
        }
        ItemRef::Node(node) => panic!("expected an attribute, got {node:?}"),
    }
}

#[test]
fn test_compiled_query_reuse() {
    let mut ns = Namespaces::new();
    ns.define("x", "urn:extra");
    let query = Query::compile_with("count(//x:note)", &ns).unwrap();
    assert_eq!(query.as_str(), "count(//x:note)");

    let doc = catalog();
    assert_eq!(
        query.evaluate(&doc, doc.root()).unwrap(),
        XPathValue::Number(1.0)
    );
    let other = Document::parse_str(r#"<r xmlns:y="urn:extra"><y:note/><y:note/></r>"#).unwrap();
    assert_eq!(
        query.evaluate(&other, other.root()).unwrap(),
        XPathValue::Number(2.0)
    );
    // A non-node-set result is a type error for select.
    assert!(matches!(
        query.select(&doc, doc.root()),
        Err(Error::QueryType { .. })
    ));
}

#[test]
fn test_free_function_evaluate() {
    let doc = catalog();
    let value = xpath::evaluate(&doc, doc.root(), "string(//book[@id='b1']/@genre)").unwrap();
    assert_eq!(value.to_xpath_string(), "fiction");
}

// ---------------------------------------------------------------------------
// Query errors
// ---------------------------------------------------------------------------

#[test]
fn test_query_errors() {
    let doc = catalog();
    assert!(matches!(
        doc.xpath("//book[").unwrap_err(),
        Error::InvalidQuerySyntax { position: 7, .. }
    ));
    assert!(matches!(
        doc.xpath("//book[frobnicate()]").unwrap_err(),
        Error::UnknownFunction { ref name, position: 7 } if name == "frobnicate"
    ));
    assert!(matches!(
        doc.xpath("count(//book)").unwrap_err(),
        Error::QueryType { expected: "node-set", .. }
    ));
    assert!(matches!(
        doc.xpath("//q:book").unwrap_err(),
        Error::InvalidQuerySyntax { position: 2, .. }
    ));
}

// ---------------------------------------------------------------------------
// CSS
// ---------------------------------------------------------------------------

#[test]
fn test_css_selectors() {
    let doc = catalog();
    assert_eq!(css_titles(&doc, "book"), ["The Hobbit", "Cosmos", "Leaves of Grass"]);
    assert_eq!(css_titles(&doc, "#b2"), ["Cosmos"]);
    assert_eq!(css_titles(&doc, "book[genre~=poetry]"), ["Leaves of Grass"]);
    assert_eq!(css_titles(&doc, "book[genre^=fic]"), ["The Hobbit", "Leaves of Grass"]);
    assert_eq!(css_titles(&doc, "book[lang]"), ["The Hobbit"]);
    assert_eq!(css_titles(&doc, "catalog > book:first-child"), ["The Hobbit"]);
    assert_eq!(css_titles(&doc, "book:last-child"), ["Leaves of Grass"]);
    assert_eq!(css_titles(&doc, "book:nth-child(2)"), ["Cosmos"]);
    assert_eq!(css_titles(&doc, "book + book + book"), ["Leaves of Grass"]);
    assert_eq!(css_titles(&doc, "#b1 ~ book"), ["Cosmos", "Leaves of Grass"]);
    assert_eq!(css_titles(&doc, "book:not([lang])"), ["Cosmos", "Leaves of Grass"]);
    assert_eq!(css_titles(&doc, "tags tag:last-child"), ["fantasy"]);
    assert_eq!(css_titles(&doc, "tag, price"), ["12.50", "classic", "fantasy", "20", "8"]);
}

#[test]
fn test_css_from_a_node_is_scoped() {
    let doc = catalog();
    let b1 = doc.element_by_id("b1").unwrap();
    assert_eq!(b1.css("tag").unwrap().len(), 2);
    let b2 = doc.element_by_id("b2").unwrap();
    assert!(b2.css("tag").unwrap().is_empty());
}

#[test]
fn test_css_translation_and_errors() {
    assert_eq!(css::to_xpath("book").unwrap(), "descendant::book");
    assert!(matches!(
        css::to_xpath("book >").unwrap_err(),
        Error::InvalidQuerySyntax { position: 6, .. }
    ));
    let doc = catalog();
    assert!(matches!(
        doc.css("book::before").unwrap_err(),
        Error::InvalidQuerySyntax { .. }
    ));
}
