#![allow(clippy::expect_used)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::fmt::Write;
use xmlsift::css;
use xmlsift::html::parse_html;
use xmlsift::serial::{fragments, serialize, serialize_to_bytes, SerializeOptions};
use xmlsift::xpath::Query;
use xmlsift::{Document, ParseOptions};

// ---------------------------------------------------------------------------
// Document generators
// ---------------------------------------------------------------------------

/// A flat catalog of `books` records, each with a few children, attributes
/// and a price for numeric predicates.
fn make_catalog(books: usize) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<catalog>\n");
    for i in 0..books {
        let genre = ["fiction", "science", "history", "poetry"][i % 4];
        let _ = writeln!(
            xml,
            "  <book id=\"bk{i}\" genre=\"{genre}\" class=\"item {genre}\">\
             <title>Title {i}</title>\
             <author>Author {}</author>\
             <price>{}.99</price></book>",
            i % 10,
            10 + i % 50
        );
    }
    xml.push_str("</catalog>\n");
    xml
}

/// A single chain of `depth` nested elements.
fn make_nested_xml(depth: usize) -> String {
    let mut xml = String::new();
    for i in 0..depth {
        let _ = write!(xml, "<level{i}>");
    }
    xml.push_str("leaf");
    for i in (0..depth).rev() {
        let _ = write!(xml, "</level{i}>");
    }
    xml
}

/// Prefixed elements drawn from twenty namespaces, with one
/// redeclaration per record to exercise scope handling.
fn make_namespace_heavy_xml() -> String {
    let mut xml = String::from("<root");
    for i in 0..20 {
        let _ = write!(xml, " xmlns:ns{i}=\"http://example.com/ns{i}\"");
    }
    xml.push_str(">\n");
    for i in 0..200 {
        let ns = i % 20;
        let _ = writeln!(
            xml,
            "  <ns{ns}:item ns{ns}:id=\"{i}\" xmlns=\"urn:local{i}\"><v>Content {i}</v></ns{ns}:item>"
        );
    }
    xml.push_str("</root>\n");
    xml
}

/// Loose real-world HTML: implied end tags, unquoted attributes, void
/// elements and named character references.
fn make_html_doc() -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html><head><title>Benchmark Page</title>\
         <meta charset=utf-8></head><body>\n",
    );
    for i in 0..100 {
        let _ = writeln!(
            html,
            "<div class=section id=s{i}>\
             <p>Paragraph {i} with <b>bold</b> &amp; <i>italic</i> text&nbsp;here\
             <ul><li>Item A<li>Item B<li>Item C</ul>\
             <img src=img{i}.png alt=\"Image {i}\"><br>\
             <a href=\"#s{i}\">Link {i}</a></div>"
        );
    }
    html.push_str("</body></html>\n");
    html
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn bench_parse_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_catalog");
    for books in [10, 100, 1000] {
        let xml = make_catalog(books);
        group.throughput(Throughput::Bytes(xml.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(books), &xml, |b, xml| {
            b.iter(|| Document::parse_str(black_box(xml)));
        });
    }
    group.finish();
}

fn bench_parse_shapes(c: &mut Criterion) {
    let nested = make_nested_xml(200);
    c.bench_function("parse_deeply_nested", |b| {
        b.iter(|| Document::parse_str(black_box(&nested)));
    });

    let namespaced = make_namespace_heavy_xml();
    c.bench_function("parse_namespace_heavy", |b| {
        b.iter(|| Document::parse_str(black_box(&namespaced)));
    });
}

fn bench_parse_bytes_latin1(c: &mut Criterion) {
    let xml = make_catalog(100).replace("UTF-8", "ISO-8859-1").replace("Title", "T\u{ee}tre");
    let (bytes, _, _) = encoding_rs::WINDOWS_1252.encode(&xml);
    let bytes = bytes.into_owned();
    let options = ParseOptions::default();
    c.bench_function("parse_bytes_latin1", |b| {
        b.iter(|| Document::parse_bytes(black_box(&bytes), &options));
    });
}

fn bench_parse_html(c: &mut Criterion) {
    let html = make_html_doc();
    c.bench_function("parse_html", |b| {
        b.iter(|| parse_html(black_box(&html)));
    });
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

fn bench_xpath(c: &mut Criterion) {
    let doc = Document::parse_str(&make_catalog(1000)).expect("failed to parse catalog");
    let mut group = c.benchmark_group("xpath");
    for (name, expr) in [
        ("child_path", "/catalog/book/title"),
        ("descendant", "//title"),
        ("predicate", "//book[@genre='fiction' and number(price) > 40]/title"),
        ("positional", "//book[position() mod 10 = 0]"),
        ("aggregate", "sum(//price) div count(//book)"),
        ("id_lookup", "id('bk500 bk999')"),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| doc.eval(black_box(expr)).expect("query failed"));
        });
    }
    group.finish();
}

fn bench_compiled_query(c: &mut Criterion) {
    let doc = Document::parse_str(&make_catalog(1000)).expect("failed to parse catalog");
    let query = Query::compile("//book[price > 30][last()]").expect("compile failed");
    c.bench_function("xpath_precompiled", |b| {
        b.iter(|| query.select(black_box(&doc), doc.root()).expect("query failed"));
    });
    c.bench_function("xpath_compile_only", |b| {
        b.iter(|| Query::compile(black_box("//book[price > 30][last()]")));
    });
}

fn bench_css(c: &mut Criterion) {
    let doc = parse_html(&make_html_doc()).expect("failed to parse html");
    let mut group = c.benchmark_group("css");
    for selector in ["div.section > p b", "li:nth-child(2)", "#s50 ~ div a[href^='#']"] {
        group.bench_function(selector, |b| {
            b.iter(|| doc.css(black_box(selector)).expect("selector failed"));
        });
    }
    group.finish();
    c.bench_function("css_translate", |b| {
        b.iter(|| css::to_xpath(black_box("ul.nav > li:not(.hidden) + li a[href$='.pdf']")));
    });
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

fn bench_serialize(c: &mut Criterion) {
    let doc = Document::parse_str(&make_catalog(1000)).expect("failed to parse catalog");
    c.bench_function("serialize", |b| {
        b.iter(|| serialize(black_box(&doc)));
    });

    let pretty = SerializeOptions::default().indent(true);
    c.bench_function("serialize_indented", |b| {
        b.iter(|| xmlsift::serial::serialize_with_options(black_box(&doc), &pretty));
    });

    let latin1 = SerializeOptions::default().encoding("ISO-8859-1");
    c.bench_function("serialize_latin1_bytes", |b| {
        b.iter(|| serialize_to_bytes(black_box(&doc), &latin1).expect("encode failed"));
    });

    c.bench_function("serialize_fragments_first_kb", |b| {
        b.iter(|| {
            let mut written = 0;
            for piece in fragments(black_box(&doc), doc.root(), &SerializeOptions::default())
                .expect("fragments failed")
            {
                written += piece.len();
                if written >= 1024 {
                    break;
                }
            }
            written
        });
    });
}

fn bench_roundtrip(c: &mut Criterion) {
    let xml = make_catalog(100);
    c.bench_function("roundtrip", |b| {
        b.iter(|| {
            let doc = Document::parse_str(black_box(&xml)).expect("parse failed");
            let serialized = serialize(&doc);
            Document::parse_str(&serialized).expect("re-parse failed")
        });
    });
}

// ---------------------------------------------------------------------------
// Editing
// ---------------------------------------------------------------------------

fn bench_edit_then_query(c: &mut Criterion) {
    let base = Document::parse_str(&make_catalog(500)).expect("failed to parse catalog");
    c.bench_function("detach_reattach_query", |b| {
        b.iter_batched(
            || base.clone(),
            |mut doc| {
                let catalog = doc.root_element().expect("no root").id();
                let first = doc.xpath("/catalog/book[1]").expect("query failed")[0]
                    .node_id()
                    .expect("not a node");
                let moved = doc.detach(first).expect("detach failed");
                doc.append_child(catalog, moved).expect("append failed");
                doc.eval("string(/catalog/book[last()]/@id)").expect("query failed")
            },
            criterion::BatchSize::LargeInput,
        );
    });
}

// ---------------------------------------------------------------------------
// Criterion groups and main
// ---------------------------------------------------------------------------

criterion_group!(
    parsing,
    bench_parse_sizes,
    bench_parse_shapes,
    bench_parse_bytes_latin1,
    bench_parse_html,
);

criterion_group!(queries, bench_xpath, bench_compiled_query, bench_css);

criterion_group!(serialization, bench_serialize, bench_roundtrip);

criterion_group!(editing, bench_edit_then_query);

criterion_main!(parsing, queries, serialization, editing);
