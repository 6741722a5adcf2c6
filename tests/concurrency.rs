//! Sharing documents across threads: concurrent readers, serialized
//! writers, and independent documents parsed in parallel.

#![allow(clippy::unwrap_used)]

use std::sync::Barrier;
use std::thread;

use xmlsift::serial::serialize;
use xmlsift::{Document, SharedDocument, XPathValue};

fn counter_doc() -> Document {
    Document::parse_str("<log/>").unwrap()
}

#[test]
fn test_concurrent_readers_see_consistent_results() {
    let xml: String = std::iter::once("<r>".to_string())
        .chain((0..200).map(|i| format!("<i n=\"{i}\"/>")))
        .chain(std::iter::once("</r>".to_string()))
        .collect();
    let shared = SharedDocument::new(Document::parse_str(&xml).unwrap());
    let expected = shared.select("//i[@n mod 7 = 0]").unwrap();

    thread::scope(|s| {
        for _ in 0..8 {
            let shared = shared.clone();
            let expected = &expected;
            s.spawn(move || {
                for _ in 0..20 {
                    assert_eq!(&shared.select("//i[@n mod 7 = 0]").unwrap(), expected);
                }
            });
        }
    });
}

#[test]
fn test_writers_are_serialized() {
    let shared = SharedDocument::new(counter_doc());
    let threads = 8;
    let per_thread = 25;
    let barrier = Barrier::new(threads);

    thread::scope(|s| {
        for t in 0..threads {
            let shared = shared.clone();
            let barrier = &barrier;
            s.spawn(move || {
                barrier.wait();
                for k in 0..per_thread {
                    shared.write(|doc| {
                        let log = doc.root_element().unwrap().id();
                        let entry = doc.create_element("entry").unwrap();
                        doc.set_attribute(entry, "from", &format!("{t}-{k}")).unwrap();
                        doc.append_child(log, entry).unwrap();
                    });
                }
            });
        }
    });

    assert_eq!(
        shared.query("count(/log/entry)").unwrap(),
        XPathValue::Number(200.0)
    );
    // Every entry from one thread appears in the order that thread wrote it.
    let doc = shared.try_unwrap().unwrap();
    for t in 0..threads {
        let order: Vec<String> = doc
            .xpath(&format!("/log/entry[starts-with(@from, '{t}-')]/@from"))
            .unwrap()
            .iter()
            .map(|item| doc.resolve(item).unwrap().text())
            .collect();
        let expected: Vec<String> = (0..per_thread).map(|k| format!("{t}-{k}")).collect();
        assert_eq!(order, expected);
    }
}

#[test]
fn test_readers_never_observe_partial_edits() {
    let shared = SharedDocument::new(Document::parse_str("<r><a/><b/></r>").unwrap());

    thread::scope(|s| {
        let writer = shared.clone();
        s.spawn(move || {
            for _ in 0..200 {
                // Swap a and b as a single exclusive edit.
                writer.write(|doc| {
                    let r = doc.root_element().unwrap().id();
                    let first = doc.xpath("/r/*[1]").unwrap()[0].node_id().unwrap();
                    let first = doc.detach(first).unwrap();
                    doc.append_child(r, first).unwrap();
                });
            }
        });
        for _ in 0..4 {
            let reader = shared.clone();
            s.spawn(move || {
                for _ in 0..200 {
                    assert_eq!(reader.query("count(/r/*)").unwrap(), XPathValue::Number(2.0));
                }
            });
        }
    });

    assert_eq!(shared.read(serialize), "<r><a/><b/></r>");
}

#[test]
fn test_documents_move_between_threads() {
    let handles: Vec<_> = (0..4)
        .map(|i| {
            thread::spawn(move || Document::parse_str(&format!("<n v=\"{i}\"/>")).unwrap())
        })
        .collect();
    let docs: Vec<Document> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let total: f64 = docs
        .iter()
        .map(|d| d.eval("number(/n/@v)").unwrap().to_number())
        .sum();
    assert_eq!(total, 6.0);
}
