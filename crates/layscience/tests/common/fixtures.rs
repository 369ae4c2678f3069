//! Generated test documents.

#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

/// Builds a single-page PDF with one text line per entry in `lines`.
pub fn pdf_with_lines(lines: &[&str]) -> Vec<u8> {
    build_pdf(lines, None)
}

fn build_pdf(lines: &[&str], title: Option<&str>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 11.into()]),
        Operation::new("Td", vec![60.into(), 760.into()]),
    ];
    for line in lines {
        operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
        operations.push(Operation::new("Td", vec![0.into(), (-13).into()]));
    }
    operations.push(Operation::new("ET", vec![]));

    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    if let Some(title) = title {
        let info_id = doc.add_object(dictionary! { "Title" => lopdf::text_string(title) });
        doc.trailer.set("Info", info_id);
    }

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// A short paper abstract, long enough for the minimum-text check.
pub fn abstract_pdf() -> Vec<u8> {
    pdf_with_lines(ABSTRACT)
}

/// [`abstract_pdf`] with `title` in its document information dictionary.
pub fn titled_abstract_pdf(title: &str) -> Vec<u8> {
    build_pdf(ABSTRACT, Some(title))
}

const ABSTRACT: &[&str] = &[
    "Sleep and Memory in Honey Bees",
    "We trained honey bees to associate an odour with sugar water and",
    "then deprived half of them of sleep for one night. Sleep-deprived",
    "bees recalled the odour less reliably, suggesting that sleep helps",
    "insects consolidate memories much like it does in mammals.",
];
