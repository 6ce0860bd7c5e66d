use lopdf::{dictionary, Document, Object, Stream};

pub const PAGE_HEIGHT: f64 = 792.0;

/// A highlighter stroke as the annotation tool writes it.
pub fn stroke(width: f64, points: &[(f64, f64)]) -> String {
    let mut ops = format!("q 1 0.952941 0.658824 RG {width} w 1 J 1 j /FXE2 gs 1 0 0 1 0 0 cm");
    for (i, (x, y)) in points.iter().enumerate() {
        let op = if i == 0 { "m" } else { "l" };
        ops.push_str(&format!(" {x} {y} {op}"));
    }
    ops.push_str(" S Q");
    ops
}

/// Page text drawing that never mentions the highlighter colour.
pub fn body_text() -> String {
    "BT /F1 12 Tf 100 700 Td (alpha beta gamma delta outside) Tj ET 0 0 1 RG 2 w 0 0 m 10 10 l S"
        .to_string()
}

/// Build a letter sized document, one entry per page, each a list of content streams.
pub fn build_pdf(pages: &[Vec<String>], compress: bool) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids: Vec<Object> = Vec::new();
    for streams in pages {
        let contents: Vec<Object> = streams
            .iter()
            .map(|content| {
                doc.add_object(Stream::new(dictionary! {}, content.as_bytes().to_vec()))
                    .into()
            })
            .collect();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => contents,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    if compress {
        doc.compress();
    }
    doc
}
