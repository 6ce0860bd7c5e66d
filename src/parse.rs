use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use lopdf::{Document, Object, ObjectId};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::layout::{WordBox, WordRecord};
use crate::logging::PDF_PARSING;
use crate::stroke::contains_highlight_color;
use crate::PageInput;

/// Guards against `Parent` cycles while looking up inherited page attributes.
const MAX_INHERITANCE_DEPTH: usize = 32;

pub fn load_pdf<P: AsRef<Path>>(path: P) -> Result<Document> {
    Ok(Document::load(path)?)
}

/// Raw bytes of every content stream of a page, decompressed when filtered.
///
/// Entries of `/Contents` that are not streams are skipped.
pub fn page_streams(doc: &Document, page_id: ObjectId) -> Result<Vec<Vec<u8>>> {
    let mut streams = Vec::new();
    for content_id in doc.get_page_contents(page_id) {
        let stream = match doc.get_object(content_id).and_then(Object::as_stream) {
            Ok(stream) => stream,
            Err(e) => {
                warn!(target: PDF_PARSING, ?content_id, "Skipping content entry: {}", e);
                continue;
            }
        };
        let content = if stream.dict.has(b"Filter") {
            stream.decompressed_content()?
        } else {
            stream.content.clone()
        };
        streams.push(content);
    }
    Ok(streams)
}

fn operand_as_float(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(*f as f64),
        _ => None,
    }
}

fn page_box(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<[f64; 4]> {
    let mut current = page_id;
    for _ in 0..MAX_INHERITANCE_DEPTH {
        let dict = doc.get_dictionary(current).ok()?;
        if let Ok(value) = dict.get(key) {
            let value = match value.as_reference() {
                Ok(id) => doc.get_object(id).ok()?,
                Err(_) => value,
            };
            let array = value.as_array().ok()?;
            let mut rect = [0.0; 4];
            for (slot, obj) in rect.iter_mut().zip(array.iter()) {
                *slot = operand_as_float(obj)?;
            }
            return (array.len() >= 4).then_some(rect);
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
    }
    None
}

/// Top edge of the visible page region, used to flip PDF user space coordinates.
///
/// For crop boxes anchored at the origin this is simply the page height.
pub fn page_height(doc: &Document, page_number: u32, page_id: ObjectId) -> Result<f64> {
    let rect = page_box(doc, page_id, b"CropBox")
        .or_else(|| page_box(doc, page_id, b"MediaBox"))
        .ok_or(Error::MissingPageBox(page_number))?;
    Ok(rect[1].max(rect[3]))
}

/// Supplies the words of a page in reading order, origin top left.
pub trait WordSource {
    fn page_words(&self, page_number: u32) -> Result<Vec<WordBox>>;
}

/// Words already extracted, keyed by 1-based page number.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "BTreeMap<u32, Vec<WordRecord>>")]
pub struct WordMap {
    pages: BTreeMap<u32, Vec<WordBox>>,
}

impl WordMap {
    pub fn new(pages: BTreeMap<u32, Vec<WordBox>>) -> Self {
        WordMap { pages }
    }

    /// Read `{"<page>": [[text, x0, y0, x1, y1], ...]}`.
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn insert(&mut self, page_number: u32, words: Vec<WordBox>) {
        self.pages.insert(page_number, words);
    }
}

impl From<BTreeMap<u32, Vec<WordRecord>>> for WordMap {
    fn from(records: BTreeMap<u32, Vec<WordRecord>>) -> Self {
        WordMap::new(
            records
                .into_iter()
                .map(|(page, words)| (page, words.into_iter().map(WordBox::from).collect()))
                .collect(),
        )
    }
}

impl WordSource for WordMap {
    fn page_words(&self, page_number: u32) -> Result<Vec<WordBox>> {
        Ok(self.pages.get(&page_number).cloned().unwrap_or_default())
    }
}

/// Collect the per page inputs of a document.
///
/// Streams that never mention the highlighter colour are dropped here, and words are
/// only requested for pages that still have a stream left.
pub fn page_inputs(doc: &Document, words: &dyn WordSource) -> Result<Vec<PageInput>> {
    let mut inputs = Vec::new();
    for (page_number, page_id) in doc.get_pages() {
        let streams: Vec<Vec<u8>> = page_streams(doc, page_id)?
            .into_iter()
            .filter(|content| contains_highlight_color(content))
            .collect();
        let page_height = page_height(doc, page_number, page_id)?;
        let words = if streams.is_empty() {
            Vec::new()
        } else {
            words.page_words(page_number)?
        };

        debug!(
            target: PDF_PARSING,
            page = page_number,
            highlight_streams = streams.len(),
            words = words.len(),
            page_height,
            "Collected page input"
        );

        inputs.push(PageInput {
            page_number,
            page_height,
            streams,
            words,
        });
    }
    Ok(inputs)
}
