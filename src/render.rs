//! pdfium backed word extraction and clip rendering.

use std::path::Path;

use geo::{coord, Rect};
use image::RgbaImage;
use pdfium_render::prelude::*;
use tracing::debug;

use crate::clip::{ClipRect, ClipRenderer};
use crate::error::{Error, Result};
use crate::geometry::flip_y;
use crate::layout::WordBox;
use crate::logging::PDF_PARSING;
use crate::parse::WordSource;

fn render_error(e: PdfiumError) -> Error {
    Error::Render(e.to_string())
}

/// Bind to the pdfium library installed on the system.
pub fn bind_pdfium() -> Result<Pdfium> {
    let bindings = Pdfium::bind_to_system_library().map_err(render_error)?;
    Ok(Pdfium::new(bindings))
}

pub struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

impl<'a> PdfiumDocument<'a> {
    pub fn open(pdfium: &'a Pdfium, path: &Path) -> Result<Self> {
        let document = pdfium.load_pdf_from_file(path, None).map_err(render_error)?;
        Ok(PdfiumDocument { document })
    }

    fn page(&self, page_number: u32) -> Result<PdfPage<'_>> {
        let index = page_number
            .checked_sub(1)
            .and_then(|index| index.try_into().ok())
            .ok_or(Error::MissingPage(page_number))?;
        self.document
            .pages()
            .get(index)
            .map_err(|_| Error::MissingPage(page_number))
    }
}

#[derive(Default)]
struct WordBuilder {
    text: String,
    bounds: Option<Rect<f64>>,
}

impl WordBuilder {
    fn push(&mut self, ch: char, rect: Rect<f64>) {
        self.text.push(ch);
        self.bounds = Some(match self.bounds {
            Some(bounds) => Rect::new(
                coord! { x: bounds.min().x.min(rect.min().x), y: bounds.min().y.min(rect.min().y) },
                coord! { x: bounds.max().x.max(rect.max().x), y: bounds.max().y.max(rect.max().y) },
            ),
            None => rect,
        });
    }

    fn finish(&mut self, page_height: f64, words: &mut Vec<WordBox>) {
        let text = std::mem::take(&mut self.text);
        if let Some(bounds) = self.bounds.take() {
            if !text.is_empty() {
                words.push(WordBox {
                    text,
                    bbox: flip_y(&bounds, page_height),
                });
            }
        }
    }
}

impl WordSource for PdfiumDocument<'_> {
    /// Whitespace separated runs of characters in content order.
    fn page_words(&self, page_number: u32) -> Result<Vec<WordBox>> {
        let page = self.page(page_number)?;
        let page_height = page.height().value as f64;
        let text = page.text().map_err(render_error)?;

        let mut words = Vec::new();
        let mut current = WordBuilder::default();
        for ch in text.chars().iter() {
            let Some(c) = ch.unicode_char().filter(|c| !c.is_whitespace()) else {
                current.finish(page_height, &mut words);
                continue;
            };
            let Ok(bounds) = ch.loose_bounds() else {
                continue;
            };
            current.push(
                c,
                Rect::new(
                    coord! { x: bounds.left.value as f64, y: bounds.bottom.value as f64 },
                    coord! { x: bounds.right.value as f64, y: bounds.top.value as f64 },
                ),
            );
        }
        current.finish(page_height, &mut words);

        debug!(target: PDF_PARSING, page = page_number, words = words.len(), "Extracted words");
        Ok(words)
    }
}

impl ClipRenderer for PdfiumDocument<'_> {
    fn render_clip(&self, page_number: u32, clip: &ClipRect, zoom: f64) -> Result<RgbaImage> {
        let page = self.page(page_number)?;
        let config = PdfRenderConfig::new().scale_page_by_factor(zoom as f32);
        let rendered = page
            .render_with_config(&config)
            .map_err(render_error)?
            .as_image()
            .to_rgba8();

        let (width, height) = rendered.dimensions();
        let x0 = ((clip.x0 * zoom).max(0.0) as u32).min(width);
        let y0 = ((clip.y0 * zoom).max(0.0) as u32).min(height);
        let x1 = ((clip.x1 * zoom).max(0.0) as u32).min(width);
        let y1 = ((clip.y1 * zoom).max(0.0) as u32).min(height);

        Ok(image::imageops::crop_imm(&rendered, x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0)).to_image())
    }
}
