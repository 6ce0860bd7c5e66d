use std::io::Write;
use std::path::{Path, PathBuf};

use image::RgbaImage;

use crate::error::Result;
use crate::Highlights;

pub const HIGHLIGHTS_FILE: &str = "highlights.txt";

const WRAP_WIDTH: usize = 70;
const INDENT: &str = "    ";

fn split_at_char(s: &str, n: usize) -> (&str, &str) {
    let index = s.char_indices().nth(n).map_or(s.len(), |(i, _)| i);
    s.split_at(index)
}

/// Greedy word wrap counting characters. Words longer than `width` are broken, the
/// first piece filling whatever room is left on the current line.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut line = String::new();
    let mut line_len = 0;

    for word in text.split_whitespace() {
        let mut rest = word;
        while !rest.is_empty() {
            let rest_len = rest.chars().count();
            let sep = usize::from(line_len > 0);
            let room = width.saturating_sub(line_len + sep);

            if rest_len <= room || (rest_len > width && room > 0) {
                let (head, tail) = split_at_char(rest, room);
                if sep == 1 {
                    line.push(' ');
                }
                line.push_str(head);
                line_len += sep + head.chars().count();
                rest = tail;
            }
            if !rest.is_empty() {
                lines.push(std::mem::take(&mut line));
                line_len = 0;
            }
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

/// Write the text highlights grouped by page:
///
/// ```text
/// page 1:
///     first highlight, wrapped at seventy
///     columns
///
/// ```
pub fn write_highlights_text<W: Write>(writer: &mut W, highlights: &Highlights) -> Result<()> {
    for (page_number, texts) in &highlights.text {
        writeln!(writer, "page {page_number}:")?;
        for text in texts {
            for line in wrap(text, WRAP_WIDTH) {
                writeln!(writer, "{INDENT}{line}")?;
            }
            writeln!(writer)?;
        }
    }
    Ok(())
}

pub fn write_json<W: Write>(writer: W, highlights: &Highlights) -> Result<()> {
    serde_json::to_writer_pretty(writer, highlights)?;
    Ok(())
}

/// `p{page}-c{index}.png`, index counting from zero within the page.
pub fn clip_path(out_dir: &Path, page_number: u32, index: usize) -> PathBuf {
    out_dir.join(format!("p{page_number}-c{index}.png"))
}

pub fn write_clip(out_dir: &Path, page_number: u32, index: usize, image: &RgbaImage) -> Result<PathBuf> {
    let path = clip_path(out_dir, page_number, index);
    image.save(&path)?;
    Ok(path)
}
