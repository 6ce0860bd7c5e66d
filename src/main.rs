use std::fs::{self, File};
use std::io::{self, BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};

use highlighter_pdf::config::{
    ExtractConfig, WordSelectionMethod, DEFAULT_AREA_RATIO, DEFAULT_CLIP_AREA_THRESHOLD,
    DEFAULT_CLIP_ZOOM, DEFAULT_MAX_SKIP_LEN,
};
use highlighter_pdf::output::{write_highlights_text, write_json, HIGHLIGHTS_FILE};
use highlighter_pdf::parse::{load_pdf, WordMap};
use highlighter_pdf::{extract_pdf_highlights, Highlights};

#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about,
    long_about = "Extract textual highlights and clippings drawn with the yellow highlighter from FILE.",
    arg_required_else_help = true
)]
pub struct Args {
    /// Path to the PDF file to process
    pub pdf_path: PathBuf,

    /// Directory for output. Defaults to the file name without its extension plus "-highlights".
    #[clap(short, long)]
    pub out: Option<PathBuf>,

    /// Number of words that can be skipped without being excluded from a highlight
    #[clap(long, default_value_t = DEFAULT_MAX_SKIP_LEN)]
    pub max_skip_len: usize,

    /// How to determine if a particular word has been highlighted (CENTROID or AREA_RATIO)
    #[clap(long, default_value_t = WordSelectionMethod::Centroid, value_parser = parse_method)]
    pub word_selection_method: WordSelectionMethod,

    /// Covered fraction above which AREA_RATIO selects a word
    #[clap(long, default_value_t = DEFAULT_AREA_RATIO)]
    pub area_ratio: f64,

    /// How much area a clipping must enclose to be considered a clipping
    #[clap(long, default_value_t = DEFAULT_CLIP_AREA_THRESHOLD)]
    pub clip_area_threshold: f64,

    /// How much to zoom in when rendering a clip. Increase for better quality.
    #[clap(long, default_value_t = DEFAULT_CLIP_ZOOM)]
    pub clip_zoom: f64,

    /// JSON file with the words of each page: {"<page>": [[text, x0, y0, x1, y1], ...]}
    #[clap(long)]
    pub words: Option<PathBuf>,

    /// Also write highlights.json
    #[clap(long)]
    pub json: bool,

    /// WARNING: Potentially destructive! Answer yes to any interactive prompts.
    #[clap(long)]
    pub yes: bool,

    /// Enable detailed logging of PDF content stream operations
    #[clap(long)]
    pub debug_ops: bool,

    /// Directory for debug operation logs
    #[clap(long)]
    pub log_dir: Option<PathBuf>,
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }

    fn config(&self) -> ExtractConfig {
        ExtractConfig {
            max_skip_len: self.max_skip_len,
            word_selection_method: self.word_selection_method,
            area_ratio: self.area_ratio,
            clip_area_threshold: self.clip_area_threshold,
            clip_zoom: self.clip_zoom,
        }
    }
}

fn parse_method(s: &str) -> std::result::Result<WordSelectionMethod, String> {
    s.parse().map_err(|e: highlighter_pdf::error::Error| e.to_string())
}

fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{prompt} [y/N] ");
    io::stderr().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

/// Extension of `path` when it is anything but `.pdf`, empty when there is none.
fn unexpected_extension(path: &Path) -> Option<String> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    (extension != "pdf").then_some(extension)
}

/// Work out the output directory, asking before anything surprising happens.
fn prepare_out_dir(args: &Args) -> Result<PathBuf> {
    if args.pdf_path.extension().is_none() && args.out.is_none() {
        bail!("If the pdf has no extension, the output directory must be manually specified.");
    }
    if let Some(ext) = unexpected_extension(&args.pdf_path) {
        let shown = if ext.is_empty() { "none".to_string() } else { format!(".{ext}") };
        if !args.yes
            && !confirm(&format!("Unexpected extension: {shown} - do you want to continue?"))?
        {
            bail!("Aborted.");
        }
    }

    let out = match &args.out {
        Some(out) => out.clone(),
        None => {
            let stem = args
                .pdf_path
                .file_stem()
                .context("Input path has no file name")?
                .to_string_lossy();
            args.pdf_path.with_file_name(format!("{stem}-highlights"))
        }
    };

    if out.is_dir() {
        if !args.yes
            && !confirm(&format!(
                "Output directory {} already exists, overwrite any contents?",
                out.display()
            ))?
        {
            bail!("Aborted.");
        }
    } else {
        fs::create_dir_all(&out)
            .with_context(|| format!("Failed to create {}", out.display()))?;
    }
    Ok(out)
}

fn load_words(path: &Path) -> Result<WordMap> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(WordMap::from_json_reader(io::BufReader::new(file))?)
}

fn write_outputs(args: &Args, out_dir: &Path, highlights: &Highlights) -> Result<()> {
    let text_path = out_dir.join(HIGHLIGHTS_FILE);
    let mut writer = BufWriter::new(File::create(&text_path)?);
    write_highlights_text(&mut writer, highlights)?;
    writer.flush()?;
    info!("Highlights written to {}", text_path.display());

    if args.json {
        let json_path = out_dir.join("highlights.json");
        write_json(BufWriter::new(File::create(&json_path)?), highlights)?;
        info!("JSON written to {}", json_path.display());
    }
    Ok(())
}

#[cfg(feature = "render")]
fn run(args: &Args, out_dir: &Path, config: &ExtractConfig) -> Result<()> {
    use highlighter_pdf::clip::ClipRenderer;
    use highlighter_pdf::output::write_clip;
    use highlighter_pdf::parse::WordSource;
    use highlighter_pdf::render::{bind_pdfium, PdfiumDocument};

    let doc = load_pdf(&args.pdf_path)?;
    let word_map = args.words.as_deref().map(load_words).transpose()?;

    let pdfium = bind_pdfium()?;
    let pdf = PdfiumDocument::open(&pdfium, &args.pdf_path)?;
    let words: &dyn WordSource = match &word_map {
        Some(map) => map,
        None => &pdf,
    };

    let highlights = extract_pdf_highlights(&doc, words, config)?;
    write_outputs(args, out_dir, &highlights)?;

    for (page_number, clips) in &highlights.clips {
        for (index, clip) in clips.iter().enumerate() {
            let image = pdf.render_clip(*page_number, clip, config.clip_zoom)?;
            let path = write_clip(out_dir, *page_number, index, &image)?;
            info!("Clip written to {}", path.display());
        }
    }
    Ok(())
}

#[cfg(not(feature = "render"))]
fn run(args: &Args, out_dir: &Path, config: &ExtractConfig) -> Result<()> {
    let doc = load_pdf(&args.pdf_path)?;
    let Some(words_path) = args.words.as_deref() else {
        bail!("No word source: pass --words or build with the `render` feature.");
    };
    let words = load_words(words_path)?;

    let highlights = extract_pdf_highlights(&doc, &words, config)?;
    write_outputs(args, out_dir, &highlights)?;

    for (page_number, clips) in &highlights.clips {
        warn!(
            page = page_number,
            clips = ?clips,
            "Clips found but rendering needs the `render` feature"
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse_args();

    // Keep the guard alive until the end of main so buffered logs are flushed.
    let _guard = match &args.log_dir {
        Some(log_dir) => highlighter_pdf::logging::init_logging_with_dir(args.debug_ops, log_dir)?,
        None => highlighter_pdf::logging::init_logging(args.debug_ops),
    };

    let config = args.config();
    config.validate()?;

    let out_dir = prepare_out_dir(&args)?;
    run(&args, &out_dir, &config)
}
