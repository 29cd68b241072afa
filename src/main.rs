use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use glob::glob;
use log::{info, warn};

use geopdf::metadata::overrides_from_json;
use geopdf::units::UnitSystem;
use geopdf::{CropMarks, GeoCanvas, PdfDocument, Result};

/// Render georeferenced pages, optionally with crop marks and bleed
#[derive(Parser, Debug)]
#[command(name = "geopdf", about = "Render GeoPDF pages with crop marks and bleed")]
struct Args {
    /// Trimmed page width (default: 8.5)
    #[arg(long, default_value_t = 8.5)]
    width: f64,
    /// Trimmed page height (default: 11)
    #[arg(long, default_value_t = 11.0)]
    height: f64,
    /// Unit of width/height
    #[arg(long, value_enum, default_value_t = UnitSystem::Inch)]
    r#type: UnitSystem,
    /// JSON file with crop-mark settings (borderWidth, markLength, markWidth, markColor, markLast, bleedWidth)
    #[arg(long)]
    crop_marks: Option<PathBuf>,
    /// Glob of JSON files with LGIDict overrides; one page per file
    #[arg(long)]
    geo: Option<String>,
    /// Flate-compress page content
    #[arg(long, default_value_t = false)]
    compress: bool,
    /// Page rotation in degrees
    #[arg(long, default_value_t = 0)]
    rotate: i64,
    /// Output file
    #[arg(long, default_value = "./geo.pdf")]
    output: PathBuf,
}

fn load_crop_marks(path: &Path) -> Result<CropMarks> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn geo_files(pattern: &str) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = glob(pattern)?.filter_map(|e| e.ok()).collect();
    paths.sort();
    Ok(paths)
}

/// Frame just inside the trim box, so the page has something to register.
fn draw_frame(canvas: &mut GeoCanvas<PdfDocument>, w_pt: f64, h_pt: f64) {
    let inset = 0.05 * w_pt.min(h_pt);
    canvas.save_state();
    canvas.set_line_width(1.0);
    canvas.rect(inset, inset, w_pt - 2.0 * inset, h_pt - 2.0 * inset);
    canvas.restore_state();
}

fn make_pdf(args: &Args) -> Result<()> {
    let w_pt = args.r#type.to_points(args.width);
    let h_pt = args.r#type.to_points(args.height);

    let mut canvas = GeoCanvas::new(PdfDocument::new(), (w_pt, h_pt));
    canvas.set_page_compression(args.compress);
    canvas.set_page_rotation(args.rotate);
    if let Some(path) = &args.crop_marks {
        canvas.set_crop_marks(Some(load_crop_marks(path)?));
    }
    canvas.set_on_page(|n| info!("page {n} done"));

    let geo_paths = match &args.geo {
        Some(pattern) => geo_files(pattern)?,
        None => Vec::new(),
    };

    if geo_paths.is_empty() {
        draw_frame(&mut canvas, w_pt, h_pt);
        canvas.show_page()?;
    }

    for path in &geo_paths {
        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(path)?)?;
        draw_frame(&mut canvas, w_pt, h_pt);
        if canvas.attach_geo(overrides_from_json(json)?)?.is_none() {
            warn!("{}: LGIDict needs Registration or CTM, page left without one", path.display());
        }
        canvas.show_page()?;
    }

    let pdf = canvas.into_inner();
    let pages = pdf.page_count();
    pdf.save(&args.output)?;
    info!(
        "wrote {} page(s) of {} x {} {} to {}",
        pages,
        args.width,
        args.height,
        args.r#type.as_str(),
        args.output.display()
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    make_pdf(&args)
}
