// ============================================================================
// ChannelFE CLI — headless channel adjustment via command-line arguments
// ============================================================================
//
// Usage examples:
//   channelfe -i photo.png --blue 40 --red -15 -o warm.png
//   channelfe -i photo.jpg --green 25 --roi 10,10,200,120 --save
//   channelfe -i "shots/*.jpg" --recipe cool.cfr --output-dir out/ --format png
//   channelfe -i photo.png --blue 30 --save-recipe cool.cfr -o preview.png
//
// Without -o / --output-dir, results are written into the store directory
// as `adjusted_<stem>.png` (or the --format extension); --save also copies
// the last one to `saved_image.png`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::config::EngineConfig;
use crate::engine::{Engine, ImageHandle, sanitize_filename};
use crate::error::Result;
use crate::io::{SaveFormat, decode_image, encode_and_write};
use crate::ops::recipe::AdjustRecipe;
use crate::region::RawRect;
use crate::request::AdjustRequest;
use crate::{log_err, log_info, logger};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// ChannelFE headless channel adjuster.
///
/// Boost or reduce the Blue / Green / Red channels of images, globally or
/// inside a rectangle, without opening an editor.
#[derive(Parser, Debug)]
#[command(
    name = "channelfe",
    about = "ChannelFE headless per-channel image adjuster",
    long_about = "Add signed offsets to the Blue, Green and Red channels of one or more\n\
                  images, optionally only inside a region of interest. Offsets saturate\n\
                  at 0 and 255. Every output is computed from the untouched input.\n\n\
                  Example:\n  \
                  channelfe -i photo.png --blue 40 --red -15 -o warm.png\n  \
                  channelfe -i *.jpg --recipe cool.cfr --output-dir out/ --format png"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Blue channel offset.
    #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
    pub blue: i32,

    /// Green channel offset.
    #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
    pub green: i32,

    /// Red channel offset.
    #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
    pub red: i32,

    /// Region of interest as x,y,w,h. "0,0,0,0" or omitted = whole image.
    #[arg(long, value_name = "X,Y,W,H", value_parser = parse_rect)]
    pub roi: Option<RawRect>,

    /// Apply offsets and region from a .cfr recipe instead of the flags above.
    #[arg(long, value_name = "RECIPE.cfr")]
    pub recipe: Option<PathBuf>,

    /// Write the effective adjustment to a .cfr recipe file.
    #[arg(long, value_name = "RECIPE.cfr")]
    pub save_recipe: Option<PathBuf>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format: png, jpeg, bmp, tga, tiff.
    /// When omitted, inferred from --output's extension, then the input's.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// JPEG quality (1–100). Defaults to the configured quality. In store
    /// mode it needs an explicit --format.
    #[arg(short, long, value_name = "1-100")]
    pub quality: Option<u8>,

    /// Downscale so the longest edge is at most this many pixels before adjusting.
    #[arg(long, value_name = "PIXELS")]
    pub max_edge: Option<u32>,

    /// Also copy the last result to the configured save name (saved_image.png).
    #[arg(long)]
    pub save: bool,

    /// Config file (JSON). Defaults to $CHANNELFE_CONFIG or ./channelfe.json.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Store directory, overriding the config's store_dir.
    #[arg(long, value_name = "DIR")]
    pub store_dir: Option<PathBuf>,

    /// Log file path, overriding the platform default.
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Print per-file timing and echo warnings to stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_rect(s: &str) -> std::result::Result<RawRect, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        return Err(format!("expected x,y,w,h but got '{}'", s));
    }
    let mut vals = [0i64; 4];
    for (slot, part) in vals.iter_mut().zip(&parts) {
        *slot = part
            .parse()
            .map_err(|_| format!("'{}' is not an integer", part))?;
    }
    Ok(RawRect::new(vals[0], vals[1], vals[2], vals[3]))
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    match &args.log_file {
        Some(path) => logger::init_at(path),
        None => logger::init(),
    }
    logger::set_echo(args.verbose);

    let mut config = EngineConfig::load_or_default(args.config.as_deref());
    if let Some(dir) = &args.store_dir {
        config.store_dir = dir.clone();
    }

    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    let request = match build_request(&args) {
        Ok(req) => req,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = request.validate(config.offset_limit) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    if let Some(path) = &args.save_recipe
        && let Err(e) = AdjustRecipe::from(request).save(path)
    {
        eprintln!("error: could not write recipe '{}': {}", path.display(), e);
        return ExitCode::FAILURE;
    }

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    if let Some(name) = &args.format
        && SaveFormat::from_extension(name).is_none()
    {
        eprintln!("error: unknown format '{}' (expected png, jpeg, bmp, tga or tiff).", name);
        return ExitCode::FAILURE;
    }

    let writes_to_store = args.output.is_none() && args.output_dir.is_none();
    if writes_to_store && args.quality.is_some() && args.format.is_none() {
        eprintln!("error: --quality needs --format when results go to the store (previews are PNG).");
        return ExitCode::FAILURE;
    }

    let engine = if writes_to_store {
        match Engine::with_dir_store(config) {
            Ok(engine) => engine,
            Err(e) => {
                eprintln!("error: could not open store directory: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        Engine::in_memory(config)
    };

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;
    let mut last_stored: Option<String> = None;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let file_start = Instant::now();

        let result = if writes_to_store {
            run_into_store(&engine, input_path, &request, &args)
        } else {
            run_to_file(&engine, input_path, &request, &args)
        };

        match result {
            Ok(written) => {
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        written,
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
                if writes_to_store {
                    last_stored = Some(written);
                }
            }
            Err(e) => {
                log_err!("{}: {}", input_path.display(), e);
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if args.save {
        match &last_stored {
            Some(name) => {
                let saved = engine.config().saved_name.clone();
                if let Err(e) = engine.store().copy(name, &saved) {
                    eprintln!("error: save failed: {}", e);
                    any_failure = true;
                } else if args.verbose {
                    println!("saved {} → {}", name, saved);
                }
            }
            None => {
                eprintln!("error: nothing to save (no result was written to the store).");
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

fn build_request(args: &CliArgs) -> Result<AdjustRequest> {
    if let Some(path) = &args.recipe {
        let recipe = AdjustRecipe::load(path)?;
        log_info!("Loaded recipe {}", path.display());
        return Ok(recipe.to_request());
    }
    Ok(AdjustRequest {
        blue: args.blue,
        green: args.green,
        red: args.red,
        region: args.roi.filter(|r| !r.is_empty()),
    })
}

// ============================================================================
// Per-file processing
// ============================================================================

/// Adjust one file and keep it in the store as `adjusted_<stem>.<ext>`.
/// The lossless preview is copied as-is unless --format asks for another
/// container. Returns the store name written.
fn run_into_store(engine: &Engine, input: &Path, request: &AdjustRequest, args: &CliArgs) -> Result<String> {
    let filename = input_filename(input);
    let handle = load(engine, input, &filename, args.max_edge)?;

    let format = args.format.as_deref().and_then(SaveFormat::from_extension);
    let outcome = engine.adjust(handle, request).and_then(|preview| match format {
        None => engine
            .save_result(&preview, preview.file_name())
            .map(|stored| stored.key().to_string()),
        Some(format) => {
            let stem = Path::new(preview.file_name())
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("adjusted_image");
            let name = format!("{}.{}", stem, format.extension());
            let quality = args.quality.unwrap_or(engine.config().jpeg_quality);
            let adjusted = engine.preview(handle)?;
            engine.store().put(&name, &adjusted, format, quality)?;
            Ok(name)
        }
    });
    engine.close(handle)?;
    outcome
}

/// Adjust one file and write it to --output or --output-dir.
/// Returns the written path for display.
fn run_to_file(engine: &Engine, input: &Path, request: &AdjustRequest, args: &CliArgs) -> Result<String> {
    let filename = input_filename(input);
    let handle = load(engine, input, &filename, args.max_edge)?;

    let outcome = engine.adjust(handle, request).and_then(|_| engine.preview(handle));
    engine.close(handle)?;
    let adjusted = outcome?;

    let format = parse_format(args.format.as_deref(), args.output.as_deref(), input, engine.config().default_format);
    let output = build_output_path(input, args.output.as_deref(), args.output_dir.as_deref(), format);
    let quality = args.quality.unwrap_or(engine.config().jpeg_quality);
    encode_and_write(&adjusted, &output, format, quality)?;
    Ok(output.display().to_string())
}

fn load(engine: &Engine, input: &Path, filename: &str, max_edge: Option<u32>) -> Result<ImageHandle> {
    let bytes = std::fs::read(input)?;
    match max_edge {
        Some(edge) => {
            let buffer = decode_image(&bytes, engine.config().decode_limits())?;
            Ok(engine.load_buffer(buffer.fit_within(edge), filename))
        }
        None => engine.load_image(&bytes, filename),
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn input_filename(input: &Path) -> String {
    input
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string())
}

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Choose the output format: `--format`, then the output extension, then
/// the input extension, then the configured default.
fn parse_format(format_arg: Option<&str>, output: Option<&Path>, input: &Path, fallback: SaveFormat) -> SaveFormat {
    let ext_of = |p: &Path| {
        p.extension()
            .and_then(|e| e.to_str())
            .and_then(SaveFormat::from_extension)
    };
    format_arg
        .and_then(SaveFormat::from_extension)
        .or_else(|| output.and_then(ext_of))
        .or_else(|| ext_of(input))
        .unwrap_or(fallback)
}

/// Output path for one input: explicit `--output`, else
/// `<output_dir>/adjusted_<stem>.<ext>`, else next to the input.
fn build_output_path(input: &Path, output: Option<&Path>, output_dir: Option<&Path>, format: SaveFormat) -> PathBuf {
    if let Some(out) = output {
        return out.to_path_buf();
    }

    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let file = format!("adjusted_{}.{}", sanitize_filename(&stem), format.extension());

    match output_dir {
        Some(dir) => dir.join(file),
        None => input.parent().unwrap_or(Path::new(".")).join(file),
    }
}
