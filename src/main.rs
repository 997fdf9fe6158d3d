//! `keying` CLI - run the keying nodes over folders of images.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use image::Rgb;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use keying_nodes::image::{decode_image, image_to_tensor, ColorPreset, OutputFormat, SortOrder};
use keying_nodes::model::ModelKind;
use keying_nodes::nodes::paths_text;
use keying_nodes::{
    BatchLoad, BatchMode, BatchSave, OutputMode, RemoveBackground, ResizeMode, SolidCanvas,
};

/// Background removal, batch folder I/O and solid canvases.
#[derive(Parser, Debug)]
#[command(name = "keying")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Remove the background of every image in a folder.
    RemoveBg(RemoveBgArgs),
    /// Load a folder as one batch and write it back out.
    Batch(BatchArgs),
    /// Generate solid color canvases.
    Canvas(CanvasArgs),
}

#[derive(Args, Debug)]
struct LoadArgs {
    /// Input folder, relative to the current directory unless absolute.
    #[arg(value_name = "FOLDER")]
    folder: PathBuf,

    /// Also load images from subfolders.
    #[arg(long)]
    recursive: bool,

    /// Maximum number of images to load.
    #[arg(long, default_value = "9999", value_name = "INT")]
    max_images: usize,

    /// Number of sorted files to skip.
    #[arg(long, default_value = "0", value_name = "INT")]
    start_index: usize,

    /// File ordering.
    #[arg(long, value_enum, default_value_t)]
    sort: SortOrder,

    /// What to do with images whose size differs from the first.
    #[arg(long, value_enum, default_value_t)]
    resize_mode: ResizeMode,
}

impl LoadArgs {
    fn to_config(&self) -> BatchLoad {
        BatchLoad {
            folder: self.folder.clone(),
            recursive: self.recursive,
            max_images: self.max_images,
            start_index: self.start_index,
            sort: self.sort,
            resize_mode: self.resize_mode,
        }
    }
}

#[derive(Args, Debug)]
struct SaveArgs {
    /// Output root directory.
    #[arg(short, long, default_value = "output", value_name = "DIR")]
    output_dir: PathBuf,

    /// Folder under the output root that receives the files.
    #[arg(long, default_value = "keying_batch")]
    subfolder: String,

    /// Output container format.
    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,

    /// Output JPEG quality (1-100).
    #[arg(short, long, default_value = "95", value_name = "INT")]
    quality: u8,

    /// Prefix for every output file name.
    #[arg(long, default_value = "")]
    prefix: String,
}

impl SaveArgs {
    fn to_config(&self) -> BatchSave {
        BatchSave {
            subfolder: self.subfolder.clone(),
            format: self.format,
            quality: self.quality,
            prefix: self.prefix.clone(),
        }
    }
}

#[derive(Args, Debug)]
struct RemoveBgArgs {
    #[command(flatten)]
    load: LoadArgs,

    #[command(flatten)]
    save: SaveArgs,

    /// Application root; models are read from <ROOT>/models/u2net only.
    #[arg(long, default_value = ".", value_name = "ROOT")]
    root: PathBuf,

    /// Segmentation model.
    #[arg(short, long, value_enum, default_value_t)]
    model: ModelKind,

    /// Image output: bare cutout or composited over the background.
    #[arg(long, value_enum, default_value_t)]
    output_mode: OutputMode,

    /// Background for composite mode, as R,G,B or #RRGGBB.
    #[arg(long, default_value = "255,255,255", value_parser = parse_rgb)]
    background: Rgb<u8>,

    /// Also save the alpha masks as grayscale PNGs to <SUBFOLDER>_mask.
    #[arg(long)]
    save_masks: bool,
}

#[derive(Args, Debug)]
struct BatchArgs {
    #[command(flatten)]
    load: LoadArgs,

    #[command(flatten)]
    save: SaveArgs,
}

#[derive(Args, Debug)]
struct CanvasArgs {
    #[command(flatten)]
    save: SaveArgs,

    /// Canvas width.
    #[arg(long, default_value = "1024", value_name = "INT")]
    width: usize,

    /// Canvas height.
    #[arg(long, default_value = "1024", value_name = "INT")]
    height: usize,

    /// Fill color preset.
    #[arg(long, value_enum, default_value_t)]
    preset: ColorPreset,

    /// Fill color for the custom preset, as R,G,B or #RRGGBB.
    #[arg(long, default_value = "255,255,255", value_parser = parse_rgb)]
    rgb: Rgb<u8>,

    /// Reference image that provides the canvas size.
    #[arg(long, value_name = "IMAGE")]
    reference: Option<PathBuf>,

    /// Ignore the reference size and use --width/--height.
    #[arg(long)]
    manual_size: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("keying={log_level},keying_nodes={log_level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let result = match &cli.command {
        Command::RemoveBg(args) => remove_bg(args),
        Command::Batch(args) => batch(args),
        Command::Canvas(args) => canvas(args),
    };

    if let Err(err) = result {
        tracing::error!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn remove_bg(args: &RemoveBgArgs) -> Result<()> {
    let base = std::env::current_dir().context("Failed to read the current directory")?;
    let loaded = args
        .load
        .to_config()
        .load(&base)
        .context("Failed to load input images")?;

    let node = RemoveBackground {
        model: args.model,
        output_mode: args.output_mode,
        background: args.background,
    };
    let (images, masks) = node
        .run_local(&args.root, loaded.images.into_dyn())
        .context("Failed to remove backgrounds")?;

    let saver = args.save.to_config();
    let names = loaded.filenames.join("\n");
    let paths = saver
        .save(&args.save.output_dir, images.into_dyn(), &names)
        .context("Failed to save images")?;
    println!("{}", paths_text(&paths));

    if args.save_masks {
        let mask_saver = BatchSave {
            subfolder: format!("{}_mask", saver.subfolder),
            ..saver
        };
        let mask_paths = mask_saver
            .save_masks(&args.save.output_dir, &masks, &names)
            .context("Failed to save masks")?;
        println!("{}", paths_text(&mask_paths));
    }

    Ok(())
}

fn batch(args: &BatchArgs) -> Result<()> {
    let base = std::env::current_dir().context("Failed to read the current directory")?;
    let loaded = args
        .load
        .to_config()
        .load(&base)
        .context("Failed to load input images")?;

    let names = loaded.filenames_text();
    let paths = args
        .save
        .to_config()
        .save(&args.save.output_dir, loaded.images.into_dyn(), &names)
        .context("Failed to save images")?;
    println!("{}", paths_text(&paths));

    Ok(())
}

fn canvas(args: &CanvasArgs) -> Result<()> {
    let reference = args
        .reference
        .as_ref()
        .map(|path| decode_image(path).map(|img| image_to_tensor(&img).into_dyn()))
        .transpose()
        .context("Failed to load reference image")?;

    let node = SolidCanvas {
        auto_from_image: !args.manual_size,
        width: args.width,
        height: args.height,
        batch_mode: BatchMode::MatchReference,
        preset: args.preset,
        custom: args.rgb,
    };
    let canvas = node.make(reference).context("Failed to generate canvas")?;

    let paths = args
        .save
        .to_config()
        .save(&args.save.output_dir, canvas.into_dyn(), "")
        .context("Failed to save canvas")?;
    println!("{}", paths_text(&paths));

    Ok(())
}

/// Parse `R,G,B` or `#RRGGBB`.
fn parse_rgb(value: &str) -> std::result::Result<Rgb<u8>, String> {
    let value = value.trim();

    if let Some(hex) = value.strip_prefix('#') {
        let parsed = u32::from_str_radix(hex, 16).ok().filter(|_| hex.len() == 6);
        let Some(rgb) = parsed else {
            return Err(format!("invalid hex color {value:?}, expected #RRGGBB"));
        };
        let [_, r, g, b] = rgb.to_be_bytes();
        return Ok(Rgb([r, g, b]));
    }

    let parts: Vec<u8> = value
        .split(',')
        .map(|part| part.trim().parse::<u8>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|err| format!("invalid color {value:?}: {err}"))?;

    match parts.as_slice() {
        [r, g, b] => Ok(Rgb([*r, *g, *b])),
        _ => Err(format!("invalid color {value:?}, expected R,G,B")),
    }
}
