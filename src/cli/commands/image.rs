//! Image normalization from the command line.

use std::path::Path;

use colored::Colorize;

use super::context::{parse_display, Context};
use crate::cli::args::{ImageCommands, ImageOptions, OutputFormat};
use crate::error::CatalogError;
use crate::features::image::{
    AspectRatio, BlobUrlFactory, CropRect, FsBlobUrlFactory, ImagePipeline, ImageRenderer, NormalizedImage,
};
use crate::output::to_json;

/// Execute image subcommands.
///
/// # Errors
///
/// Returns an error if the image is invalid or the output cannot be written.
pub fn image(ctx: &Context, cmd: ImageCommands) -> Result<String, CatalogError> {
    match cmd {
        ImageCommands::Crop {
            path,
            out,
            aspect,
            crop,
            display,
        } => {
            let options = ImageOptions {
                image: Some(path.clone()),
                aspect,
                crop,
                display,
            };
            let normalized = normalize(ctx, &path, &options, "image")?;
            let written = std::fs::write(&out, &normalized.bytes);
            release_preview(ctx, Some(&normalized));
            written?;
            format_written(&normalized, &out, ctx.format)
        }
    }
}

/// Normalize the image named in `options`, if any.
///
/// # Errors
///
/// Returns `CatalogError::Validation` for a bad file, crop or display size.
pub fn load_image(
    ctx: &Context,
    options: &ImageOptions,
    prefix: &str,
) -> Result<Option<NormalizedImage>, CatalogError> {
    match &options.image {
        Some(path) => normalize(ctx, path, options, prefix).map(Some),
        None => {
            if options.crop.is_some() || options.display.is_some() || options.aspect.is_some() {
                return Err(CatalogError::Validation(
                    "--aspect, --crop and --display need --image".to_string(),
                ));
            }
            Ok(None)
        }
    }
}

/// Remove the local preview of an image once the command is done with it.
pub fn release_preview(ctx: &Context, image: Option<&NormalizedImage>) {
    if let Some(url) = image.and_then(|i| i.preview_url.as_deref()) {
        FsBlobUrlFactory::new(ctx.paths.previews.clone()).revoke(url);
    }
}

/// Run one file through a crop session: select, frame, adjust, commit.
fn normalize(
    ctx: &Context,
    path: &Path,
    options: &ImageOptions,
    prefix: &str,
) -> Result<NormalizedImage, CatalogError> {
    let bytes = std::fs::read(path).map_err(|e| {
        CatalogError::Validation(format!("cannot read image {}: {e}", path.display()))
    })?;
    let aspect: AspectRatio = options.aspect.unwrap_or(ctx.config.image.default_aspect);

    let renderer = ImageRenderer;
    let previews = FsBlobUrlFactory::new(ctx.paths.previews.clone());
    let pipeline = ImagePipeline::new(&renderer, &previews)
        .with_limits(ctx.config.image.max_bytes, ctx.config.image.jpeg_quality)
        .with_filename_prefix(prefix);

    let mut session = pipeline.select(bytes, aspect)?;
    match &options.display {
        Some(raw) => {
            let (width, height) = parse_display(raw)?;
            session.frame(width, height)?;
        }
        None => {
            session.frame_natural()?;
        }
    }
    if let Some(raw) = &options.crop {
        session.adjust(CropRect::parse(raw)?)?;
    }

    session
        .commit()?
        .ok_or_else(|| CatalogError::Validation("no crop rectangle to render".to_string()))
}

fn format_written(
    image: &NormalizedImage,
    out: &Path,
    format: OutputFormat,
) -> Result<String, CatalogError> {
    match format {
        OutputFormat::Json => to_json(&serde_json::json!({
            "path": out.display().to_string(),
            "filename": image.filename,
            "width": image.width,
            "height": image.height,
            "bytes": image.bytes.len(),
            "mime": image.mime,
        })),
        OutputFormat::Pretty => Ok(format!(
            "{} Wrote {} ({}x{}, {} bytes)",
            "✓".green(),
            out.display(),
            image.width,
            image.height,
            image.bytes.len()
        )),
    }
}
