//
// image.rs
// dicom-batch
//
// Exports decoded pixel data to raster images, undoing MONOCHROME1 polarity and optionally collapsing to grayscale.
//
// Thales Matheus Mendonça Santos - November 2025

use std::fs;
use std::ops::Sub;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use dicom::object::open_file;
use dicom::pixeldata::{
    DecodedPixelData, PhotometricInterpretation, PixelDecoder, PlanarConfiguration,
};
use dicom_pixeldata::{ConvertOptions, ModalityLutOption, PixelRepresentation, VoiLutOption};
use image::{DynamicImage, ImageBuffer, ImageFormat, Luma, Rgb};
use ndarray::{Array, Array4, ArrayView3, Axis, Dimension};
use tracing::debug;

use crate::batch::FileProcessor;
use crate::settings::FolderRole;
use crate::walker::WalkedFile;

/// Options controlling how pixel data is turned into raster files.
#[derive(Debug, Clone)]
pub struct ImageExportOptions {
    /// Collapse every image to 8-bit single-channel luminance.
    pub grayscale: bool,
    /// Raster file extension, which also selects the encoder.
    pub format: String,
}

impl Default for ImageExportOptions {
    fn default() -> Self {
        Self {
            grayscale: true,
            format: "png".to_string(),
        }
    }
}

impl ImageExportOptions {
    fn image_format(&self) -> Result<ImageFormat> {
        ImageFormat::from_extension(&self.format)
            .ok_or_else(|| anyhow!("Unsupported image format: {}", self.format))
    }
}

/// Raw samples of every frame, laid out as `[frame, row, column, sample]`.
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    U8(Array4<u8>),
    U16(Array4<u16>),
    I32(Array4<i32>),
}

impl Samples {
    pub fn number_of_frames(&self) -> usize {
        match self {
            Samples::U8(a) => a.len_of(Axis(0)),
            Samples::U16(a) => a.len_of(Axis(0)),
            Samples::I32(a) => a.len_of(Axis(0)),
        }
    }

    pub fn invert(&mut self) {
        match self {
            Samples::U8(a) => invert_polarity(a),
            Samples::U16(a) => invert_polarity(a),
            Samples::I32(a) => invert_polarity(a),
        }
    }
}

/// Reverses intensities in place as `max - value`, where `max` is the largest sample in the
/// array itself rather than the bit-depth ceiling.
pub fn invert_polarity<T, D>(samples: &mut Array<T, D>)
where
    T: Copy + Ord + Sub<Output = T>,
    D: Dimension,
{
    if let Some(max) = samples.iter().copied().max() {
        samples.mapv_inplace(|v| max - v);
    }
}

/// Materialises decoded pixel data without modality/VOI LUTs, with MONOCHROME1 already inverted.
pub fn decode_samples(decoded: &DecodedPixelData<'_>) -> Result<Samples> {
    let options = ConvertOptions::new()
        .with_modality_lut(ModalityLutOption::None)
        .with_voi_lut(VoiLutOption::Identity);

    let frames = decoded.number_of_frames() as usize;
    let rows = decoded.rows() as usize;
    let columns = decoded.columns() as usize;
    let spp = decoded.samples_per_pixel() as usize;
    let planar = spp > 1
        && matches!(decoded.planar_configuration(), PlanarConfiguration::PixelFirst);
    let shape = (frames, rows, columns, spp);

    // The converter only accepts interleaved samples, so colour-by-plane data is read from
    // the raw decoded bytes instead.
    let mut samples = if planar {
        planar_samples(decoded, shape)?
    } else if decoded.pixel_representation() == PixelRepresentation::Signed {
        let data = decoded
            .to_vec_with_options::<i32>(&options)
            .context("Failed to convert decoded pixels to vector")?;
        Samples::I32(shape_samples(data, shape, false)?)
    } else if decoded.bits_allocated() <= 8 {
        let data = decoded
            .to_vec_with_options::<u8>(&options)
            .context("Failed to convert decoded pixels to vector")?;
        Samples::U8(shape_samples(data, shape, false)?)
    } else {
        let data = decoded
            .to_vec_with_options::<u16>(&options)
            .context("Failed to convert decoded pixels to vector")?;
        Samples::U16(shape_samples(data, shape, false)?)
    };

    if matches!(
        decoded.photometric_interpretation(),
        PhotometricInterpretation::Monochrome1
    ) {
        debug!("MONOCHROME1 data, inverting samples");
        samples.invert();
    }
    Ok(samples)
}

/// Unsigned samples straight from the decoded buffer, 8-bit or little-endian 16-bit.
fn planar_samples(
    decoded: &DecodedPixelData<'_>,
    shape: (usize, usize, usize, usize),
) -> Result<Samples> {
    let (frames, rows, columns, spp) = shape;
    let count = frames * rows * columns * spp;
    let raw = decoded.data();

    if decoded.bits_allocated() <= 8 {
        // Odd-length pixel data carries one padding byte.
        let data: Vec<u8> = raw.iter().copied().take(count).collect();
        Ok(Samples::U8(shape_samples(data, shape, true)?))
    } else {
        let data: Vec<u16> = raw
            .chunks_exact(2)
            .take(count)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Ok(Samples::U16(shape_samples(data, shape, true)?))
    }
}

fn shape_samples<T>(
    data: Vec<T>,
    (frames, rows, columns, spp): (usize, usize, usize, usize),
    planar: bool,
) -> Result<Array4<T>> {
    if planar {
        // Colour-by-plane: each frame stores all reds, then greens, then blues.
        let planes = Array4::from_shape_vec((frames, spp, rows, columns), data)
            .context("Pixel data does not match the declared dimensions")?;
        Ok(planes.permuted_axes([0, 2, 3, 1]))
    } else {
        Array4::from_shape_vec((frames, rows, columns, spp), data)
            .context("Pixel data does not match the declared dimensions")
    }
}

/// Builds the raster image for one frame.
pub fn frame_image(samples: &Samples, frame: usize, grayscale: bool) -> Result<DynamicImage> {
    let image = match samples {
        Samples::U8(a) => {
            let view = a.index_axis(Axis(0), frame);
            // The sample axis decides between luminance and RGB buffers.
            match view.len_of(Axis(2)) {
                1 => DynamicImage::ImageLuma8(buffer::<Luma<u8>>(view)?),
                3 => DynamicImage::ImageRgb8(buffer::<Rgb<u8>>(view)?),
                n => bail!("Unsupported samples per pixel: {}", n),
            }
        }
        Samples::U16(a) => u16_image(a.index_axis(Axis(0), frame))?,
        Samples::I32(a) => {
            // Shift signed data so the smallest sample maps to zero.
            let min = a.iter().copied().min().unwrap_or(0);
            let shifted = a
                .index_axis(Axis(0), frame)
                .mapv(|v| (i64::from(v) - i64::from(min)).clamp(0, i64::from(u16::MAX)) as u16);
            u16_image(shifted.view())?
        }
    };

    // Grayscale output is always 8-bit; 16-bit data is scaled down, not clipped.
    Ok(if grayscale {
        DynamicImage::ImageLuma8(image.to_luma8())
    } else {
        image
    })
}

fn u16_image(view: ArrayView3<'_, u16>) -> Result<DynamicImage> {
    Ok(match view.len_of(Axis(2)) {
        1 => DynamicImage::ImageLuma16(buffer::<Luma<u16>>(view)?),
        3 => DynamicImage::ImageRgb16(buffer::<Rgb<u16>>(view)?),
        n => bail!("Unsupported samples per pixel: {}", n),
    })
}

fn buffer<P>(view: ArrayView3<'_, P::Subpixel>) -> Result<ImageBuffer<P, Vec<P::Subpixel>>>
where
    P: image::Pixel,
{
    let (rows, columns, _) = view.dim();
    // Iteration follows logical order, so permuted (planar) views come out interleaved.
    let raw: Vec<P::Subpixel> = view.iter().copied().collect();
    ImageBuffer::from_raw(columns as u32, rows as u32, raw)
        .ok_or_else(|| anyhow!("Pixel buffer too small for {}x{} image", columns, rows))
}

/// Output file names for an image with `frames` frames: `stem.ext`, or `stem_frameNNN.ext`
/// per frame for multi-frame objects.
pub fn output_names(source_name: &str, extension: &str, frames: usize) -> Vec<String> {
    let stem = Path::new(source_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| source_name.to_string());

    if frames <= 1 {
        vec![format!("{}.{}", stem, extension)]
    } else {
        (0..frames)
            .map(|i| format!("{}_frame{:03}.{}", stem, i, extension))
            .collect()
    }
}

/// Converts one DICOM file, writing its image(s) into `output_dir`.
pub fn convert(
    input: &Path,
    output_dir: &Path,
    options: &ImageExportOptions,
) -> Result<Vec<PathBuf>> {
    let format = options.image_format()?;
    let obj = open_file(input).context("Failed to open DICOM file")?;
    let decoded = obj
        .decode_pixel_data()
        .context("Failed to decode pixel data")?;
    let samples = decode_samples(&decoded)?;

    let source_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let names = output_names(&source_name, &options.format, samples.number_of_frames());

    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {:?}", output_dir))?;

    let mut written = Vec::with_capacity(names.len());
    for (frame, name) in names.into_iter().enumerate() {
        let path = output_dir.join(name);
        frame_image(&samples, frame, options.grayscale)?
            .save_with_format(&path, format)
            .with_context(|| format!("Failed to save image to {:?}", path))?;
        written.push(path);
    }
    Ok(written)
}

/// Pixel-export step of a batch run.
#[derive(Debug, Clone)]
pub struct ImageExporter {
    options: ImageExportOptions,
}

impl ImageExporter {
    pub fn new(options: ImageExportOptions) -> Result<Self> {
        options.image_format()?;
        Ok(Self { options })
    }
}

impl FileProcessor for ImageExporter {
    fn name(&self) -> &str {
        "Image export"
    }

    fn output_role(&self) -> FolderRole {
        FolderRole::ImageOutput
    }

    fn process(&self, file: &WalkedFile, output_root: &Path) -> Result<Vec<PathBuf>> {
        convert(&file.path, &output_root.join(file.relative_dir()), &self.options)
    }
}
