//! Single-band GeoTIFF reading and writing on top of the pure-Rust `tiff` crate.
//!
//! Only the first band of an input is used. GeoTIFF tags are read into a
//! [`GeoReference`] and written back unchanged on outputs.
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::debug;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::{colortype, DirectoryEncoder, TiffEncoder, TiffKind};
use tiff::tags::Tag;

use crate::error::{Error, Result};
use crate::georef::GeoReference;
use crate::grid::ClassGrid;

/// TIFF PhotometricInterpretation value for palette-colour images.
const PHOTOMETRIC_PALETTE: u16 = 3;
/// Entries in an 8-bit palette.
const PALETTE_LEN: usize = 256;

// ── Colour tables ─────────────────────────────────────────────────────────────

/// An 8-bit palette, entry `i` colouring pixel value `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorTable {
    pub entries: Vec<[u8; 4]>,
}

impl ColorTable {
    /// Parse GDAL VRT colour-table entries, one `<Entry c1=".." c2=".." c3=".." c4=".."/>`
    /// per palette index in order. `c4` (alpha) is optional and defaults to 255.
    pub fn parse(text: &str) -> Result<Self> {
        let mut entries = Vec::new();
        for chunk in text.split("<Entry").skip(1) {
            let body = chunk.split("/>").next().unwrap_or(chunk);
            let channel = |name: &str| -> Result<Option<u8>> {
                match attr(body, name) {
                    None => Ok(None),
                    Some(raw) => raw.trim().parse::<u8>().map(Some).map_err(|_| {
                        Error::BadColorTable(format!("entry {}: {name}=\"{raw}\"", entries.len()))
                    }),
                }
            };
            let (Some(r), Some(g), Some(b)) = (channel("c1")?, channel("c2")?, channel("c3")?) else {
                return Err(Error::BadColorTable(format!(
                    "entry {} is missing c1/c2/c3",
                    entries.len()
                )));
            };
            let a = channel("c4")?.unwrap_or(255);
            entries.push([r, g, b, a]);
        }
        if entries.is_empty() {
            return Err(Error::BadColorTable("no <Entry> elements".into()));
        }
        if entries.len() > PALETTE_LEN {
            return Err(Error::BadColorTable(format!(
                "{} entries exceed the 8-bit palette",
                entries.len()
            )));
        }
        Ok(Self { entries })
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::parse(&fs::read_to_string(path)?)
    }

    /// TIFF ColorMap layout: 256 reds, then 256 greens, then 256 blues, each
    /// scaled to 16 bits. Indices past the table are black.
    pub fn to_tiff_colormap(&self) -> Vec<u16> {
        let mut map = vec![0u16; 3 * PALETTE_LEN];
        for (i, rgba) in self.entries.iter().enumerate() {
            for (band, &v) in rgba[..3].iter().enumerate() {
                map[band * PALETTE_LEN + i] = u16::from(v) * 257;
            }
        }
        map
    }
}

/// Value of `name="..."` inside an XML element body.
fn attr<'a>(body: &'a str, name: &str) -> Option<&'a str> {
    let key = format!("{name}=\"");
    let start = body.find(&key)? + key.len();
    let len = body[start..].find('"')?;
    Some(&body[start..start + len])
}

// ── Reading ───────────────────────────────────────────────────────────────────

fn find_f64s<R: Read + Seek>(decoder: &mut Decoder<R>, tag: Tag) -> Result<Option<Vec<f64>>> {
    match decoder.find_tag(tag)? {
        Some(v) => Ok(Some(v.into_f64_vec()?)),
        None => Ok(None),
    }
}

fn find_ascii<R: Read + Seek>(decoder: &mut Decoder<R>, tag: Tag) -> Result<Option<String>> {
    match decoder.find_tag(tag)? {
        Some(v) => Ok(Some(v.into_string()?)),
        None => Ok(None),
    }
}

/// Read the GeoTIFF tags of the current image.
pub fn read_georef<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoReference> {
    let geo_keys = match decoder.find_tag(Tag::GeoKeyDirectoryTag)? {
        Some(v) => Some(v.into_u16_vec()?),
        None => None,
    };
    Ok(GeoReference {
        pixel_scale: find_f64s(decoder, Tag::ModelPixelScaleTag)?,
        tiepoint: find_f64s(decoder, Tag::ModelTiepointTag)?,
        transformation: find_f64s(decoder, Tag::ModelTransformationTag)?,
        geo_keys,
        geo_doubles: find_f64s(decoder, Tag::GeoDoubleParamsTag)?,
        geo_ascii: find_ascii(decoder, Tag::GeoAsciiParamsTag)?,
        nodata: find_ascii(decoder, Tag::GdalNodata)?,
    })
}

/// Keep every `samples`-th value starting at 0 (band 1 of a chunky image).
fn first_band<T: Copy>(v: Vec<T>, samples: usize) -> Vec<T> {
    if samples <= 1 {
        v
    } else {
        v.into_iter().step_by(samples).collect()
    }
}

fn find_u16<R: Read + Seek>(decoder: &mut Decoder<R>, tag: Tag) -> Result<Option<u16>> {
    match decoder.find_tag(tag)? {
        Some(v) => Ok(Some(v.into_u16()?)),
        None => Ok(None),
    }
}

/// Byte ranges of the strips of an uncompressed 8-bit palette image.
///
/// The `tiff` decoder refuses palette images, but their samples are plain
/// palette indices, so the strips are read directly.
fn palette_strips<R: Read + Seek>(decoder: &mut Decoder<R>, path: &Path) -> Result<Vec<(u64, u64)>> {
    let unsupported = |kind: &str| Error::UnsupportedSampleType {
        path: path.to_path_buf(),
        kind: format!("palette image with {kind}"),
    };
    let bits = match decoder.find_tag(Tag::BitsPerSample)? {
        Some(v) => v.into_u16_vec()?,
        None => vec![1],
    };
    if bits != [8] {
        return Err(unsupported(&format!("{bits:?} bits per sample")));
    }
    let compression = find_u16(decoder, Tag::Compression)?.unwrap_or(1);
    if compression != 1 {
        return Err(unsupported(&format!("compression {compression}")));
    }
    let (Some(offsets), Some(counts)) = (decoder.find_tag(Tag::StripOffsets)?, decoder.find_tag(Tag::StripByteCounts)?)
    else {
        return Err(unsupported("tiled layout"));
    };
    let offsets = offsets.into_u64_vec()?;
    let counts = counts.into_u64_vec()?;
    if offsets.len() != counts.len() {
        return Err(unsupported("mismatched strip tables"));
    }
    Ok(offsets.into_iter().zip(counts).collect())
}

fn read_strips(path: &Path, strips: &[(u64, u64)], width: usize, height: usize) -> Result<Vec<i32>> {
    let pixels = width * height;
    let mut reader = BufReader::new(File::open(path)?);
    let mut bytes = Vec::with_capacity(pixels);
    for &(offset, len) in strips {
        let start = bytes.len();
        bytes.resize(start + len as usize, 0);
        reader.seek(SeekFrom::Start(offset))?;
        reader.read_exact(&mut bytes[start..])?;
    }
    if bytes.len() < pixels {
        return Err(Error::Length { width, height, got: bytes.len() });
    }
    bytes.truncate(pixels);
    Ok(bytes.into_iter().map(i32::from).collect())
}

fn decode_band<R: Read + Seek>(decoder: &mut Decoder<R>, path: &Path, pixels: usize) -> Result<Vec<i32>> {
    let unsupported = |kind: &str| Error::UnsupportedSampleType {
        path: path.to_path_buf(),
        kind: kind.to_string(),
    };
    let data = match decoder.read_image()? {
        DecodingResult::U8(v) => {
            let s = v.len() / pixels.max(1);
            first_band(v, s).into_iter().map(i32::from).collect()
        }
        DecodingResult::U16(v) => {
            let s = v.len() / pixels.max(1);
            first_band(v, s).into_iter().map(i32::from).collect()
        }
        DecodingResult::I8(v) => {
            let s = v.len() / pixels.max(1);
            first_band(v, s).into_iter().map(i32::from).collect()
        }
        DecodingResult::I16(v) => {
            let s = v.len() / pixels.max(1);
            first_band(v, s).into_iter().map(i32::from).collect()
        }
        DecodingResult::I32(v) => {
            let s = v.len() / pixels.max(1);
            first_band(v, s)
        }
        DecodingResult::U32(v) => {
            let s = v.len() / pixels.max(1);
            let band = first_band(v, s);
            let mut out = Vec::with_capacity(band.len());
            for x in band {
                out.push(i32::try_from(x).map_err(|_| unsupported("u32 value out of i32 range"))?);
            }
            out
        }
        DecodingResult::F32(_) | DecodingResult::F64(_) => return Err(unsupported("floating point")),
        _ => return Err(unsupported("64-bit integer")),
    };
    Ok(data)
}

/// Decode band 1 of an integer GeoTIFF into a [`ClassGrid`]. Palette images
/// yield their raw indices.
pub fn read_class_grid(path: &Path) -> Result<ClassGrid> {
    let file = File::open(path)?;
    let mut decoder = Decoder::new(BufReader::new(file))?.with_limits(Limits::unlimited());
    let (width, height) = decoder.dimensions()?;
    let (width, height) = (width as usize, height as usize);
    let georef = read_georef(&mut decoder)?;

    let data = if find_u16(&mut decoder, Tag::PhotometricInterpretation)? == Some(PHOTOMETRIC_PALETTE) {
        let strips = palette_strips(&mut decoder, path)?;
        drop(decoder);
        read_strips(path, &strips, width, height)?
    } else {
        decode_band(&mut decoder, path, width * height)?
    };

    debug!("read {} ({}x{})", path.display(), width, height);
    Ok(ClassGrid::from_vec(width, height, data)?.with_georef(georef))
}

// ── Writing ───────────────────────────────────────────────────────────────────

/// Output options shared by the writers.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Embed a palette (8-bit outputs only).
    pub color_table: Option<ColorTable>,
    /// GDAL_NODATA value; overrides the one carried by the reference.
    pub nodata: Option<f64>,
}

fn write_georef<W: Write + Seek, K: TiffKind>(
    dir: &mut DirectoryEncoder<'_, W, K>,
    georef: &GeoReference,
) -> Result<()> {
    if let Some(v) = &georef.pixel_scale {
        dir.write_tag(Tag::ModelPixelScaleTag, v.as_slice())?;
    }
    if let Some(v) = &georef.tiepoint {
        dir.write_tag(Tag::ModelTiepointTag, v.as_slice())?;
    }
    if let Some(v) = &georef.transformation {
        dir.write_tag(Tag::ModelTransformationTag, v.as_slice())?;
    }
    if let Some(v) = &georef.geo_keys {
        dir.write_tag(Tag::GeoKeyDirectoryTag, v.as_slice())?;
    }
    if let Some(v) = &georef.geo_doubles {
        dir.write_tag(Tag::GeoDoubleParamsTag, v.as_slice())?;
    }
    if let Some(v) = &georef.geo_ascii {
        dir.write_tag(Tag::GeoAsciiParamsTag, v.as_str())?;
    }
    if let Some(v) = &georef.nodata {
        dir.write_tag(Tag::GdalNodata, v.as_str())?;
    }
    Ok(())
}

fn check_len(width: usize, height: usize, got: usize) -> Result<()> {
    if got != width * height {
        return Err(Error::Length { width, height, got });
    }
    Ok(())
}

/// Sibling path the data is written to before being renamed into place.
fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    path.with_file_name(name)
}

/// Run `encode` against a temporary sibling file and move it to `path` on
/// success, so an interrupted run never leaves a truncated output behind.
fn create_with<F>(path: &Path, encode: F) -> Result<()>
where
    F: FnOnce(&mut TiffEncoder<BufWriter<File>>) -> Result<()>,
{
    let tmp = partial_path(path);
    let result = (|| -> Result<()> {
        let file = File::create(&tmp)?;
        let mut encoder = TiffEncoder::new(BufWriter::new(file))?;
        encode(&mut encoder)?;
        drop(encoder);
        fs::rename(&tmp, path)?;
        Ok(())
    })();
    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(Error::Create { path: path.to_path_buf(), source: Box::new(e) });
    }
    debug!("wrote {}", path.display());
    Ok(())
}

/// Write an 8-bit single-band GeoTIFF.
pub fn write_u8(
    path: &Path,
    width: usize,
    height: usize,
    data: &[u8],
    georef: &GeoReference,
    opts: &WriteOptions,
) -> Result<()> {
    check_len(width, height, data.len())?;
    let georef = match opts.nodata {
        Some(_) => georef.clone().with_nodata(opts.nodata),
        None => georef.clone(),
    };
    create_with(path, |encoder| {
        let mut image = encoder.new_image::<colortype::Gray8>(width as u32, height as u32)?;
        write_georef(image.encoder(), &georef)?;
        if let Some(table) = &opts.color_table {
            image.encoder().write_tag(Tag::PhotometricInterpretation, PHOTOMETRIC_PALETTE)?;
            image.encoder().write_tag(Tag::ColorMap, table.to_tiff_colormap().as_slice())?;
        }
        image.write_data(data)?;
        Ok(())
    })
}

/// Write a Float32 single-band GeoTIFF.
pub fn write_f32(
    path: &Path,
    width: usize,
    height: usize,
    data: &[f32],
    georef: &GeoReference,
    opts: &WriteOptions,
) -> Result<()> {
    check_len(width, height, data.len())?;
    let georef = match opts.nodata {
        Some(_) => georef.clone().with_nodata(opts.nodata),
        None => georef.clone(),
    };
    create_with(path, |encoder| {
        let mut image = encoder.new_image::<colortype::Gray32Float>(width as u32, height as u32)?;
        write_georef(image.encoder(), &georef)?;
        image.write_data(data)?;
        Ok(())
    })
}
