//! lopdf-backed container reader.
//!
//! Walks each page's resource dictionary (following inherited `Resources`
//! and nested form XObjects) and hands back every image XObject as bytes
//! an OCR engine can read:
//! - `DCTDecode` streams are passed through as JPEG after a test decode
//! - `CCITTFaxDecode` streams are wrapped in a TIFF header
//! - Flate/LZW/unfiltered samples (1 to 16 bits; Gray, RGB, CMYK, ICCBased
//!   or Indexed) are re-encoded as PNG
//! - anything else is reported as an unsupported encoding for that image

use super::{Container, ContainerReader};
use crate::error::{ImageExtractionError, PipelineError};
use crate::types::{EmbeddedImage, ExtractedPage, ImageKind};
use image::{DynamicImage, ImageBuffer, ImageFormat, Luma, Rgb};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;

/// Page tree depth limit when looking for inherited resources
const MAX_PAGE_TREE_DEPTH: usize = 32;

pub struct LopdfReader {
    /// How deep to follow form XObjects looking for nested images
    max_form_depth: usize,
}

impl Default for LopdfReader {
    fn default() -> Self {
        Self { max_form_depth: 4 }
    }
}

impl LopdfReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_form_depth(mut self, depth: usize) -> Self {
        self.max_form_depth = depth;
        self
    }
}

impl ContainerReader for LopdfReader {
    fn name(&self) -> &str {
        "lopdf"
    }

    fn open(&self, path: &Path) -> Result<Box<dyn Container>, PipelineError> {
        let document = Document::load(path).map_err(|e| PipelineError::UnopenablePdf {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        // BTreeMap keyed by 1-based page number, already in document order
        let pages: Vec<(u32, ObjectId)> = document.get_pages().into_iter().collect();

        Ok(Box::new(LopdfContainer {
            document,
            pages,
            max_form_depth: self.max_form_depth,
        }))
    }
}

struct LopdfContainer {
    document: Document,
    pages: Vec<(u32, ObjectId)>,
    max_form_depth: usize,
}

type ImageSlot = Result<EmbeddedImage, ImageExtractionError>;

impl LopdfContainer {
    fn page_resources(&self, page_id: ObjectId) -> Option<&Dictionary> {
        let mut current = self.document.get_dictionary(page_id).ok()?;
        for _ in 0..MAX_PAGE_TREE_DEPTH {
            if let Ok(resources) = current.get(b"Resources") {
                return resolve_dict(&self.document, resources);
            }
            let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
            current = self.document.get_dictionary(parent).ok()?;
        }
        None
    }

    fn collect_images(&self, resources: &Dictionary, depth: usize, out: &mut Vec<ImageSlot>) {
        let xobjects = match resources.get(b"XObject") {
            Ok(object) => match resolve_dict(&self.document, object) {
                Some(dict) => dict,
                None => {
                    out.push(Err(ImageExtractionError::CorruptData(
                        "XObject resource is not a dictionary".to_string(),
                    )));
                    return;
                }
            },
            Err(_) => return,
        };

        // Dictionary keeps the file's key order, which keeps image order stable
        for (name, value) in xobjects.iter() {
            let name = String::from_utf8_lossy(name);
            let stream = match self.resolve_stream(value) {
                Some(stream) => stream,
                None => {
                    out.push(Err(ImageExtractionError::CorruptData(format!(
                        "XObject /{name} does not resolve to a stream"
                    ))));
                    continue;
                }
            };

            match stream.dict.get(b"Subtype").and_then(|s| s.as_name()) {
                Ok(b"Image") => out.push(decode_image_stream(&self.document, stream)),
                Ok(b"Form") if depth < self.max_form_depth => {
                    if let Some(nested) = stream
                        .dict
                        .get(b"Resources")
                        .ok()
                        .and_then(|r| resolve_dict(&self.document, r))
                    {
                        self.collect_images(nested, depth + 1, out);
                    }
                }
                _ => {}
            }
        }
    }

    fn resolve_stream<'a>(&'a self, object: &'a Object) -> Option<&'a Stream> {
        match object {
            Object::Stream(stream) => Some(stream),
            Object::Reference(id) => self.document.get_object(*id).ok()?.as_stream().ok(),
            _ => None,
        }
    }
}

impl Container for LopdfContainer {
    fn metadata(&self) -> BTreeMap<String, String> {
        let mut metadata = BTreeMap::new();
        let info = match self
            .document
            .trailer
            .get(b"Info")
            .ok()
            .and_then(|info| resolve_dict(&self.document, info))
        {
            Some(info) => info,
            None => return metadata,
        };

        for (key, value) in info.iter() {
            if let Some(text) = object_to_string(&self.document, value, 0) {
                metadata.insert(String::from_utf8_lossy(key).to_string(), text);
            }
        }
        metadata
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page(&self, index: usize) -> ExtractedPage {
        let (number, page_id) = match self.pages.get(index) {
            Some(page) => *page,
            None => return ExtractedPage::empty(index),
        };

        let text_layer = self
            .document
            .extract_text(&[number])
            .ok()
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());

        let mut images = Vec::new();
        if let Some(resources) = self.page_resources(page_id) {
            self.collect_images(resources, 0, &mut images);
        }

        ExtractedPage {
            index,
            images,
            text_layer,
        }
    }
}

// ===== IMAGE STREAM DECODING =====

/// Filters that only undo compression. An image codec filter, if any, is last.
const TRANSPORT_FILTERS: [&str; 2] = ["FlateDecode", "LZWDecode"];

fn decode_image_stream(document: &Document, stream: &Stream) -> ImageSlot {
    let filters = stream_filters(&stream.dict);
    let (codec, transport) = match filters.split_last() {
        Some((last, rest)) if !TRANSPORT_FILTERS.contains(&last.as_str()) => (Some(last.as_str()), rest),
        _ => (None, filters.as_slice()),
    };
    if let Some(unknown) = transport.iter().find(|f| !TRANSPORT_FILTERS.contains(&f.as_str())) {
        return Err(ImageExtractionError::UnsupportedEncoding(unknown.clone()));
    }
    let data = undo_transport_filters(document, stream, transport, filters.len())?;

    match codec {
        Some("DCTDecode") => {
            // Test decode so corrupt JPEG data fails here, at image granularity
            image::load_from_memory_with_format(&data, ImageFormat::Jpeg)?;
            Ok(EmbeddedImage::new(data, ImageKind::Jpeg))
        }
        Some("CCITTFaxDecode") => {
            let params = filter_params(document, &stream.dict, filters.len() - 1, filters.len());
            ccitt_to_tiff(&stream.dict, params, &data)
        }
        Some(other) => Err(ImageExtractionError::UnsupportedEncoding(other.to_string())),
        None => raw_samples_to_png(document, &stream.dict, &data),
    }
}

fn stream_filters(dict: &Dictionary) -> Vec<String> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![String::from_utf8_lossy(name).to_string()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_name().ok())
            .map(|name| String::from_utf8_lossy(name).to_string())
            .collect(),
        _ => Vec::new(),
    }
}

/// `/DecodeParms` entry for the filter at `index` of a `count`-long chain
fn filter_params<'a>(
    document: &'a Document,
    dict: &'a Dictionary,
    index: usize,
    count: usize,
) -> Option<&'a Dictionary> {
    match dict.get(b"DecodeParms").ok()? {
        Object::Array(items) => resolve_dict(document, items.get(index)?),
        single if count == 1 => resolve_dict(document, single),
        _ => None,
    }
}

/// Run the leading Flate/LZW filters of `stream`.
///
/// lopdf refuses to decompress anything tagged `/Subtype /Image`, so the
/// filters run on a detached copy of the content.
fn undo_transport_filters(
    document: &Document,
    stream: &Stream,
    filters: &[String],
    chain_len: usize,
) -> Result<Vec<u8>, ImageExtractionError> {
    if filters.is_empty() {
        return Ok(stream.content.clone());
    }

    let mut dict = Dictionary::new();
    dict.set(
        "Filter",
        Object::Array(filters.iter().map(|f| Object::Name(f.as_bytes().to_vec())).collect()),
    );
    // lopdf applies one parameter dictionary to the whole chain
    if filters.len() == 1 {
        if let Some(params) = filter_params(document, &stream.dict, 0, chain_len) {
            dict.set("DecodeParms", Object::Dictionary(params.clone()));
        }
    }

    Stream::new(dict, stream.content.clone())
        .decompressed_content()
        .map_err(|e| ImageExtractionError::CorruptData(format!("{} failed: {e}", filters.join("+"))))
}

// ===== CCITT FAX =====

const TIFF_SHORT: u16 = 3;
const TIFF_LONG: u16 = 4;

/// Wrap CCITT fax data in a single-strip little-endian TIFF.
///
/// `/K` < 0 is Group 4 (TIFF compression 4); otherwise Group 3 (compression
/// 3) with two-dimensional coding flagged in T4Options when `/K` > 0.
fn ccitt_to_tiff(dict: &Dictionary, params: Option<&Dictionary>, data: &[u8]) -> ImageSlot {
    let width = dict_dimension(dict, b"Width")?;
    let height = dict_dimension(dict, b"Height")?;
    let strip_len = u32::try_from(data.len())
        .map_err(|_| ImageExtractionError::CorruptData("CCITT stream exceeds 4 GiB".to_string()))?;

    let flag = |key: &[u8]| {
        params
            .and_then(|p| p.get(key).ok())
            .map_or(false, |v| matches!(v, Object::Boolean(true)))
    };
    let k = params
        .and_then(|p| p.get(b"K").ok())
        .and_then(|k| k.as_i64().ok())
        .unwrap_or(0);
    let byte_aligned = flag(b"EncodedByteAlign");
    // Fax decoders emit black as 1; flip the interpretation when the PDF
    // renders the samples the other way round
    let inverted = flag(b"BlackIs1") != decode_inverted(dict);

    let t4_options = (k >= 0).then(|| u32::from(k > 0) | if byte_aligned { 4 } else { 0 });
    let entry_count = 9 + usize::from(t4_options.is_some());
    let strip_offset = (8 + 2 + entry_count * 12 + 4) as u32;

    let mut entries: Vec<(u16, u16, u32)> = vec![
        (256, TIFF_LONG, width),                        // ImageWidth
        (257, TIFF_LONG, height),                       // ImageLength
        (258, TIFF_SHORT, 1),                           // BitsPerSample
        (259, TIFF_SHORT, if k < 0 { 4 } else { 3 }),   // Compression
        (262, TIFF_SHORT, u32::from(inverted)),         // PhotometricInterpretation
        (273, TIFF_LONG, strip_offset),                 // StripOffsets
        (277, TIFF_SHORT, 1),                           // SamplesPerPixel
        (278, TIFF_LONG, height),                       // RowsPerStrip
        (279, TIFF_LONG, strip_len),                    // StripByteCounts
    ];
    if let Some(options) = t4_options {
        entries.push((292, TIFF_LONG, options)); // T4Options
    }

    let mut tiff = Vec::with_capacity(strip_offset as usize + data.len());
    tiff.extend_from_slice(b"II");
    tiff.extend_from_slice(&42u16.to_le_bytes());
    tiff.extend_from_slice(&8u32.to_le_bytes());
    tiff.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for (tag, field_type, value) in entries {
        tiff.extend_from_slice(&tag.to_le_bytes());
        tiff.extend_from_slice(&field_type.to_le_bytes());
        tiff.extend_from_slice(&1u32.to_le_bytes());
        // SHORT values sit in the first two bytes of the value field
        tiff.extend_from_slice(&value.to_le_bytes());
    }
    tiff.extend_from_slice(&0u32.to_le_bytes());
    tiff.extend_from_slice(data);

    Ok(EmbeddedImage::new(tiff, ImageKind::Tiff))
}

// ===== RAW SAMPLES =====

/// Color model of an unencoded sample stream
enum ColorModel {
    Gray,
    Rgb,
    Cmyk,
    /// Palette entries already converted to RGB
    Indexed(Vec<[u8; 3]>),
}

impl ColorModel {
    fn components(&self) -> usize {
        match self {
            ColorModel::Gray | ColorModel::Indexed(_) => 1,
            ColorModel::Rgb => 3,
            ColorModel::Cmyk => 4,
        }
    }

    fn pixel_rgb(&self, px: &[u8]) -> [u8; 3] {
        match self {
            ColorModel::Gray => [px[0]; 3],
            ColorModel::Rgb => [px[0], px[1], px[2]],
            ColorModel::Cmyk => cmyk_pixel(px),
            ColorModel::Indexed(palette) => palette
                .get(px[0] as usize)
                .or(palette.last())
                .copied()
                .unwrap_or([0; 3]),
        }
    }
}

fn parse_color_space(document: &Document, object: &Object, in_indexed: bool) -> Result<ColorModel, ImageExtractionError> {
    let object = match object {
        Object::Reference(id) => document
            .get_object(*id)
            .map_err(|e| ImageExtractionError::CorruptData(format!("ColorSpace: {e}")))?,
        other => other,
    };
    let (family, params): (&[u8], &[Object]) = match object {
        Object::Name(name) => (name.as_slice(), [].as_slice()),
        Object::Array(items) => match items.split_first() {
            Some((Object::Name(name), rest)) => (name.as_slice(), rest),
            _ => return Err(ImageExtractionError::CorruptData("malformed ColorSpace array".to_string())),
        },
        _ => return Err(ImageExtractionError::CorruptData("ColorSpace is not a name or array".to_string())),
    };

    match family {
        b"DeviceGray" | b"CalGray" | b"G" => Ok(ColorModel::Gray),
        b"DeviceRGB" | b"CalRGB" | b"RGB" => Ok(ColorModel::Rgb),
        b"DeviceCMYK" | b"CMYK" => Ok(ColorModel::Cmyk),
        b"ICCBased" => {
            let channels = params
                .first()
                .and_then(|profile| match profile {
                    Object::Reference(id) => document.get_object(*id).ok()?.as_stream().ok(),
                    Object::Stream(stream) => Some(stream),
                    _ => None,
                })
                .and_then(|profile| profile.dict.get(b"N").ok()?.as_i64().ok());
            match channels {
                Some(1) => Ok(ColorModel::Gray),
                Some(3) => Ok(ColorModel::Rgb),
                Some(4) => Ok(ColorModel::Cmyk),
                n => Err(ImageExtractionError::UnsupportedEncoding(format!("ICCBased with N={n:?}"))),
            }
        }
        b"Indexed" | b"I" if !in_indexed => {
            let [base, hival, lookup, ..] = params else {
                return Err(ImageExtractionError::CorruptData(
                    "Indexed color space needs base, hival and lookup".to_string(),
                ));
            };
            let base = parse_color_space(document, base, true)?;
            let entries = hival.as_i64().unwrap_or(255).clamp(0, 255) as usize + 1;
            let table = palette_bytes(document, lookup)?;
            let palette: Vec<[u8; 3]> = table
                .chunks_exact(base.components())
                .take(entries)
                .map(|entry| base.pixel_rgb(entry))
                .collect();
            if palette.is_empty() {
                return Err(ImageExtractionError::CorruptData("empty Indexed palette".to_string()));
            }
            Ok(ColorModel::Indexed(palette))
        }
        other => Err(ImageExtractionError::UnsupportedEncoding(format!(
            "{} color space",
            String::from_utf8_lossy(other)
        ))),
    }
}

fn palette_bytes(document: &Document, lookup: &Object) -> Result<Vec<u8>, ImageExtractionError> {
    let lookup = match lookup {
        Object::Reference(id) => document
            .get_object(*id)
            .map_err(|e| ImageExtractionError::CorruptData(format!("palette: {e}")))?,
        other => other,
    };
    match lookup {
        Object::String(bytes, _) => Ok(bytes.clone()),
        Object::Stream(stream) => {
            let filters = stream_filters(&stream.dict);
            undo_transport_filters(document, stream, &filters, filters.len())
        }
        _ => Err(ImageExtractionError::CorruptData("palette is not a string or stream".to_string())),
    }
}

/// Missing `/ColorSpace` (image masks, sloppy writers): 1-bit and friends
/// are gray, 8-bit is guessed from the sample count.
fn infer_color_model(samples: usize, pixels: usize, bits: usize) -> Result<ColorModel, ImageExtractionError> {
    if bits != 8 || pixels == 0 {
        return Ok(ColorModel::Gray);
    }
    match samples / pixels {
        1 => Ok(ColorModel::Gray),
        3 => Ok(ColorModel::Rgb),
        4 => Ok(ColorModel::Cmyk),
        n => Err(ImageExtractionError::UnsupportedEncoding(format!(
            "{n} components per pixel"
        ))),
    }
}

fn raw_samples_to_png(document: &Document, dict: &Dictionary, samples: &[u8]) -> ImageSlot {
    let width = dict_dimension(dict, b"Width")?;
    let height = dict_dimension(dict, b"Height")?;
    let is_mask = matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true)));
    let bits = if is_mask {
        1
    } else {
        dict.get(b"BitsPerComponent").and_then(|b| b.as_i64()).unwrap_or(8)
    };
    if !matches!(bits, 1 | 2 | 4 | 8 | 16) {
        return Err(ImageExtractionError::UnsupportedEncoding(format!(
            "{bits}-bit samples"
        )));
    }
    let bits = bits as usize;
    let (w, h) = (width as usize, height as usize);

    let model = match dict.get(b"ColorSpace") {
        Ok(space) if !is_mask => parse_color_space(document, space, false)?,
        _ => infer_color_model(samples.len(), w * h, bits)?,
    };
    let components = model.components();

    let mut values = unpack_samples(samples, w, h, components, bits)?;
    if !matches!(model, ColorModel::Indexed(_)) {
        scale_to_byte(&mut values, bits);
    }

    let decoded = match &model {
        ColorModel::Gray => {
            if decode_inverted(dict) {
                values.iter_mut().for_each(|v| *v = 255 - *v);
            }
            ImageBuffer::<Luma<u8>, _>::from_raw(width, height, values).map(DynamicImage::ImageLuma8)
        }
        ColorModel::Rgb => ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, values).map(DynamicImage::ImageRgb8),
        other => {
            let rgb: Vec<u8> = values
                .chunks_exact(components)
                .flat_map(|px| other.pixel_rgb(px))
                .collect();
            ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, rgb).map(DynamicImage::ImageRgb8)
        }
    }
    .ok_or_else(|| ImageExtractionError::CorruptData("sample buffer too small".to_string()))?;

    let mut png = Cursor::new(Vec::new());
    decoded.write_to(&mut png, ImageFormat::Png)?;
    Ok(EmbeddedImage::new(png.into_inner(), ImageKind::Png))
}

/// One byte per sample. Rows of sub-byte samples start on a byte boundary;
/// 16-bit samples keep their high byte.
fn unpack_samples(
    samples: &[u8],
    width: usize,
    height: usize,
    components: usize,
    bits: usize,
) -> Result<Vec<u8>, ImageExtractionError> {
    let per_row = width * components;
    let row_bytes = (per_row * bits + 7) / 8;
    if per_row == 0 || height == 0 || samples.len() < row_bytes * height {
        return Err(ImageExtractionError::CorruptData(format!(
            "{} bytes of samples for a {width}x{height} image",
            samples.len()
        )));
    }

    let mut values = Vec::with_capacity(per_row * height);
    for row in samples.chunks_exact(row_bytes).take(height) {
        match bits {
            8 => values.extend_from_slice(&row[..per_row]),
            16 => values.extend(row.chunks_exact(2).take(per_row).map(|pair| pair[0])),
            _ => {
                let mask = (1u8 << bits) - 1;
                values.extend((0..per_row).map(|i| {
                    let offset = i * bits;
                    (row[offset / 8] >> (8 - bits - offset % 8)) & mask
                }));
            }
        }
    }
    Ok(values)
}

fn scale_to_byte(values: &mut [u8], bits: usize) {
    if bits < 8 {
        let max = (1u16 << bits) - 1;
        for value in values.iter_mut() {
            *value = (u16::from(*value) * 255 / max) as u8;
        }
    }
}

/// `/Decode [1 0]`: sample 0 is white
fn decode_inverted(dict: &Dictionary) -> bool {
    let Ok(Object::Array(range)) = dict.get(b"Decode") else {
        return false;
    };
    match (range.first().map(Object::as_float), range.get(1).map(Object::as_float)) {
        (Some(Ok(low)), Some(Ok(high))) => low > high,
        _ => false,
    }
}

fn dict_dimension(dict: &Dictionary, key: &[u8]) -> Result<u32, ImageExtractionError> {
    dict.get(key)
        .and_then(|v| v.as_i64())
        .ok()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| {
            ImageExtractionError::CorruptData(format!(
                "missing or invalid /{}",
                String::from_utf8_lossy(key)
            ))
        })
}

fn cmyk_pixel(px: &[u8]) -> [u8; 3] {
    let k = 255 - px[3] as u16;
    [
        ((255 - px[0] as u16) * k / 255) as u8,
        ((255 - px[1] as u16) * k / 255) as u8,
        ((255 - px[2] as u16) * k / 255) as u8,
    ]
}

// ===== OBJECT HELPERS =====

fn resolve_dict<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match object {
        Object::Dictionary(dict) => Some(dict),
        Object::Reference(id) => document.get_dictionary(*id).ok(),
        _ => None,
    }
}

fn object_to_string(document: &Document, object: &Object, depth: usize) -> Option<String> {
    match object {
        Object::String(bytes, _) => Some(decode_text_string(bytes)),
        Object::Name(name) => Some(String::from_utf8_lossy(name).to_string()),
        Object::Integer(i) => Some(i.to_string()),
        Object::Real(r) => Some(r.to_string()),
        Object::Boolean(b) => Some(b.to_string()),
        Object::Reference(id) if depth < 4 => document
            .get_object(*id)
            .ok()
            .and_then(|o| object_to_string(document, o, depth + 1)),
        _ => None,
    }
}

/// PDF text strings are UTF-16BE with a BOM or PDFDocEncoding (treated as Latin-1)
fn decode_text_string(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn image_stream(filter: Option<&str>, width: i64, height: i64, content: Vec<u8>) -> Stream {
        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width,
            "Height" => height,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8_i64,
        };
        if let Some(filter) = filter {
            dict.set("Filter", Object::Name(filter.as_bytes().to_vec()));
        }
        Stream::new(dict, content)
    }

    /// Two pages: page 1 has a valid gray image, a corrupt JPEG and a CCITT
    /// image; page 2 inherits resources with no images.
    fn write_fixture(path: &Path) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let gray_id = doc.add_object(image_stream(None, 2, 2, vec![0, 255, 255, 0]));
        let bad_jpeg_id = doc.add_object(image_stream(Some("DCTDecode"), 2, 2, b"not a jpeg".to_vec()));
        let fax_id = doc.add_object(image_stream(Some("CCITTFaxDecode"), 2, 2, vec![0; 4]));

        let page_one = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    "Im0" => gray_id,
                    "Im1" => bad_jpeg_id,
                    "Im2" => fax_id,
                },
            },
        });
        let page_two = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_one.into(), page_two.into()],
                "Count" => 2_i64,
                "Resources" => dictionary! {},
                "MediaBox" => vec![0_i64.into(), 0_i64.into(), 612_i64.into(), 792_i64.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal("Bluffs Filing 3"),
            "Author" => Object::string_literal("County Surveyor"),
        });
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn test_reads_pages_images_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plat.pdf");
        write_fixture(&path);

        let container = LopdfReader::new().open(&path).unwrap();
        assert_eq!(container.page_count(), 2);

        let metadata = container.metadata();
        assert_eq!(metadata.get("Title").map(String::as_str), Some("Bluffs Filing 3"));
        assert_eq!(metadata.get("Author").map(String::as_str), Some("County Surveyor"));

        let first = container.page(0);
        assert_eq!(first.index, 0);
        assert_eq!(first.images.len(), 3);

        let gray = first.images[0].as_ref().unwrap();
        assert_eq!(gray.kind, ImageKind::Png);
        let decoded = image::load_from_memory(&gray.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (2, 2));

        assert!(matches!(first.images[1], Err(ImageExtractionError::Decode(_))));
        let fax = first.images[2].as_ref().unwrap();
        assert_eq!(fax.kind, ImageKind::Tiff);
        assert_eq!(tiff_tag(&fax.bytes, 259), Some(3));

        let second = container.page(1);
        assert!(second.images.is_empty());
    }

    #[test]
    fn test_image_order_is_stable_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plat.pdf");
        write_fixture(&path);

        let kinds = |page: ExtractedPage| -> Vec<bool> { page.images.iter().map(|i| i.is_ok()).collect() };
        let reader = LopdfReader::new();
        let first = kinds(reader.open(&path).unwrap().page(0));
        let second = kinds(reader.open(&path).unwrap().page(0));
        assert_eq!(first, second);
        assert_eq!(first, vec![true, false, true]);
    }

    #[test]
    fn test_corrupt_header_is_unopenable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"this is not a pdf").unwrap();

        match LopdfReader::new().open(&path) {
            Err(PipelineError::UnopenablePdf { path: p, .. }) => assert_eq!(p, path),
            Err(other) => panic!("expected UnopenablePdf, got {other:?}"),
            Ok(_) => panic!("expected UnopenablePdf, got a container"),
        }
    }

    #[test]
    fn test_out_of_range_page_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plat.pdf");
        write_fixture(&path);

        let page = LopdfReader::new().open(&path).unwrap().page(7);
        assert_eq!(page.index, 7);
        assert!(page.images.is_empty());
        assert!(page.text_layer.is_none());
    }

    #[test]
    fn test_utf16_text_string() {
        let bytes = [0xFE, 0xFF, 0x00, b'P', 0x00, b'l', 0x00, b'a', 0x00, b't'];
        assert_eq!(decode_text_string(&bytes), "Plat");
        assert_eq!(decode_text_string(b"Caf\xe9"), "Café");
    }

    #[test]
    fn test_cmyk_conversion() {
        assert_eq!(cmyk_pixel(&[0, 0, 0, 0]), [255, 255, 255]);
        assert_eq!(cmyk_pixel(&[0, 0, 0, 255]), [0, 0, 0]);
    }

    // ===== SAMPLE DECODING =====

    fn zlib(data: &[u8]) -> Vec<u8> {
        use flate2::write::ZlibEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn decode(stream: &Stream) -> ImageSlot {
        decode_image_stream(&Document::with_version("1.5"), stream)
    }

    fn gray_pixels(slot: ImageSlot) -> image::GrayImage {
        let png = slot.unwrap();
        assert_eq!(png.kind, ImageKind::Png);
        image::load_from_memory(&png.bytes).unwrap().to_luma8()
    }

    /// Value of a single-count IFD entry in a little-endian TIFF
    fn tiff_tag(tiff: &[u8], tag: u16) -> Option<u32> {
        let count = u16::from_le_bytes([tiff[8], tiff[9]]) as usize;
        tiff[10..10 + count * 12].chunks_exact(12).find_map(|entry| {
            (u16::from_le_bytes([entry[0], entry[1]]) == tag)
                .then(|| u32::from_le_bytes([entry[8], entry[9], entry[10], entry[11]]))
        })
    }

    #[test]
    fn test_one_bit_rows_respect_padding() {
        // 10 pixels per row: two bytes per row, last six bits are padding
        let mut stream = image_stream(None, 10, 2, vec![0b1010_1010, 0b1100_0000, 0b0000_0000, 0b0111_1111]);
        stream.dict.set("BitsPerComponent", 1_i64);

        let gray = gray_pixels(decode(&stream));
        assert_eq!(gray.dimensions(), (10, 2));
        let row0: Vec<u8> = (0..10).map(|x| gray.get_pixel(x, 0)[0]).collect();
        assert_eq!(row0, vec![255, 0, 255, 0, 255, 0, 255, 0, 255, 255]);
        let row1: Vec<u8> = (0..10).map(|x| gray.get_pixel(x, 1)[0]).collect();
        assert_eq!(row1, vec![0, 0, 0, 0, 0, 0, 0, 0, 0, 255]);
    }

    #[test]
    fn test_flate_bilevel_scan_decodes() {
        // Alternating white and black rows, 64x32 at 1 bit
        let samples: Vec<u8> = (0..32).flat_map(|row| [if row % 2 == 0 { 0xFF } else { 0x00 }; 8]).collect();
        let mut stream = image_stream(Some("FlateDecode"), 64, 32, zlib(&samples));
        stream.dict.set("BitsPerComponent", 1_i64);

        let gray = gray_pixels(decode(&stream));
        assert_eq!(gray.dimensions(), (64, 32));
        assert_eq!(gray.get_pixel(63, 0)[0], 255);
        assert_eq!(gray.get_pixel(0, 1)[0], 0);
    }

    #[test]
    fn test_image_mask_and_decode_inversion() {
        let mut mask = image_stream(None, 8, 1, vec![0b0000_1111]);
        mask.dict.remove(b"ColorSpace");
        mask.dict.remove(b"BitsPerComponent");
        mask.dict.set("ImageMask", true);
        let gray = gray_pixels(decode(&mask));
        assert_eq!(gray.get_pixel(0, 0)[0], 0);
        assert_eq!(gray.get_pixel(7, 0)[0], 255);

        let mut inverted = image_stream(None, 2, 1, vec![0, 255]);
        inverted.dict.set("Decode", vec![1_i64.into(), 0_i64.into()]);
        let gray = gray_pixels(decode(&inverted));
        assert_eq!(gray.get_pixel(0, 0)[0], 255);
        assert_eq!(gray.get_pixel(1, 0)[0], 0);
    }

    #[test]
    fn test_sub_byte_samples_scale_to_full_range() {
        assert_eq!(unpack_samples(&[0b1110_0100], 4, 1, 1, 2).unwrap(), vec![3, 2, 1, 0]);
        assert_eq!(unpack_samples(&[0xF0, 0x70], 3, 1, 1, 4).unwrap(), vec![15, 0, 7]);

        let mut values = vec![3, 2, 0];
        scale_to_byte(&mut values, 2);
        assert_eq!(values, vec![255, 170, 0]);

        assert!(matches!(
            unpack_samples(&[0xFF], 16, 1, 1, 1),
            Err(ImageExtractionError::CorruptData(_))
        ));
    }

    #[test]
    fn test_indexed_palette_expands_to_rgb() {
        let mut stream = image_stream(None, 3, 1, vec![1, 0, 7]);
        stream.dict.set(
            "ColorSpace",
            vec![
                Object::Name(b"Indexed".to_vec()),
                Object::Name(b"DeviceRGB".to_vec()),
                1_i64.into(),
                Object::String(vec![255, 0, 0, 0, 0, 255], lopdf::StringFormat::Hexadecimal),
            ],
        );

        let png = decode(&stream).unwrap();
        let rgb = image::load_from_memory(&png.bytes).unwrap().to_rgb8();
        assert_eq!(rgb.get_pixel(0, 0).0, [0, 0, 255]);
        assert_eq!(rgb.get_pixel(1, 0).0, [255, 0, 0]);
        // Out-of-range index clamps to the last entry
        assert_eq!(rgb.get_pixel(2, 0).0, [0, 0, 255]);
    }

    #[test]
    fn test_one_bit_indexed_palette() {
        let mut stream = image_stream(None, 8, 1, vec![0b1000_0001]);
        stream.dict.set("BitsPerComponent", 1_i64);
        stream.dict.set(
            "ColorSpace",
            vec![
                Object::Name(b"Indexed".to_vec()),
                Object::Name(b"DeviceGray".to_vec()),
                1_i64.into(),
                Object::string_literal(vec![240u8, 16]),
            ],
        );

        let png = decode(&stream).unwrap();
        let rgb = image::load_from_memory(&png.bytes).unwrap().to_rgb8();
        assert_eq!(rgb.get_pixel(0, 0).0, [16, 16, 16]);
        assert_eq!(rgb.get_pixel(1, 0).0, [240, 240, 240]);
        assert_eq!(rgb.get_pixel(7, 0).0, [16, 16, 16]);
    }

    #[test]
    fn test_unsupported_color_space_is_per_image() {
        let mut stream = image_stream(None, 1, 1, vec![0]);
        stream.dict.set(
            "ColorSpace",
            vec![Object::Name(b"Separation".to_vec()), Object::Name(b"Black".to_vec())],
        );
        assert!(matches!(
            decode(&stream),
            Err(ImageExtractionError::UnsupportedEncoding(name)) if name.contains("Separation")
        ));
    }

    #[test]
    fn test_group4_fax_wrapped_as_tiff() {
        let fax_data = vec![0x26, 0xA0, 0x00, 0x10, 0x01];
        let mut stream = image_stream(Some("CCITTFaxDecode"), 16, 4, fax_data.clone());
        stream.dict.set(
            "DecodeParms",
            dictionary! { "K" => -1_i64, "Columns" => 16_i64, "BlackIs1" => true },
        );

        let tiff = decode(&stream).unwrap();
        assert_eq!(tiff.kind, ImageKind::Tiff);
        assert_eq!(&tiff.bytes[..4], b"II*\0");
        assert_eq!(tiff_tag(&tiff.bytes, 256), Some(16));
        assert_eq!(tiff_tag(&tiff.bytes, 257), Some(4));
        assert_eq!(tiff_tag(&tiff.bytes, 259), Some(4));
        assert_eq!(tiff_tag(&tiff.bytes, 262), Some(1));
        assert_eq!(tiff_tag(&tiff.bytes, 292), None);

        let offset = tiff_tag(&tiff.bytes, 273).unwrap() as usize;
        assert_eq!(&tiff.bytes[offset..], fax_data.as_slice());
        assert_eq!(tiff_tag(&tiff.bytes, 279), Some(fax_data.len() as u32));
    }

    #[test]
    fn test_compressed_jpeg_passes_through() {
        let mut jpeg = Cursor::new(Vec::new());
        image::GrayImage::from_pixel(8, 8, Luma([200u8]))
            .write_to(&mut jpeg, ImageFormat::Jpeg)
            .unwrap();
        let jpeg = jpeg.into_inner();

        let mut stream = image_stream(None, 8, 8, zlib(&jpeg));
        stream.dict.set(
            "Filter",
            vec![Object::Name(b"FlateDecode".to_vec()), Object::Name(b"DCTDecode".to_vec())],
        );
        let image = decode(&stream).unwrap();
        assert_eq!(image.kind, ImageKind::Jpeg);
        assert_eq!(image.bytes, jpeg);

        stream.dict.set(
            "Filter",
            vec![Object::Name(b"ASCII85Decode".to_vec()), Object::Name(b"DCTDecode".to_vec())],
        );
        assert!(matches!(
            decode(&stream),
            Err(ImageExtractionError::UnsupportedEncoding(name)) if name == "ASCII85Decode"
        ));
    }
}
