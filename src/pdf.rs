//! Combine page screenshots into one multi-page PDF.
//!
//! Each image becomes a page whose media box matches the image's pixel size
//! (1 px = 1 pt). Images are stored as JPEG streams, so any alpha channel is
//! flattened to RGB first.

use crate::error::{Error, Result};
use image::{DynamicImage, ImageFormat};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use std::io::Cursor;
use std::path::Path;

/// A decoded page image ready to embed
struct PageImage {
    width: u32,
    height: u32,
    jpeg: Vec<u8>,
}

impl PageImage {
    fn open(path: &Path) -> Result<Self> {
        let img = image::open(path)?;
        Self::from_image(img)
    }

    fn from_image(img: DynamicImage) -> Result<Self> {
        let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
        let mut jpeg = Vec::new();
        rgb.write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)?;
        Ok(Self {
            width: rgb.width(),
            height: rgb.height(),
            jpeg,
        })
    }
}

/// Write every loadable image in `paths` as one page of `output`, in order.
///
/// Returns the number of pages written.
pub fn combine_screenshots<P: AsRef<Path>>(paths: &[P], output: &Path) -> Result<usize> {
    let images: Vec<PageImage> = paths
        .iter()
        .filter_map(|p| match PageImage::open(p.as_ref()) {
            Ok(img) => Some(img),
            Err(e) => {
                ::log::error!("Could not load image {}: {}", p.as_ref().display(), e);
                None
            }
        })
        .collect();

    if images.is_empty() {
        return Err(Error::NoImages);
    }

    let mut doc = build_document(&images)?;
    doc.save(output)?;

    if images.len() == 1 {
        ::log::info!("Saved single screenshot as PDF: {}", output.display());
    } else {
        ::log::info!(
            "Combined {} screenshots into PDF: {}",
            images.len(),
            output.display()
        );
    }
    Ok(images.len())
}

fn build_document(images: &[PageImage]) -> Result<Document> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::with_capacity(images.len());
    for img in images {
        let page_id = add_page(&mut doc, pages_id, img)?;
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    Ok(doc)
}

fn add_page(doc: &mut Document, pages_id: ObjectId, img: &PageImage) -> Result<ObjectId> {
    let width = i64::from(img.width);
    let height = i64::from(img.height);

    let image_stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width,
            "Height" => height,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8_i64,
            "Filter" => "DCTDecode",
        },
        img.jpeg.clone(),
    );
    let image_id = doc.add_object(image_stream);

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Integer(width),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(height),
                    Object::Integer(0),
                    Object::Integer(0),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode()?));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(width),
            Object::Integer(height),
        ],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                "Im0" => image_id,
            },
        },
    });

    Ok(page_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> std::path::PathBuf {
        let path = dir.join(name);
        RgbaImage::from_pixel(width, height, Rgba([200, 30, 30, 128]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn test_combine_multiple_screenshots() {
        let tmp = tempfile::tempdir().unwrap();
        let a = write_png(tmp.path(), "a.png", 40, 30);
        let b = write_png(tmp.path(), "b.png", 20, 60);
        let output = tmp.path().join("out.pdf");

        let pages = combine_screenshots(&[a, b], &output).unwrap();
        assert_eq!(pages, 2);

        let doc = Document::load(&output).unwrap();
        let page_ids: Vec<ObjectId> = doc.get_pages().values().copied().collect();
        assert_eq!(page_ids.len(), 2);

        let media_box = doc
            .get_object(page_ids[1])
            .and_then(Object::as_dict)
            .and_then(|d| d.get(b"MediaBox"))
            .and_then(Object::as_array)
            .unwrap();
        assert_eq!(media_box[2].as_i64().unwrap(), 20);
        assert_eq!(media_box[3].as_i64().unwrap(), 60);
    }

    #[test]
    fn test_unreadable_images_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let good = write_png(tmp.path(), "good.png", 10, 10);
        let bad = tmp.path().join("bad.png");
        std::fs::write(&bad, b"not an image").unwrap();
        let output = tmp.path().join("out.pdf");

        let pages = combine_screenshots(&[bad, good], &output).unwrap();
        assert_eq!(pages, 1);
        assert!(output.exists());
    }

    #[test]
    fn test_no_loadable_images() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("missing.png");
        let output = tmp.path().join("out.pdf");

        let err = combine_screenshots(&[missing], &output).unwrap_err();
        assert!(matches!(err, Error::NoImages));
        assert!(!output.exists());
    }
}
