//! The document side of page construction: turning metadata into objects and
//! committing finished pages.

use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Page transition style, `/Trans /S`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionStyle {
    Split,
    Blinds,
    Box,
    Wipe,
    Dissolve,
    Glitter,
    R,
}

impl TransitionStyle {
    fn as_name(&self) -> &'static str {
        match self {
            TransitionStyle::Split => "Split",
            TransitionStyle::Blinds => "Blinds",
            TransitionStyle::Box => "Box",
            TransitionStyle::Wipe => "Wipe",
            TransitionStyle::Dissolve => "Dissolve",
            TransitionStyle::Glitter => "Glitter",
            TransitionStyle::R => "R",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub style: TransitionStyle,
    /// Seconds the transition takes.
    pub duration: Option<f64>,
}

impl Transition {
    fn to_dictionary(&self) -> Dictionary {
        let mut d = dictionary! {
            "Type" => "Trans",
            "S" => Object::Name(self.style.as_name().as_bytes().to_vec()),
        };
        if let Some(secs) = self.duration {
            d.set("D", Object::Real(secs as f32));
        }
        d
    }
}

/// The `/LGIDict` entry of a page.
#[derive(Debug, Clone, PartialEq)]
pub enum GeoAttachment {
    Single(ObjectId),
    Many(Vec<ObjectId>),
}

impl GeoAttachment {
    pub fn to_object(&self) -> Object {
        match self {
            GeoAttachment::Single(id) => Object::Reference(*id),
            GeoAttachment::Many(ids) => Object::Array(ids.iter().map(|id| Object::Reference(*id)).collect()),
        }
    }
}

/// A closed page, ready to be appended to a document.
#[derive(Debug, Clone)]
pub struct FinishedPage {
    pub width: f64,
    pub height: f64,
    pub rotation: i64,
    pub compress: bool,
    pub transition: Option<Transition>,
    pub duration: Option<f64>,
    pub geo: Option<GeoAttachment>,
    pub content: Vec<u8>,
    pub resources: Dictionary,
    pub annotations: Vec<Object>,
}

/// What page construction needs from the document it writes into.
pub trait DocumentSink {
    /// Adds `object` to the object graph and returns its reference.
    fn serialize_object(&mut self, object: Object) -> Result<ObjectId>;

    /// Commits a finished page to the end of the page sequence.
    fn append_page(&mut self, page: FinishedPage) -> Result<ObjectId>;
}

/// An lopdf document being built page by page.
pub struct PdfDocument {
    doc: Document,
    pages_id: ObjectId,
    page_ids: Vec<ObjectId>,
}

impl Default for PdfDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfDocument {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self { doc, pages_id, page_ids: Vec::new() }
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    pub fn page_ids(&self) -> &[ObjectId] {
        &self.page_ids
    }

    /// Writes the page tree and catalog and hands back the lopdf document.
    pub fn finish(mut self) -> Document {
        let kids: Vec<Object> = self.page_ids.iter().map(|id| Object::Reference(*id)).collect();
        let pages_dict = dictionary! {
            "Type" => "Pages",
            "Kids" => Object::Array(kids),
            "Count" => Object::Integer(self.page_ids.len() as i64),
        };
        self.doc.objects.insert(self.pages_id, Object::Dictionary(pages_dict));

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc
    }

    pub fn save(self, path: impl AsRef<Path>) -> Result<()> {
        let mut doc = self.finish();
        doc.save(path)?;
        Ok(())
    }
}

impl DocumentSink for PdfDocument {
    fn serialize_object(&mut self, object: Object) -> Result<ObjectId> {
        Ok(self.doc.add_object(object))
    }

    fn append_page(&mut self, page: FinishedPage) -> Result<ObjectId> {
        let mut stream = Stream::new(Dictionary::new(), page.content);
        if page.compress {
            stream.compress()?;
        }
        let contents_id = self.doc.add_object(stream);

        let media_box = Object::Array(vec![0.0.into(), 0.0.into(), page.width.into(), page.height.into()]);
        let mut dict = dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => media_box,
            "Resources" => page.resources,
            "Contents" => contents_id,
        };
        if page.rotation != 0 {
            dict.set("Rotate", Object::Integer(page.rotation));
        }
        if let Some(trans) = &page.transition {
            dict.set("Trans", trans.to_dictionary());
        }
        if let Some(dur) = page.duration {
            dict.set("Dur", Object::Real(dur as f32));
        }
        if let Some(geo) = &page.geo {
            dict.set("LGIDict", geo.to_object());
        }
        if !page.annotations.is_empty() {
            dict.set("Annots", Object::Array(page.annotations));
        }

        let page_id = self.doc.add_object(dict);
        self.page_ids.push(page_id);
        Ok(page_id)
    }
}
