//! Page construction with GeoPDF metadata and crop-mark finalization.
//!
//! [`GeoCanvas`] owns the state of the page being drawn (its content buffer
//! and the GeoDicts attached to it) and a [`DocumentSink`] it commits closed
//! pages to. [`GeoCanvas::show_page`] is where crop marks, bleed and the
//! `/LGIDict` entry get applied.

use log::{debug, trace};
use lopdf::{Dictionary, Object, ObjectId};
use pdf_writer::Content;

use crate::content::{ContentBuffer, Instruction, join_instructions};
use crate::crop_marks::{Color, CropMarks, LineSegment, ResolvedCropMarks};
use crate::document::{DocumentSink, FinishedPage, GeoAttachment, Transition};
use crate::error::Result;
use crate::metadata::{GeoDict, Validatable, Value};

/// References of the GeoDicts attached to the current page, in attach order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoAccumulator {
    refs: Vec<ObjectId>,
}

impl GeoAccumulator {
    pub fn push(&mut self, id: ObjectId) {
        self.refs.push(id);
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn refs(&self) -> &[ObjectId] {
        &self.refs
    }

    /// One reference is attached bare, several as an array, none not at all.
    pub fn into_attachment(self) -> Option<GeoAttachment> {
        match self.refs.len() {
            0 => None,
            1 => Some(GeoAttachment::Single(self.refs[0])),
            _ => Some(GeoAttachment::Many(self.refs)),
        }
    }
}

/// Everything that lives for exactly one page.
#[derive(Debug)]
struct PageState {
    code: ContentBuffer,
    geo: GeoAccumulator,
    resources: Dictionary,
    annotations: Vec<Object>,
}

impl Default for PageState {
    fn default() -> Self {
        Self {
            code: ContentBuffer::new(),
            geo: GeoAccumulator::default(),
            resources: Dictionary::new(),
            annotations: Vec::new(),
        }
    }
}

type PageCallback = Box<dyn FnMut(u32)>;

pub struct GeoCanvas<D: DocumentSink> {
    doc: D,
    page_size: (f64, f64),
    crop_marks: Option<CropMarks>,
    rotation: i64,
    compress: bool,
    transition: Option<Transition>,
    duration: Option<f64>,
    preamble: Option<Instruction>,
    before_page: Vec<Instruction>,
    after_page: Vec<Instruction>,
    on_page: Option<PageCallback>,
    page_number: u32,
    page: PageState,
}

impl<D: DocumentSink> GeoCanvas<D> {
    pub fn new(doc: D, page_size: (f64, f64)) -> Self {
        Self {
            doc,
            page_size,
            crop_marks: None,
            rotation: 0,
            compress: false,
            transition: None,
            duration: None,
            preamble: None,
            before_page: Vec::new(),
            after_page: Vec::new(),
            on_page: None,
            page_number: 1,
            page: PageState::default(),
        }
    }

    // ========== settings ==========

    pub fn set_page_size(&mut self, width: f64, height: f64) {
        self.page_size = (width, height);
    }

    pub fn page_size(&self) -> (f64, f64) {
        self.page_size
    }

    pub fn set_crop_marks(&mut self, crop_marks: Option<CropMarks>) {
        self.crop_marks = crop_marks;
    }

    /// Page rotation in degrees, a multiple of 90.
    pub fn set_page_rotation(&mut self, degrees: i64) {
        self.rotation = degrees;
    }

    pub fn set_page_compression(&mut self, compress: bool) {
        self.compress = compress;
    }

    pub fn set_page_transition(&mut self, transition: Option<Transition>) {
        self.transition = transition;
    }

    /// Seconds the page is displayed in presentation mode.
    pub fn set_page_duration(&mut self, seconds: Option<f64>) {
        self.duration = seconds;
    }

    /// Instruction placed between the out-of-band prologue and the page content.
    pub fn set_preamble(&mut self, op: Option<Instruction>) {
        self.preamble = op;
    }

    /// Raw instructions emitted ahead of every page's content.
    pub fn push_before_page(&mut self, op: impl Into<Instruction>) {
        self.before_page.push(op.into());
    }

    /// Raw instructions emitted after every page's content.
    pub fn push_after_page(&mut self, op: impl Into<Instruction>) {
        self.after_page.push(op.into());
    }

    /// Called with the ordinal of each page once it has been appended.
    pub fn set_on_page(&mut self, callback: impl FnMut(u32) + 'static) {
        self.on_page = Some(Box::new(callback));
    }

    /// Ordinal of the page currently being drawn, starting at 1.
    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn code(&self) -> &ContentBuffer {
        &self.page.code
    }

    pub fn geo(&self) -> &GeoAccumulator {
        &self.page.geo
    }

    pub fn resources_mut(&mut self) -> &mut Dictionary {
        &mut self.page.resources
    }

    pub fn add_annotation(&mut self, annot: impl Into<Object>) {
        self.page.annotations.push(annot.into());
    }

    pub fn doc(&self) -> &D {
        &self.doc
    }

    pub fn into_inner(self) -> D {
        self.doc
    }

    // ========== drawing primitives ==========

    fn emit(&mut self, build: impl FnOnce(&mut Content)) {
        let mut content = Content::new();
        build(&mut content);
        self.page.code.push(content.finish());
    }

    /// Appends an already-encoded instruction.
    pub fn raw(&mut self, op: impl Into<Instruction>) {
        self.page.code.push(op);
    }

    pub fn save_state(&mut self) {
        self.emit(|c| {
            c.save_state();
        });
    }

    pub fn restore_state(&mut self) {
        self.emit(|c| {
            c.restore_state();
        });
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.emit(|c| {
            c.transform([1.0, 0.0, 0.0, 1.0, dx as f32, dy as f32]);
        });
    }

    pub fn scale(&mut self, sx: f64, sy: f64) {
        self.emit(|c| {
            c.transform([sx as f32, 0.0, 0.0, sy as f32, 0.0, 0.0]);
        });
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        self.emit(|c| {
            match color {
                Color::Gray { level } => c.set_stroke_gray(level),
                Color::Rgb { r, g, b } => c.set_stroke_rgb(r, g, b),
                Color::Cmyk { c: cy, m, y, k } => c.set_stroke_cmyk(cy, m, y, k),
            };
        });
    }

    /// Negative and NaN widths are drawn as 0 (the thinnest line the device renders).
    pub fn set_line_width(&mut self, width: f64) {
        let width = if width > 0.0 { width } else { 0.0 };
        self.emit(|c| {
            c.set_line_width(width as f32);
        });
    }

    /// Strokes each segment as its own instruction.
    pub fn lines(&mut self, segments: &[LineSegment]) {
        for &(x1, y1, x2, y2) in segments {
            self.emit(|c| {
                c.move_to(x1 as f32, y1 as f32).line_to(x2 as f32, y2 as f32).stroke();
            });
        }
    }

    pub fn rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.emit(|c| {
            c.rect(x as f32, y as f32, w as f32, h as f32).stroke();
        });
    }

    // ========== GeoPDF ==========

    /// Builds a GeoDict from `overrides` and attaches it to the current page.
    ///
    /// Returns `Ok(None)` without touching the page when the dictionary is not
    /// valid (no `Registration` or `CTM`, or an invalid nested dictionary).
    pub fn attach_geo<I, K, V>(&mut self, overrides: I) -> Result<Option<ObjectId>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let lgi = GeoDict::new(overrides);
        if !lgi.is_valid() {
            debug!("page {}: dropping LGIDict without Registration/CTM", self.page_number);
            return Ok(None);
        }

        let id = self.doc.serialize_object(lgi.to_object())?;
        self.page.geo.push(id);
        Ok(Some(id))
    }

    // ========== page close ==========

    /// Closes the current page, appends it to the document and starts a new one.
    pub fn show_page(&mut self) -> Result<ObjectId> {
        let (mut page_w, mut page_h) = self.page_size;

        if let Some(cm) = self.crop_marks.as_ref().and_then(CropMarks::resolve) {
            self.apply_crop_marks(&cm, page_w, page_h);
            (page_w, page_h) = cm.enlarged(page_w, page_h);
        }

        // keeps a trailing Q from running into `endstream`
        self.page.code.push(b" ".to_vec());

        let PageState { code, geo, resources, annotations } = std::mem::take(&mut self.page);

        let content = join_instructions(
            self.before_page
                .iter()
                .chain(self.preamble.iter())
                .chain(code.instructions())
                .chain(self.after_page.iter()),
        );

        let page = FinishedPage {
            width: page_w,
            height: page_h,
            rotation: self.rotation,
            compress: self.compress,
            transition: self.transition.clone(),
            duration: self.duration,
            geo: geo.into_attachment(),
            content,
            resources,
            annotations,
        };

        let page_id = self.doc.append_page(page)?;
        debug!("appended page {} as {:?} ({page_w} x {page_h})", self.page_number, page_id);

        if let Some(cb) = self.on_page.as_mut() {
            cb(self.page_number);
        }
        self.start_page();
        Ok(page_id)
    }

    fn start_page(&mut self) {
        self.page_number += 1;
        self.page = PageState::default();
    }

    /// Wraps the existing content in the border/bleed transform and draws the
    /// corner ticks, either underneath the content or on top of it.
    fn apply_crop_marks(&mut self, cm: &ResolvedCropMarks, page_w: f64, page_h: f64) {
        debug!(
            "page {}: crop marks border={} mark={} bleed={} last={}",
            self.page_number, cm.border_width, cm.mark_length, cm.bleed_width, cm.mark_last
        );

        let mut cx0 = self.page.code.len();
        let mut held_marks = None;

        if let (true, Some(color)) = (cm.draws_marks(), cm.mark_color) {
            self.save_state();
            self.set_stroke_color(color);
            self.set_line_width(cm.mark_width);
            self.lines(&cm.mark_segments(page_w, page_h));
            self.restore_state();

            if cm.mark_last {
                let marks = self.page.code.remove_from(cx0);
                trace!("holding back {} mark instructions", marks.len());
                held_marks = Some(marks);
                cx0 = self.page.code.len();
            }
        }

        let transform = cm.bleed_transform(page_w, page_h);
        self.save_state();
        self.translate(transform.translate.0, transform.translate.1);
        if let Some((sx, sy)) = transform.scale {
            self.scale(sx, sy);
        }

        let wrapper = self.page.code.remove_from(cx0);
        trace!("moving {} wrapper instructions to the front", wrapper.len());
        self.page.code.insert_at(0, wrapper);
        self.restore_state();

        if let Some(marks) = held_marks {
            self.page.code.append(marks);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::document::PdfDocument;
    use crate::metadata::Projection;

    #[derive(Default)]
    struct RecordingSink {
        objects: Vec<Object>,
        pages: Vec<FinishedPage>,
    }

    impl DocumentSink for RecordingSink {
        fn serialize_object(&mut self, object: Object) -> Result<ObjectId> {
            self.objects.push(object);
            Ok((self.objects.len() as u32, 0))
        }

        fn append_page(&mut self, page: FinishedPage) -> Result<ObjectId> {
            self.pages.push(page);
            Ok((1000 + self.pages.len() as u32, 0))
        }
    }

    fn canvas() -> GeoCanvas<RecordingSink> {
        GeoCanvas::new(RecordingSink::default(), (612.0, 792.0))
    }

    fn registration() -> Value {
        Value::Array(vec![Value::Array(vec!["0".into(), "0".into(), "-77".into(), "38".into()])])
    }

    fn lines_of(page: &FinishedPage) -> Vec<String> {
        String::from_utf8_lossy(&page.content).lines().map(str::to_string).collect()
    }

    fn last_page(c: &GeoCanvas<RecordingSink>) -> &FinishedPage {
        c.doc().pages.last().unwrap()
    }

    #[test]
    fn invalid_geo_is_dropped_silently() {
        let mut c = canvas();
        let got = c.attach_geo([("Description", "nowhere")]).unwrap();
        assert!(got.is_none());
        assert!(c.geo().is_empty());
        assert!(c.doc().objects.is_empty());
    }

    #[test]
    fn valid_geo_is_serialized_and_accumulated() {
        let mut c = canvas();
        let id = c.attach_geo([("Registration", registration())]).unwrap();
        assert_eq!(id, Some((1, 0)));
        assert_eq!(c.geo().len(), 1);

        c.attach_geo([("CTM", Value::Array(vec![]))]).unwrap();
        assert_eq!(c.geo().refs(), &[(1, 0), (2, 0)]);
    }

    #[test]
    fn geo_with_invalid_nested_dict_is_dropped() {
        let mut c = canvas();
        let nested = GeoDict::new([("Projection", Value::from(Projection::new([("Datum", "WE")])))]);
        let got = c
            .attach_geo([("Registration", registration()), ("Inset", Value::from(nested))])
            .unwrap();
        assert!(got.is_none());
        assert_eq!(c.geo().len(), 0);
    }

    #[test]
    fn geo_attachment_shape() {
        let mut c = canvas();
        c.show_page().unwrap();
        assert_eq!(last_page(&c).geo, None);

        c.attach_geo([("CTM", Value::Array(vec![]))]).unwrap();
        c.show_page().unwrap();
        assert_eq!(last_page(&c).geo, Some(GeoAttachment::Single((1, 0))));

        c.attach_geo([("CTM", Value::Array(vec![]))]).unwrap();
        c.attach_geo([("Registration", registration())]).unwrap();
        c.show_page().unwrap();
        assert_eq!(last_page(&c).geo, Some(GeoAttachment::Many(vec![(2, 0), (3, 0)])));
    }

    #[test]
    fn without_crop_marks_content_is_untouched() {
        let mut c = canvas();
        c.raw(b"0 0 m 10 10 l S".to_vec());
        c.show_page().unwrap();

        let page = last_page(&c);
        assert_eq!((page.width, page.height), (612.0, 792.0));
        assert_eq!(page.content, b"0 0 m 10 10 l S\n ".to_vec());
    }

    #[test]
    fn zero_border_skips_processing() {
        let mut c = canvas();
        c.set_crop_marks(Some(CropMarks { border_width: Some(-5.0), ..Default::default() }));
        c.raw(b"BODY".to_vec());
        c.show_page().unwrap();

        let page = last_page(&c);
        assert_eq!((page.width, page.height), (612.0, 792.0));
        assert_eq!(lines_of(page), ["BODY", " "]);
    }

    #[test]
    fn marks_last_are_drawn_after_translated_content() {
        let mut c = canvas();
        c.set_crop_marks(Some(CropMarks {
            border_width: Some(36.0),
            mark_length: Some(18.0),
            mark_last: Some(true),
            bleed_width: Some(0.0),
            ..Default::default()
        }));
        c.raw(b"BODY".to_vec());
        c.show_page().unwrap();

        let page = last_page(&c);
        assert_eq!((page.width, page.height), (612.0 + 72.0, 792.0 + 72.0));

        let lines = lines_of(page);
        assert_eq!(lines[0], "q");
        assert!(lines[1].ends_with(" cm"));
        assert_eq!(lines[2], "BODY");
        assert_eq!(lines[3], "Q");

        let strokes: Vec<usize> = (0..lines.len()).filter(|&i| lines[i] == "S").collect();
        assert_eq!(strokes.len(), 8);
        assert!(strokes.iter().all(|&i| i > 3));
        assert_eq!(lines.last().map(String::as_str), Some(" "));
    }

    #[test]
    fn marks_first_are_hoisted_with_the_wrapper() {
        let mut c = canvas();
        c.set_crop_marks(Some(CropMarks { mark_last: Some(false), ..Default::default() }));
        c.raw(b"BODY".to_vec());
        c.show_page().unwrap();

        let lines = lines_of(last_page(&c));
        let body = lines.iter().position(|l| l == "BODY").unwrap();
        let strokes = lines.iter().filter(|l| *l == "S").count();
        assert_eq!(strokes, 8);
        assert!(lines[..body].iter().filter(|l| *l == "S").count() == 8);
        assert_eq!(lines[body + 1], "Q");
    }

    #[test]
    fn disabled_marks_still_translate() {
        let mut c = canvas();
        c.set_crop_marks(Some(CropMarks { mark_color: Some(None), ..Default::default() }));
        c.raw(b"BODY".to_vec());
        c.show_page().unwrap();

        let page = last_page(&c);
        assert_eq!((page.width, page.height), (684.0, 864.0));
        let lines = lines_of(page);
        assert!(!lines.iter().any(|l| l == "S"));
        assert_eq!(lines[0], "q");
        assert_eq!(lines[2], "BODY");
    }

    #[test]
    fn bleed_adds_a_scale_after_the_translate() {
        let mut c = GeoCanvas::new(RecordingSink::default(), (600.0, 800.0));
        let cm = CropMarks { bleed_width: Some(9.0), ..Default::default() };
        c.set_crop_marks(Some(cm.clone()));
        c.raw(b"BODY".to_vec());
        c.show_page().unwrap();

        let page = last_page(&c);
        assert_eq!((page.width, page.height), (672.0, 872.0));

        let lines = lines_of(page);
        assert_eq!(lines[0], "q");
        assert_eq!(lines[1], "1 0 0 1 27 27 cm");
        assert_eq!(lines[2], "1.03 0 0 1.0225 0 0 cm");
        assert_eq!(lines[3], "BODY");

        // content origin and far corner under the emitted matrices
        let t = cm.resolve().unwrap().bleed_transform(600.0, 800.0);
        assert_eq!(t.apply(0.0, 0.0), (27.0, 27.0));
        let (x, y) = t.apply(600.0, 800.0);
        assert!((x - 645.0).abs() < 1e-9 && (y - 845.0).abs() < 1e-9);
    }

    #[test]
    fn bad_mark_width_does_not_abort_page_close() {
        for mw in [-1.0, f64::NAN] {
            let mut c = GeoCanvas::new(PdfDocument::new(), (0.0, 0.0));
            c.set_crop_marks(Some(CropMarks {
                bleed_width: Some(9.0),
                mark_width: Some(mw),
                ..Default::default()
            }));
            c.show_page().unwrap();
            assert_eq!(c.doc().page_count(), 1);
        }
    }

    #[test]
    fn negative_line_width_is_drawn_as_zero() {
        let mut c = canvas();
        c.set_line_width(-2.0);
        c.set_line_width(f64::NAN);
        let ops: Vec<String> = c
            .code()
            .instructions()
            .iter()
            .map(|op| String::from_utf8_lossy(op).trim().to_string())
            .collect();
        assert_eq!(ops, ["0 w", "0 w"]);
    }

    #[test]
    fn out_of_band_lists_wrap_the_page() {
        let mut c = canvas();
        c.push_before_page(b"%before".to_vec());
        c.set_preamble(Some(b"%preamble".to_vec()));
        c.push_after_page(b"%after".to_vec());
        c.raw(b"BODY".to_vec());
        c.show_page().unwrap();

        assert_eq!(lines_of(last_page(&c)), ["%before", "%preamble", "BODY", " ", "%after"]);
    }

    #[test]
    fn settings_carry_into_the_page() {
        let mut c = canvas();
        c.set_page_rotation(180);
        c.set_page_compression(true);
        c.set_page_duration(Some(3.0));
        c.add_annotation(Object::Integer(7));
        c.show_page().unwrap();

        let page = last_page(&c);
        assert_eq!(page.rotation, 180);
        assert!(page.compress);
        assert_eq!(page.duration, Some(3.0));
        assert_eq!(page.annotations.len(), 1);
    }

    #[test]
    fn state_resets_between_pages() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut c = canvas();
        let log = Rc::clone(&seen);
        c.set_on_page(move |n| log.borrow_mut().push(n));

        c.raw(b"BODY".to_vec());
        c.add_annotation(Object::Integer(1));
        c.attach_geo([("CTM", Value::Array(vec![]))]).unwrap();
        c.show_page().unwrap();

        assert!(c.code().is_empty());
        assert!(c.geo().is_empty());
        assert_eq!(c.page_number(), 2);

        c.show_page().unwrap();
        let page = last_page(&c);
        assert_eq!(page.geo, None);
        assert!(page.annotations.is_empty());
        assert_eq!(page.content, b" ".to_vec());
        assert_eq!(*seen.borrow(), vec![1, 2]);
    }

    #[test]
    fn writes_through_lopdf() {
        let mut c = GeoCanvas::new(PdfDocument::new(), (200.0, 100.0));
        c.set_crop_marks(Some(CropMarks::default()));
        c.attach_geo([("CTM", Value::Array(vec![]))]).unwrap();
        c.rect(10.0, 10.0, 50.0, 50.0);
        let page_id = c.show_page().unwrap();

        let doc = c.into_inner().finish();
        assert_eq!(doc.get_pages().len(), 1);
        let dict = doc.get_object(page_id).unwrap().as_dict().unwrap();
        let lgi = dict.get(b"LGIDict").unwrap().as_reference().unwrap();
        let lgi = doc.get_object(lgi).unwrap().as_dict().unwrap();
        assert!(lgi.get(b"CTM").is_ok());
        assert!(lgi.get(b"Projection").is_ok());
    }
}
