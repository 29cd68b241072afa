//! GeoPDF page construction: `/LGIDict` georeferencing metadata and
//! crop-mark / bleed finalization of page content streams.

pub mod content;
pub mod crop_marks;
pub mod document;
pub mod error;
pub mod metadata;
pub mod page;
pub mod units;

pub use content::{ContentBuffer, Instruction, Segment};
pub use crop_marks::{BleedTransform, Color, CropMarks, ResolvedCropMarks};
pub use document::{DocumentSink, FinishedPage, GeoAttachment, PdfDocument, Transition, TransitionStyle};
pub use error::{GeoPdfError, Result};
pub use metadata::{Dict, GeoDict, Projection, Validatable, Value};
pub use page::{GeoAccumulator, GeoCanvas};
