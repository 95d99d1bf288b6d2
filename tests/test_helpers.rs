//! # Test Helper Library
//!
//! Shared fixtures for the integration tests: in-memory images, scripted OCR backends
//! and a scripted field model, so the pipeline can run without network or Tesseract.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use image::{DynamicImage, ImageFormat};
use medscan::extraction::{FieldModel, ModelFields, ModelFuture};
use medscan::ocr::{BackendFuture, BackendKind, OcrBackend};
use medscan::{CalendarMonth, OcrError};
use tempfile::NamedTempFile;

pub fn cm(year: i32, month: u32) -> CalendarMonth {
    CalendarMonth::new(year, month).expect("valid calendar month")
}

/// A blank PNG of the given size
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::new_rgb8(width, height);
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("encode png");
    buf
}

/// Write `bytes` to a temporary `.png` file that lives as long as the handle
pub fn temp_image_file(bytes: &[u8]) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".png")
        .tempfile()
        .expect("create temp file");
    file.write_all(bytes).expect("write temp image");
    file.flush().expect("flush temp image");
    file
}

/// What a scripted backend does when called
#[derive(Clone)]
pub enum Reply {
    Text(&'static str),
    Nothing,
    Fail(OcrError),
}

/// OCR backend that replays a fixed reply and counts its calls
pub struct ScriptedBackend {
    kind: BackendKind,
    available: bool,
    reply: Reply,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(kind: BackendKind, reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            kind,
            available: true,
            reply,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn unavailable(kind: BackendKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            available: false,
            reply: Reply::Nothing,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OcrBackend for ScriptedBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn extract_text<'a>(&'a self, _image: &'a [u8]) -> BackendFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.reply.clone();
        Box::pin(async move {
            match reply {
                Reply::Text(text) => Ok(Some(text.to_string())),
                Reply::Nothing => Ok(None),
                Reply::Fail(err) => Err(err),
            }
        })
    }
}

/// Field model with fixed answers for the image and text passes
#[derive(Default)]
pub struct ScriptedModel {
    pub from_image: Option<ModelFields>,
    pub from_text: Option<ModelFields>,
    image_calls: AtomicUsize,
    text_calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new(from_image: Option<ModelFields>, from_text: Option<ModelFields>) -> Arc<Self> {
        Arc::new(Self {
            from_image,
            from_text,
            ..Default::default()
        })
    }

    pub fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }

    pub fn text_calls(&self) -> usize {
        self.text_calls.load(Ordering::SeqCst)
    }
}

impl FieldModel for ScriptedModel {
    fn is_available(&self) -> bool {
        true
    }

    fn extract_from_image<'a>(&'a self, _image: &'a [u8]) -> ModelFuture<'a> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.from_image.clone();
        Box::pin(async move { reply })
    }

    fn extract_from_text<'a>(&'a self, _text: &'a str) -> ModelFuture<'a> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.from_text.clone();
        Box::pin(async move { reply })
    }
}

/// Label text of a probiotic strip as OCR reads it
pub const BIFILAC_LABEL: &str = "BIFILAC\n\
Capsules\n\
B.No. ALA306\n\
MFG. DT. JAN.24\n\
EXP. DT. DEC.26\n\
M.R.P. Rs. 120.50\n\
Mfd. by TOA PHARMA Pvt Ltd";

pub fn as_backend(backend: &Arc<ScriptedBackend>) -> Arc<dyn OcrBackend> {
    backend.clone()
}

pub fn as_model(model: &Arc<ScriptedModel>) -> Arc<dyn FieldModel> {
    model.clone()
}
