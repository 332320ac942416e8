pub mod rubric;
pub mod scoring;
pub mod client;
pub mod ocr;
pub mod grader;

pub use rubric::{parse_rubric, Subject, SUBJECTS};
pub use client::{GeminiClient, ScoringModel, ScoringRequest, Attachment};
pub use ocr::{OcrEngine, TesseractCli};
pub use grader::{Grader, LoadedFile};
