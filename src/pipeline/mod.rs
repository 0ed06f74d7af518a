//! Pipeline stages for a policy comparison.
//!
//! Each submodule implements one step and can be tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ normalize ──▶ request ──▶ llm ──▶ contract
//! (files)   (text/b64)    (parts)    (model)  (parse)
//! ```
//!
//! 1. [`input`]     — uploaded documents: name, media type, bytes or path
//! 2. [`normalize`] — spreadsheets become CSV text; everything else is
//!    base64-wrapped with its media type. Workbook decoding runs in
//!    `spawn_blocking`.
//! 3. [`request`]   — payloads in submission order, the instruction, the
//!    system persona and the response schema
//! 4. [`llm`]       — the only stage with network I/O
//! 5. [`contract`]  — the record shape the model must return

pub mod contract;
pub mod input;
pub mod llm;
pub mod normalize;
pub mod request;
