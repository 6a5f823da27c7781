//! NMEA 0183 Codec Library
//!
//! This library provides the sentence handling used by the multiplexer:
//! - Checksum computation and verification
//! - A catalogue of sentence formats (sentence id -> field variable names)
//! - A stateful handle holding the last known value of every variable,
//!   keyed by an optional origin tag prefix
//! - Sentence synthesis from the stored values
//!
//! # Example
//!
//! ```no_run
//! use nmea0183::Sentences;
//!
//! let sentences = Sentences::load("nmea_sentences.yaml").unwrap_or_default();
//! let mut handle = sentences.make_handle();
//!
//! handle.parse("$HCHDM,238.5,M*25", "cp_").unwrap();
//! let hdm = handle.write("hdm", "HF", "cp_").unwrap();
//! println!("{}", hdm);
//! ```

pub mod error;
pub mod handle;
pub mod sentences;

pub use error::CodecError;
pub use handle::Handle;
pub use sentences::Sentences;

/// XOR checksum of the sentence body.
///
/// A leading `$` or `!` is skipped and the computation stops at `*` when
/// present, so both a bare body and a full sentence can be passed.
pub fn checksum(sentence: &str) -> u8 {
    let body = sentence
        .strip_prefix('$')
        .or_else(|| sentence.strip_prefix('!'))
        .unwrap_or(sentence);
    let body = body.split('*').next().unwrap_or(body);
    body.bytes().fold(0u8, |acc, b| acc ^ b)
}
