/// Errors reported by the sentence codec
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Sentence does not have the `$ADDR,...` shape
    #[error("malformed sentence: {0}")]
    Malformed(String),

    /// Checksum carried by the sentence does not match its body
    #[error("checksum error: expected {expected:02X}, got {actual:02X}")]
    Checksum { expected: u8, actual: u8 },

    /// Sentence id not present in the catalogue
    #[error("unknown sentence: {0}")]
    UnknownSentence(String),

    /// No stored variable exists for the sentence under the requested tag
    #[error("no data for sentence {sentence} with tag <{tag}>")]
    NoData { sentence: String, tag: String },

    /// Catalogue file could not be read
    #[error("catalogue error: {0}")]
    Catalogue(#[from] std::io::Error),

    /// Catalogue file could not be decoded
    #[error("catalogue format error: {0}")]
    CatalogueFormat(#[from] serde_yaml::Error),
}
