use thiserror::Error;

/// Errors from the ENML-to-Markdown conversion core.
///
/// Almost everything the converter meets in the wild is handled by logging a
/// warning and carrying on; these are the cases that genuinely cannot
/// produce output.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// An anchor closed with no matching opening bracket in the output
    /// stream. This is a builder invariant violation, not bad input.
    #[error("anchor closed without a matching opening bracket")]
    UnbalancedAnchor,
}

/// Errors from reading an ENEX container.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("conversion error: {0}")]
    Convert(#[from] ConvertError),
}
