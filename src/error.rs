use thiserror::Error;

/// Which resource budget was exceeded while building a page map.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    #[error("raw HTML size")]
    HtmlSize,
    #[error("DOM node count")]
    DomNodes,
    #[error("text output size")]
    TextOutput,
    #[error("image output size")]
    ImageOutput,
}

#[derive(Error, Debug)]
pub enum PageMapError {
    #[error("input exceeds configured size limit ({actual} bytes > {limit} bytes)")]
    InputTooLarge { actual: usize, limit: usize },

    #[error("malformed HTML input: {0}")]
    MalformedHtml(String),

    #[error("resource exhausted: {reason} ({actual} > {limit})")]
    ResourceExhausted {
        reason: ResourceKind,
        actual: usize,
        limit: usize,
    },

    #[error("pipeline timed out during stage: {stage}")]
    PipelineTimeout { stage: String },
}

pub type Result<T> = std::result::Result<T, PageMapError>;
