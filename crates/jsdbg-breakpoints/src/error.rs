use jsdbg_cache::CacheError;
use jsdbg_cdp::CdpError;
use jsdbg_config::ConfigError;
use jsdbg_sourcemap::SourceMapError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BreakpointError>;

#[derive(Debug, Error)]
pub enum BreakpointError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("prediction cache: {0}")]
    Cache(#[from] CacheError),

    #[error(transparent)]
    SourceMap(#[from] SourceMapError),

    #[error("debugger: {0}")]
    Cdp(#[from] CdpError),

    #[error("engine accepted entry breakpoint for {url_regex:?} without returning an id")]
    MissingBreakpointId { url_regex: String },
}
