//! Source map discovery and decoding.
//!
//! A [`SourceMapRepository`] walks a project's output directory and reports
//! every compiled file that carries a `sourceMappingURL` comment. A
//! [`SourceMapLoader`] turns that metadata into a [`SourceMap`] that can answer
//! original-to-generated position queries. A [`SourcePathResolver`] maps the
//! source URLs a map lists back onto workspace paths.

mod error;
mod loader;
mod map;
mod repository;
mod resolver;
pub mod url;
mod vlq;

pub use error::{Result, SourceMapError};
pub use loader::{SourceMapFactory, SourceMapLoader, SourceMapMetadata};
pub use map::{Bias, DecodedSourceMap, GeneratedPosition, OriginalPosition, SourceMap};
pub use repository::{
    map_path, metadata_for_file, parse_source_mapping_url, relative_out_file_patterns,
    FsSourceMapRepository, OutFilesMatcher, SourceMapRepository,
};
pub use resolver::{FileUrlResolver, OverridePathResolver, SourcePathResolver};
