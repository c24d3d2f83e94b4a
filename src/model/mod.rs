pub mod value;
pub mod path;
pub mod parser;
pub mod serializer;
pub mod extractor;
pub mod applier;
pub mod line_scan;
pub mod transcoder;
