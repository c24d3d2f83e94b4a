pub mod fs;
pub mod preview;
