pub mod markdown;
pub mod writer;

pub use writer::LocalWriter;
