//! Readers for reference datasets and input spectra
//!
//! Loading the original Hydrolight/NOBM products is out of scope; these
//! readers consume the tabular JSON shape the rest of the crate works with.

pub mod json;
pub mod types;
pub mod utils;

pub use json::JsonReader;
pub use types::{DataReader, FileType, ReadError, ReferenceDataset, Spectra};
pub use utils::reader_from_filetype;

pub fn create_reader(file_name: String) -> Result<Box<dyn DataReader>, ReadError> {
    match reader_from_filetype(file_name.as_ref()) {
        Ok(FileType::Json) => Ok(Box::new(JsonReader { file_name })),
        Err(e) => Err(e),
    }
}
