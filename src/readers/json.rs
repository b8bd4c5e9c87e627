use super::{DataReader, ReadError, ReferenceDataset, Spectra};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::BufReader;

pub struct JsonReader {
    pub file_name: String,
}

impl JsonReader {
    fn read<T: DeserializeOwned>(&self) -> Result<T, ReadError> {
        let file = File::open(&self.file_name).map_err(|source| ReadError::Io {
            path: self.file_name.clone(),
            source,
        })?;

        let reader = BufReader::new(file);

        serde_json::from_reader(reader).map_err(|source| ReadError::Json {
            path: self.file_name.clone(),
            source,
        })
    }
}

impl DataReader for JsonReader {
    fn read_reference(&self) -> Result<ReferenceDataset, ReadError> {
        self.read()
    }

    fn read_spectra(&self) -> Result<Spectra, ReadError> {
        self.read()
    }
}
