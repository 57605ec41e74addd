// File: autogram-common/src/models/media.rs

use bytes::Bytes;
use crate::traits::Weighted;

/// A downloaded attachment, keyed by its upstream file id.
///
/// The payload is reference counted so handing copies to many HTTP
/// responses does not duplicate the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub id: String,
    pub data: Bytes,
}

impl MediaFile {
    pub fn new(id: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            id: id.into(),
            data: data.into(),
        }
    }
}

impl Weighted for MediaFile {
    fn id(&self) -> &str {
        &self.id
    }

    fn weight(&self) -> u64 {
        self.data.len() as u64
    }
}
