//! Pluggable byte transform applied to records before they hit the disk
//! queue and reversed when they are read back for upload.

use crate::Result;

pub trait Crypto: Send + Sync + 'static {
    fn encrypt(
        &self,
        bytes: Vec<u8>,
    ) -> Result<Vec<u8>>;

    fn decrypt(
        &self,
        bytes: Vec<u8>,
    ) -> Result<Vec<u8>>;
}

/// Default transform: records are stored as-is.
pub struct NoopCrypto;

impl Crypto for NoopCrypto {
    fn encrypt(
        &self,
        bytes: Vec<u8>,
    ) -> Result<Vec<u8>> {
        Ok(bytes)
    }

    fn decrypt(
        &self,
        bytes: Vec<u8>,
    ) -> Result<Vec<u8>> {
        Ok(bytes)
    }
}
