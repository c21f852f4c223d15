use crate::utils::time::now_iso8601;
use crate::NetworkError;
use crate::Result;
use crate::SerializationError;

/// Assembles one upload body:
/// `{"api_key": <key>, "batch": [<record>, ...], "sent_at": <ISO-8601>}`.
///
/// Records are already serialized JSON read off the queue head; they are
/// emitted verbatim, never re-parsed. Offers are accepted until the raw
/// record bytes would push past the batch byte budget.
pub(crate) struct BatchBuilder {
    body: String,
    record_count: usize,
    record_bytes: usize,
    max_batch_bytes: usize,
}

impl BatchBuilder {
    pub(crate) fn new(
        api_key: &str,
        max_batch_bytes: usize,
    ) -> Result<Self> {
        let mut body = String::from("{\"api_key\":");
        body.push_str(&serde_json::to_string(api_key)?);
        body.push_str(",\"batch\":[");
        Ok(BatchBuilder {
            body,
            record_count: 0,
            record_bytes: 0,
            max_batch_bytes,
        })
    }

    /// Offer one decrypted record. Returns `false`, leaving the body
    /// untouched, when adding it would exceed the byte budget.
    pub(crate) fn offer(
        &mut self,
        record: &[u8],
    ) -> Result<bool> {
        let new_size = self.record_bytes + record.len();
        if new_size > self.max_batch_bytes {
            return Ok(false);
        }

        let text = std::str::from_utf8(record).map_err(|_| SerializationError::NotUtf8)?;
        if self.record_count > 0 {
            self.body.push(',');
        }
        // Stored records may carry trailing whitespace from the writer.
        self.body.push_str(text.trim());
        self.record_count += 1;
        self.record_bytes = new_size;
        Ok(true)
    }

    pub(crate) fn record_count(&self) -> usize {
        self.record_count
    }

    /// Close the batch array and stamp `sent_at`, so the collector can
    /// correct for local clock skew.
    pub(crate) fn finish(mut self) -> Result<(Vec<u8>, usize)> {
        if self.record_count == 0 {
            return Err(NetworkError::EmptyBatch.into());
        }
        self.body.push_str("],\"sent_at\":\"");
        self.body.push_str(&now_iso8601());
        self.body.push_str("\"}");
        Ok((self.body.into_bytes(), self.record_count))
    }
}
