use crate::error::FetchError;

#[derive(Debug, Clone, Copy)]
pub struct BodyLimit {
    max: u64,
    received: u64,
}

impl BodyLimit {
    pub fn new(max: u64) -> Self {
        Self { max, received: 0 }
    }

    pub fn check_declared(&self, content_length: Option<u64>) -> Result<(), FetchError> {
        match content_length {
            Some(size) if size > self.max => Err(FetchError::TooLarge {
                size,
                max: self.max,
            }),
            _ => Ok(()),
        }
    }

    /// Counts a chunk before it is kept; fails as soon as the total passes the cap.
    pub fn accept(&mut self, chunk_len: usize) -> Result<(), FetchError> {
        let next = self.received.saturating_add(chunk_len as u64);
        if next > self.max {
            return Err(FetchError::TooLarge {
                size: next,
                max: self.max,
            });
        }
        self.received = next;
        Ok(())
    }

    pub fn received(&self) -> u64 {
        self.received
    }
}
