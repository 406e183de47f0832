//! Configuration options for constdb writers and readers.

/// Default capacity of the write buffer (64KB).
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 64 * 1024;

/// Default read granularity when streaming a file through the checksum (64KB).
pub const DEFAULT_CHECKSUM_CHUNK_SIZE: usize = 64 * 1024;

/// Configuration options for building and opening a database.
///
/// None of these settings affect the file format.
#[derive(Debug, Clone)]
pub struct Options {
    /// Capacity of the buffer between the writer and the backing medium.
    /// Default: 64KB
    pub write_buffer_size: usize,

    /// Number of bytes read at a time while computing or verifying the
    /// checksum trailer.
    /// Default: 64KB
    pub checksum_chunk_size: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
            checksum_chunk_size: DEFAULT_CHECKSUM_CHUNK_SIZE,
        }
    }
}

impl Options {
    /// Creates a new Options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the write buffer capacity.
    pub fn write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }

    /// Sets the checksum streaming chunk size.
    pub fn checksum_chunk_size(mut self, size: usize) -> Self {
        self.checksum_chunk_size = size;
        self
    }

    /// Validates the options and returns an error if any are invalid.
    pub fn validate(&self) -> crate::Result<()> {
        if self.write_buffer_size == 0 {
            return Err(crate::Error::invalid_argument("write_buffer_size must be > 0"));
        }
        if self.checksum_chunk_size == 0 {
            return Err(crate::Error::invalid_argument("checksum_chunk_size must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = Options::default();
        assert_eq!(opts.write_buffer_size, 64 * 1024);
        assert_eq!(opts.checksum_chunk_size, 64 * 1024);
    }

    #[test]
    fn test_options_builder() {
        let opts = Options::new().write_buffer_size(4096).checksum_chunk_size(512);

        assert_eq!(opts.write_buffer_size, 4096);
        assert_eq!(opts.checksum_chunk_size, 512);
    }

    #[test]
    fn test_options_validation() {
        let mut opts = Options::default();
        assert!(opts.validate().is_ok());

        opts.write_buffer_size = 0;
        assert!(opts.validate().is_err());

        opts.write_buffer_size = 1024;
        opts.checksum_chunk_size = 0;
        assert!(opts.validate().is_err());
    }
}
