use std::convert::Infallible;

/// Receives one mono sample per clock tick from a named sound source.
pub trait SampleSink {
    type Err;

    /// Push a single sample produced by `source`.
    ///
    /// # Errors
    ///
    /// This method will return an error if the sink is unable to accept the sample.
    fn push_sample(&mut self, source: &str, sample: i32) -> Result<(), Self::Err>;
}

/// Sink that records every sample it receives, mostly useful for offline rendering and tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub samples: Vec<i32>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SampleSink for RecordingSink {
    type Err = Infallible;

    fn push_sample(&mut self, _source: &str, sample: i32) -> Result<(), Self::Err> {
        self.samples.push(sample);
        Ok(())
    }
}
