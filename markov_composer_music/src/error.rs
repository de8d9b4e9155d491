// Error taxonomy for training, generation and configuration.
//
// Every stage fails synchronously with one of these kinds. Starvation during
// generation is deliberately absent: it is absorbed by the back-off in
// markov.rs and only shows up in the walk report.

/// Everything the composer can fail with.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No usable note events were supplied.
    #[error("no usable training notes")]
    EmptyInput,

    /// No training source was long enough to observe a single transition.
    #[error("order {order} needs at least {needed} states in one source, longest had {longest}", needed = .order + 1)]
    InsufficientData { order: usize, longest: usize },

    /// Chain order outside 1..=3.
    #[error("chain order {0} is outside the supported range 1..=3")]
    InvalidOrder(usize),

    /// Instrument profile whose lowest pitch is not below its highest.
    #[error("instrument '{name}' has a degenerate range {lowest}..={highest}")]
    DegenerateRange { name: String, lowest: u8, highest: u8 },

    #[error("unknown instrument '{0}'")]
    UnknownInstrument(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_message_names_the_requirement() {
        let err = Error::InsufficientData {
            order: 2,
            longest: 2,
        };
        assert_eq!(
            err.to_string(),
            "order 2 needs at least 3 states in one source, longest had 2"
        );
    }

    #[test]
    fn json_errors_convert() {
        let parse: std::result::Result<u8, _> = serde_json::from_str("nope");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Json(_)));
    }
}
