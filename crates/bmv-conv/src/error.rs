use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvError {
    #[error("{what}: expected shape {expected:?}, got {got:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    #[error("{what} has a zero-sized dimension: {dims:?}")]
    ZeroDimension { what: &'static str, dims: Vec<usize> },
    #[error("kernel {kernel:?} does not fit input {input:?}")]
    KernelLargerThanInput {
        kernel: (usize, usize),
        input: (usize, usize),
    },
    #[error("weights expect {weights} input channels, inputs have {inputs}")]
    ChannelMismatch { weights: usize, inputs: usize },
    #[error("engine error: {0}")]
    Engine(#[from] bmv_core::EngineError),
}

pub type Result<T> = std::result::Result<T, ConvError>;
