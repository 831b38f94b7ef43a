use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Capture launch error: {0}")]
    Launch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
