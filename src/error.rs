use std::error::Error as StdError;
use std::path::PathBuf;

use thiserror::Error;

pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Failure of one letter generation, tagged by the stage that failed.
#[derive(Debug, Error)]
pub enum LetterError {
    /// The purchase request is not a readable `.docx`.
    #[error("cannot read purchase request {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    /// The letter template is missing or not a readable `.docx`.
    #[error("cannot open letter template {}", .path.display())]
    Template {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("cannot fill letter template")]
    Fill {
        #[source]
        source: BoxError,
    },

    #[error("cannot write letter {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: BoxError,
    },
}

impl LetterError {
    pub fn parse(path: impl Into<PathBuf>, err: anyhow::Error) -> Self {
        Self::Parse {
            path: path.into(),
            source: err.into(),
        }
    }

    pub fn template(path: impl Into<PathBuf>, err: anyhow::Error) -> Self {
        Self::Template {
            path: path.into(),
            source: err.into(),
        }
    }

    pub fn fill(err: anyhow::Error) -> Self {
        Self::Fill { source: err.into() }
    }

    pub fn write(path: impl Into<PathBuf>, err: anyhow::Error) -> Self {
        Self::Write {
            path: path.into(),
            source: err.into(),
        }
    }

    /// This error and all of its causes, joined with `": "`.
    pub fn chain(&self) -> String {
        let mut out = self.to_string();
        let mut cur = self.source();
        while let Some(err) = cur {
            out.push_str(": ");
            out.push_str(&err.to_string());
            cur = err.source();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::LetterError;
    use anyhow::Context;

    #[test]
    fn chain_includes_causes() {
        let err: anyhow::Result<()> =
            Err(anyhow::anyhow!("invalid Zip archive")).context("open docx: pr.docx");
        let err = LetterError::parse("uploads/pr.docx", err.expect_err("error"));
        let chain = err.chain();
        assert!(chain.starts_with("cannot read purchase request uploads/pr.docx"));
        assert!(chain.contains("open docx: pr.docx"));
        assert!(chain.contains("invalid Zip archive"));
    }
}
