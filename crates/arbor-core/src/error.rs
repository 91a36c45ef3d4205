use std::fmt;
use std::rc::Rc;

use crate::applier::HostError;

/// A thrown value travelling through the component tree.
///
/// Cloning shares the underlying error; equality is identity, so a boundary
/// can tell whether it is looking at the error it already caught.
#[derive(Clone)]
pub struct CapturedError(Rc<anyhow::Error>);

impl CapturedError {
    pub fn new(error: impl Into<anyhow::Error>) -> Self {
        Self(Rc::new(error.into()))
    }

    pub fn inner(&self) -> &anyhow::Error {
        &self.0
    }

    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.0.downcast_ref::<E>()
    }

    pub fn ptr_eq(&self, other: &CapturedError) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl From<anyhow::Error> for CapturedError {
    fn from(error: anyhow::Error) -> Self {
        Self(Rc::new(error))
    }
}

impl PartialEq for CapturedError {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for CapturedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for CapturedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

/// Where a caught error came from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Component names from the failing component outward.
    pub component_stack: Vec<&'static str>,
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for name in &self.component_stack {
            writeln!(f, "    in <{name}>")?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No boundary handled the error; the last committed host tree is intact.
    #[error("uncaught error: {0}")]
    Uncaught(CapturedError),
    #[error(transparent)]
    Host(#[from] HostError),
    #[error("pending work did not settle after {0} rounds")]
    Unsettled(usize),
}

impl Error {
    /// The thrown value, when this is an uncaught component error.
    pub fn captured(&self) -> Option<&CapturedError> {
        match self {
            Error::Uncaught(error) => Some(error),
            _ => None,
        }
    }
}

impl From<CapturedError> for Error {
    fn from(error: CapturedError) -> Self {
        Error::Uncaught(error)
    }
}
