//! Fault: the error value carried by a rejected observation.
//!
//! A fault is stored once and handed to every observer, so it has to be
//! cheap to clone. It wraps the producer's error in an `Arc` and never
//! re-wraps or stringifies it: `downcast_ref` gets the original type back and
//! `ptr_eq` tells whether two faults are the same instance.

use std::any::Any;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};

/// A panic caught while running a block or a transform.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("panicked: {message}")]
pub struct Panicked {
    pub message: String,
}

#[derive(Clone)]
pub struct Fault {
    inner: Arc<dyn Error + Send + Sync + 'static>,
}

impl Fault {
    pub fn new<E>(error: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(error),
        }
    }

    /// Build a fault from a `catch_unwind` payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::new(Panicked { message })
    }

    /// Same underlying error instance?
    pub fn ptr_eq(&self, other: &Fault) -> bool {
        // Compare data pointers only; vtables may differ across codegen units.
        std::ptr::addr_eq(Arc::as_ptr(&self.inner), Arc::as_ptr(&other.inner))
    }

    pub fn is<E: Error + 'static>(&self) -> bool {
        self.inner.is::<E>()
    }

    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }

    pub fn is_panic(&self) -> bool {
        self.is::<Panicked>()
    }

    pub fn as_error(&self) -> &(dyn Error + Send + Sync + 'static) {
        &*self.inner
    }
}

impl<E> From<E> for Fault
where
    E: Error + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Fault::new(error)
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner, f)
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.inner, f)
    }
}

impl Serialize for Fault {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
