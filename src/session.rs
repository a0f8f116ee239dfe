//! Owned handle on the integral library plus evaluation settings.

use std::sync::Arc;

use crate::native::NativeLibrary;

#[non_exhaustive]
#[derive(Debug, Clone, derive_builder::Builder)]
pub struct SessionConfig {
    /// Evaluate shell pairs with rayon.
    #[builder(default = true)]
    pub parallel: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig { parallel: true }
    }
}

/// Every dispatch goes through a session; layouts built with one session's
/// library are evaluated with the same library.
#[derive(Debug, Clone)]
pub struct CintSession {
    library: Arc<NativeLibrary>,
    config: SessionConfig,
}

impl CintSession {
    /// Session on the process-wide built-in library.
    pub fn new() -> Self {
        CintSession { library: NativeLibrary::global(), config: SessionConfig::default() }
    }

    pub fn with_library(library: Arc<NativeLibrary>, config: SessionConfig) -> Self {
        CintSession { library, config }
    }

    pub fn library(&self) -> &NativeLibrary {
        &self.library
    }

    pub(crate) fn library_handle(&self) -> Arc<NativeLibrary> {
        Arc::clone(&self.library)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

impl Default for CintSession {
    fn default() -> Self {
        CintSession::new()
    }
}
