use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, Result};

/// Cooperative interrupt flag, checked between whole units of work.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag armed by Ctrl-C. Only one handler can be installed per process.
    pub fn install_ctrlc() -> std::result::Result<Self, ctrlc::Error> {
        let flag = Self::new();
        let c2 = flag.cancelled.clone();
        ctrlc::set_handler(move || {
            c2.store(true, Ordering::SeqCst);
        })?;
        Ok(flag)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}
