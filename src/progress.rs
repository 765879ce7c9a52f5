use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const FRAMES: [char; 4] = ['|', '/', '-', '\\'];

/// Redraws `prompt` plus a spinning frame on stderr until stopped.
pub struct Spinner {
    prompt: String,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Spinner {
    pub fn start(prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        let stop = Arc::new(AtomicBool::new(false));
        let s2 = stop.clone();
        let p2 = prompt.clone();
        let handle = thread::spawn(move || {
            let mut i = 0;
            while !s2.load(Ordering::Relaxed) {
                let mut err = std::io::stderr().lock();
                let _ = write!(err, "\r{p2} {}", FRAMES[i % FRAMES.len()]);
                let _ = err.flush();
                drop(err);
                thread::sleep(Duration::from_millis(100));
                i += 1;
            }
        });
        Self {
            prompt,
            stop,
            handle: Some(handle),
        }
    }

    pub fn finish(mut self, outcome: &str) {
        self.halt();
        eprintln!("\r{} {outcome}", self.prompt);
    }

    fn halt(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.halt();
    }
}
