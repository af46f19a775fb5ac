//! Progress handlers for cancelling a compilation.

use std::error::Error;
use std::fmt;
use std::time::{Duration, Instant};

/// Polled by the compiler; returning `false` cancels the compilation.
pub trait DnnfHandler {
    /// Called once when the compilation starts.
    fn started(&mut self) {}

    /// Called after every Shannon expansion.
    fn shannon_expansion(&mut self) -> bool;
}

/// Never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopHandler;

impl DnnfHandler for NopHandler {
    fn shannon_expansion(&mut self) -> bool {
        true
    }
}

/// Cancels once more than `limit` Shannon expansions were made.
#[derive(Debug, Clone, Copy)]
pub struct ExpansionLimit {
    limit: u64,
    count: u64,
}

impl ExpansionLimit {
    pub fn new(limit: u64) -> Self {
        Self { limit, count: 0 }
    }

    /// Expansions seen so far.
    pub fn count(&self) -> u64 {
        self.count
    }
}

impl DnnfHandler for ExpansionLimit {
    fn started(&mut self) {
        self.count = 0;
    }

    fn shannon_expansion(&mut self) -> bool {
        self.count += 1;
        self.count <= self.limit
    }
}

/// Cancels once the wall-clock budget, counted from `started`, is spent.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutHandler {
    timeout: Duration,
    deadline: Option<Instant>,
}

impl TimeoutHandler {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: None,
        }
    }
}

impl DnnfHandler for TimeoutHandler {
    fn started(&mut self) {
        self.deadline = Some(Instant::now() + self.timeout);
    }

    fn shannon_expansion(&mut self) -> bool {
        match self.deadline {
            Some(deadline) => Instant::now() < deadline,
            None => true,
        }
    }
}

/// The compilation was cancelled by its handler.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "compilation cancelled by handler")
    }
}

impl Error for Cancelled {}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_expansion_limit() {
        let mut handler = ExpansionLimit::new(2);
        handler.started();
        assert!(handler.shannon_expansion());
        assert!(handler.shannon_expansion());
        assert!(!handler.shannon_expansion());
        assert_eq!(handler.count(), 3);
        handler.started();
        assert_eq!(handler.count(), 0);
    }

    #[test]
    fn test_timeout() {
        let mut handler = TimeoutHandler::new(Duration::ZERO);
        assert!(handler.shannon_expansion());
        handler.started();
        assert!(!handler.shannon_expansion());

        let mut handler = TimeoutHandler::new(Duration::from_secs(3600));
        handler.started();
        assert!(handler.shannon_expansion());
    }

    #[test]
    fn test_cancelled_display() {
        assert_eq!(Cancelled.to_string(), "compilation cancelled by handler");
    }
}
