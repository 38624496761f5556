//! Recording [`Runner`] for tests: no process is ever spawned.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{Command, Error, Runner};

type Responder = dyn Fn(&Command) -> Result<String, Error> + Send + Sync;
type Delay = dyn Fn(&Command) -> std::time::Duration + Send + Sync;

pub struct MockRunner {
    calls: std::sync::Mutex<Vec<Command>>,
    responder: Box<Responder>,
    delay: Option<Box<Delay>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockRunner {
    /// Every command succeeds with empty output.
    pub fn new() -> Self {
        Self::with_responder(|_| Ok(String::new()))
    }

    pub fn with_responder(
        responder: impl Fn(&Command) -> Result<String, Error> + Send + Sync + 'static,
    ) -> Self {
        Self {
            calls: std::sync::Mutex::new(Vec::new()),
            responder: Box::new(responder),
            delay: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Keeps every command "running" for `delay`, so concurrent callers overlap.
    #[must_use]
    pub fn with_delay(self, delay: std::time::Duration) -> Self {
        self.with_delay_by(move |_| delay)
    }

    /// Like [`MockRunner::with_delay`], with the running time chosen per command.
    #[must_use]
    pub fn with_delay_by(
        mut self,
        delay: impl Fn(&Command) -> std::time::Duration + Send + Sync + 'static,
    ) -> Self {
        self.delay = Some(Box::new(delay));
        self
    }

    pub fn calls(&self) -> Vec<Command> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_to(&self, program: &str) -> Vec<Command> {
        self.calls()
            .into_iter()
            .filter(|command| command.get_program() == program)
            .collect()
    }

    /// Highest number of commands that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner for MockRunner {
    async fn run(&self, command: &Command) -> Result<String, Error> {
        self.calls.lock().unwrap().push(command.clone());
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = &self.delay {
            let delay = delay(command);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
        let result = (self.responder)(command);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// The error a real runner reports for a command exiting with `exit_code`.
pub fn process_error(command: &Command, exit_code: i32, stderr: &str) -> Error {
    Error::Process {
        command: command.to_string(),
        exit_code: Some(exit_code),
        stderr: stderr.to_string(),
    }
}
