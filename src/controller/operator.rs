use std::io::{self, BufRead, Write};

use log::debug;

/// Pause point where the operator gets the chance to start the real server.
pub trait OperatorPrompt: Send + Sync {
    /// Shows `message` and returns once the operator acknowledged it.
    fn confirm(&self, message: &str) -> io::Result<()>;
}

/// Prints to standard output and waits for a line on standard input.
///
/// Blocks the calling thread, so the controller runs it on the blocking pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompt;

impl OperatorPrompt for StdinPrompt {
    fn confirm(&self, message: &str) -> io::Result<()> {
        let mut stdout = io::stdout();
        writeln!(stdout, "{}", message)?;
        stdout.flush()?;

        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "standard input closed before confirmation",
            ));
        }
        Ok(())
    }
}

/// Never waits.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPrompt;

impl OperatorPrompt for NoPrompt {
    fn confirm(&self, message: &str) -> io::Result<()> {
        debug!("Skipping prompt: {}", message);
        Ok(())
    }
}
