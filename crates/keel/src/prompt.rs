//! Interactive confirmation on the terminal.

use std::io::{self, BufRead, Write};

use keel_core::Confirm;

/// Asks on stdout and reads the answer from stdin.
///
/// Anything but `y`/`yes` declines, including end of input.
pub struct TerminalPrompt;

impl Confirm for TerminalPrompt {
    fn confirm(&self, prompt: &str) -> bool {
        print!("{prompt} [y/N] ");
        if io::stdout().flush().is_err() {
            return false;
        }

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(0) | Err(_) => {
                println!();
                false
            }
            Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
        }
    }
}
