use colored::Colorize;
use std::io::{self, BufRead, Write};

/// Ask whether to re-send a failed request. Only asks on an interactive
/// terminal; anything but an explicit yes declines.
pub fn confirm_retry(reason: &str) -> bool {
    if !atty::is(atty::Stream::Stdin) || !atty::is(atty::Stream::Stderr) {
        return false;
    }

    eprint!("{}: {} Retry? [y/N] ", "error".red().bold(), reason);
    if io::stderr().flush().is_err() {
        return false;
    }

    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    is_yes(&answer)
}

fn is_yes(answer: &str) -> bool {
    matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes" | "s" | "si"
    )
}
