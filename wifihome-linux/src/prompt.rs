//! Terminal prompts for the gated commands. Answers given on the command line skip the prompt.

use std::io::{BufRead, IsTerminal, Write};

use console::Term;
use wifihome_core::{PromptOutcome, Prompter};

pub struct TerminalPrompter<R> {
    input: R,
    /// Set when stdin is a terminal; secrets are then read without echo.
    term: Option<Term>,
    secret: Option<String>,
    assume_yes: bool,
}

impl TerminalPrompter<std::io::StdinLock<'static>> {
    pub fn stdin(secret: Option<String>, assume_yes: bool) -> Self {
        let mut p = Self::new(std::io::stdin().lock(), secret, assume_yes);
        p.term = secret_terminal(std::io::stdin().is_terminal());
        p
    }
}

fn secret_terminal(interactive: bool) -> Option<Term> {
    interactive.then(Term::stderr)
}

impl<R: BufRead> TerminalPrompter<R> {
    pub fn new(input: R, secret: Option<String>, assume_yes: bool) -> Self {
        Self {
            input,
            term: None,
            secret,
            assume_yes,
        }
    }

    fn ask_hidden(&mut self, title: &str, message: &str) -> Option<String> {
        let Some(term) = &self.term else {
            return self.ask(title, message);
        };
        term.write_str(&format!("{title}: {message} ")).ok()?;
        term.read_secure_line().ok()
    }

    /// One trimmed line, or `None` on EOF / read error.
    fn ask(&mut self, title: &str, message: &str) -> Option<String> {
        let mut err = std::io::stderr();
        let _ = write!(err, "{title}: {message} ");
        let _ = err.flush();
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
        }
    }
}

impl<R: BufRead> Prompter for TerminalPrompter<R> {
    fn prompt_secret(&mut self, title: &str, message: &str) -> PromptOutcome {
        if let Some(s) = self.secret.take() {
            return PromptOutcome::Answered(s);
        }
        match self.ask_hidden(title, message) {
            Some(s) if !s.is_empty() => PromptOutcome::Answered(s),
            _ => PromptOutcome::Cancelled,
        }
    }

    fn confirm(&mut self, title: &str, message: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        matches!(
            self.ask(title, &format!("{message} [y/N]")).as_deref().map(str::trim),
            Some("y" | "Y" | "yes")
        )
    }
}
