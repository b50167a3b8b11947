//! Interactive input for `@prompt`.

use crate::error::ErrorKind;
use anyhow::{Context, Result};
use colored::*;
use std::collections::BTreeMap;
use std::io::{BufRead, Write};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub name: String,
    pub message: String,
    /// `text`, `password` or `confirm`.
    pub kind: String,
}

impl Prompt {
    pub fn text(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { name: name.into(), message: message.into(), kind: "text".to_string() }
    }

    pub fn is_confirm(&self) -> bool {
        self.kind == "confirm"
    }
}

pub trait Prompter {
    /// Answers keyed by prompt name.
    fn ask(&self, prompts: &[Prompt]) -> Result<BTreeMap<String, String>>;
}

/// Refuses every question. Installed unless the host provides a prompter.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPrompter;

impl Prompter for NoPrompter {
    fn ask(&self, _prompts: &[Prompt]) -> Result<BTreeMap<String, String>> {
        crate::bail_eval!(ErrorKind::Prompt, "no prompter was installed")
    }
}

/// Line based prompter on stdin/stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompter;

impl StdinPrompter {
    fn read_answer<R: BufRead>(input: &mut R, prompt: &Prompt) -> Result<String> {
        let suffix = if prompt.is_confirm() { " (y/N)" } else { "" };
        print!("{} {}{} ", "?".cyan().bold(), prompt.message.bold(), suffix);
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let mut line = String::new();
        input
            .read_line(&mut line)
            .with_context(|| format!("Failed to read answer for '{}'", prompt.name))?;
        let answer = line.trim_end_matches(['\r', '\n']).to_string();

        if prompt.is_confirm() {
            let yes = matches!(answer.trim().to_lowercase().as_str(), "y" | "yes" | "true");
            return Ok(yes.to_string());
        }
        Ok(answer)
    }
}

impl Prompter for StdinPrompter {
    fn ask(&self, prompts: &[Prompt]) -> Result<BTreeMap<String, String>> {
        let stdin = std::io::stdin();
        let mut input = stdin.lock();
        let mut answers = BTreeMap::new();
        for prompt in prompts {
            let answer = Self::read_answer(&mut input, prompt)?;
            answers.insert(prompt.name.clone(), answer);
        }
        Ok(answers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalError;
    use std::io::Cursor;

    #[test]
    fn test_no_prompter_fails() {
        let err = NoPrompter.ask(&[Prompt::text("a", "A?")]).unwrap_err();
        assert_eq!(err.to_string(), "no prompter was installed");
        assert_eq!(EvalError::kind_of(&err), Some(ErrorKind::Prompt));
    }

    #[test]
    fn test_read_answer() {
        let mut input = Cursor::new("secret\r\n");
        let answer = StdinPrompter::read_answer(&mut input, &Prompt::text("pw", "Password")).unwrap();
        assert_eq!(answer, "secret");
    }

    #[test]
    fn test_read_confirm() {
        let prompt = Prompt { name: "go".into(), message: "Go?".into(), kind: "confirm".into() };
        let mut input = Cursor::new("Y\n");
        assert_eq!(StdinPrompter::read_answer(&mut input, &prompt).unwrap(), "true");
        let mut input = Cursor::new("\n");
        assert_eq!(StdinPrompter::read_answer(&mut input, &prompt).unwrap(), "false");
    }
}
