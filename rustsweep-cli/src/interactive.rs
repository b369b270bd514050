use anyhow::{bail, Result};
use colored::Colorize;
use rustsweep::{JobSpec, OperationKind};
use std::collections::VecDeque;
use std::io::{BufRead, Write};

/// Reads whitespace-separated answers from a terminal-like input
pub struct Prompter<R, W> {
    input: R,
    output: W,
    pending: VecDeque<String>,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            pending: VecDeque::new(),
        }
    }

    fn ask(&mut self, question: &str) -> Result<String> {
        write!(self.output, "{}", question)?;
        self.output.flush()?;
        self.next_token()
    }

    fn next_token(&mut self) -> Result<String> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Ok(token);
            }
            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                bail!("input closed before the job was fully described");
            }
            self.pending
                .extend(line.split_whitespace().map(str::to_string));
        }
    }

    fn ask_whole_word(&mut self) -> Result<bool> {
        loop {
            let answer = self.ask("\nDo you want to search a whole word? (Y | N): ")?;
            match answer.as_str() {
                "Y" | "y" => return Ok(true),
                "N" | "n" => return Ok(false),
                _ => writeln!(
                    self.output,
                    "\n{}",
                    "Invalid input! Please enter a valid input.".yellow()
                )?,
            }
        }
    }

    fn ask_operation(&mut self) -> Result<OperationKind> {
        let mut menu = String::from("\nSelect an option:\n");
        for op in OperationKind::ALL {
            menu.push_str(&format!("{}. {}\n", op.selector(), op.name()));
        }
        menu.push_str("\nEnter your option: ");

        loop {
            let answer = self.ask(&menu)?;
            match answer.parse::<u8>().ok().and_then(OperationKind::from_selector) {
                Some(op) => return Ok(op),
                None => writeln!(
                    self.output,
                    "\n{}",
                    "Invalid option. Please select a valid input.".yellow()
                )?,
            }
        }
    }

    /// Walks the whole-word question, the operation menu and the pattern prompts
    pub fn collect_job(&mut self) -> Result<JobSpec> {
        let whole_word = self.ask_whole_word()?;
        let operation = self.ask_operation()?;

        let spec = match operation {
            OperationKind::Count => {
                let pattern = self.ask("\nEnter a word to count: ")?;
                JobSpec::count(pattern, whole_word)?
            }
            OperationKind::SearchCaseSensitive => {
                let pattern = self.ask("\nEnter a word to search (Case Sensitive): ")?;
                JobSpec::search(pattern, true, whole_word)?
            }
            OperationKind::SearchCaseInsensitive => {
                let pattern = self.ask("\nEnter a word to search (Case Insensitive): ")?;
                JobSpec::search(pattern, false, whole_word)?
            }
            OperationKind::SearchRegex => {
                let pattern = self.ask("\nEnter a word to search (Regular Expression): ")?;
                JobSpec::regex(pattern, whole_word)?
            }
            OperationKind::Replace => {
                let pattern = self.ask("\nEnter a word to search: ")?;
                let replacement = self.ask("\nEnter a word to replace: ")?;
                JobSpec::replace(pattern, replacement, whole_word)?
            }
        };
        writeln!(self.output)?;
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn collect(input: &str) -> (Result<JobSpec>, String) {
        let mut output = Vec::new();
        let result = Prompter::new(Cursor::new(input.as_bytes()), &mut output).collect_job();
        (result, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_count_flow() {
        let (spec, output) = collect("Y\n1\ncat\n");
        let spec = spec.unwrap();
        assert_eq!(spec.operation, OperationKind::Count);
        assert_eq!(spec.pattern, "cat");
        assert!(spec.whole_word);
        assert!(output.contains("1. Count\n2. Search (Case Sensitive)"));
        assert!(output.contains("Enter a word to count: "));
    }

    #[test]
    fn test_replace_flow_on_one_line() {
        let (spec, _) = collect("n 5 cat dog\n");
        let spec = spec.unwrap();
        assert_eq!(spec.operation, OperationKind::Replace);
        assert_eq!(spec.replacement.as_deref(), Some("dog"));
        assert!(!spec.whole_word);
    }

    #[test]
    fn test_invalid_answers_are_asked_again() {
        let (spec, output) = collect("maybe\nN\n9\n3\nCat\n");
        assert_eq!(spec.unwrap().operation, OperationKind::SearchCaseInsensitive);
        assert!(output.contains("Invalid input! Please enter a valid input."));
        assert!(output.contains("Invalid option. Please select a valid input."));
    }

    #[test]
    fn test_closed_input_fails() {
        let (spec, _) = collect("Y\n4\n");
        assert!(spec.is_err());
    }

    #[test]
    fn test_overlong_pattern_is_rejected() {
        let input = format!("N\n1\n{}\n", "a".repeat(100));
        let (spec, _) = collect(&input);
        assert!(spec.is_err());
    }
}
