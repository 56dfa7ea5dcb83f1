// ABOUTME: Operator selection of tables and columns to migrate
// ABOUTME: Select-all / include-subset / exclude-subset decisions behind a pluggable provider

use anyhow::{bail, Context, Result};
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use std::collections::VecDeque;

/// How the operator wants to pick from a list of names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    All,
    Include,
    Exclude,
}

/// Source of operator decisions
///
/// [`TerminalSelector`] prompts on the terminal; [`ScriptedSelector`] replays
/// canned answers.
pub trait SelectionProvider {
    /// Pick a selection mode for `options`
    fn choose_mode(&mut self, items_name: &str, options: &[String]) -> Result<SelectionMode>;

    /// Read a comma or space separated list of names for a subset mode
    fn read_subset(&mut self, items_name: &str, mode: SelectionMode) -> Result<String>;

    /// Tell the operator which names were not recognised
    fn report_unknown(&mut self, unknown: &[String]);

    /// Ask a yes/no question
    fn confirm(&mut self, question: &str) -> Result<bool>;
}

/// Split operator input on commas and whitespace, dropping repeats
///
/// # Examples
///
/// ```
/// # use pg_table_migrator::interactive::parse_subset;
/// assert_eq!(parse_subset("a, b  c,a"), vec!["a", "b", "c"]);
/// assert!(parse_subset(" , ").is_empty());
/// ```
pub fn parse_subset(input: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in input.replace(',', " ").split_whitespace() {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Names in `subset` that are not among `options`
pub fn unknown_items(subset: &[String], options: &[String]) -> Vec<String> {
    subset
        .iter()
        .filter(|name| !options.contains(name))
        .cloned()
        .collect()
}

/// Resolve a validated subset against `options`
///
/// The result keeps the order of `options`.
pub fn apply_selection(mode: SelectionMode, options: &[String], subset: &[String]) -> Vec<String> {
    match mode {
        SelectionMode::All => options.to_vec(),
        SelectionMode::Include => options
            .iter()
            .filter(|name| subset.contains(name))
            .cloned()
            .collect(),
        SelectionMode::Exclude => options
            .iter()
            .filter(|name| !subset.contains(name))
            .cloned()
            .collect(),
    }
}

/// Ask the operator which of `options` to migrate
///
/// In subset modes the list is re-read until every name is one of `options`.
/// Select-all returns `options` unchanged.
pub fn ask_user_to_select<P: SelectionProvider + ?Sized>(
    provider: &mut P,
    items_name: &str,
    options: &[String],
) -> Result<Vec<String>> {
    let mode = provider.choose_mode(items_name, options)?;
    if mode == SelectionMode::All {
        return Ok(options.to_vec());
    }

    loop {
        let input = provider.read_subset(items_name, mode)?;
        let subset = parse_subset(&input);
        let unknown = unknown_items(&subset, options);

        if unknown.is_empty() {
            let selected = apply_selection(mode, options, &subset);
            tracing::info!("✓ Selected {} of {} {}", selected.len(), options.len(), items_name);
            return Ok(selected);
        }

        tracing::debug!("Rejected {} unknown {}", unknown.len(), items_name);
        provider.report_unknown(&unknown);
    }
}

/// Ask a yes/no question through the provider
pub fn ask_yes_no<P: SelectionProvider + ?Sized>(provider: &mut P, question: &str) -> Result<bool> {
    provider.confirm(question)
}

/// Terminal prompts built on dialoguer
#[derive(Default)]
pub struct TerminalSelector {
    theme: ColorfulTheme,
}

impl TerminalSelector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SelectionProvider for TerminalSelector {
    fn choose_mode(&mut self, items_name: &str, options: &[String]) -> Result<SelectionMode> {
        println!();
        println!("Choose {} to be migrated.", items_name);
        println!();
        println!("Possible options:");
        println!("{}", options.join(", "));
        println!();

        let choice = Select::with_theme(&self.theme)
            .with_prompt(format!("How should {} be selected?", items_name))
            .items(&["Select all", "Select subset", "Exclude subset"])
            .default(0)
            .interact()
            .with_context(|| format!("Failed to get {} selection mode", items_name))?;

        Ok(match choice {
            0 => SelectionMode::All,
            1 => SelectionMode::Include,
            _ => SelectionMode::Exclude,
        })
    }

    fn read_subset(&mut self, items_name: &str, mode: SelectionMode) -> Result<String> {
        let verb = if mode == SelectionMode::Exclude {
            "exclude"
        } else {
            "include"
        };

        Input::<String>::with_theme(&self.theme)
            .with_prompt(format!(
                "Input the {} to {} separated with commas",
                items_name, verb
            ))
            .allow_empty(true)
            .interact_text()
            .with_context(|| format!("Failed to read {} list", items_name))
    }

    fn report_unknown(&mut self, unknown: &[String]) {
        println!("ERROR. Unknown items: {}", unknown.join(", "));
    }

    fn confirm(&mut self, question: &str) -> Result<bool> {
        Confirm::with_theme(&self.theme)
            .with_prompt(question)
            .default(false)
            .interact()
            .context("Failed to get confirmation")
    }
}

/// One canned operator answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedAnswer {
    Mode(SelectionMode),
    Subset(String),
    Confirm(bool),
}

/// Selection provider that replays canned answers in order
///
/// Running out of answers, or meeting an answer of the wrong kind, is an
/// error rather than a hang.
#[derive(Debug, Default)]
pub struct ScriptedSelector {
    answers: VecDeque<ScriptedAnswer>,
    unknown_reports: Vec<Vec<String>>,
}

impl ScriptedSelector {
    pub fn new(answers: impl IntoIterator<Item = ScriptedAnswer>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            unknown_reports: Vec::new(),
        }
    }

    /// Every rejected name list, in the order it was reported
    pub fn unknown_reports(&self) -> &[Vec<String>] {
        &self.unknown_reports
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }

    fn next_answer(&mut self, expected: &str) -> Result<ScriptedAnswer> {
        match self.answers.pop_front() {
            Some(answer) => Ok(answer),
            None => bail!("No scripted answer left for {}", expected),
        }
    }
}

impl SelectionProvider for ScriptedSelector {
    fn choose_mode(&mut self, items_name: &str, _options: &[String]) -> Result<SelectionMode> {
        match self.next_answer(items_name)? {
            ScriptedAnswer::Mode(mode) => Ok(mode),
            other => bail!("Expected a selection mode for {}, got {:?}", items_name, other),
        }
    }

    fn read_subset(&mut self, items_name: &str, _mode: SelectionMode) -> Result<String> {
        match self.next_answer(items_name)? {
            ScriptedAnswer::Subset(input) => Ok(input),
            other => bail!("Expected a {} list, got {:?}", items_name, other),
        }
    }

    fn report_unknown(&mut self, unknown: &[String]) {
        self.unknown_reports.push(unknown.to_vec());
    }

    fn confirm(&mut self, question: &str) -> Result<bool> {
        match self.next_answer(question)? {
            ScriptedAnswer::Confirm(answer) => Ok(answer),
            other => bail!("Expected a yes/no answer to '{}', got {:?}", question, other),
        }
    }
}
