// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::str::FromStr;

use crate::config::NodeConfig;
use crate::engine::NodeContext;
use crate::errors::NodeResult;
use crate::packet::PayloadType;
use crate::traits::{Node, NodeContract, ProcessOutcome};

/// Words kept lowercase by title case unless they open the text.
const TITLE_SMALL_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaseMode {
    #[default]
    Upper,
    Lower,
    /// First letter of each word capitalized
    Proper,
    /// Proper case that leaves articles and short prepositions lowercase
    Title,
}

impl FromStr for CaseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upper" => Ok(CaseMode::Upper),
            "lower" => Ok(CaseMode::Lower),
            "proper" => Ok(CaseMode::Proper),
            "title" => Ok(CaseMode::Title),
            other => Err(format!("Unknown case mode: {}", other)),
        }
    }
}

impl CaseMode {
    pub fn apply(self, input: &str) -> String {
        match self {
            CaseMode::Upper => input.to_uppercase(),
            CaseMode::Lower => input.to_lowercase(),
            CaseMode::Proper => input
                .split_whitespace()
                .map(capitalize)
                .collect::<Vec<_>>()
                .join(" "),
            CaseMode::Title => input
                .split_whitespace()
                .enumerate()
                .map(|(i, word)| {
                    let lower = word.to_lowercase();
                    if i > 0 && TITLE_SMALL_WORDS.contains(&lower.as_str()) {
                        lower
                    } else {
                        capitalize(word)
                    }
                })
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
    }
}

/// Changes the case of text packets, optionally prepending the `prefix`
/// side packet.
#[derive(Debug, Clone)]
pub struct TextCaseNode {
    mode: CaseMode,
}

impl TextCaseNode {
    pub fn new(mode: CaseMode) -> Self {
        Self { mode }
    }

    pub fn from_config(config: &NodeConfig) -> Result<Self, String> {
        let mode = config
            .option_str("mode")
            .map(CaseMode::from_str)
            .transpose()?
            .unwrap_or_default();
        Ok(Self::new(mode))
    }
}

impl Node for TextCaseNode {
    fn contract(&self) -> NodeContract {
        NodeContract::new()
            .input("in", PayloadType::Text)
            .output("out", PayloadType::Text)
            .optional_input_side_packet("prefix", PayloadType::Text)
    }

    fn process(&self, cx: &mut NodeContext<'_>) -> NodeResult<ProcessOutcome> {
        if !cx.has_input("in") {
            return Ok(ProcessOutcome::NoOutput);
        }
        let converted = self.mode.apply(cx.input("in")?.get::<String>()?);
        let text = if cx.has_side_packet("prefix") {
            format!("{}{}", cx.side_packet("prefix")?.get::<String>()?, converted)
        } else {
            converted
        };
        cx.emit("out", text)?;
        Ok(ProcessOutcome::Processed)
    }

    fn name(&self) -> &'static str {
        "text_case"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_modes() {
        let test_cases = vec![
            (CaseMode::Upper, "hello World", "HELLO WORLD"),
            (CaseMode::Lower, "Hello WORLD", "hello world"),
            (CaseMode::Proper, "hello  wORLD of rust", "Hello World Of Rust"),
            (CaseMode::Title, "the lord of the rings", "The Lord of the Rings"),
            (CaseMode::Title, "", ""),
        ];

        for (mode, input, expected) in test_cases {
            assert_eq!(mode.apply(input), expected, "{:?} on '{}'", mode, input);
        }
    }

    #[test]
    fn test_mode_from_options() {
        let config = NodeConfig::new("t", "text_case").with_option("mode", "title");
        assert_eq!(TextCaseNode::from_config(&config).unwrap().mode, CaseMode::Title);

        let config = NodeConfig::new("t", "text_case");
        assert_eq!(TextCaseNode::from_config(&config).unwrap().mode, CaseMode::Upper);

        let config = NodeConfig::new("t", "text_case").with_option("mode", "shouty");
        assert_eq!(
            TextCaseNode::from_config(&config).unwrap_err(),
            "Unknown case mode: shouty"
        );
    }
}
