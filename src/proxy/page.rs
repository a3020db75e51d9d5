//! Page-number to URL templating for paginated listings

use serde::{Deserialize, Serialize};

/// Placeholder substituted with the formatted page token
pub const PAGE_PLACEHOLDER: &str = "{PAGENO}";

/// Side on which padding characters are inserted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PadDirection {
    #[default]
    Left,
    Right,
}

/// Describes how a page index maps into a source URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInstruction {
    pub template: String,
    pub pad_char: char,
    pub pad_length: usize,
    pub pad_direction: PadDirection,
    pub start_page: u32,
}

impl PageInstruction {
    /// Unpadded instruction starting at page 1
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
            pad_char: '0',
            pad_length: 0,
            pad_direction: PadDirection::Left,
            start_page: 1,
        }
    }

    /// Instruction for a source with a single fixed URL
    pub fn single(url: &str) -> Self {
        Self::new(url).with_start_page(0)
    }

    pub fn with_padding(mut self, pad_char: char, pad_length: usize, direction: PadDirection) -> Self {
        self.pad_char = pad_char;
        self.pad_length = pad_length;
        self.pad_direction = direction;
        self
    }

    pub fn with_start_page(mut self, start_page: u32) -> Self {
        self.start_page = start_page;
        self
    }

    pub fn with_template(mut self, template: &str) -> Self {
        self.template = template.to_string();
        self
    }

    /// Whether successive pages map to distinct URLs
    pub fn is_paginated(&self) -> bool {
        self.template.contains(PAGE_PLACEHOLDER)
    }

    /// The padded page fragment. Indexes wider than the pad length are kept whole.
    pub fn token(&self, page: u32) -> String {
        let digits = page.to_string();
        let width = digits.chars().count();
        if width >= self.pad_length {
            return digits;
        }

        let padding: String = std::iter::repeat(self.pad_char)
            .take(self.pad_length - width)
            .collect();
        match self.pad_direction {
            PadDirection::Left => format!("{}{}", padding, digits),
            PadDirection::Right => format!("{}{}", digits, padding),
        }
    }

    /// The full URL of the given page
    pub fn format(&self, page: u32) -> String {
        self.template.replace(PAGE_PLACEHOLDER, &self.token(page))
    }
}
