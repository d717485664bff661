// Assembles the passage context handed to generators

use crate::index::ScoredPassage;

const SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Copy)]
pub struct ContextBuilder {
    max_chars: usize,
}

impl ContextBuilder {
    #[inline]
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    /// Join passage contents in rank order, separated by blank lines, within
    /// the character budget. The passage that crosses the budget is cut and
    /// nothing after it is added.
    #[inline]
    pub fn build(&self, passages: &[ScoredPassage]) -> String {
        let mut context = String::new();
        let mut used = 0;

        for scored in passages {
            let content = scored.passage.content.trim();
            if content.is_empty() {
                continue;
            }

            let separator = if context.is_empty() { 0 } else { SEPARATOR.len() };
            let remaining = self.max_chars.saturating_sub(used + separator);
            if remaining == 0 {
                break;
            }

            if !context.is_empty() {
                context.push_str(SEPARATOR);
                used += separator;
            }

            let length = content.chars().count();
            if length <= remaining {
                context.push_str(content);
                used += length;
            } else {
                context.extend(content.chars().take(remaining));
                break;
            }
        }

        context
    }
}
