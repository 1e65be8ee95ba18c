// Copyright 2026 The Projexa Project
// SPDX-License-Identifier: Apache-2.0

use super::markdown::strip_markdown;

/// Delimiter that opens and closes a fenced code block.
pub const FENCE_MARKER: &str = "```";

const TICK: char = '`';

/// Per-request sanitizer state. Feed fragments in arrival order through
/// [`clean`](Self::clean), then call [`finish`](Self::finish) once the
/// upstream ends.
///
/// Never share an instance between requests.
#[derive(Debug, Clone)]
pub struct StreamCleaner {
    /// Inside a fenced code block; nothing is emitted until it closes.
    in_fence: bool,
    /// Words still allowed out.
    word_budget: usize,
    /// Terminal: the budget is spent or the upstream ended.
    done: bool,
    /// Trailing backticks (1 or 2) held back from the previous fragment
    /// in case the next fragment completes a fence marker.
    pending_ticks: usize,
}

impl StreamCleaner {
    pub fn new(max_words: usize) -> Self {
        Self {
            in_fence: false,
            word_budget: max_words,
            done: false,
            pending_ticks: 0,
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn in_fence(&self) -> bool {
        self.in_fence
    }

    pub fn remaining_words(&self) -> usize {
        self.word_budget
    }

    /// Sanitize one fragment. Returns the text to emit, possibly empty.
    ///
    /// Kept words are joined by single spaces. A trailing space follows
    /// unless this fragment spent the last of the budget.
    pub fn clean(&mut self, fragment: &str) -> String {
        if self.done || fragment.is_empty() {
            return String::new();
        }
        let retained = self.strip_fences(fragment);
        let rewritten = strip_markdown(&retained);
        self.take_words(&rewritten)
    }

    /// Mark the stream as ended and flush held-back backticks that never
    /// became a fence marker. Further input is discarded.
    pub fn finish(&mut self) -> String {
        let held = std::mem::take(&mut self.pending_ticks);
        let flush = held > 0 && !self.in_fence && !self.done;
        self.done = true;
        if flush {
            self.take_words(&TICK.to_string().repeat(held))
        } else {
            String::new()
        }
    }

    /// Drop fenced content, toggling `in_fence` on every marker. Characters
    /// outside fences are kept in order.
    fn strip_fences(&mut self, fragment: &str) -> String {
        let mut text = TICK.to_string().repeat(self.pending_ticks);
        text.push_str(fragment);
        self.pending_ticks = 0;

        let mut out = String::with_capacity(text.len());
        let mut rest = text.as_str();
        while let Some(ch) = rest.chars().next() {
            if rest.starts_with(FENCE_MARKER) {
                self.in_fence = !self.in_fence;
                rest = &rest[FENCE_MARKER.len()..];
                continue;
            }
            if rest.len() < FENCE_MARKER.len() && rest.chars().all(|c| c == TICK) {
                // Could be the first half of a marker; decide on the next fragment.
                self.pending_ticks = rest.len();
                break;
            }
            if !self.in_fence {
                out.push(ch);
            }
            rest = &rest[ch.len_utf8()..];
        }
        out
    }

    fn take_words(&mut self, text: &str) -> String {
        if self.word_budget == 0 {
            self.done = true;
            return String::new();
        }

        let mut words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return String::new();
        }
        words.truncate(self.word_budget);
        self.word_budget -= words.len();
        if self.word_budget == 0 {
            self.done = true;
        }

        let mut out = words.join(" ");
        if !self.done {
            out.push(' ');
        }
        out
    }
}
