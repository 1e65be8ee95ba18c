// Copyright 2026 The Projexa Project
// SPDX-License-Identifier: Apache-2.0

// Stream sanitizer and word budget
//
// Responsibilities:
// - Suppress fenced code blocks, including fences opened in one fragment
//   and closed in a later one
// - Detect fence markers whose backticks straddle a fragment boundary
// - Rewrite markdown links to their label; drop heading and list markers
// - Enforce a hard word budget across the whole stream

mod cleaner;
mod markdown;

pub use cleaner::{StreamCleaner, FENCE_MARKER};
pub use markdown::strip_markdown;
