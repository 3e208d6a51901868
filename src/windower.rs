//! Word-budgeted block splitting with message overlap.
//!
//! Records are packed greedily into blocks. When the next record would push a
//! non-empty block past the word budget, the block is closed and the next one
//! is seeded with the trailing `overlap` records of the closed block, so each
//! split keeps some conversational context. A single record larger than the
//! budget is never split; it just produces an oversized block.

use crate::messages::{Block, ChatMessage};

/// Running state for one `window` call
struct BlockAccumulator<'a> {
    current: Block<'a>,
    words: usize,
}

impl<'a> BlockAccumulator<'a> {
    fn new() -> Self {
        Self {
            current: Vec::new(),
            words: 0,
        }
    }

    fn would_overflow(&self, words: usize, max_words: usize) -> bool {
        !self.current.is_empty() && self.words + words > max_words
    }

    /// Close the current block and reseed with its trailing `overlap` records
    fn flush(&mut self, overlap: usize) -> Block<'a> {
        let seed_start = self.current.len().saturating_sub(overlap);
        let seed: Block<'a> = self.current[seed_start..].to_vec();
        self.words = seed.iter().map(|m| m.word_count()).sum();
        std::mem::replace(&mut self.current, seed)
    }

    fn push(&mut self, msg: &'a ChatMessage, words: usize) {
        self.current.push(msg);
        self.words += words;
    }

    fn finish(self) -> Option<Block<'a>> {
        if self.current.is_empty() {
            None
        } else {
            Some(self.current)
        }
    }
}

/// Split ordered records into word-budgeted blocks.
///
/// The budget only gates when a block is closed: a reseeded overlap prefix
/// plus the record that triggered the flush may exceed it. `overlap` is
/// honored as given; callers clamp it.
pub fn window(records: &[ChatMessage], max_words: usize, overlap: usize) -> Vec<Block<'_>> {
    let mut blocks = Vec::new();
    let mut acc = BlockAccumulator::new();

    for msg in records {
        let words = msg.word_count();
        if acc.would_overflow(words, max_words) {
            blocks.push(acc.flush(overlap));
        }
        acc.push(msg, words);
    }

    if let Some(last) = acc.finish() {
        blocks.push(last);
    }

    blocks
}

/// Total words across a block
pub fn block_words(block: &[&ChatMessage]) -> usize {
    block.iter().map(|m| m.word_count()).sum()
}
