use std::time::Duration;

use tokio::time::Instant;

/// Releases text no faster than a target number of words per minute.
///
/// The first chunk goes out immediately; each later chunk waits until every
/// word released so far has had its share of time.
#[derive(Debug)]
pub struct WordPacer {
    per_word: Duration,
    started: Option<Instant>,
    words: u64,
}

impl WordPacer {
    pub fn new(target_wpm: u32) -> Self {
        let wpm = f64::from(target_wpm.max(1));
        Self {
            per_word: Duration::from_secs_f64(60.0 / wpm),
            started: None,
            words: 0,
        }
    }

    pub fn per_word(&self) -> Duration {
        self.per_word
    }

    /// Wait for `text`'s turn, then count its words as released.
    pub async fn pace(&mut self, text: &str) {
        let started = *self.started.get_or_insert_with(Instant::now);
        let due = started + self.per_word.mul_f64(self.words as f64);
        tokio::time::sleep_until(due).await;
        self.words += count_words(text);
    }
}

fn count_words(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_word_budget() {
        assert_eq!(WordPacer::new(600).per_word(), Duration::from_millis(100));
        assert_eq!(WordPacer::new(60).per_word(), Duration::from_secs(1));
        // Zero would divide by zero; it is treated as one word a minute.
        assert_eq!(WordPacer::new(0).per_word(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_paces_by_released_words() {
        let mut pacer = WordPacer::new(600);
        let start = Instant::now();

        pacer.pace("hello world").await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        pacer.pace("again").await;
        assert!(start.elapsed() >= Duration::from_millis(200));

        pacer.pace("done").await;
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_whitespace_only_chunks_cost_nothing() {
        let mut pacer = WordPacer::new(600);
        let start = Instant::now();

        pacer.pace("  ").await;
        pacer.pace("\n").await;
        pacer.pace("word").await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
