use serde::{Deserialize, Serialize};

/// Token count and rate for one sanitized runner output.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Throughput {
    pub token_count: usize,
    pub tokens_per_second: f64,
}

/// Token separator: Unicode whitespace plus the ASCII information separators `U+001C..=U+001F`.
pub fn is_separator(c: char) -> bool {
    c.is_whitespace() || ('\u{1c}'..='\u{1f}').contains(&c)
}

/// Count whitespace-separated tokens in `sanitized` and divide by the wall-clock duration.
///
/// A zero, negative or NaN duration yields a rate of `0.0` rather than a division fault.
pub fn measure(sanitized: &str, duration_s: f64) -> Throughput {
    let token_count = sanitized
        .split(is_separator)
        .filter(|t| !t.is_empty())
        .count();
    let tokens_per_second = if duration_s > 0.0 {
        token_count as f64 / duration_s
    } else {
        0.0
    };

    Throughput {
        token_count,
        tokens_per_second,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_over_positive_duration() {
        let t = measure("a b c", 2.0);
        assert_eq!(t.token_count, 3);
        assert_eq!(t.tokens_per_second, 1.5);
    }

    #[test]
    fn empty_text_zero_duration() {
        assert_eq!(
            measure("", 0.0),
            Throughput {
                token_count: 0,
                tokens_per_second: 0.0
            }
        );
    }

    #[test]
    fn zero_duration_means_zero_rate() {
        let t = measure("one two three four", 0.0);
        assert_eq!(t.token_count, 4);
        assert_eq!(t.tokens_per_second, 0.0);
    }

    #[test]
    fn nan_and_negative_durations_are_zero_rate() {
        assert_eq!(measure("a b", f64::NAN).tokens_per_second, 0.0);
        assert_eq!(measure("a b", -1.0).tokens_per_second, 0.0);
    }

    #[test]
    fn ascii_separator_controls_split_tokens() {
        assert_eq!(measure("a\x1fb", 1.0).token_count, 2);
        assert_eq!(measure("\x1c a\x1db\x1e c \x1f", 1.0).token_count, 3);
        assert_eq!(measure("a\u{a0}b\u{2003}c", 1.0).token_count, 3);
    }

    #[test]
    fn runs_of_mixed_whitespace_are_one_separator() {
        assert_eq!(measure(" a \t\n b\r\n\nc  ", 1.0).token_count, 3);
    }
}
