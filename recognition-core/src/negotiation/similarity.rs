//! Draft similarity used for convergence detection.

/// Character-position agreement over the longer string's length.
///
/// Two empty strings are identical (1.0). Positions are compared by
/// `char`, so multi-byte text is not penalised by its encoding.
pub fn similarity(previous: &str, current: &str) -> f64 {
    let a: Vec<char> = previous.chars().collect();
    let b: Vec<char> = current.chars().collect();

    let longer = a.len().max(b.len());
    if longer == 0 {
        return 1.0;
    }

    let agreeing = a.iter().zip(b.iter()).filter(|(x, y)| x == y).count();
    agreeing as f64 / longer as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_identical_and_empty() {
        assert_eq!(similarity("Try the base case first", "Try the base case first"), 1.0);
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("abc", ""), 0.0);
    }

    #[test]
    fn test_positional_agreement() {
        // 3 of 4 positions agree
        assert_eq!(similarity("abcd", "abcx"), 0.75);
        // shorter string only agrees on its prefix
        assert_eq!(similarity("abcd", "ab"), 0.5);
        // a one-character shift destroys positional agreement
        assert_eq!(similarity("abcd", "xabc"), 0.0);
    }

    proptest! {
        #[test]
        fn prop_identical_is_one(s in ".{0,200}") {
            prop_assert_eq!(similarity(&s, &s), 1.0);
        }

        #[test]
        fn prop_bounded_and_symmetric(a in ".{0,100}", b in ".{0,100}") {
            let forward = similarity(&a, &b);
            prop_assert!((0.0..=1.0).contains(&forward));
            prop_assert_eq!(forward, similarity(&b, &a));
        }
    }
}
