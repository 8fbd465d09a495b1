/// Best similarity (0-100) between the shorter string and any equally long
/// window of the longer one.
pub fn partial_ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let needle: String = short.iter().collect();

    let mut best = 0.0_f64;
    for window in long.windows(short.len()) {
        let candidate: String = window.iter().collect();
        let score = strsim::normalized_levenshtein(&needle, &candidate);
        if score > best {
            best = score;
            if best >= 1.0 {
                break;
            }
        }
    }
    (best * 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substring_scores_full() {
        assert_eq!(partial_ratio("spotify", "com.spotify.music"), 100);
        assert_eq!(partial_ratio("com.android.chrome", "chrome"), 100);
    }

    #[test]
    fn typo_scores_high_unrelated_scores_low() {
        assert!(partial_ratio("spotfy", "spotify") >= 60);
        assert!(partial_ratio("xyz", "spotify") < 60);
    }

    #[test]
    fn empty_input_is_zero() {
        assert_eq!(partial_ratio("", "spotify"), 0);
        assert_eq!(partial_ratio("maps", ""), 0);
    }
}
