
// turns token sequences into (context, center) training pairs for CBOW and skip-gram.
// windows never cross sequence boundaries and boundary positions are dropped, not padded.

use crate::error::{EmbeddingError, Result};

/// Context windows of `2 * window_size` tokens together with the centre of each window.
/// Positions within `window_size` of either end are dropped, so a sequence of length `L`
/// yields `L - 2 * window_size` windows (none when `L <= 2 * window_size`).
pub fn build_current_surrounding_pairs<T: Clone>(indices: &[T], window_size: usize) -> Result<(Vec<Vec<T>>, Vec<T>)> {

    if window_size == 0 {
        return Err(EmbeddingError::invalid_parameter("window_size must be at least 1"));
    }

    let n = indices.len();
    if n <= 2 * window_size {
        return Ok((Vec::new(), Vec::new()));
    }

    let mut surroundings: Vec<Vec<T>> = Vec::with_capacity(n - 2 * window_size);
    let mut currents: Vec<T> = Vec::with_capacity(n - 2 * window_size);
    for i in window_size..n - window_size {
        let mut window = Vec::with_capacity(2 * window_size);
        window.extend_from_slice(&indices[i - window_size..i]);
        window.extend_from_slice(&indices[i + 1..=i + window_size]);
        surroundings.push(window);
        currents.push(indices[i].clone());
    }

    Ok((surroundings, currents))
}

/// Flattens every window into one (context token, centre) pair per context position.
pub fn expand_surrounding_words<T: Clone>(ix_surroundings: &[Vec<T>], ix_current: &[T]) -> Result<(Vec<T>, Vec<T>)> {

    if ix_surroundings.len() != ix_current.len() {
        return Err(EmbeddingError::size_mismatch("windows and centres", ix_surroundings.len(), ix_current.len()));
    }

    let mut expanded_surroundings = Vec::new();
    let mut expanded_current = Vec::new();
    for (window, current) in ix_surroundings.iter().zip(ix_current) {
        for context in window {
            expanded_surroundings.push(context.clone());
            expanded_current.push(current.clone());
        }
    }

    Ok((expanded_surroundings, expanded_current))
}

pub fn cbow_preprocessing(indices_list: &[Vec<usize>], window_size: usize) -> Result<(Vec<Vec<usize>>, Vec<usize>)> {
    let mut sources = Vec::new();
    let mut targets = Vec::new();
    for indices in indices_list {
        let (surrounding, current) = build_current_surrounding_pairs(indices, window_size)?;
        sources.extend(surrounding);
        targets.extend(current);
    }
    Ok((sources, targets))
}

pub fn skipgram_preprocessing(indices_list: &[Vec<usize>], window_size: usize) -> Result<(Vec<usize>, Vec<usize>)> {
    let mut sources = Vec::new();
    let mut targets = Vec::new();
    for indices in indices_list {
        let (surrounding, current) = build_current_surrounding_pairs(indices, window_size)?;
        let (surrounding_expanded, current_expanded) = expand_surrounding_words(&surrounding, &current)?;
        sources.extend(surrounding_expanded);
        targets.extend(current_expanded);
    }
    Ok((sources, targets))
}


#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn windows_on_words() {
        let text: Vec<&str> = "dogs and cats are playing".split(' ').collect();
        let (surroundings, currents) = build_current_surrounding_pairs(&text, 1).unwrap();
        assert_eq!(surroundings, vec![vec!["dogs", "cats"], vec!["and", "are"], vec!["cats", "playing"]]);
        assert_eq!(currents, vec!["and", "cats", "are"]);

        let (expanded, current) = expand_surrounding_words(&surroundings, &currents).unwrap();
        assert_eq!(expanded, vec!["dogs", "cats", "and", "are", "cats", "playing"]);
        assert_eq!(current, vec!["and", "and", "cats", "cats", "are", "are"]);
    }

    #[test]
    fn window_count_and_width() {
        let indices: Vec<usize> = (1..=9).collect();
        for window_size in 1..=4 {
            let (surroundings, currents) = build_current_surrounding_pairs(&indices, window_size).unwrap();
            assert_eq!(surroundings.len(), indices.len() - 2 * window_size);
            assert_eq!(currents.len(), indices.len() - 2 * window_size);
            assert!(surroundings.iter().all(|w| w.len() == 2 * window_size));
        }

        let (surroundings, currents) = build_current_surrounding_pairs(&indices, 2).unwrap();
        assert_eq!(surroundings[0], vec![1, 2, 4, 5]);
        assert_eq!(currents[0], 3);
    }

    #[test]
    fn short_sequences_yield_nothing() {
        let indices = vec![4, 5, 6, 7];
        let (surroundings, currents) = build_current_surrounding_pairs(&indices, 2).unwrap();
        assert!(surroundings.is_empty() && currents.is_empty());

        let (sources, targets) = skipgram_preprocessing(&[indices.clone(), vec![1]], 2).unwrap();
        assert!(sources.is_empty() && targets.is_empty());

        let (sources, targets) = cbow_preprocessing(&[indices], 3).unwrap();
        assert!(sources.is_empty() && targets.is_empty());
    }

    #[test]
    fn zero_window_is_rejected() {
        assert!(build_current_surrounding_pairs(&[1, 2, 3], 0).is_err());
    }

    #[test]
    fn corpus_pairs_do_not_cross_sequences() {
        let corpus = vec![vec![1, 2, 3], vec![4, 5, 6, 7]];
        let (sources, targets) = cbow_preprocessing(&corpus, 1).unwrap();
        assert_eq!(sources, vec![vec![1, 3], vec![4, 6], vec![5, 7]]);
        assert_eq!(targets, vec![2, 5, 6]);

        let (sources, targets) = skipgram_preprocessing(&corpus, 1).unwrap();
        assert_eq!(sources, vec![1, 3, 4, 6, 5, 7]);
        assert_eq!(targets, vec![2, 2, 5, 5, 6, 6]);
    }
}
