use super::model::{Label, LabelSequence};

/// Put the labels of the cleaned rows back at their original positions;
/// every dropped position is clear.
///
/// # Panics
///
/// If the bookkeeping does not line up: a dropped index out of range, a
/// repeated dropped index, or a label count that differs from the number
/// of kept positions. These are defects in the caller, not data problems.
pub fn reconstruct(original_len: usize, dropped: &[usize], cleaned_labels: &[Label]) -> LabelSequence {
    let mut is_dropped = vec![false; original_len];
    for &i in dropped {
        assert!(i < original_len, "dropped index {i} out of range for length {original_len}");
        assert!(!is_dropped[i], "dropped index {i} listed twice");
        is_dropped[i] = true;
    }
    assert_eq!(
        original_len - dropped.len(),
        cleaned_labels.len(),
        "kept positions and cleaned labels disagree"
    );

    let mut kept = cleaned_labels.iter();
    is_dropped
        .into_iter()
        .map(|dropped| {
            if dropped {
                Label::Clear
            } else {
                // Counts were checked above.
                *kept.next().unwrap_or(&Label::Clear)
            }
        })
        .collect()
}
