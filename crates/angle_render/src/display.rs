use crate::board::AngleResult;

/// Which view to show for a selection.
///
/// The selected view if it has an image; otherwise the closest view that does,
/// searching outward one step at a time, right before left, wrapping around.
/// `None` when nothing has rendered yet.
pub fn displayed_index(results: &[AngleResult], selected: usize) -> Option<usize> {
    nearest_with(results.len(), selected, |i| results[i].has_image())
}

pub fn nearest_with(
    len: usize,
    selected: usize,
    has_image: impl Fn(usize) -> bool,
) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let selected = selected % len;
    if has_image(selected) {
        return Some(selected);
    }
    for offset in 1..=len / 2 {
        let right = (selected + offset) % len;
        if has_image(right) {
            return Some(right);
        }
        let left = (selected + len - offset) % len;
        if left != right && has_image(left) {
            return Some(left);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(flags: &'static [bool]) -> impl Fn(usize) -> bool {
        move |i| flags[i]
    }

    #[test]
    fn selected_with_image_is_shown() {
        assert_eq!(nearest_with(4, 2, lookup(&[false, false, true, false])), Some(2));
    }

    #[test]
    fn falls_back_to_nearest_neighbour() {
        // done, queued, queued, done
        let flags = &[true, false, false, true];
        assert_eq!(nearest_with(4, 1, lookup(flags)), Some(0));
        assert_eq!(nearest_with(4, 2, lookup(flags)), Some(3));
    }

    #[test]
    fn right_wins_ties() {
        let flags = &[false, true, false, true, false];
        assert_eq!(nearest_with(5, 2, lookup(flags)), Some(3));
    }

    #[test]
    fn wraps_around_the_ends() {
        let flags = &[false, false, false, false, false, false, false, true];
        assert_eq!(nearest_with(8, 0, lookup(flags)), Some(7));
        assert_eq!(nearest_with(8, 1, lookup(flags)), Some(7));
    }

    #[test]
    fn nothing_rendered() {
        assert_eq!(nearest_with(3, 1, lookup(&[false, false, false])), None);
        assert_eq!(nearest_with(0, 0, |_| true), None);
    }

    #[test]
    fn out_of_range_selection_wraps() {
        assert_eq!(nearest_with(4, 6, lookup(&[false, false, true, false])), Some(2));
    }
}
