use std::cmp::Ordering;

/// Where a probe value falls in a sorted slice.
#[derive(Debug, PartialEq)]
pub enum SearchResult {
    /// The value is at this index.
    Exact(usize),
    /// The value would insert at this index (a strictly larger element
    /// exists there); the predecessor is at `index - 1`.
    LeftOf(usize),
    /// The value is smaller than every element.
    LowerBound(usize),
    /// The value is larger than every element.
    UpperBound(usize),
}

impl SearchResult {
    #[allow(dead_code)]
    pub fn get_index(&self) -> usize {
        match self {
            SearchResult::Exact(idx) => *idx,
            SearchResult::LeftOf(idx) => *idx,
            SearchResult::LowerBound(idx) => *idx,
            SearchResult::UpperBound(idx) => *idx,
        }
    }
}

/// Binary search over a sorted slice, classifying where `new_val` lands.
pub fn search_sorted<T: Ord>(vec: &[T], new_val: T) -> SearchResult {
    let mut left = 0;
    let mut right = vec.len();
    while left < right {
        let mid = left + (right - left) / 2;

        match vec[mid].cmp(&new_val) {
            Ordering::Less => left = mid + 1,
            Ordering::Greater => right = mid,
            Ordering::Equal => return SearchResult::Exact(mid),
        }
    }

    if left == 0 {
        SearchResult::LowerBound(left)
    } else if left < vec.len() {
        SearchResult::LeftOf(left)
    } else {
        SearchResult::UpperBound(left)
    }
}

/// Index of the rightmost element less than or equal to `val`, if any.
///
/// This is the breakpoint-lookup primitive: offsets take effect at their
/// breakpoint position and hold until the next one.
pub fn rightmost_at_or_before<T: Ord>(vec: &[T], val: T) -> Option<usize> {
    match search_sorted(vec, val) {
        SearchResult::Exact(idx) => Some(idx),
        SearchResult::LeftOf(idx) => Some(idx - 1),
        SearchResult::LowerBound(_) => None,
        SearchResult::UpperBound(idx) => idx.checked_sub(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_sorted_empty() {
        let vec: Vec<i32> = vec![];
        assert_eq!(search_sorted(&vec, 5), SearchResult::LowerBound(0));
    }

    #[test]
    fn test_search_sorted_exact_match() {
        let vec = vec![1, 2, 3, 4, 5];
        assert_eq!(search_sorted(&vec, 3), SearchResult::Exact(2));
    }

    #[test]
    fn test_search_sorted_no_exact_match_left_of() {
        let vec = vec![1, 3, 5, 7, 9];
        assert_eq!(search_sorted(&vec, 4), SearchResult::LeftOf(2));
    }

    #[test]
    fn test_search_sorted_no_exact_match_lower_bound() {
        let vec = vec![10, 20, 30, 40, 50];
        assert_eq!(search_sorted(&vec, 5), SearchResult::LowerBound(0));
    }

    #[test]
    fn test_search_sorted_no_exact_match_upper_bound() {
        let vec = vec![10, 20, 30, 40, 50];
        assert_eq!(search_sorted(&vec, 55), SearchResult::UpperBound(5));
    }

    #[test]
    fn test_rightmost_at_or_before() {
        let vec = vec![10u64, 20, 30];
        assert_eq!(rightmost_at_or_before(&vec, 5), None);
        assert_eq!(rightmost_at_or_before(&vec, 10), Some(0));
        assert_eq!(rightmost_at_or_before(&vec, 25), Some(1));
        assert_eq!(rightmost_at_or_before(&vec, 30), Some(2));
        assert_eq!(rightmost_at_or_before(&vec, 99), Some(2));
    }

    #[test]
    fn test_rightmost_at_or_before_empty() {
        let vec: Vec<u64> = vec![];
        assert_eq!(rightmost_at_or_before(&vec, 1), None);
    }
}
