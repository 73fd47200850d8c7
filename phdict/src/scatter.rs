use alloc::vec::Vec;

/// Move elements from `x = source[i]` to `destination[permutation(x)]`.
///
/// `permutation` must map the elements to distinct in-bounds indices. Elements mapped to `None`
/// are dropped.
pub(crate) fn scatter<T>(
    source: Vec<T>,
    mut permutation: impl FnMut(&T) -> Option<usize>,
    destination: &mut [Option<T>],
) {
    for element in source {
        let index = permutation(&element);
        debug_assert!(index.is_some(), "element without an index");
        if let Some(index) = index {
            debug_assert!(destination[index].is_none(), "two elements share index {index}");
            destination[index] = Some(element);
        }
    }
}
