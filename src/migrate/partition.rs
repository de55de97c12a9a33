/// Split `items` into `workers` contiguous slices whose sizes differ by at most one.
///
/// The first `len % workers` slices get one extra item. Order is preserved, so
/// concatenating the slices gives back `items`. Trailing slices may be empty
/// when there are fewer items than workers; `workers == 0` is treated as 1.
pub fn partition<T>(items: &[T], workers: usize) -> Vec<&[T]> {
    let workers = workers.max(1);
    let base = items.len() / workers;
    let remainder = items.len() % workers;
    let mut slices = Vec::with_capacity(workers);
    let mut start = 0usize;
    for i in 0..workers {
        let count = if i < remainder { base + 1 } else { base };
        let end = start + count;
        slices.push(&items[start..end]);
        start = end;
    }
    slices
}
