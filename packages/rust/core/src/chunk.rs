//! Lazy grouping of a stream into bounded batches.
//!
//! Only the batch being filled is held in memory.

use std::num::NonZeroUsize;

/// Batches of at most `size` items; the last one may be shorter.
pub fn chunk<I: IntoIterator>(iter: I, size: NonZeroUsize) -> Chunks<I::IntoIter> {
    Chunks {
        iter: iter.into_iter(),
        size: size.get(),
    }
}

/// Like [`chunk`] over fallible items. The first error is yielded in place
/// of the batch it interrupted, which is discarded, and the stream ends.
pub fn try_chunk<I, T, E>(iter: I, size: NonZeroUsize) -> TryChunks<I::IntoIter>
where
    I: IntoIterator<Item = Result<T, E>>,
{
    TryChunks {
        iter: iter.into_iter(),
        size: size.get(),
        done: false,
    }
}

pub struct Chunks<I> {
    iter: I,
    size: usize,
}

impl<I: Iterator> Iterator for Chunks<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch: Vec<_> = self.iter.by_ref().take(self.size).collect();
        (!batch.is_empty()).then_some(batch)
    }
}

pub struct TryChunks<I> {
    iter: I,
    size: usize,
    done: bool,
}

impl<I, T, E> Iterator for TryChunks<I>
where
    I: Iterator<Item = Result<T, E>>,
{
    type Item = Result<Vec<T>, E>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut batch = Vec::new();
        while batch.len() < self.size {
            match self.iter.next() {
                Some(Ok(item)) => batch.push(item),
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    break;
                }
            }
        }
        (!batch.is_empty()).then_some(Ok(batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn groups_with_short_tail() {
        let lens: Vec<usize> = chunk(0..2500, size(1000)).map(|b| b.len()).collect();
        assert_eq!(lens, vec![1000, 1000, 500]);
    }

    #[test]
    fn exact_multiple_has_no_empty_tail() {
        let batches: Vec<_> = chunk(0..6, size(3)).collect();
        assert_eq!(batches, vec![vec![0, 1, 2], vec![3, 4, 5]]);
    }

    #[test]
    fn empty_stream_has_no_batches() {
        assert_eq!(chunk(std::iter::empty::<u8>(), size(4)).count(), 0);
    }

    #[test]
    fn pulls_only_one_batch_at_a_time() {
        let pulled = Cell::new(0usize);
        let source = (0..).inspect(|_| pulled.set(pulled.get() + 1));
        let mut batches = chunk(source, size(10));

        assert_eq!(batches.next().unwrap().len(), 10);
        assert_eq!(pulled.get(), 10);
        assert_eq!(batches.next().unwrap()[0], 10);
        assert_eq!(pulled.get(), 20);
    }

    #[test]
    fn error_discards_partial_batch_and_ends() {
        let items: Vec<Result<u32, &str>> = vec![Ok(1), Ok(2), Ok(3), Ok(4), Err("bad row"), Ok(6)];
        let mut batches = try_chunk(items, size(3));
        assert_eq!(batches.next(), Some(Ok(vec![1, 2, 3])));
        assert_eq!(batches.next(), Some(Err("bad row")));
        assert_eq!(batches.next(), None);
    }

    #[test]
    fn fallible_without_errors_matches_plain() {
        let items = (0..7).map(Ok::<_, ()>);
        let lens: Vec<usize> = try_chunk(items, size(3)).map(|b| b.unwrap().len()).collect();
        assert_eq!(lens, vec![3, 3, 1]);
    }
}
