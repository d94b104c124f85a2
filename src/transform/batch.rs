/// Groups an iterator into chunks of `size` items. The last chunk carries the
/// remainder and is never padded.
#[derive(Debug, Clone)]
pub struct Batch<I> {
    upstream: I,
    size: usize,
}

impl<I> Batch<I> {
    /// # Panics
    ///
    /// Panics when `size` is zero.
    pub fn new(upstream: I, size: usize) -> Self {
        assert!(size > 0, "batch size must be greater than zero");
        Self { upstream, size }
    }
}

impl<I: Iterator> Iterator for Batch<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut chunk = Vec::with_capacity(self.size);
        for item in self.upstream.by_ref().take(self.size) {
            chunk.push(item);
        }
        if chunk.is_empty() { None } else { Some(chunk) }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (lower, upper) = self.upstream.size_hint();
        (
            lower.div_ceil(self.size),
            upper.map(|upper| upper.div_ceil(self.size)),
        )
    }
}
