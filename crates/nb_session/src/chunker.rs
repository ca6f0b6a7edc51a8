/// Default chunk size, in words.
pub const DEFAULT_CHUNK_SIZE: usize = 30_000;

/// Splits `text` into whitespace-normalized chunks of fewer than `max_units` words.
///
/// Words are added greedily. When the next word would bring the running count up to
/// `max_units`, the current chunk is closed and the word opens the next one. The
/// result is never empty: blank input yields a single empty chunk. A `max_units` of
/// zero behaves like one, which puts every word in its own chunk.
pub fn chunk(text: &str, max_units: usize) -> Vec<String> {
    let max_units = max_units.max(1);
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + 1 >= max_units {
            chunks.push(current.join(" "));
            current.clear();
        }
        current.push(word);
    }
    chunks.push(current.join(" "));

    debug_assert_eq!(
        chunks.join(" "),
        text.split_whitespace().collect::<Vec<_>>().join(" "),
        "chunking must preserve the text"
    );
    chunks
}
