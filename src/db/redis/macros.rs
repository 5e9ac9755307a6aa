/// Read-through caching against Redis.
///
/// Returns the cached value when present. Otherwise evaluates the block,
/// queues the result for a background write and returns it. A cache that
/// cannot be reached counts as a miss, so the block still runs.
///
/// # Arguments
/// * `$cache`: a [`Cache`](crate::db::Cache).
/// * `$key`: the [`CacheKey`](crate::db::CacheKey) to read and write.
/// * `$ttl`: time-to-live in seconds for the stored value.
/// * `$block`: future producing `Result<T, AppError>` on a miss.
///
/// # Example
/// ```rust,ignore
/// let titles = cached!(self.cache, CacheKey::Trending(media_type), 600, async move {
///     self.fetch_trending(media_type).await
/// })?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        let cached = match $cache.get_from_cache(&$key).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(error = %e, key = %$key, "Cache read failed, treating as miss");
                None
            }
        };

        match cached {
            Some(value) => Ok(value),
            None => match $block.await {
                Ok(value) => {
                    $cache.set_in_background(&$key, &value, $ttl);
                    Ok(value)
                }
                Err(e) => Err(e),
            },
        }
    }};
}
