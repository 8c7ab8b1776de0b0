use lazy_static::lazy_static;
use prometheus::{Counter, Histogram, register_counter, register_histogram};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("monk_chat_requests_total", "Total number of chat requests").unwrap();
    pub static ref CACHE_HITS: Counter =
        register_counter!("monk_cache_hits_total", "Chat lookups that found cached content").unwrap();
    pub static ref CACHE_MISSES: Counter =
        register_counter!("monk_cache_misses_total", "Chat lookups with no cached content").unwrap();
    pub static ref CACHE_ERRORS: Counter =
        register_counter!("monk_cache_errors_total", "Chat lookups that failed in the store").unwrap();
    pub static ref LLM_RETRIES: Counter =
        register_counter!("monk_llm_retries_total", "Provider calls retried after a rate limit").unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "monk_chat_latency_seconds",
        "Chat request latency in seconds"
    )
    .unwrap();
    pub static ref FETCH_SUCCESS: Counter =
        register_counter!("monk_fetch_success_total", "URLs fetched and cached").unwrap();
    pub static ref FETCH_FAILURES: Counter =
        register_counter!("monk_fetch_failures_total", "URLs that failed to fetch or store").unwrap();
}
