//! Default value functions used by serde for config deserialization.

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_base_url() -> String {
    "https://api.telegram.org".to_string()
}

pub fn default_request_timeout() -> u64 {
    75
}

pub fn default_limit() -> u32 {
    100
}

pub fn default_poll_timeout() -> u32 {
    60
}

pub fn default_retry_delay() -> u64 {
    3
}

pub fn default_max_retry_delay() -> u64 {
    60
}

pub fn default_listen_path() -> String {
    "/".to_string()
}

pub fn default_bind() -> String {
    "0.0.0.0:8443".to_string()
}

pub fn default_max_connections() -> u32 {
    40
}

pub fn default_buffer() -> usize {
    100
}
