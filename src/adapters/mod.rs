//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements  | Connects to               |
//! |------------|-------------|---------------------------|
//! | `log_sink` | EventSink   | Serial log output         |
//! | `nvs`      | ConfigPort  | NVS / in-memory store     |
//! | `time`     | Monotonic   | ESP32 high-res timer      |
//! | `sntp`     | (mailbox)   | ESP-IDF SNTP → NETWORK_TIME |

pub mod log_sink;
pub mod nvs;
pub mod sntp;
pub mod time;
