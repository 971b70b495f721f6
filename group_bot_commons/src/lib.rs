//! Boilerplate shared by the group bots: logger and runtime setup, plus
//! a few helpers around teloxide types that every bot ends up needing.

use std::future::Future;

pub mod useful_methods;

/// Re-exports used by the macros of this crate, so that users of them don't
/// need to depend on the exact same crates themselves.
#[doc(hidden)]
pub mod reexports {
    pub use log;
    pub use teloxide;
    pub use tokio;
}

/// Initialize logging and start the `closure` in an async runtime.
/// Logging is enabled by default on level `info` unless overridden
/// by environment variable `RUST_LOG`. This uses the crate
/// [pretty_env_logger][] internally, see its documentation for more details.
///
/// # Panics
///
/// Panics if the tokio runtime could not be built.
///
/// [pretty_env_logger]: https://docs.rs/pretty_env_logger
pub fn start_everything(closure: impl Future<Output = ()>) {
    let log_level = std::env::var_os("RUST_LOG")
        .unwrap_or_else(|| std::ffi::OsString::from("info"))
        .into_string()
        .unwrap_or_else(|_| String::from("info"));

    // journald timestamps everything on its own.
    let running_as_systemd_service = std::env::var_os("JOURNAL_STREAM").is_some();

    let mut builder = match running_as_systemd_service {
        true => pretty_env_logger::formatted_builder(),
        false => pretty_env_logger::formatted_timed_builder(),
    };

    builder.parse_filters(&log_level);

    if builder.try_init().is_err() {
        log::error!("Tried to init logger twice!");
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build the tokio runtime!")
        .block_on(closure);
}

/// How many times [`teloxide_retry`] retries a request that hit flood control.
pub const FLOOD_RETRY_ATTEMPTS: u8 = 3;

/// Evaluate an expression producing a `Result<_, teloxide::RequestError>`,
/// typically a request with `.await` at the end, and evaluate it again after
/// sleeping if Telegram answered with a flood control error.
///
/// Gives up after [`FLOOD_RETRY_ATTEMPTS`] retries and returns whatever the
/// last attempt returned.
#[macro_export]
macro_rules! teloxide_retry {
    ($request:expr) => {{
        let mut retries_left: u8 = $crate::FLOOD_RETRY_ATTEMPTS;
        loop {
            match $request {
                Err($crate::reexports::teloxide::RequestError::RetryAfter(seconds))
                    if retries_left > 0 =>
                {
                    retries_left -= 1;
                    $crate::reexports::log::warn!(
                        "Hit flood control, retrying in {} seconds",
                        seconds.seconds()
                    );
                    $crate::reexports::tokio::time::sleep(seconds.duration()).await;
                }
                result => break result,
            }
        }
    }};
}

#[cfg(test)]
mod tests {
    use teloxide::{types::Seconds, ApiError, RequestError};

    #[tokio::test]
    async fn retry_passes_through_other_errors() {
        let mut calls = 0;
        let result: Result<(), RequestError> = teloxide_retry!({
            calls += 1;
            Err(RequestError::Api(ApiError::MessageCantBeDeleted))
        });

        assert!(matches!(
            result,
            Err(RequestError::Api(ApiError::MessageCantBeDeleted))
        ));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn retry_gives_up_eventually() {
        let mut calls = 0;
        let result: Result<(), RequestError> = teloxide_retry!({
            calls += 1;
            Err(RequestError::RetryAfter(Seconds::from_seconds(0)))
        });

        assert!(matches!(result, Err(RequestError::RetryAfter(_))));
        assert_eq!(calls, u32::from(super::FLOOD_RETRY_ATTEMPTS) + 1);
    }

    #[tokio::test]
    async fn retry_recovers_after_flood_control() {
        let mut calls = 0;
        let result: Result<u8, RequestError> = teloxide_retry!({
            calls += 1;
            if calls < 2 {
                Err(RequestError::RetryAfter(Seconds::from_seconds(0)))
            } else {
                Ok(42)
            }
        });

        assert!(matches!(result, Ok(42)));
        assert_eq!(calls, 2);
    }
}
