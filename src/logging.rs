use env_logger::{Builder, Env};

/// `RUST_LOG` wins; otherwise `info`, or `debug` when `verbose`.
pub fn init(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let _ = Builder::from_env(Env::default().default_filter_or(default))
        .format_timestamp_millis()
        .try_init();
}
