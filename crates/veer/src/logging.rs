use clap::ValueEnum;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> tracing::level_filters::LevelFilter {
        match self {
            LogLevel::Error => tracing::level_filters::LevelFilter::ERROR,
            LogLevel::Warn => tracing::level_filters::LevelFilter::WARN,
            LogLevel::Info => tracing::level_filters::LevelFilter::INFO,
            LogLevel::Debug => tracing::level_filters::LevelFilter::DEBUG,
            LogLevel::Trace => tracing::level_filters::LevelFilter::TRACE,
        }
    }

    /// Level from `VEER_LOG_LEVEL`, if set to a known name.
    pub fn from_env() -> Option<Self> {
        let value = std::env::var("VEER_LOG_LEVEL").ok()?;
        Self::from_str(value.trim(), true).ok()
    }

    /// `DEBUG` in the environment forces debug output, `QUIET` limits output
    /// to warnings. `DEBUG` wins if both are set.
    pub fn with_env_markers(self, debug: bool, quiet: bool) -> Self {
        if debug {
            LogLevel::Debug
        } else if quiet {
            LogLevel::Warn
        } else {
            self
        }
    }
}

pub fn effective_level(requested: LogLevel) -> LogLevel {
    requested.with_env_markers(
        std::env::var_os("DEBUG").is_some(),
        std::env::var_os("QUIET").is_some(),
    )
}

pub fn init_logging(format: LogFormat, level: LogLevel) {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(effective_level(level).as_filter())
        .with_ansi(false)
        .with_target(false);

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}
