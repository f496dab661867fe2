use clap::ValueEnum;
use colored::Colorize;
use log::kv::{self, Key, Value, VisitSource};
use log::{Level, LevelFilter, Record};
use std::io::Write;

/// Crates whose records are capped at `warn` so `--log-level debug` stays readable.
const NOISY_DEPENDENCIES: &[&str] = &[
    "headless_chrome",
    "reqwest",
    "hyper",
    "hyper_util",
    "rustls",
    "tungstenite",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Json,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    None,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::None => LevelFilter::Off,
        }
    }
}

pub fn init_logger(format: LogFormat, level: LogLevel) {
    let level = LevelFilter::from(level);
    let mut builder = env_logger::Builder::new();
    builder.filter(None, level);
    for target in NOISY_DEPENDENCIES {
        builder.filter_module(target, level.min(LevelFilter::Warn));
    }

    match format {
        LogFormat::Text => builder.format(|buf, record| writeln!(buf, "{}", render_text(record))),
        LogFormat::Json => builder.format(|buf, record| {
            let time = buf.timestamp().to_string();
            writeln!(buf, "{}", render_json(&time, record))
        }),
    };

    builder.init();
}

struct Fields(Vec<(String, String)>);

impl<'kvs> VisitSource<'kvs> for Fields {
    fn visit_pair(&mut self, key: Key<'kvs>, value: Value<'kvs>) -> Result<(), kv::Error> {
        self.0.push((key.as_str().to_string(), value.to_string()));
        Ok(())
    }
}

fn fields(record: &Record) -> Vec<(String, String)> {
    let mut fields = Fields(Vec::new());
    // Visiting an in-memory record cannot fail.
    let _ = record.key_values().visit(&mut fields);
    fields.0
}

fn render_text(record: &Record) -> String {
    let level = match record.level() {
        Level::Error => "ERROR".red(),
        Level::Warn => "WARN".yellow(),
        Level::Info => "INFO".green(),
        Level::Debug => "DEBUG".blue(),
        Level::Trace => "TRACE".purple(),
    };

    let mut line = format!("[{}] - {}", level, record.args());
    for (key, value) in fields(record) {
        let needs_quotes =
            value.is_empty() || value.contains(|c: char| c.is_whitespace() || c == '"' || c == '=');
        if needs_quotes {
            line.push_str(&format!(" {key}={value:?}"));
        } else {
            line.push_str(&format!(" {key}={value}"));
        }
    }
    line
}

/// Keys every JSON record carries; record fields with these names get a
/// `field_` prefix instead of replacing them.
const RESERVED_JSON_KEYS: &[&str] = &["time", "level", "msg"];

fn render_json(time: &str, record: &Record) -> String {
    let mut object = serde_json::Map::new();
    object.insert("time".into(), time.into());
    object.insert("level".into(), record.level().as_str().into());
    object.insert("msg".into(), record.args().to_string().into());
    for (key, value) in fields(record) {
        let key = if RESERVED_JSON_KEYS.contains(&key.as_str()) {
            format!("field_{key}")
        } else {
            key
        };
        object.insert(key, value.into());
    }
    serde_json::Value::Object(object).to_string()
}
