use crate::error::{Error, Result};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

/// Writes every log line to two sinks
struct Tee<A, B> {
    first: A,
    second: B,
}

impl<A: Write, B: Write> Write for Tee<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.first.write_all(buf)?;
        self.second.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.first.flush()?;
        self.second.flush()
    }
}

/// Initialize `env_logger` (`RUST_LOG`, default `info`), logging to stdout and
/// optionally appending to `log_file` as well
pub fn init(log_file: Option<&Path>) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} - {} - {}",
            buf.timestamp(),
            record.level(),
            record.args()
        )
    });

    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder.target(env_logger::Target::Pipe(Box::new(Tee {
                first: io::stdout(),
                second: file,
            })));
        }
        None => {
            builder.target(env_logger::Target::Stdout);
        }
    }

    builder
        .try_init()
        .map_err(|e| Error::Config(format!("logger already initialized: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tee_writes_both_sinks() {
        let mut tee = Tee {
            first: Vec::new(),
            second: Vec::new(),
        };
        tee.write_all(b"line one\n").unwrap();
        tee.flush().unwrap();

        assert_eq!(tee.first, b"line one\n");
        assert_eq!(tee.second, b"line one\n");
    }
}
