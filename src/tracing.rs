use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

/// Tees formatted log lines to stderr and, once configured, a log file.
#[derive(Clone)]
struct SharedWriter {
    inner: Arc<Mutex<Option<File>>>,
}

struct MultiWriter {
    inner: Arc<Mutex<Option<File>>>,
}

impl SharedWriter {
    fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
        }
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedWriter {
    type Writer = MultiWriter;

    fn make_writer(&'a self) -> Self::Writer {
        MultiWriter {
            inner: self.inner.clone(),
        }
    }
}

impl MultiWriter {
    fn with_file(&self, f: impl FnOnce(&mut File)) {
        // A poisoned lock only means another writer panicked mid-line.
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(file) = guard.as_mut() {
            f(file);
        }
    }
}

impl Write for MultiWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = io::stderr().write(buf)?;
        self.with_file(|file| {
            let _ = file.write_all(&buf[..written]);
        });
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.with_file(|file| {
            let _ = file.flush();
        });
        Ok(())
    }
}

static WRITER: OnceLock<SharedWriter> = OnceLock::new();

/// Installs the global subscriber once; `RUST_LOG` overrides the default
/// `info` level. Later calls only swap the log file.
pub fn init(log_file: Option<&Path>) {
    let writer = WRITER.get_or_init(|| {
        let _ = tracing_log::LogTracer::init();

        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

        let writer = SharedWriter::new();
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(writer.clone())
            .try_init();
        writer
    });
    set_log_file(writer, log_file);
}

fn set_log_file(writer: &SharedWriter, log_file: Option<&Path>) {
    let file = log_file.and_then(|path| {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            let _ = std::fs::create_dir_all(parent);
        }
        OpenOptions::new().create(true).append(true).open(path).ok()
    });
    let mut guard = match writer.inner.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    *guard = file;
}
