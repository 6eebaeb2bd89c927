use std::fs::OpenOptions;
use std::io;
use std::sync::Mutex;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::access::GlId;
use crate::config::{Config, LogFormat};

/// Install the global subscriber: JSON or text, to `log_file` or stderr
pub fn init(config: &Config) -> io::Result<()> {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = match (&config.log_file, config.log_format) {
        (Some(path), format) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let builder = builder.with_ansi(false).with_writer(Mutex::new(file));
            match format {
                LogFormat::Json => builder.json().try_init(),
                LogFormat::Text => builder.try_init(),
            }
        }
        (None, LogFormat::Json) => builder.json().with_writer(io::stderr).try_init(),
        (None, LogFormat::Text) => builder.with_writer(io::stderr).try_init(),
    };

    result.map_err(|e| io::Error::other(e.to_string()))
}

/// Record the process about to replace the gateway
pub fn log_command_execution(command: &str, user: &str, gl_id: &GlId) {
    info!(
        command = %command,
        user = %user,
        gl_key_type = %gl_id.key_type().as_str(),
        gl_key_id = %gl_id.id(),
        "executing git command"
    );
}

/// Record a refused access check
pub fn log_access_denied(command: &str, user: &str) {
    warn!(command = %command, user = %user, "access denied");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    impl Captured {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn capture<F: FnOnce()>(f: F) -> String {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(captured.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        captured.contents()
    }

    #[test]
    fn test_log_command_execution() {
        let output = capture(|| {
            log_command_execution(
                "git-upload-pack /repos/group/repo.git",
                "user with id key-123",
                &GlId::key("123"),
            )
        });

        assert_eq!(output.lines().count(), 1);
        assert!(output.contains("INFO"));
        assert!(output.contains("executing git command"));
        assert!(output.contains("command=git-upload-pack /repos/group/repo.git"));
        assert!(output.contains("gl_key_type=key"));
        assert!(output.contains("gl_key_id=123"));
    }

    #[test]
    fn test_log_access_denied_is_warning() {
        let output = capture(|| log_access_denied("git-receive-pack group/repo", "@alice"));

        assert!(output.contains("WARN"));
        assert!(output.contains("access denied"));
        assert!(output.contains("@alice"));
    }
}
