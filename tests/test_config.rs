use std::io::Write as _;
use std::path::{Path, PathBuf};

use rampart::config::{Config, TriggerMode};
use tempfile::TempDir;

fn write_config(dir: &Path, text: &str) -> PathBuf {
    let path = dir.join("server.yaml");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(text.as_bytes()).unwrap();
    path
}

#[test]
fn test_defaults_when_no_file_is_given() {
    let config = Config::load_or_default(None).unwrap();
    assert_eq!(config.server.listen_addr, "0.0.0.0:8080");
    assert_eq!(config.server.web_root, PathBuf::from("www"));
    assert_eq!(config.server.trigger_mode, TriggerMode::Edge);
    assert_eq!(config.limits.worker_threads, 8);
    assert_eq!(config.limits.read_buffer_size, 2048);
    assert_eq!(config.limits.timeslot_secs, 5);
    assert_eq!(config.log.queue_depth, 0);
}

#[test]
fn test_full_file_overrides_everything() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        dir.path(),
        r#"
server:
  listen_addr: "127.0.0.1:9000"
  web_root: "/srv/www"
  trigger_mode: level
  max_connections: 128
limits:
  read_buffer_size: 4096
  write_buffer_size: 2048
  worker_threads: 4
  queue_depth: 100
  timeslot_secs: 2
  max_events: 256
log:
  dir: "/tmp/rampart-logs"
  file_name: "access.log"
  split_lines: 1000
  queue_depth: 500
"#,
    );

    let config = Config::load(&path).unwrap();
    assert_eq!(config.server.listen_addr, "127.0.0.1:9000");
    assert_eq!(config.server.web_root, PathBuf::from("/srv/www"));
    assert_eq!(config.server.trigger_mode, TriggerMode::Level);
    assert_eq!(config.server.max_connections, 128);
    assert_eq!(config.limits.read_buffer_size, 4096);
    assert_eq!(config.limits.worker_threads, 4);
    assert_eq!(config.limits.max_events, 256);
    assert_eq!(config.log.file_name, "access.log");
    assert_eq!(config.log.split_lines, 1000);

    let log = config.log_config();
    assert_eq!(log.dir, PathBuf::from("/tmp/rampart-logs"));
    assert_eq!(log.queue_depth, 500);
}

#[test]
fn test_partial_file_keeps_defaults_for_the_rest() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        dir.path(),
        r#"
server:
  listen_addr: "127.0.0.1:0"
"#,
    );

    let config = Config::load(&path).unwrap();
    assert_eq!(config.server.listen_addr, "127.0.0.1:0");
    // Untouched sections and keys stay at their defaults.
    assert_eq!(config.server.trigger_mode, TriggerMode::Edge);
    assert_eq!(config.limits.queue_depth, 10000);
    assert_eq!(config.log.file_name, "server.log");
}

#[test]
fn test_missing_file_is_an_error() {
    let err = Config::load(Path::new("/nonexistent/server.yaml")).unwrap_err();
    assert!(err.to_string().contains("reading config file"));
}

#[test]
fn test_invalid_trigger_mode_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        dir.path(),
        r#"
server:
  trigger_mode: sideways
"#,
    );
    assert!(Config::load(&path).is_err());
}
