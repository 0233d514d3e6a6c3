//! In-crate test-only logger. Records every emitted record into a
//! shared buffer so unit tests can assert exact log text and level,
//! mirroring astropop's `log_to_list` test helper without pulling in
//! an external log-capture crate.

use std::sync::{Mutex, OnceLock};

use log::{Level, Log, Metadata, Record};

pub struct ListLogger {
    records: Mutex<Vec<(Level, String)>>,
}

impl Log for ListLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        self.records
            .lock()
            .unwrap()
            .push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

static LOGGER: OnceLock<ListLogger> = OnceLock::new();

fn logger() -> &'static ListLogger {
    LOGGER.get_or_init(|| {
        let logger = ListLogger {
            records: Mutex::new(Vec::new()),
        };
        logger
    })
}

/// Installs the list logger as the global logger, if not already
/// installed, and clears any records from a previous test. Tests that
/// assert on log output must run single-threaded with respect to each
/// other (the logger is process-global); call this at the start of
/// each such test.
pub fn reset() -> &'static ListLogger {
    let logger = logger();
    if log::set_logger(logger).is_ok() {
        log::set_max_level(log::LevelFilter::Debug);
    }
    logger.records.lock().unwrap().clear();
    logger
}

impl ListLogger {
    pub fn records(&self) -> Vec<(Level, String)> {
        self.records.lock().unwrap().clone()
    }
}
