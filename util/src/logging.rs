use std::{
    error::Error,
    fmt,
    fs::{create_dir_all, read_dir, remove_file, rename, File},
    io,
    path::{Path, PathBuf},
    sync::Mutex as StdMutex,
    thread,
};

use flate2::{write::GzEncoder, Compression};

use log4rs::{
    append::{
        console::ConsoleAppender,
        rolling_file::{
            policy::compound::{roll::Roll, trigger::size::SizeTrigger, CompoundPolicy},
            RollingFileAppender,
        },
    },
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
    filter::{Filter, Response},
};

use log::*;

use chrono::prelude::*;

const FILE_SIZE_LIMIT: u64 = 50_000_000;

#[cfg(debug_assertions)]
const LEVEL_FILTER: LevelFilter = LevelFilter::Debug;
#[cfg(not(debug_assertions))]
const LEVEL_FILTER: LevelFilter = LevelFilter::Info;

/// Configures log4rs for a server process.
///
/// Console output is in the form `[HH:MM:SS Level]: message` and highlighted by level. Debug and
/// trace records are only accepted from modules whose path starts with `crate_filter`. If debug
/// assertions are off, then logging events on the debug level are blocked.
///
/// Logs are recorded in `log_directory` as `latest.log`, and rolled into `yyyy-mm-dd-#.log.gz`
/// once they grow past 50MB or on the first roll of a new day.
pub fn init_logger<P: AsRef<Path>>(crate_filter: &str, log_directory: P) -> Result<(), Box<dyn Error>> {
    let log_directory = log_directory.as_ref();
    create_dir_all(log_directory)?;

    let console = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{h([{d(%H:%M:%S)} {l}]: {m})}{n}",
        )))
        .build();

    let logfile = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new("[{d(%H:%M:%S)} {l}]: {m}{n}")))
        .build(
            log_directory.join("latest.log"),
            Box::new(CompoundPolicy::new(
                Box::new(SizeTrigger::new(FILE_SIZE_LIMIT)),
                Box::new(DailyLogRoller::new(log_directory)),
            )),
        )?;

    let config = Config::builder()
        .appender(
            Appender::builder()
                .filter(Box::new(CrateFilter::new(crate_filter)))
                .build("console", Box::new(console)),
        )
        .appender(
            Appender::builder()
                .filter(Box::new(CrateFilter::new(crate_filter)))
                .build("logfile", Box::new(logfile)),
        )
        .build(
            Root::builder()
                .appender("console")
                .appender("logfile")
                .build(LEVEL_FILTER),
        )?;

    log4rs::init_config(config)?;

    Ok(())
}

/// This should be called directly before the main process exits. This function simply compresses the
/// current log file.
pub fn cleanup<P: AsRef<Path>>(log_directory: P) {
    let log_directory = log_directory.as_ref();
    // There's no reason to handle an error here
    let _ = DailyLogRoller::new(log_directory).roll_threaded(&log_directory.join("latest.log"), false);
}

// Only debug output from our own crates
struct CrateFilter {
    filter: String,
}

impl CrateFilter {
    pub fn new(filter: &str) -> Self {
        CrateFilter {
            filter: filter.to_owned(),
        }
    }
}

impl Filter for CrateFilter {
    fn filter(&self, record: &Record<'_>) -> Response {
        if record.level() != Level::Debug && record.level() != Level::Trace {
            return Response::Accept;
        }

        match record.module_path() {
            Some(path) =>
                if path.starts_with(&self.filter) {
                    Response::Accept
                } else {
                    Response::Reject
                },
            None => Response::Reject,
        }
    }
}

impl fmt::Debug for CrateFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrateFilter")
            .field("filter", &self.filter)
            .finish()
    }
}

// Names rolled logs by date, with a counter for multiple rolls on the same day
struct DailyLogRoller {
    directory: PathBuf,
    name_info: StdMutex<(u32, u32)>, // current day, log count for today
}

impl DailyLogRoller {
    pub fn new(directory: &Path) -> Self {
        let mut max_index = 0;

        if let Ok(paths) = read_dir(directory) {
            let today = format!("{}", Local::now().format("%Y-%m-%d"));

            // Find the logs that match today's date and determine the highest index ({date}-{index}.log.gz).
            for path in paths
                .flatten()
                .filter_map(|entry| entry.file_name().into_string().ok())
                .filter(|name| name.starts_with(&today))
            {
                if let Some(index) = Self::index_from_path(&path) {
                    if index > max_index {
                        max_index = index;
                    }
                }
            }
        }

        DailyLogRoller {
            directory: directory.to_owned(),
            name_info: StdMutex::new((Local::now().ordinal(), max_index)),
        }
    }

    fn index_from_path(path: &str) -> Option<u32> {
        let dash_index = path.rfind('-')?;
        let dot_index = path.find('.')?;
        if dash_index + 1 < dot_index {
            path[dash_index + 1 .. dot_index].parse::<u32>().ok()
        } else {
            None
        }
    }

    fn next_index(&self) -> (DateTime<Local>, u32) {
        let mut guard = match self.name_info.lock() {
            Ok(guard) => guard,
            // The counter is still usable after a panic elsewhere
            Err(poisoned) => poisoned.into_inner(),
        };

        let local_datetime = Local::now();
        if local_datetime.ordinal() != guard.0 {
            guard.0 = local_datetime.ordinal();
            guard.1 = 1;
        } else {
            guard.1 += 1;
        }

        (local_datetime, guard.1)
    }

    pub fn roll_threaded(&self, file: &Path, threaded: bool) -> io::Result<()> {
        let (local_datetime, index) = self.next_index();

        // Rename the file in case it's large and will take a while to compress
        let log = self.directory.join("latest-tmp.log");
        rename(file, &log)?;

        let output = self.directory.join(format!(
            "{}-{}.log.gz",
            local_datetime.format("%Y-%m-%d"),
            index
        ));

        if threaded {
            thread::spawn(move || {
                Self::try_compress_log(&log, &output);
            });
        } else {
            Self::try_compress_log(&log, &output);
        }

        Ok(())
    }

    fn try_compress_log(input_path: &Path, output_path: &Path) {
        if let Err(e) = Self::compress_log(input_path, output_path) {
            error!("Failed to compress log file: {}", e);
        }
    }

    // Takes the source file and compresses it, writing to the output path. Removes the source when done.
    fn compress_log(input_path: &Path, output_path: &Path) -> io::Result<()> {
        let mut input = File::open(input_path)?;
        let mut output = GzEncoder::new(File::create(output_path)?, Compression::default());
        io::copy(&mut input, &mut output)?;
        drop(output.finish()?);
        drop(input); // This needs to occur before file deletion on some OS's
        remove_file(input_path)
    }
}

impl Roll for DailyLogRoller {
    fn roll(&self, file: &Path) -> anyhow::Result<()> {
        self.roll_threaded(file, true)?;
        Ok(())
    }
}

impl fmt::Debug for DailyLogRoller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DailyLogRoller")
            .field("directory", &self.directory)
            .finish()
    }
}
