//! Process wide output configuration.
//!
//! A [`Pipeline`] owns the local sinks (console streams and the rotating log
//! file) and the live [`OutputSet`]. The structured logger writes through a
//! [`PipelineWriter`], which always picks the set that is live at the start of
//! an entry. Remote shipping is switched on and off by installing a new set.

pub mod config;
pub mod output;

pub use config::{PipelineConfig, PlatformProfile, default_log_dir};
pub use output::{OutputSet, OutputSlot};

use crate::domain::{ConfigError, PipelineError, Severity};
use crate::remote::{
    GeoLookup, RemoteClientFactory, RemoteSettings, RemoteShipper, RemoteShipperConfig,
};
use crate::writer::{ConsoleWriter, LogWriter, RotatingFile};
use parking_lot::Mutex;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{Metadata, debug, error};
use tracing_subscriber::fmt::MakeWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Uninitialized,
    Initialized,
    Closed,
}

struct Control {
    state: PipelineState,
    /// Local-only set, present while initialized.
    base: Option<OutputSet>,
    file: Option<Arc<RotatingFile>>,
    last_addr: String,
    remote_enabled: bool,
    pending: Option<AbortHandle>,
    /// Bumped by `init` and `close`; configure tasks from older generations
    /// never install.
    generation: u64,
}

struct Shared {
    config: PipelineConfig,
    outputs: OutputSlot,
    control: Mutex<Control>,
    factory: Arc<dyn RemoteClientFactory>,
    geo: Arc<dyn GeoLookup>,
    stderr: Arc<dyn LogWriter>,
    stdout: Arc<dyn LogWriter>,
}

impl Shared {
    fn console_set(&self) -> OutputSet {
        OutputSet::new(Arc::clone(&self.stderr), Arc::clone(&self.stdout))
    }

    fn enable_remote(&self, settings: RemoteSettings, generation: u64) {
        if settings.proxy_addr.is_empty() {
            error!("{}, won't report to the remote log service", ConfigError::MissingProxy);
            self.remove_remote(generation);
            return;
        }

        let client = match self.factory.build(&settings) {
            Ok(client) => client,
            Err(e) => {
                error!("Not sending error logs to the remote log service: {e}");
                self.remove_remote(generation);
                return;
            }
        };

        debug!(
            "Sending error logs to the remote log service via proxy at {}",
            settings.proxy_addr
        );

        let shipper = RemoteShipper::new(
            RemoteShipperConfig::capture(&settings),
            client,
            Arc::clone(&self.geo),
        );
        self.add_remote(Arc::new(shipper), generation);
    }

    fn add_remote(&self, shipper: Arc<dyn LogWriter>, generation: u64) {
        let mut control = self.control.lock();
        if control.state == PipelineState::Closed || control.generation != generation {
            return;
        }
        let base = control.base.clone().unwrap_or_else(|| self.console_set());
        self.outputs.install(base.with_remote(
            shipper,
            self.config.platform,
            Arc::clone(&self.stdout),
        ));
        control.remote_enabled = true;
    }

    fn remove_remote(&self, generation: u64) {
        let mut control = self.control.lock();
        if control.state == PipelineState::Closed || control.generation != generation {
            return;
        }
        let base = control.base.clone().unwrap_or_else(|| self.console_set());
        self.outputs.install(base);
        control.remote_enabled = false;
    }
}

/// Builder for [`Pipeline`]; every collaborator has a production default.
pub struct PipelineBuilder {
    config: PipelineConfig,
    factory: Option<Arc<dyn RemoteClientFactory>>,
    geo: Arc<dyn GeoLookup>,
    stderr: Arc<dyn LogWriter>,
    stdout: Arc<dyn LogWriter>,
}

impl PipelineBuilder {
    pub fn client_factory(mut self, factory: Arc<dyn RemoteClientFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn geo_lookup(mut self, geo: Arc<dyn GeoLookup>) -> Self {
        self.geo = geo;
        self
    }

    /// Replaces the console streams, e.g. to capture output.
    pub fn console(mut self, stderr: Arc<dyn LogWriter>, stdout: Arc<dyn LogWriter>) -> Self {
        self.stderr = stderr;
        self.stdout = stdout;
        self
    }

    pub fn build(self) -> Pipeline {
        let factory = self.factory.unwrap_or_else(|| {
            Arc::new(self.config.client_factory()) as Arc<dyn RemoteClientFactory>
        });
        let console = OutputSet::new(Arc::clone(&self.stderr), Arc::clone(&self.stdout));

        Pipeline {
            shared: Arc::new(Shared {
                config: self.config,
                outputs: OutputSlot::new(console),
                control: Mutex::new(Control {
                    state: PipelineState::Uninitialized,
                    base: None,
                    file: None,
                    last_addr: String::new(),
                    remote_enabled: false,
                    pending: None,
                    generation: 0,
                }),
                factory,
                geo: self.geo,
                stderr: self.stderr,
                stdout: self.stdout,
            }),
        }
    }
}

/// The logging pipeline: `init`, `configure`, `close`.
///
/// Cloning is cheap and every clone controls the same pipeline.
#[derive(Clone)]
pub struct Pipeline {
    shared: Arc<Shared>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: PipelineConfig) -> PipelineBuilder {
        PipelineBuilder {
            config,
            factory: None,
            geo: Arc::new(String::new),
            stderr: Arc::new(ConsoleWriter::stderr()),
            stdout: Arc::new(ConsoleWriter::stdout()),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.shared.config
    }

    pub fn state(&self) -> PipelineState {
        self.shared.control.lock().state
    }

    /// Whether the live set currently ships errors remotely.
    pub fn remote_enabled(&self) -> bool {
        self.shared.control.lock().remote_enabled
    }

    /// Address of the most recent accepted `configure` call.
    pub fn last_enabled_address(&self) -> String {
        self.shared.control.lock().last_addr.clone()
    }

    pub fn log_file_path(&self) -> Option<PathBuf> {
        self.shared
            .control
            .lock()
            .file
            .as_ref()
            .map(|file| file.path().to_path_buf())
    }

    pub fn current_outputs(&self) -> Arc<OutputSet> {
        self.shared.outputs.current()
    }

    /// Writer handle for the structured logger.
    pub fn writer(&self) -> PipelineWriter {
        PipelineWriter {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Creates the log directory and file and installs the local outputs.
    ///
    /// Remote configuration made before `init` is discarded.
    pub fn init(&self) -> Result<(), PipelineError> {
        let log_dir = {
            let mut control = self.shared.control.lock();
            if control.state == PipelineState::Initialized {
                return Err(PipelineError::AlreadyInitialized);
            }

            let log_dir = self.shared.config.resolve_log_dir()?;
            std::fs::create_dir_all(&log_dir).map_err(|source| PipelineError::CreateLogDir {
                path: log_dir.clone(),
                source,
            })?;

            let path = log_dir.join(&self.shared.config.file_name);
            let file = RotatingFile::open(&path, self.shared.config.rotation_policy())
                .map_err(|source| PipelineError::OpenLogFile { path, source })?;
            let file = Arc::new(file);

            let base = OutputSet::local(
                Arc::clone(&self.shared.stderr),
                Arc::clone(&self.shared.stdout),
                Arc::clone(&file) as Arc<dyn LogWriter>,
            );
            self.shared.outputs.install(base.clone());

            control.base = Some(base);
            control.file = Some(file);
            control.state = PipelineState::Initialized;
            control.remote_enabled = false;
            control.last_addr.clear();
            control.generation += 1;
            log_dir
        };

        debug!("Placing logs in {}", log_dir.display());
        Ok(())
    }

    /// Enables, re-targets or disables remote shipping of error entries.
    ///
    /// Returns immediately; the remote outputs are installed by a background
    /// task whose handle is returned. `None` means the call was a no-op.
    /// Must be called from within a tokio runtime.
    pub fn configure(
        &self,
        addr: &str,
        ca_pem: &str,
        instance_id: &str,
        version: &str,
        build_date: &str,
    ) -> Option<JoinHandle<()>> {
        let Some(token) = self.shared.config.remote_token() else {
            debug!("{}, not sending error logs remotely", ConfigError::MissingCredential);
            return None;
        };

        if version.is_empty() {
            error!(
                "{}, remote logs won't include version information",
                ConfigError::MissingVersion
            );
            return None;
        }

        if build_date.is_empty() {
            error!(
                "{}, remote logs won't include build date information",
                ConfigError::MissingBuildDate
            );
            return None;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            error!("No async runtime available, not configuring remote logging");
            return None;
        };

        let mut control = self.shared.control.lock();
        if control.last_addr == addr {
            drop(control);
            debug!("Logging configuration unchanged");
            return None;
        }

        let settings = RemoteSettings {
            token: token.to_string(),
            proxy_addr: addr.to_string(),
            ca_pem: ca_pem.to_string(),
            instance_id: instance_id.to_string(),
            version: version.to_string(),
            build_date: build_date.to_string(),
        };

        let shared = Arc::clone(&self.shared);
        let generation = control.generation;
        // The task takes the same lock before installing, so it cannot
        // observe a half-recorded configure.
        let task = runtime.spawn(async move { shared.enable_remote(settings, generation) });
        control.last_addr = addr.to_string();
        control.pending = Some(task.abort_handle());
        Some(task)
    }

    /// Detaches the outputs and closes the log file.
    ///
    /// Call once per `init`; a second call fails because the file is already
    /// closed.
    pub fn close(&self) -> Result<(), PipelineError> {
        let file = {
            let mut control = self.shared.control.lock();
            if let Some(pending) = control.pending.take() {
                pending.abort();
            }
            let Some(file) = control.file.clone() else {
                return Err(PipelineError::NotInitialized);
            };

            self.shared.outputs.install(self.shared.console_set());
            control.base = None;
            control.state = PipelineState::Closed;
            control.generation += 1;
            control.last_addr.clear();
            control.remote_enabled = false;
            file
        };

        file.close().map_err(PipelineError::CloseLogFile)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.shared.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// `MakeWriter` for `tracing_subscriber::fmt`.
///
/// ERROR events go to the error channel, every other level to the debug
/// channel.
#[derive(Clone)]
pub struct PipelineWriter {
    shared: Arc<Shared>,
}

impl PipelineWriter {
    pub fn entry_writer(&self, severity: Severity) -> EntryWriter {
        let outputs = self.shared.outputs.current();
        EntryWriter {
            target: Arc::clone(outputs.writer(severity)),
        }
    }
}

impl<'a> MakeWriter<'a> for PipelineWriter {
    type Writer = EntryWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.entry_writer(Severity::Debug)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        self.entry_writer(Severity::from(meta.level()))
    }
}

/// Writes entries to one channel of the set that was live when it was made.
///
/// Every `write` call is one entry.
pub struct EntryWriter {
    target: Arc<dyn LogWriter>,
}

impl io::Write for EntryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.target.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
