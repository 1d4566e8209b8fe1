use super::config::PlatformProfile;
use crate::domain::Severity;
use crate::writer::{FanoutWriter, LogWriter, TimestampPrepender};
use parking_lot::RwLock;
use std::sync::Arc;

/// The pair of writers the structured logger currently writes to.
#[derive(Clone)]
pub struct OutputSet {
    pub error: Arc<dyn LogWriter>,
    pub debug: Arc<dyn LogWriter>,
}

impl OutputSet {
    pub fn new(error: Arc<dyn LogWriter>, debug: Arc<dyn LogWriter>) -> Self {
        Self { error, debug }
    }

    /// Timestamped console streams plus a shared timestamped file.
    ///
    /// Both channels write to the same file sink but to distinct console
    /// streams.
    pub fn local(
        stderr: Arc<dyn LogWriter>,
        stdout: Arc<dyn LogWriter>,
        file: Arc<dyn LogWriter>,
    ) -> Self {
        let file: Arc<dyn LogWriter> = Arc::new(TimestampPrepender::new(file));
        Self::new(
            Arc::new(FanoutWriter::new(vec![
                Arc::new(TimestampPrepender::new(stderr)),
                Arc::clone(&file),
            ])),
            Arc::new(FanoutWriter::new(vec![
                Arc::new(TimestampPrepender::new(stdout)),
                file,
            ])),
        )
    }

    /// Adds the remote shipper to the error channel.
    ///
    /// On [`PlatformProfile::Mobile`] the shipper becomes the only error
    /// destination and debug output goes to `stdout` as is. The shipper is
    /// always behind a fan-out so its failures never reach the log call.
    pub fn with_remote(
        &self,
        shipper: Arc<dyn LogWriter>,
        platform: PlatformProfile,
        stdout: Arc<dyn LogWriter>,
    ) -> Self {
        match platform {
            PlatformProfile::Desktop => Self::new(
                Arc::new(FanoutWriter::new(vec![Arc::clone(&self.error), shipper])),
                Arc::clone(&self.debug),
            ),
            PlatformProfile::Mobile => {
                Self::new(Arc::new(FanoutWriter::new(vec![shipper])), stdout)
            }
        }
    }

    pub fn writer(&self, severity: Severity) -> &Arc<dyn LogWriter> {
        match severity {
            Severity::Error => &self.error,
            Severity::Debug => &self.debug,
        }
    }
}

impl std::fmt::Debug for OutputSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputSet").finish_non_exhaustive()
    }
}

/// Holds the live [`OutputSet`].
///
/// Readers clone the current `Arc` and complete their entry against it;
/// installing replaces the whole set at once, so no entry is ever split across
/// two generations.
pub struct OutputSlot {
    current: RwLock<Arc<OutputSet>>,
}

impl OutputSlot {
    pub fn new(initial: OutputSet) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    pub fn current(&self) -> Arc<OutputSet> {
        Arc::clone(&self.current.read())
    }

    /// Installs `set` and returns the previous one.
    pub fn install(&self, set: OutputSet) -> Arc<OutputSet> {
        std::mem::replace(&mut *self.current.write(), Arc::new(set))
    }
}

impl std::fmt::Debug for OutputSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputSlot").finish_non_exhaustive()
    }
}
