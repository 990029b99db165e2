/// Receives events while a feed is loaded and validated.
///
/// Every method defaults to doing nothing, so a handler overrides only what it
/// displays. Validation events may arrive from several threads at once when
/// the `parallel` feature is on.
pub trait ProgressHandler: Send + Sync {
    /// Number of files the loader will try, optional ones included.
    fn set_total_files(&self, count: usize) {
        let _ = count;
    }

    fn on_start_file_load(&self, file: &str) {
        let _ = file;
    }

    /// `loaded` is false when reading or parsing the file failed.
    fn on_finish_file_load(&self, file: &str, loaded: bool) {
        let _ = (file, loaded);
    }

    fn set_total_validators(&self, count: usize) {
        let _ = count;
    }

    fn on_start_validation(&self, validator_name: &str) {
        let _ = validator_name;
    }

    /// `findings` counts what the validator reported, including a captured
    /// panic.
    fn on_finish_validation(&self, validator_name: &str, findings: usize) {
        let _ = (validator_name, findings);
    }
}

pub struct NoOpProgressHandler;

impl ProgressHandler for NoOpProgressHandler {}
