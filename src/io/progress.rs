use std::sync::Mutex;

type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

static DOWNLOAD_PROGRESS: Mutex<Option<ProgressFn>> = Mutex::new(None);

/// Install a process-wide download progress hook.
///
/// The CLI uses this to print a percentage line; the web server leaves it
/// unset. Replaces any previously installed hook.
pub fn set_download_progress_callback(cb: impl Fn(u64, u64) + Send + 'static) {
    if let Ok(mut slot) = DOWNLOAD_PROGRESS.lock() {
        *slot = Some(Box::new(cb));
    }
}

pub(crate) fn emit_download_progress(done: u64, total: u64) {
    if let Ok(slot) = DOWNLOAD_PROGRESS.lock() {
        if let Some(cb) = slot.as_ref() {
            cb(done, total);
        }
    }
}
