use std::{
    fs,
    io::{self, BufWriter, Write},
    path::Path,
    time::Duration,
};

use reqwest::blocking::Client;

use crate::{error::Result, io::progress::emit_download_progress};

pub fn http_client() -> Client {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(60 * 60))
        .build()
        .expect("reqwest client build failed")
}

/// Counts bytes through to the inner writer, reporting after each chunk.
struct ProgressWriter<W: Write> {
    inner: W,
    written: u64,
    total: u64,
}

impl<W: Write> Write for ProgressWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        emit_download_progress(self.written, self.total);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Download `url` to `dest`, writing through a `.part` file so an
/// interrupted transfer never leaves a truncated artifact at `dest`.
pub fn download_with_progress(client: &Client, url: &str, dest: &Path) -> Result<()> {
    let part = dest.with_extension("part");

    let mut resp = client.get(url).send()?.error_for_status()?;
    let total = resp.content_length().unwrap_or(0);
    emit_download_progress(0, total);

    let mut writer = ProgressWriter {
        inner: BufWriter::new(fs::File::create(&part)?),
        written: 0,
        total,
    };
    io::copy(&mut resp, &mut writer)?;
    writer.flush()?;
    let written = writer.written;
    drop(writer);

    if dest.exists() {
        fs::remove_file(dest).ok();
    }
    fs::rename(&part, dest)?;

    emit_download_progress(total.max(written), total.max(written));
    Ok(())
}
